//! Entry point for the **wmiinav** window-navigation helper.
//!
//! Dispatches on the first positional argument: `nav` (the default) runs
//! one listing/selection/focus round against wmii, `status` keeps a bar
//! file updated until the process is killed.

use log::{error, info};
use wmiinav::config::Config;
use wmiinav::menu::Menu;
use wmiinav::wmii::wm::Wmii;

/// Resolve the config directory (`$XDG_CONFIG_HOME/wmiinav`).
fn config_dir() -> std::path::PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME").unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        format!("{}/.config", home)
    });
    std::path::PathBuf::from(base).join("wmiinav")
}

/// Try to load the config from `$XDG_CONFIG_HOME/wmiinav/config.json`,
/// falling back to compiled-in defaults.
fn load_config() -> Config {
    let path = config_dir().join("config.json");
    match Config::load(&path) {
        Ok(cfg) => {
            info!("loaded config from {}", path.display());
            cfg
        }
        Err(e) => {
            info!("no config file ({}), using defaults", e);
            Config::default()
        }
    }
}

/// Connect to wmii or die trying.
fn connect() -> Wmii {
    match Wmii::connect() {
        Ok(wm) => wm,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}

//  Main

fn main() {
    env_logger::init();

    let command = std::env::args().nth(1).unwrap_or_else(|| "nav".into());
    match command.as_str() {
        "nav" => run_nav(),
        "status" => run_status(),
        other => {
            error!("unknown command {:?} (expected nav or status)", other);
            std::process::exit(1);
        }
    }
}

/// One navigation round: list, pick, focus.
fn run_nav() {
    let config = load_config();
    let mut wm = connect();
    let menu = Menu::from_config(&config.menu);
    if let Err(e) = wmiinav::nav::run(&mut wm, &menu) {
        error!("{}", e);
        std::process::exit(1);
    }
}

/// The periodic bar publisher; runs until killed.
fn run_status() {
    let config = load_config();
    let mut wm = connect();
    wmiinav::status::run(&mut wm, &config.status);
}

//! Periodic status publishing.
//!
//! Fills a bar file with a load-average and wall-clock line on a fixed
//! interval.  A failed host read falls back to placeholder text and a
//! failed bar write is logged; the loop only ends with the process.

use std::env;
use std::fmt;
use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone};
use log::{debug, info, warn};

use crate::config::StatusConfig;
use crate::wmii::wm::Wmii;

/// Colour scheme for the bar, as exported by wmii itself.
const COLORS_ENV: &str = "WMII_NORMCOLORS";

const LOAD_PATH: &str = "/proc/loadavg";
const LOAD_PLACEHOLDER: &str = "? ? ?";

/// `date`-style stamp, e.g. `Sat Aug 22 13:05:09 2026`.
const TIME_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

/// Publish the status line to the configured bar file, forever.
///
/// The bar file is created up front with the colour scheme from
/// `$WMII_NORMCOLORS`; wmii refuses the create when the file already
/// exists, so that failure is expected on restarts.
pub fn run(wm: &mut Wmii, config: &StatusConfig) -> ! {
    let colors = env::var(COLORS_ENV).unwrap_or_default();
    if let Err(e) = wm.create_bar(&config.bar, &colors) {
        debug!("create {}: {}", config.bar, e);
    }

    info!(
        "publishing status to {} every {}ms",
        config.bar, config.interval_ms
    );
    let interval = Duration::from_millis(config.interval_ms);
    loop {
        tick(wm, &config.bar);
        thread::sleep(interval);
    }
}

/// One publish: compose the line and write it out.
fn tick(wm: &mut Wmii, bar: &str) {
    let line = format!(
        "{} | {}",
        read_load(Path::new(LOAD_PATH)),
        timestamp(Local::now())
    );
    if let Err(e) = wm.set_bar(bar, &line) {
        warn!("status write failed: {}", e);
    }
}

/// The first three fields of the load-average file, or a placeholder when
/// the host cannot supply them.
fn read_load(path: &Path) -> String {
    match fs::read(path) {
        Ok(raw) => load_fields(&raw),
        Err(_) => LOAD_PLACEHOLDER.to_string(),
    }
}

fn load_fields(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .split(' ')
        .take(3)
        .collect::<Vec<_>>()
        .join(" ")
}

fn timestamp<Tz: TimeZone>(now: DateTime<Tz>) -> String
where
    Tz::Offset: fmt::Display,
{
    now.format(TIME_FORMAT).to_string()
}

//  Tests

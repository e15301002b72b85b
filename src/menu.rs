//! [`Picker`] implementation backed by an external dmenu-style program.
//!
//! The menu process receives one candidate per line on stdin and prints
//! the chosen line on stdout.  Empty output means the user cancelled.

use crate::config::MenuConfig;
use crate::traits::Picker;
use std::io::Write;
use std::process::{Command, Stdio};
use std::thread;

/// An external line-oriented menu program such as dmenu.
pub struct Menu {
    program: String,
    args: Vec<String>,
}

/// Errors that can occur when running the menu program.
#[derive(Debug, thiserror::Error)]
#[error("menu error: {0}")]
pub struct MenuError(String);

impl Menu {
    pub fn new(program: &str, args: &[String]) -> Menu {
        Menu {
            program: program.to_string(),
            args: args.to_vec(),
        }
    }

    pub fn from_config(cfg: &MenuConfig) -> Menu {
        Menu {
            program: cfg.program.clone(),
            args: cfg.args.clone(),
        }
    }
}

/// Match the menu's raw stdout against the candidate lines.
///
/// Empty output means the user cancelled.  Output matching no candidate
/// (the user typed free text) is also treated as "no selection".
fn find_choice(stdout: &[u8], items: &[String]) -> Option<usize> {
    if stdout.is_empty() {
        return None;
    }
    let raw = String::from_utf8_lossy(stdout);
    let chosen = raw.strip_suffix('\n').unwrap_or(&raw);
    items.iter().position(|item| item.as_str() == chosen)
}

impl Picker for Menu {
    type Error = MenuError;

    fn choose(&self, items: &[String]) -> Result<Option<usize>, MenuError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|e| MenuError(format!("failed to run {}: {}", self.program, e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| MenuError("menu stdin was not piped".into()))?;

        // The menu may start printing before it has consumed all of its
        // input, so a second thread feeds stdin while this one waits for
        // the output.  A menu that exits early closes its end of the pipe;
        // stop feeding when that happens.
        let feeder = {
            let lines = items.to_vec();
            thread::spawn(move || {
                for line in &lines {
                    if writeln!(stdin, "{}", line).is_err() {
                        break;
                    }
                }
                // Dropping stdin closes the pipe, signalling end-of-list.
            })
        };

        let output = child
            .wait_with_output()
            .map_err(|e| MenuError(format!("failed to wait for {}: {}", self.program, e)))?;
        if feeder.join().is_err() {
            return Err(MenuError("menu stdin feeder panicked".into()));
        }

        Ok(find_choice(&output.stdout, items))
    }
}

//  Tests

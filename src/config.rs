//! Application configuration.
//!
//! The configuration is loaded from a JSON file at
//! `$XDG_CONFIG_HOME/wmiinav/config.json`.  The top-level schema uses
//! per-section keys so the file can be extended with additional sections
//! later without breaking backward compatibility.
//!
//! # Example
//!
//! ```json
//! {
//!   "menu": {
//!     "program": "dmenu",
//!     "args": ["-l", "7", "-i", "-b"]
//!   },
//!   "status": {
//!     "bar": "/rbar/status",
//!     "interval_ms": 1000
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration.
///
/// Every field is optional; a minimal `{}` file is valid and all sections
/// fall back to their compiled-in defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Picker program settings.
    #[serde(default)]
    pub menu: MenuConfig,

    /// Status bar publishing settings.
    #[serde(default)]
    pub status: StatusConfig,
}

/// Picker program settings.
///
/// The program is fed one candidate line per window on standard input and
/// is expected to print the chosen line on standard output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MenuConfig {
    /// Picker executable, looked up on `$PATH`.
    pub program: String,
    /// Arguments passed to the picker.
    pub args: Vec<String>,
}

impl Default for MenuConfig {
    fn default() -> Self {
        Self {
            program: "dmenu".into(),
            args: vec!["-l".into(), "7".into(), "-i".into(), "-b".into()],
        }
    }
}

/// Status bar publishing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Bar file the status line is written to.
    pub bar: String,
    /// Delay between status updates (ms).
    pub interval_ms: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            bar: "/rbar/status".into(),
            interval_ms: 1000,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError(format!("failed to read {}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| ConfigError(format!("failed to parse {}: {}", path.display(), e)))?;
        Ok(config)
    }
}

/// Error from loading or parsing a configuration file.
#[derive(Debug, thiserror::Error)]
#[error("config error: {0}")]
pub struct ConfigError(String);

//! [`WindowManager`] implementation backed by wmii's 9P file server.
//!
//! Communicates directly with wmii through the Unix socket advertised by
//! `$WMII_ADDRESS` (falling back to the plan9port namespace directory),
//! avoiding any shell-out to `wmiir`.
//!
//! The namespace paths in play:
//!
//! | Path                 | Use                                        |
//! |----------------------|--------------------------------------------|
//! | `/client`            | One directory per window, plus `sel`       |
//! | `/client/<id>/props` | Freeform window label                      |
//! | `/client/<id>/tags`  | `+`-joined tags; write `+<tag>` to append  |
//! | `/ctl`               | `view <tag>` line; write to switch views   |
//! | `/tag/sel/ctl`       | Write `select client <id>` to focus        |
//! | `/rbar/*`            | Status bar files                           |

use crate::ninep::client::{Conn, Fsys};
use crate::ninep::NinepError;
use crate::traits::WindowManager;
use crate::window::{parse_tags, Window};
use log::error;
use std::path::PathBuf;

/// wmii-backed window manager.
///
/// Holds one attached 9P session for its whole lifetime; dropping it
/// releases the session.
pub struct Wmii {
    fs: Fsys,
}

/// Errors that can occur when talking to wmii.
#[derive(Debug, thiserror::Error)]
pub enum WmiiError {
    /// The wmii service could not be located or attached.
    #[error("cannot reach wmii: {0}")]
    Connect(String),

    /// A 9P operation failed after the session was established.
    #[error("{0}")]
    Ninep(#[from] NinepError),
}

impl Wmii {
    /// Connect to the wmii service and attach to its namespace root.
    ///
    /// No retry: if wmii is not running the caller should surface the
    /// error and exit.
    pub fn connect() -> Result<Wmii, WmiiError> {
        let path = service_address()?;
        let conn = Conn::dial(&path)
            .map_err(|e| WmiiError::Connect(format!("dial {}: {}", path.display(), e)))?;
        // wmii ignores both the user name and the attach name.
        let fs = conn
            .attach("", "")
            .map_err(|e| WmiiError::Connect(format!("attach: {}", e)))?;
        Ok(Wmii { fs })
    }

    #[cfg(test)]
    pub(crate) fn from_fsys(fs: Fsys) -> Wmii {
        Wmii { fs }
    }

    /// Read one metadata file under `/client/<id>/`, degrading to an empty
    /// string on failure: one unreadable window must not break the whole
    /// listing.
    fn read_field(&mut self, id: &str, file: &str) -> String {
        let path = format!("/client/{}/{}", id, file);
        match self.fs.read(&path) {
            Ok(data) => String::from_utf8_lossy(&data).into_owned(),
            Err(e) => {
                error!("read {}: {}", path, e);
                String::new()
            }
        }
    }

    //  Status bar

    /// Create the status bar file at `path`, writing its colorscheme line.
    pub fn create_bar(&mut self, path: &str, colors: &str) -> Result<(), WmiiError> {
        self.fs.create(path, format!("{}\n", colors).as_bytes())?;
        Ok(())
    }

    /// Replace the text of the status bar file at `path`.
    pub fn set_bar(&mut self, path: &str, text: &str) -> Result<(), WmiiError> {
        self.fs.write(path, text.as_bytes())?;
        Ok(())
    }
}

//  Service discovery

/// Resolve the Unix socket wmii is serving 9P on.
fn service_address() -> Result<PathBuf, WmiiError> {
    address_from(
        std::env::var("WMII_ADDRESS").ok().as_deref(),
        std::env::var("NAMESPACE").ok().as_deref(),
        std::env::var("USER").ok().as_deref(),
        std::env::var("DISPLAY").ok().as_deref(),
    )
}

/// The resolution ladder wmii's own tools use:
///
/// 1. `$WMII_ADDRESS`, a dial string like `unix!/path/to/socket`;
/// 2. `$NAMESPACE/wmii`;
/// 3. `/tmp/ns.$USER.$DISPLAY/wmii`, where a trailing `.0` is stripped
///    from the display (`:0.0` and `:0` name the same namespace).
fn address_from(
    wmii_address: Option<&str>,
    namespace: Option<&str>,
    user: Option<&str>,
    display: Option<&str>,
) -> Result<PathBuf, WmiiError> {
    if let Some(addr) = wmii_address.filter(|a| !a.is_empty()) {
        let path = addr.strip_prefix("unix!").ok_or_else(|| {
            WmiiError::Connect(format!("unsupported wmii address {:?}", addr))
        })?;
        return Ok(PathBuf::from(path));
    }
    if let Some(ns) = namespace.filter(|n| !n.is_empty()) {
        return Ok(PathBuf::from(ns).join("wmii"));
    }
    let mut disp = display.filter(|d| !d.is_empty()).unwrap_or(":0.0").to_string();
    if disp.ends_with(".0") {
        disp.truncate(disp.len() - 2);
    }
    let disp = disp.replace('/', "_");
    Ok(PathBuf::from(format!("/tmp/ns.{}.{}", user.unwrap_or(""), disp)).join("wmii"))
}

/// Extract the visible tag from the contents of `/ctl`.
///
/// wmii reports one `view <tag>` line among the control lines; its absence
/// is not an error.
fn parse_view(ctl: &str) -> Option<String> {
    ctl.lines()
        .find_map(|line| line.strip_prefix("view "))
        .map(|tag| tag.trim().to_string())
}

//  WindowManager implementation

impl WindowManager for Wmii {
    type Error = WmiiError;

    fn windows(&mut self) -> Result<Vec<Window>, Self::Error> {
        let entries = self.fs.read_dir("/client")?;
        let mut windows = Vec::with_capacity(entries.len());
        for entry in entries {
            // `sel` is wmii's alias for the selected window, not a window
            // of its own.
            if entry.name == "sel" {
                continue;
            }
            windows.push(Window {
                props: self.read_field(&entry.name, "props"),
                tags: parse_tags(&self.read_field(&entry.name, "tags")),
                id: entry.name,
            });
        }
        Ok(windows)
    }

    fn current_tag(&mut self) -> Result<Option<String>, Self::Error> {
        let data = self.fs.read("/ctl")?;
        Ok(parse_view(&String::from_utf8_lossy(&data)))
    }

    fn view(&mut self, tag: &str) -> Result<(), Self::Error> {
        self.fs.write("/ctl", format!("view {}\n", tag).as_bytes())?;
        Ok(())
    }

    fn select_client(&mut self, id: &str) -> Result<(), Self::Error> {
        self.fs
            .write("/tag/sel/ctl", format!("select client {}\n", id).as_bytes())?;
        Ok(())
    }

    fn add_tag(&mut self, id: &str, tag: &str) -> Result<(), Self::Error> {
        self.fs
            .write(&format!("/client/{}/tags", id), format!("+{}", tag).as_bytes())?;
        Ok(())
    }
}

//  Tests

//! The window model shared by the navigation flow and the wmii backend.

use std::fmt;

/// One client window, as listed under wmii's `/client` directory.
///
/// A fresh listing is taken on every navigation; nothing is cached across
/// invocations.  A window with no tags is a valid transient state: the
/// first selection assigns it the currently visible tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    /// Opaque window id assigned by wmii, e.g. `0x2200002`.
    pub id: String,
    /// Freeform property string (instance, class, title).  May be empty.
    pub props: String,
    /// The window's tags.
    pub tags: Vec<String>,
}

impl Window {
    /// The line presented to the picker for the window at `index`.
    pub fn menu_line(&self, index: usize) -> String {
        format!("<{}> [{}] {}", index, self.tags.join("+"), self.props)
    }

    /// Append `tag` to the local tag set and re-sort it.
    ///
    /// Callers that also update the window manager must keep the remote
    /// side in sync; see `WindowManager::add_tag`.
    pub fn append_tag(&mut self, tag: &str) {
        self.tags.push(tag.to_string());
        self.tags.sort_unstable();
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.id, self.props, self.tags.join("+"))
    }
}

/// Split wmii's `+`-joined tag syntax into individual tags.
///
/// Empty segments are dropped, so a leading or trailing `+` (or an empty
/// value) never produces an empty tag.
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split('+')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

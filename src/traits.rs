//! Core traits that decouple the navigation flow from wmii and from any
//! specific picker program.
//!
//! [`nav::run`](crate::nav::run) only depends on these abstractions, so the
//! tag-resolution logic is tested against in-memory fakes instead of a
//! live window manager and a real menu process.

use crate::window::Window;

/// Abstraction over a window manager that lists windows and manipulates
/// tag and selection state.
///
/// Methods take `&mut self` because the wmii backend funnels every
/// operation through a single stateful 9P session.
///
/// # Contract
///
/// * [`windows`](WindowManager::windows) returns a fresh listing on every
///   call; implementations must not cache across calls.
/// * [`add_tag`](WindowManager::add_tag) appends to the window's existing
///   tags, it never replaces them.
pub trait WindowManager {
    /// The error type produced by this window manager.
    type Error: std::error::Error + Send + 'static;

    /// List all real windows (synthetic entries excluded).
    fn windows(&mut self) -> Result<Vec<Window>, Self::Error>;

    /// Return the currently visible tag, or `None` if the manager did not
    /// report one.
    fn current_tag(&mut self) -> Result<Option<String>, Self::Error>;

    /// Make `tag` the visible tag.
    fn view(&mut self, tag: &str) -> Result<(), Self::Error>;

    /// Focus the window with id `id` within the visible tag.
    fn select_client(&mut self, id: &str) -> Result<(), Self::Error>;

    /// Append `tag` to the tags of the window with id `id`.
    fn add_tag(&mut self, id: &str, tag: &str) -> Result<(), Self::Error>;
}

/// An interactive chooser that is fed one line per candidate.
///
/// # Contract
///
/// * [`choose`](Picker::choose) blocks until the picker process exits;
///   there is no timeout.
/// * A cancelled pick is `Ok(None)`, not an error.  Errors are reserved
///   for failing to run or talk to the picker.
/// * A returned index is a valid position in `items`.
pub trait Picker {
    /// The error type produced by this picker.
    type Error: std::error::Error + Send + 'static;

    /// Present `items` and return the index of the chosen one.
    fn choose(&self, items: &[String]) -> Result<Option<usize>, Self::Error>;
}

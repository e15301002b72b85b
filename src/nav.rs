//! The navigation flow: list, pick, resolve, focus.
//!
//! [`run`] ties the [`WindowManager`] and [`Picker`] traits together and
//! owns the tag-resolution policy deciding which tag becomes visible when
//! a window is chosen.

use crate::traits::{Picker, WindowManager};
use log::{debug, info};

/// Possible errors from a navigation run.
#[derive(Debug, thiserror::Error)]
pub enum NavError {
    /// The window manager returned an error.
    #[error("window manager error: {0}")]
    WindowManager(String),

    /// The picker returned an error.
    #[error("picker error: {0}")]
    Picker(String),
}

/// Pick the tag to switch to.
///
/// The window's first tag wins, unless the currently visible tag is among
/// the window's tags, in which case no switch is needed.  `None` only for
/// a window with no tags.
fn target_tag<'a>(tags: &'a [String], current: Option<&str>) -> Option<&'a str> {
    current
        .and_then(|cur| tags.iter().find(|t| t.as_str() == cur))
        .or_else(|| tags.first())
        .map(String::as_str)
}

/// Run one navigation: list windows, let the user pick one, then make it
/// visible and focused.
///
/// Resolution after a pick:
///
/// 1. an untagged window first gains the currently visible tag, so it
///    does not stay unreachable;
/// 2. the target tag is the window's first tag, preferring the current
///    tag when the window already carries it;
/// 3. the view is switched only when the target differs from the current
///    tag, so re-selecting an already-visible window never flickers;
/// 4. the window is focused within the now-visible tag.
///
/// A cancelled pick returns `Ok(())` without touching any state.
pub fn run<W: WindowManager, P: Picker>(wm: &mut W, picker: &P) -> Result<(), NavError> {
    let mut windows = wm
        .windows()
        .map_err(|e| NavError::WindowManager(e.to_string()))?;

    let items: Vec<String> = windows
        .iter()
        .enumerate()
        .map(|(i, w)| w.menu_line(i))
        .collect();

    let Some(index) = picker
        .choose(&items)
        .map_err(|e| NavError::Picker(e.to_string()))?
    else {
        debug!("selection cancelled");
        return Ok(());
    };

    if index >= windows.len() {
        return Err(NavError::Picker(format!(
            "picker index {} out of range (have {} windows)",
            index,
            windows.len()
        )));
    }
    let win = &mut windows[index];
    debug!("chose {}", win);

    let current = wm
        .current_tag()
        .map_err(|e| NavError::WindowManager(e.to_string()))?;

    if win.tags.is_empty() {
        // An untagged window cannot be viewed; give it the visible tag.
        let Some(cur) = current.as_deref() else {
            return Err(NavError::WindowManager(
                "no visible tag to assign to an untagged window".into(),
            ));
        };
        info!("tagging {} with {}", win.id, cur);
        wm.add_tag(&win.id, cur)
            .map_err(|e| NavError::WindowManager(e.to_string()))?;
        win.append_tag(cur);
    }

    match target_tag(&win.tags, current.as_deref()) {
        Some(tag) if current.as_deref() != Some(tag) => {
            info!("view {}", tag);
            wm.view(tag)
                .map_err(|e| NavError::WindowManager(e.to_string()))?;
        }
        Some(_) => debug!("already viewing the target tag"),
        None => {}
    }

    info!("select {}", win.id);
    wm.select_client(&win.id)
        .map_err(|e| NavError::WindowManager(e.to_string()))?;

    Ok(())
}

//  Tests

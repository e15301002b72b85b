//! **wmiinav**: keyboard-driven window navigation for the wmii window
//! manager.
//!
//! Lists every client wmii knows about, hands the list to an external
//! picker (dmenu by default), then makes the chosen window visible and
//! focused.  Talking to wmii means speaking 9P over a Unix socket, so the
//! crate carries a small client for that protocol.
//!
//! # Architecture
//!
//! The crate is organised around two core traits:
//!
//! * [`traits::WindowManager`]: abstracts listing, tagging and focusing so
//!   the navigation flow is not coupled to wmii's namespace layout.
//! * [`traits::Picker`]: abstracts the interactive chooser so the flow is
//!   not coupled to any particular menu program.
//!
//! Concrete implementations live in [`wmii`] (9P namespace client) and
//! [`menu`] (external picker process).

pub mod config;
pub mod menu;
pub mod nav;
pub mod ninep;
pub mod status;
pub mod traits;
pub mod window;
pub mod wmii;

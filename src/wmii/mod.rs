//! wmii-specific implementations.
//!
//! This module provides the concrete backend for the
//! [`WindowManager`](crate::traits::WindowManager) trait, talking 9P to a
//! running wmii instance.
//!
//! Nothing outside this module should reference wmii's namespace layout
//! directly.

pub mod wm;

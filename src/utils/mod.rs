//! Utility functions module
//!
//! Shutdown signals, time formatting and request field helpers.

pub mod fields;
pub mod signals;
pub mod time;

// Re-export main functions
pub use signals::shutdown_signal;
pub use time::{format_hms, split_hms};

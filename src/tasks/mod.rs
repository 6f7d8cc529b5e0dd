//! Background tasks module
//!
//! The countdown tick loop and the periodic telemetry and port refreshes.

pub mod countdown;
pub mod port_scan;
pub mod telemetry_refresh;

// Re-export main functions
pub use countdown::{spawn_countdown, RunningTimer};
pub use port_scan::port_scan_task;
pub use telemetry_refresh::telemetry_refresh_task;

//! Manual control services
//!
//! Operations behind the operator's manual controls: power supply sessions,
//! shutter motion, port selection and shutdown.

pub mod power_supply;
pub mod rig;
pub mod shutter;

// Re-export main functions
pub use power_supply::{
    disable_power_supply, enable_power_supply, start_manual_session, stop_manual_session, ManualSessionRequest,
};
pub use rig::{refresh_ports, select_ports, shutdown_rig, PortSelection};
pub use shutter::{close_shutter, open_shutter, stop_shutter};

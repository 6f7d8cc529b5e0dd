//! Evaporator Control - power supply, shutter and scenario control for a thermoresistive evaporator
//!
//! This library drives the power supply and the shutter stepper motor through
//! status-code driver traits, runs multi-stage current/duration scenarios with a
//! countdown or elapsed timer, and guarantees the supply is switched off when a
//! run ends.

pub mod api;
pub mod config;
pub mod devices;
pub mod error;
pub mod scenario;
pub mod services;
pub mod state;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use api::create_router;
pub use config::{Config, RigSettings};
pub use error::{ControlError, DeviceError, ValidationError};
pub use scenario::{ScenarioController, ScenarioRequest};
pub use state::AppState;
pub use utils::signals::shutdown_signal;

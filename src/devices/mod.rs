//! Device driver capabilities
//!
//! The power supply and the shutter motor are reached through driver traits that
//! return the vendor status codes. Each device has one owning handle that
//! serializes access and runs the calls off the async executor.

pub mod codes;
pub mod ports;
pub mod power_supply;
pub mod shutter;
pub mod simulated;

// Re-export main types
pub use codes::{status_message, DeviceKind, Language};
pub use power_supply::{PowerSupply, PowerSupplyDriver, Telemetry};
pub use shutter::{MotorMotion, Shutter, ShutterDriver, ShutterPosition};
pub use simulated::{
    CallJournal, DriverCall, FaultPlan, Operation, SimulatedPowerSupply, SimulatedShutter,
    SIMULATED_POWER_SUPPLY_PORT, SIMULATED_SHUTTER_PORT,
};

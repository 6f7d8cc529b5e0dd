//! State management module
//!
//! Panel, timer and scenario run state plus the event stream observers subscribe to.

pub mod app_state;
pub mod events;
pub mod rig_state;
pub mod run_state;
pub mod timer_state;

// Re-export main types
pub use app_state::{AppState, SupplyOwner};
pub use events::RigEvent;
pub use rig_state::{Notice, NoticeLevel, RigState};
pub use run_state::{RunPhase, ScenarioRunState};
pub use timer_state::TimerState;

//! Scenario execution
//!
//! Timer state machine, stage validation, the stage sequencer, the controller
//! that owns a run and the run log.

pub mod controller;
pub mod report;
pub mod run_log;
pub mod sequencer;
pub mod stage;
pub mod timer;

// Re-export main types
pub use controller::{ScenarioController, ScenarioRequest};
pub use report::{RunReport, RunStatus, StageOutcome, StageRecord};
pub use stage::{validate_stages, Stage, StageInput};
pub use timer::{CountdownTimer, StageDuration, TickOutcome, TimeFields, TimerMode};

//! Events broadcast to observers of the rig

use serde::{Deserialize, Serialize};

use super::rig_state::Notice;
use crate::scenario::{
    report::{RunStatus, StageOutcome},
    timer::TimerMode,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RigEvent {
    /// Panel state changed through the named action
    PanelChanged { action: String },
    StageStarted {
        stage: usize,
        current_amperes: u16,
        mode: TimerMode,
    },
    TimerTick {
        stage: Option<usize>,
        remaining_seconds: u64,
        elapsed_seconds: u64,
    },
    TimerExpired {
        stage: Option<usize>,
        elapsed_seconds: u64,
    },
    StageFinished { stage: usize, outcome: StageOutcome },
    RunFinished { status: RunStatus },
    Notice(Notice),
}

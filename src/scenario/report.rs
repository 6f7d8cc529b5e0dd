//! Outcome records of a scenario run

use std::{fmt, path::PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use super::timer::{StageDuration, TimerMode};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StageOutcome {
    Succeeded,
    Cancelled,
    Failed { message: String },
}

impl fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageOutcome::Succeeded => f.write_str("success"),
            StageOutcome::Cancelled => f.write_str("cancelled"),
            StageOutcome::Failed { message } => write!(f, "failed: {}", message),
        }
    }
}

/// One attempted stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    /// Position in the scenario, from 1
    pub number: usize,
    pub current_amperes: u16,
    pub duration: StageDuration,
    /// Mode the timer actually ran in
    pub mode: TimerMode,
    pub elapsed_seconds: u64,
    pub outcome: StageOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Stopped,
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Success => f.write_str("success"),
            RunStatus::Stopped => f.write_str("stopped"),
            RunStatus::Failed => f.write_str("failed"),
        }
    }
}

/// Summary of a finished run, also the content of the run log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub mode: TimerMode,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub stages_total: usize,
    pub stages: Vec<StageRecord>,
    pub status: RunStatus,
    pub power_off_error: Option<String>,
    pub log_path: Option<PathBuf>,
}

impl RunReport {
    pub fn cancelled_stages(&self) -> Vec<usize> {
        self.stages
            .iter()
            .filter(|s| s.outcome == StageOutcome::Cancelled)
            .map(|s| s.number)
            .collect()
    }

    pub fn succeeded(&self) -> usize {
        self.stages
            .iter()
            .filter(|s| s.outcome == StageOutcome::Succeeded)
            .count()
    }
}

/// Overall status from the attempted stages and whether a stop was requested
pub fn run_status(stages: &[StageRecord], cancellation_requested: bool) -> RunStatus {
    if stages.iter().any(|s| matches!(s.outcome, StageOutcome::Failed { .. })) {
        RunStatus::Failed
    } else if cancellation_requested || stages.iter().any(|s| s.outcome == StageOutcome::Cancelled) {
        RunStatus::Stopped
    } else {
        RunStatus::Success
    }
}

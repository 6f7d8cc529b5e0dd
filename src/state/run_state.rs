//! Scenario run state

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::scenario::{
    report::{RunReport, StageOutcome, StageRecord},
    timer::TimerMode,
};

/// Scenario controller phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    #[default]
    Idle,
    Validating,
    Running,
    /// Powering off and resetting after a cancel or a failure
    Stopping,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenarioRunState {
    pub phase: RunPhase,
    pub is_running: bool,
    pub cancellation_requested: bool,
    pub mode: Option<TimerMode>,
    pub stages_total: usize,
    /// Stage number (from 1) currently executing
    pub current_stage: Option<usize>,
    pub cancelled_stages: BTreeSet<usize>,
    pub records: Vec<StageRecord>,
    pub last_report: Option<RunReport>,
}

impl ScenarioRunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset per-run bookkeeping for a new run; the last report is kept
    pub fn begin(&mut self, mode: TimerMode, stages_total: usize) {
        self.phase = RunPhase::Running;
        self.is_running = true;
        self.cancellation_requested = false;
        self.mode = Some(mode);
        self.stages_total = stages_total;
        self.current_stage = None;
        self.cancelled_stages.clear();
        self.records.clear();
    }

    pub fn record(&mut self, record: StageRecord) {
        if record.outcome == StageOutcome::Cancelled {
            self.cancelled_stages.insert(record.number);
        }
        self.records.push(record);
    }

    pub fn finish(&mut self, report: RunReport) {
        self.phase = RunPhase::Idle;
        self.is_running = false;
        self.current_stage = None;
        self.last_report = Some(report);
    }
}

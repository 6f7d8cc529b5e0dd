//! Timer state structure published to observers

use serde::{Deserialize, Serialize};

use crate::{
    error::Field,
    scenario::timer::{Progress, TimeFields, TimerMode},
};

/// Snapshot of the active countdown / elapsed timer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerState {
    pub active: bool,
    pub mode: Option<TimerMode>,
    pub remaining_seconds: Option<u64>,
    pub elapsed_seconds: u64,
    /// Displayed `HH` / `MM` / `SS` fields
    pub display: TimeFields,
    /// Input fields are read-only while counting
    pub fields_locked: bool,
    pub progress: Progress,
    /// Fields rejected by the last start attempt
    pub invalid_fields: Vec<Field>,
    /// Stage number (from 1) when the timer belongs to a scenario run
    pub stage: Option<usize>,
}

impl TimerState {
    /// Create a new inactive timer state
    pub fn new() -> Self {
        Self::inactive()
    }

    /// Create an inactive timer state
    pub fn inactive() -> Self {
        Self {
            active: false,
            mode: None,
            remaining_seconds: None,
            elapsed_seconds: 0,
            display: TimeFields::default(),
            fields_locked: false,
            progress: Progress::default(),
            invalid_fields: Vec::new(),
            stage: None,
        }
    }

    /// Inactive state that marks the fields a start attempt rejected
    pub fn rejected(invalid_fields: Vec<Field>) -> Self {
        Self {
            invalid_fields,
            ..Self::inactive()
        }
    }

    /// Check if the timer is active
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Get remaining seconds if timer is active
    pub fn remaining_seconds(&self) -> Option<u64> {
        if self.active {
            self.remaining_seconds
        } else {
            None
        }
    }
}

impl Default for TimerState {
    fn default() -> Self {
        Self::new()
    }
}

//! Error taxonomy shared by the control core

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::devices::{status_message, DeviceKind, Language};

/// An input field of a stage row or of the manual timer form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Current,
    Hours,
    Minutes,
    Seconds,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Current => "current",
            Field::Hours => "hours",
            Field::Minutes => "minutes",
            Field::Seconds => "seconds",
        };
        f.write_str(name)
    }
}

/// One offending field of one stage (stages are numbered from 1 for display)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub stage: usize,
    pub field: Field,
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

fn join_stage_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("stage {}: {}", e.stage, e.field))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Bad or missing operator input, detected before any device I/O
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("empty time fields: a countdown needs a nonzero duration")]
    EmptyTimeFields,

    #[error("invalid time fields: {}", join(.0))]
    InvalidTimeFields(Vec<Field>),

    #[error("scenario has no stages")]
    NoStages,

    #[error("invalid stage fields: {}", join_stage_errors(.0))]
    InvalidStages(Vec<FieldError>),

    #[error("cannot run a scenario where every stage has zero current")]
    NoCurrent,

    #[error("cannot run a countdown scenario where every stage has zero duration")]
    NoDuration,

    #[error("no serial port selected for the {0}")]
    PortNotSelected(DeviceKind),

    #[error("current setpoint {0:?} is not a value between 0 and 200 A")]
    SetpointOutOfRange(String),
}

impl ValidationError {
    /// Fields the operator has to correct, for marking them in the form
    pub fn invalid_fields(&self) -> Vec<Field> {
        match self {
            ValidationError::EmptyTimeFields => vec![Field::Hours, Field::Minutes, Field::Seconds],
            ValidationError::InvalidTimeFields(fields) => fields.clone(),
            ValidationError::SetpointOutOfRange(_) => vec![Field::Current],
            _ => Vec::new(),
        }
    }
}

/// Failure reported by a device driver call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("{device}: error code {code}. {message}")]
    Status {
        device: DeviceKind,
        code: i32,
        message: String,
    },

    #[error("{device}: driver unavailable: {reason}")]
    Unavailable { device: DeviceKind, reason: String },
}

impl DeviceError {
    pub fn from_status(device: DeviceKind, code: i32, language: Language) -> Self {
        DeviceError::Status {
            device,
            code,
            message: status_message(device, code, language).to_string(),
        }
    }

    pub fn device(&self) -> DeviceKind {
        match self {
            DeviceError::Status { device, .. } | DeviceError::Unavailable { device, .. } => *device,
        }
    }

    /// Telemetry read failures are transient and never stop a run
    pub fn is_telemetry(&self) -> bool {
        matches!(self, DeviceError::Status { code, .. } if *code < 0)
    }
}

/// Errors surfaced by the control layer to its callers
#[derive(Debug, Error)]
pub enum ControlError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("a scenario is already running")]
    AlreadyRunning,

    #[error("the power supply is not connected")]
    NotConnected,

    #[error("{0}")]
    Busy(&'static str),

    #[error("Internal Error: {0}")]
    Internal(String),
}

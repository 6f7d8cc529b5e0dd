//! Stage rows and their validation

use serde::{Deserialize, Serialize};

use super::timer::{StageDuration, TimeFields, TimerMode};
use crate::{
    error::{Field, FieldError, ValidationError},
    utils::fields::lenient_text,
};

pub const MAX_CURRENT_AMPERES: u16 = 200;
/// Setpoints at or above this raise an overheating warning
pub const OVERHEAT_WARNING_AMPERES: f64 = 160.0;

/// One editable stage row as typed by the operator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageInput {
    #[serde(default, deserialize_with = "lenient_text")]
    pub current: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub hours: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub minutes: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub seconds: String,
}

impl StageInput {
    pub fn new(current: impl Into<String>, hours: impl Into<String>, minutes: impl Into<String>, seconds: impl Into<String>) -> Self {
        Self {
            current: current.into(),
            hours: hours.into(),
            minutes: minutes.into(),
            seconds: seconds.into(),
        }
    }

    pub fn time_fields(&self) -> TimeFields {
        TimeFields::new(self.hours.clone(), self.minutes.clone(), self.seconds.clone())
    }
}

/// A validated stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub current_amperes: u16,
    pub duration: StageDuration,
}

fn parse_current(text: &str) -> Option<u16> {
    let text = text.trim();
    if text.is_empty() {
        return Some(0);
    }
    text.parse::<u16>().ok()
}

/// Validate every row before anything touches the devices.
///
/// Per-row field errors are collected for all rows and reported together.
pub fn validate_stages(rows: &[StageInput], mode: TimerMode) -> Result<Vec<Stage>, ValidationError> {
    if rows.is_empty() {
        return Err(ValidationError::NoStages);
    }

    let mut stages = Vec::with_capacity(rows.len());
    let mut errors = Vec::new();

    for (index, row) in rows.iter().enumerate() {
        let number = index + 1;

        let current = parse_current(&row.current);
        let current = match current {
            Some(c) if c > 0 && c <= MAX_CURRENT_AMPERES => Some(c),
            _ => {
                errors.push(FieldError { stage: number, field: Field::Current });
                None
            }
        };

        let duration = match row.time_fields().parse() {
            Ok(d) => Some(d),
            Err(e) => {
                errors.extend(e.invalid_fields().into_iter().map(|field| FieldError { stage: number, field }));
                None
            }
        };

        if let (Some(current_amperes), Some(duration)) = (current, duration) {
            stages.push(Stage { current_amperes, duration });
        }
    }

    if !errors.is_empty() {
        // A list where no row has any current is reported as such
        if rows.iter().all(|r| parse_current(&r.current) == Some(0)) {
            return Err(ValidationError::NoCurrent);
        }
        return Err(ValidationError::InvalidStages(errors));
    }

    if mode == TimerMode::ReverseCountdown && stages.iter().all(|s| s.duration.is_zero()) {
        return Err(ValidationError::NoDuration);
    }

    Ok(stages)
}

/// Parse a manual current setpoint; `,` and `.` are both accepted as decimal separator
pub fn parse_setpoint(text: &str) -> Result<f64, ValidationError> {
    let normalized = text.trim().replace(',', ".");
    normalized
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && (0.0..=MAX_CURRENT_AMPERES as f64).contains(v))
        .ok_or_else(|| ValidationError::SetpointOutOfRange(text.to_string()))
}

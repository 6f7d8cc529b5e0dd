//! Countdown / elapsed timer state machine
//!
//! The timer owns the remaining-time state and its display fields but has no
//! clock of its own: whoever drives it calls [`CountdownTimer::tick`] once per
//! period (see `tasks::countdown`).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    error::{Field, ValidationError},
    state::TimerState,
    utils::{fields::lenient_text, split_hms, time::{SECONDS_IN_DAY, SECONDS_IN_HOUR, SECONDS_IN_MINUTE}},
};

pub const MAX_HOURS: u32 = 24;
pub const MAX_MINUTES: u32 = 60;
pub const MAX_SECONDS: u32 = 60;

/// Counting direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerMode {
    /// Count down from a fixed target and fire the expiry action at zero
    #[default]
    ReverseCountdown,
    /// Count up from the start value until stopped
    DirectElapsed,
}

impl fmt::Display for TimerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerMode::ReverseCountdown => f.write_str("reverse countdown"),
            TimerMode::DirectElapsed => f.write_str("direct elapsed"),
        }
    }
}

/// The three hour/minute/second text fields as typed by the operator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeFields {
    #[serde(default, deserialize_with = "lenient_text")]
    pub hours: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub minutes: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub seconds: String,
}

impl TimeFields {
    pub fn new(hours: impl Into<String>, minutes: impl Into<String>, seconds: impl Into<String>) -> Self {
        Self {
            hours: hours.into(),
            minutes: minutes.into(),
            seconds: seconds.into(),
        }
    }

    /// Two-digit display of a number of seconds
    pub fn display(total_seconds: u64) -> Self {
        let (h, m, s) = split_hms(total_seconds);
        Self::new(format!("{:02}", h), format!("{:02}", m), format!("{:02}", s))
    }

    pub fn is_blank(&self) -> bool {
        self.hours.trim().is_empty() && self.minutes.trim().is_empty() && self.seconds.trim().is_empty()
    }

    /// Parse and bounds-check the fields; a blank field counts as zero
    pub fn parse(&self) -> Result<StageDuration, ValidationError> {
        let hours = parse_field(&self.hours, MAX_HOURS);
        let minutes = parse_field(&self.minutes, MAX_MINUTES);
        let seconds = parse_field(&self.seconds, MAX_SECONDS);

        match (hours, minutes, seconds) {
            (Some(hours), Some(minutes), Some(seconds)) => Ok(StageDuration { hours, minutes, seconds }),
            _ => {
                let invalid = [(hours, Field::Hours), (minutes, Field::Minutes), (seconds, Field::Seconds)]
                    .into_iter()
                    .filter(|(value, _)| value.is_none())
                    .map(|(_, field)| field)
                    .collect();
                Err(ValidationError::InvalidTimeFields(invalid))
            }
        }
    }
}

fn parse_field(text: &str, max: u32) -> Option<u8> {
    let text = text.trim();
    if text.is_empty() {
        return Some(0);
    }
    text.parse::<u32>().ok().filter(|v| *v < max).map(|v| v as u8)
}

/// A bounded hours/minutes/seconds span, always shorter than a day
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDuration {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
}

impl StageDuration {
    pub fn new(hours: u8, minutes: u8, seconds: u8) -> Result<Self, ValidationError> {
        TimeFields::new(hours.to_string(), minutes.to_string(), seconds.to_string()).parse()
    }

    pub fn total_seconds(&self) -> u64 {
        let total = self.hours as u64 * SECONDS_IN_HOUR
            + self.minutes as u64 * SECONDS_IN_MINUTE
            + self.seconds as u64;
        debug_assert!(total < SECONDS_IN_DAY);
        total
    }

    pub fn is_zero(&self) -> bool {
        self.total_seconds() == 0
    }

    pub fn as_fields(&self) -> TimeFields {
        TimeFields::new(self.hours.to_string(), self.minutes.to_string(), self.seconds.to_string())
    }
}

/// Progress indicator state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub minimum: u64,
    pub maximum: u64,
    pub value: u64,
}

impl Default for Progress {
    fn default() -> Self {
        Self { minimum: 0, maximum: 1, value: 0 }
    }
}

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The timer is not running
    Idle,
    Counting { remaining_seconds: u64, elapsed_seconds: u64 },
    /// Countdown reached zero; the expiry action has run and the timer is reset
    Expired { elapsed_seconds: u64 },
}

type ExpiryAction = Box<dyn FnOnce() + Send>;

pub struct CountdownTimer {
    mode: TimerMode,
    remaining_seconds: u64,
    elapsed_seconds: u64,
    running: bool,
    fields_locked: bool,
    display: TimeFields,
    progress: Progress,
    on_expired: Option<ExpiryAction>,
}

impl fmt::Debug for CountdownTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CountdownTimer")
            .field("mode", &self.mode)
            .field("remaining_seconds", &self.remaining_seconds)
            .field("elapsed_seconds", &self.elapsed_seconds)
            .field("running", &self.running)
            .field("progress", &self.progress)
            .finish_non_exhaustive()
    }
}

impl Default for CountdownTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl CountdownTimer {
    pub fn new() -> Self {
        Self {
            mode: TimerMode::default(),
            remaining_seconds: 0,
            elapsed_seconds: 0,
            running: false,
            fields_locked: false,
            display: TimeFields::default(),
            progress: Progress::default(),
            on_expired: None,
        }
    }

    /// Validate the typed fields and start counting.
    ///
    /// All-blank fields are an error for a countdown and mean "count up from
    /// zero" for elapsed mode. On error the timer is left untouched.
    pub fn start<F>(&mut self, mode: TimerMode, fields: &TimeFields, on_expired: F) -> Result<(), ValidationError>
    where
        F: FnOnce() + Send + 'static,
    {
        if fields.is_blank() {
            if mode == TimerMode::ReverseCountdown {
                return Err(ValidationError::EmptyTimeFields);
            }
            self.begin(TimerMode::DirectElapsed, 0, true, fields.clone(), Box::new(on_expired));
            return Ok(());
        }

        let duration = fields.parse()?;
        self.start_with(mode, duration, on_expired);
        Ok(())
    }

    /// Start from an already validated duration. A zero countdown expires on the first tick.
    pub fn start_with<F>(&mut self, mode: TimerMode, duration: StageDuration, on_expired: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let total = duration.total_seconds();
        let locked = total > 0 || mode == TimerMode::DirectElapsed;
        self.begin(mode, total, locked, duration.as_fields(), Box::new(on_expired));
    }

    fn begin(&mut self, mode: TimerMode, total: u64, locked: bool, display: TimeFields, on_expired: ExpiryAction) {
        self.mode = mode;
        self.remaining_seconds = total;
        self.elapsed_seconds = 0;
        self.running = true;
        self.fields_locked = locked;
        self.display = display;
        self.progress = Progress { minimum: 0, maximum: total, value: 0 };
        self.on_expired = Some(on_expired);
    }

    /// Advance by one period
    pub fn tick(&mut self) -> TickOutcome {
        if !self.running {
            return TickOutcome::Idle;
        }
        self.elapsed_seconds += 1;

        match self.mode {
            TimerMode::DirectElapsed => {
                self.remaining_seconds += 1;
                self.display = TimeFields::display(self.remaining_seconds);
                self.progress.value = self.remaining_seconds;
            }
            TimerMode::ReverseCountdown => {
                self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
                if self.remaining_seconds == 0 {
                    let elapsed_seconds = self.elapsed_seconds;
                    self.running = false;
                    if let Some(action) = self.on_expired.take() {
                        action();
                    }
                    self.reset();
                    return TickOutcome::Expired { elapsed_seconds };
                }
                self.display = TimeFields::display(self.remaining_seconds);
                self.progress.value = self.progress.maximum - self.remaining_seconds;
            }
        }

        TickOutcome::Counting {
            remaining_seconds: self.remaining_seconds,
            elapsed_seconds: self.elapsed_seconds,
        }
    }

    /// Stop without firing the expiry action and clear everything
    pub fn reset(&mut self) {
        self.running = false;
        self.remaining_seconds = 0;
        self.elapsed_seconds = 0;
        self.fields_locked = false;
        self.display = TimeFields::default();
        self.progress = Progress::default();
        self.on_expired = None;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    pub fn remaining_seconds(&self) -> u64 {
        self.remaining_seconds
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    pub fn display(&self) -> &TimeFields {
        &self.display
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    pub fn fields_locked(&self) -> bool {
        self.fields_locked
    }

    pub fn snapshot(&self, stage: Option<usize>) -> TimerState {
        if !self.running {
            return TimerState::inactive();
        }
        TimerState {
            active: true,
            mode: Some(self.mode),
            remaining_seconds: Some(self.remaining_seconds),
            elapsed_seconds: self.elapsed_seconds,
            display: self.display.clone(),
            fields_locked: self.fields_locked,
            progress: self.progress,
            invalid_fields: Vec::new(),
            stage,
        }
    }
}

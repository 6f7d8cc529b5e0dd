//! Main application state management

use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Instant,
};

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use super::{Notice, NoticeLevel, RigEvent, RigState, RunPhase, ScenarioRunState, TimerState};
use crate::{
    config::RigSettings,
    devices::{PowerSupply, Shutter},
    error::ControlError,
    tasks::RunningTimer,
};

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>, ControlError> {
    mutex
        .lock()
        .map_err(|e| ControlError::Internal(format!("Failed to lock {}: {}", what, e)))
}

/// Who drives the power supply output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupplyOwner {
    Manual,
    Scenario,
}

/// Main application state shared by the API, the background tasks and the scenario controller
pub struct AppState {
    pub settings: RigSettings,
    /// Device handles, each the single owner of its driver
    pub power_supply: PowerSupply,
    pub shutter: Shutter,
    /// Operator panel: ports, device flags, telemetry, notices
    pub rig_state: Arc<Mutex<RigState>>,
    pub timer_state: Arc<Mutex<TimerState>>,
    pub run_state: Arc<Mutex<ScenarioRunState>>,
    /// Timer of the manual power supply session, if one is counting
    pub manual_timer: Mutex<Option<RunningTimer>>,
    /// Holder of the power supply output; taken before any device call of a session
    pub supply_owner: Mutex<Option<SupplyOwner>>,
    /// Server metadata
    pub start_time: Instant,
    /// Last action tracking
    pub last_action: Arc<Mutex<Option<String>>>,
    pub last_action_time: Arc<Mutex<Option<DateTime<Utc>>>>,
    /// Rig events: stage progress, timer ticks, notices
    pub event_tx: broadcast::Sender<RigEvent>,
    /// Channel for timer updates
    pub timer_update_tx: watch::Sender<TimerState>,
    /// Keep the receiver alive to prevent channel closure
    pub _timer_update_rx: watch::Receiver<TimerState>,
    /// Scenario phase changes
    pub run_phase_tx: watch::Sender<RunPhase>,
    pub _run_phase_rx: watch::Receiver<RunPhase>,
}

impl AppState {
    pub fn new(settings: RigSettings, power_supply: PowerSupply, shutter: Shutter) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        let (timer_update_tx, timer_update_rx) = watch::channel(TimerState::new());
        let (run_phase_tx, run_phase_rx) = watch::channel(RunPhase::Idle);

        Self {
            settings,
            power_supply,
            shutter,
            rig_state: Arc::new(Mutex::new(RigState::new())),
            timer_state: Arc::new(Mutex::new(TimerState::new())),
            run_state: Arc::new(Mutex::new(ScenarioRunState::new())),
            manual_timer: Mutex::new(None),
            supply_owner: Mutex::new(None),
            start_time: Instant::now(),
            last_action: Arc::new(Mutex::new(None)),
            last_action_time: Arc::new(Mutex::new(None)),
            event_tx,
            timer_update_tx,
            _timer_update_rx: timer_update_rx,
            run_phase_tx,
            _run_phase_rx: run_phase_rx,
        }
    }

    fn record_action(&self, action: &str) {
        if let Ok(mut last_action) = self.last_action.lock() {
            *last_action = Some(action.to_string());
        }
        if let Ok(mut last_time) = self.last_action_time.lock() {
            *last_time = Some(Utc::now());
        }
    }

    /// Send an event; having no subscribers is fine
    pub fn emit(&self, event: RigEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Update the panel state and notify observers
    pub fn update_rig<F>(&self, action: &str, updater: F) -> Result<RigState, ControlError>
    where
        F: FnOnce(&mut RigState),
    {
        let mut rig = lock(&self.rig_state, "rig state")?;
        updater(&mut rig);
        let new_state = rig.clone();
        drop(rig); // Release the lock early

        self.record_action(action);
        self.emit(RigEvent::PanelChanged { action: action.to_string() });
        Ok(new_state)
    }

    /// Store measured telemetry while the output is on; not an operator action
    pub fn store_telemetry(&self, current: Option<u16>, voltage: Option<f32>) -> Result<(), ControlError> {
        let mut rig = lock(&self.rig_state, "rig state")?;
        if rig.output_on {
            rig.measured_current = current;
            rig.measured_voltage = voltage;
        }
        Ok(())
    }

    /// Get current panel state
    pub fn get_rig_state(&self) -> Result<RigState, ControlError> {
        lock(&self.rig_state, "rig state").map(|rig| rig.clone())
    }

    /// Add a notice for the operator, log it and broadcast it
    pub fn notify(&self, level: NoticeLevel, source: &str, message: impl Into<String>) {
        let notice = Notice {
            level,
            source: source.to_string(),
            message: message.into(),
            timestamp: Utc::now(),
        };

        match level {
            NoticeLevel::Info => info!("[{}] {}", source, notice.message),
            NoticeLevel::Warning => warn!("[{}] {}", source, notice.message),
            NoticeLevel::Error => error!("[{}] {}", source, notice.message),
        }

        match lock(&self.rig_state, "rig state") {
            Ok(mut rig) => rig.push_notice(notice.clone()),
            Err(e) => error!("Failed to store notice: {}", e),
        }
        self.emit(RigEvent::Notice(notice));
    }

    pub fn clear_notices(&self) -> Result<usize, ControlError> {
        let cleared = lock(&self.rig_state, "rig state")?.clear_notices();
        if cleared > 0 {
            info!("Cleared {} notices", cleared);
        }
        Ok(cleared)
    }

    /// Get current timer state
    pub fn get_timer_state(&self) -> Result<TimerState, ControlError> {
        lock(&self.timer_state, "timer state").map(|t| t.clone())
    }

    /// Replace the timer state and notify timer watchers
    pub fn publish_timer_state(&self, timer_state: TimerState) -> Result<(), ControlError> {
        let mut current = lock(&self.timer_state, "timer state")?;
        *current = timer_state.clone();
        drop(current);

        if let Err(e) = self.timer_update_tx.send(timer_state) {
            warn!("Failed to send timer update: {}", e);
        }
        Ok(())
    }

    /// Clear the timer display and progress
    pub fn reset_timer_state(&self) {
        if let Err(e) = self.publish_timer_state(TimerState::inactive()) {
            error!("Failed to reset timer state: {}", e);
        }
    }

    pub fn get_run_state(&self) -> Result<ScenarioRunState, ControlError> {
        lock(&self.run_state, "run state").map(|r| r.clone())
    }

    /// Update the run state; phase changes are forwarded to phase watchers
    pub fn update_run<F>(&self, updater: F) -> Result<ScenarioRunState, ControlError>
    where
        F: FnOnce(&mut ScenarioRunState),
    {
        let mut run = lock(&self.run_state, "run state")?;
        updater(&mut run);
        let new_state = run.clone();
        drop(run);

        self.run_phase_tx.send_if_modified(|phase| {
            if *phase != new_state.phase {
                *phase = new_state.phase;
                true
            } else {
                false
            }
        });
        Ok(new_state)
    }

    pub fn set_run_phase(&self, phase: RunPhase) -> Result<ScenarioRunState, ControlError> {
        self.update_run(|run| {
            run.phase = phase;
            run.is_running = phase != RunPhase::Idle;
        })
    }

    pub fn run_phase(&self) -> RunPhase {
        *self.run_phase_tx.borrow()
    }

    pub fn scenario_active(&self) -> bool {
        self.run_phase() != RunPhase::Idle
    }

    pub fn manual_session_active(&self) -> bool {
        self.manual_timer
            .lock()
            .map(|timer| timer.as_ref().is_some_and(|t| !t.is_finished()))
            .unwrap_or(false)
    }

    /// Take the power supply for `owner`. Fails while anyone holds it.
    pub fn claim_supply(&self, owner: SupplyOwner) -> Result<(), ControlError> {
        let mut slot = lock(&self.supply_owner, "supply owner")?;
        match *slot {
            None => {
                *slot = Some(owner);
                debug!("Power supply claimed by {:?}", owner);
                Ok(())
            }
            Some(SupplyOwner::Manual) => Err(ControlError::Busy("a manual power supply session is running")),
            Some(SupplyOwner::Scenario) => Err(ControlError::Busy("a scenario is running")),
        }
    }

    /// Give the power supply back; a claim held by someone else is left alone
    pub fn release_supply(&self, owner: SupplyOwner) {
        match lock(&self.supply_owner, "supply owner") {
            Ok(mut slot) if *slot == Some(owner) => {
                *slot = None;
                debug!("Power supply released by {:?}", owner);
            }
            Ok(_) => {}
            Err(e) => error!("Failed to release the power supply: {}", e),
        }
    }

    pub fn supply_owner(&self) -> Option<SupplyOwner> {
        self.supply_owner.lock().ok().and_then(|slot| *slot)
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

    /// Get last action information
    pub fn get_last_action(&self) -> (Option<String>, Option<DateTime<Utc>>) {
        let last_action = self.last_action.lock().ok().and_then(|a| a.clone());
        let last_action_time = self.last_action_time.lock().ok().and_then(|t| *t);
        (last_action, last_action_time)
    }
}

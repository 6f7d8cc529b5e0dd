//! Scenario controller
//!
//! Owns the cancellation token and the running flag of the current run:
//!
//! ```text
//! Idle --start--> Validating --valid--> Running --all stages done--> Idle
//! Validating --invalid--> Idle
//! Running --cancel | device error | stage error--> Stopping --> Idle
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::{sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::{
    report::RunReport,
    sequencer::StageSequencer,
    stage::{validate_stages, Stage, StageInput},
    timer::TimerMode,
};
use crate::{
    devices::DeviceKind,
    error::{ControlError, ValidationError},
    state::{AppState, NoticeLevel, RunPhase, ScenarioRunState, SupplyOwner},
};

const SOURCE: &str = "scenario";

/// A scenario as submitted by the operator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenarioRequest {
    #[serde(default)]
    pub mode: TimerMode,
    pub stages: Vec<StageInput>,
}

struct ActiveRun {
    cancel: CancellationToken,
    handle: JoinHandle<RunReport>,
}

pub struct ScenarioController {
    state: Arc<AppState>,
    active: Mutex<Option<ActiveRun>>,
}

impl ScenarioController {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            active: Mutex::new(None),
        }
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.scenario_active()
    }

    /// Validate the scenario and start it in the background.
    ///
    /// Rejected without touching the devices when a run is already active, a
    /// manual session holds the supply, a port is missing or the supply is not
    /// connected. The supply stays claimed for the run until it is powered off.
    pub async fn start(&self, request: ScenarioRequest) -> Result<ScenarioRunState, ControlError> {
        let mut active = self.active.lock().await;
        if active.as_ref().is_some_and(|run| !run.handle.is_finished()) || self.state.scenario_active() {
            self.state.notify(NoticeLevel::Warning, SOURCE, "A scenario is already running");
            return Err(ControlError::AlreadyRunning);
        }
        *active = None;

        if let Err(e) = self.state.claim_supply(SupplyOwner::Scenario) {
            self.state
                .notify(NoticeLevel::Warning, SOURCE, "Stop the manual session before starting a scenario");
            return Err(e);
        }
        let (port, stages) = match self.prepare(request.mode, request.stages) {
            Ok(prepared) => prepared,
            Err(e) => {
                self.state.release_supply(SupplyOwner::Scenario);
                return Err(e);
            }
        };

        let run_state = match self.state.update_run(|run| run.begin(request.mode, stages.len())) {
            Ok(run_state) => run_state,
            Err(e) => {
                self.state.release_supply(SupplyOwner::Scenario);
                return Err(e);
            }
        };

        let cancel = CancellationToken::new();
        let sequencer = StageSequencer::new(
            Arc::clone(&self.state),
            stages,
            request.mode,
            port,
            cancel.clone(),
        );
        let handle = tokio::spawn(sequencer.run());
        *active = Some(ActiveRun { cancel, handle });

        info!("Scenario accepted: {} stages", run_state.stages_total);
        Ok(run_state)
    }

    /// Precondition checks and validation; returns the supply port and the stages to run
    fn prepare(&self, mode: TimerMode, rows: Vec<StageInput>) -> Result<(String, Vec<Stage>), ControlError> {
        let rig = self.state.get_rig_state()?;
        let port = match (&rig.power_supply_port, &rig.shutter_port) {
            (None, _) => return Err(self.reject(ValidationError::PortNotSelected(DeviceKind::PowerSupply))),
            (_, None) => return Err(self.reject(ValidationError::PortNotSelected(DeviceKind::Shutter))),
            (Some(port), Some(_)) => port.clone(),
        };
        if !rig.power_supply_connected {
            self.state
                .notify(NoticeLevel::Warning, SOURCE, "Connect the power supply before starting a scenario");
            return Err(ControlError::NotConnected);
        }

        self.state.set_run_phase(RunPhase::Validating)?;

        let mut stages = match validate_stages(&rows, mode) {
            Ok(stages) => stages,
            Err(e) => {
                self.state.set_run_phase(RunPhase::Idle)?;
                return Err(self.reject(e));
            }
        };

        if mode == TimerMode::DirectElapsed && stages.len() > 1 {
            let dropped = stages.len() - 1;
            stages.truncate(1);
            self.state.notify(
                NoticeLevel::Warning,
                SOURCE,
                format!("Elapsed mode runs a single stage; {} stage(s) ignored", dropped),
            );
        }

        Ok((port, stages))
    }

    fn reject(&self, e: ValidationError) -> ControlError {
        self.state.notify(NoticeLevel::Warning, SOURCE, e.to_string());
        ControlError::Validation(e)
    }

    /// Request cancellation and wait until the run has powered off and reached `Idle`.
    /// Returns `None` when nothing was running.
    pub async fn stop(&self) -> Result<Option<RunReport>, ControlError> {
        let Some(run) = self.active.lock().await.take() else {
            return Ok(None);
        };

        if !run.handle.is_finished() {
            info!("Stopping scenario");
            if let Err(e) = self.state.update_run(|r| r.cancellation_requested = true) {
                warn!("Failed to flag cancellation: {}", e);
            }
        }
        run.cancel.cancel();

        match run.handle.await {
            Ok(report) => Ok(Some(report)),
            Err(e) => {
                error!("Scenario task failed: {}", e);
                self.recover().await;
                let err = ControlError::Internal(format!("scenario task failed: {}", e));
                self.state.notify(NoticeLevel::Error, SOURCE, err.to_string());
                Err(err)
            }
        }
    }

    /// Power off and return to `Idle` when the sequencer could not do it itself
    async fn recover(&self) {
        if let Err(e) = self.state.power_supply.turn_off().await {
            self.state.notify(NoticeLevel::Error, SOURCE, format!("Power off failed: {}", e));
        }
        if let Err(e) = self.state.update_rig("scenario-recover", |rig| rig.mark_disconnected()) {
            error!("Failed to update panel state: {}", e);
        }
        self.state.reset_timer_state();
        self.state.release_supply(SupplyOwner::Scenario);
        if let Err(e) = self.state.set_run_phase(RunPhase::Idle) {
            error!("Failed to reset run phase: {}", e);
        }
    }

    /// Wait until no run is active and return the last report
    pub async fn wait(&self) -> Option<RunReport> {
        let mut phase = self.state.run_phase_tx.subscribe();
        if let Err(e) = phase.wait_for(|p| *p == RunPhase::Idle).await {
            warn!("Run phase channel closed: {}", e);
        }

        let finished = {
            let mut active = self.active.lock().await;
            match active.as_ref() {
                Some(run) if run.handle.is_finished() => active.take(),
                _ => None,
            }
        };
        if let Some(run) = finished {
            if let Err(e) = run.handle.await {
                error!("Scenario task failed: {}", e);
            }
        }

        self.state.get_run_state().ok().and_then(|run| run.last_report)
    }
}

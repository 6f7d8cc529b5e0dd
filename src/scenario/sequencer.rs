//! Stage sequencer
//!
//! Applies each stage to the power supply, counts its timer down and moves on.
//! Cancellation is cooperative: it is observed before a stage starts and while
//! a stage timer counts, never in the middle of a device call.

use std::sync::Arc;

use chrono::{DateTime, Local};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::{
    report::{run_status, RunReport, RunStatus, StageOutcome, StageRecord},
    run_log::write_run_log,
    stage::Stage,
    timer::{CountdownTimer, TimerMode},
};
use crate::{
    error::{ControlError, DeviceError},
    state::{AppState, NoticeLevel, RigEvent, RunPhase, SupplyOwner},
    tasks::spawn_countdown,
};

const SOURCE: &str = "scenario";

pub struct StageSequencer {
    state: Arc<AppState>,
    stages: Vec<Stage>,
    mode: TimerMode,
    port: String,
    cancel: CancellationToken,
}

impl StageSequencer {
    pub fn new(
        state: Arc<AppState>,
        stages: Vec<Stage>,
        mode: TimerMode,
        port: String,
        cancel: CancellationToken,
    ) -> Self {
        Self { state, stages, mode, port, cancel }
    }

    /// Run every stage in order, then power off, reset the timer and write the run log
    pub async fn run(self) -> RunReport {
        let started_at = Local::now();
        let mut records = Vec::with_capacity(self.stages.len());

        info!("Scenario started: {} stages, {} mode", self.stages.len(), self.mode);

        for (index, stage) in self.stages.iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!("Scenario stopped before stage {}", index + 1);
                break;
            }

            let record = self.run_stage(index + 1, stage).await;
            let keep_going = record.outcome == StageOutcome::Succeeded;

            self.state.emit(RigEvent::StageFinished {
                stage: record.number,
                outcome: record.outcome.clone(),
            });
            let stored = record.clone();
            if let Err(e) = self.state.update_run(|run| run.record(stored)) {
                error!("Failed to record stage outcome: {}", e);
            }
            records.push(record);

            if !keep_going {
                break;
            }
        }

        self.finish(started_at, records).await
    }

    async fn run_stage(&self, number: usize, stage: &Stage) -> StageRecord {
        let mut record = StageRecord {
            number,
            current_amperes: stage.current_amperes,
            duration: stage.duration,
            mode: self.mode,
            elapsed_seconds: 0,
            outcome: StageOutcome::Succeeded,
        };

        if let Err(e) = self.state.update_run(|run| run.current_stage = Some(number)) {
            error!("Failed to update current stage: {}", e);
        }
        self.state.emit(RigEvent::StageStarted {
            stage: number,
            current_amperes: stage.current_amperes,
            mode: self.mode,
        });
        info!("Stage {}: {} A, {} s", number, stage.current_amperes, stage.duration.total_seconds());

        if let Err(e) = self.apply(stage).await {
            self.state.notify(NoticeLevel::Error, SOURCE, format!("Stage {} failed: {}", number, e));
            self.mark_disconnected();
            record.outcome = StageOutcome::Failed { message: e.to_string() };
            return record;
        }

        match self.await_timer(number, stage).await {
            Ok((elapsed, outcome)) => {
                if outcome == StageOutcome::Cancelled {
                    self.state.notify(NoticeLevel::Info, SOURCE, format!("Stage {} cancelled", number));
                }
                record.elapsed_seconds = elapsed;
                record.outcome = outcome;
            }
            Err(e) => {
                self.state.notify(NoticeLevel::Error, SOURCE, format!("Stage {} failed: {}", number, e));
                record.outcome = StageOutcome::Failed { message: e.to_string() };
            }
        }
        record
    }

    /// Connect, switch on, send the setpoint, read back telemetry and clear the ZP register
    async fn apply(&self, stage: &Stage) -> Result<(), DeviceError> {
        let ps = &self.state.power_supply;
        ps.connect(&self.port).await?;
        ps.turn_on().await?;
        ps.set_current_voltage(stage.current_amperes, self.state.settings.voltage).await?;

        let telemetry = ps.read_telemetry().await;
        for e in telemetry.errors() {
            self.state.notify(NoticeLevel::Warning, "telemetry", e.to_string());
        }

        let current = telemetry.current.as_ref().ok().copied();
        let voltage = telemetry.voltage_volts();
        let setpoint = stage.current_amperes;
        let result = self.state.update_rig("scenario-stage", |rig| {
            rig.power_supply_connected = true;
            rig.output_on = true;
            rig.setpoint_amperes = Some(setpoint);
            rig.measured_current = current;
            rig.measured_voltage = voltage;
        });
        if let Err(e) = result {
            warn!("Failed to update panel state: {}", e);
        }

        ps.reset().await
    }

    /// Count the stage timer until it expires or the run is cancelled
    async fn await_timer(&self, number: usize, stage: &Stage) -> Result<(u64, StageOutcome), ControlError> {
        let (done_tx, done_rx) = oneshot::channel();
        let mut timer = CountdownTimer::new();
        timer.start_with(self.mode, stage.duration, move || {
            let _ = done_tx.send(());
        });
        let running = spawn_countdown(Arc::clone(&self.state), timer, Some(number));

        tokio::select! {
            biased;

            _ = self.cancel.cancelled() => {
                let elapsed = running.stop().await?;
                Ok((elapsed, StageOutcome::Cancelled))
            }

            done = done_rx => {
                let elapsed = running.join().await?;
                match done {
                    Ok(()) => Ok((elapsed, StageOutcome::Succeeded)),
                    Err(_) => Err(ControlError::Internal(format!(
                        "stage {} timer ended without expiring",
                        number
                    ))),
                }
            }
        }
    }

    fn mark_disconnected(&self) {
        if let Err(e) = self.state.update_rig("device-error", |rig| rig.mark_disconnected()) {
            error!("Failed to update panel state: {}", e);
        }
    }

    async fn finish(self, started_at: DateTime<Local>, stages: Vec<StageRecord>) -> RunReport {
        let cancellation_requested = self.cancel.is_cancelled();
        let status = run_status(&stages, cancellation_requested);

        if status != RunStatus::Success {
            if let Err(e) = self.state.set_run_phase(RunPhase::Stopping) {
                error!("Failed to enter stopping phase: {}", e);
            }
        }

        // Exactly one power off per run, whatever happened before
        let power_off_error = match self.state.power_supply.turn_off().await {
            Ok(()) => {
                let result = self.state.update_rig("scenario-power-off", |rig| {
                    rig.output_on = false;
                    rig.setpoint_amperes = None;
                    rig.clear_telemetry();
                });
                if let Err(e) = result {
                    warn!("Failed to update panel state: {}", e);
                }
                None
            }
            Err(e) => {
                self.state.notify(NoticeLevel::Error, SOURCE, format!("Power off failed: {}", e));
                self.mark_disconnected();
                Some(e.to_string())
            }
        };
        self.state.reset_timer_state();

        let mut report = RunReport {
            mode: self.mode,
            started_at,
            finished_at: Local::now(),
            stages_total: self.stages.len(),
            stages,
            status,
            power_off_error,
            log_path: None,
        };

        match write_run_log(&self.state.settings.scenario_dir, &report).await {
            Ok(path) => report.log_path = Some(path),
            Err(e) => self
                .state
                .notify(NoticeLevel::Warning, SOURCE, format!("Failed to write run log: {}", e)),
        }

        let level = match status {
            RunStatus::Success | RunStatus::Stopped => NoticeLevel::Info,
            RunStatus::Failed => NoticeLevel::Error,
        };
        self.state.notify(level, SOURCE, format!("Scenario finished: {}", status));
        self.state.emit(RigEvent::RunFinished { status });

        self.state.release_supply(SupplyOwner::Scenario);
        let final_report = report.clone();
        if let Err(e) = self.state.update_run(|run| {
            run.cancellation_requested |= cancellation_requested;
            run.finish(final_report);
        }) {
            error!("Failed to store run report: {}", e);
        }

        report
    }
}

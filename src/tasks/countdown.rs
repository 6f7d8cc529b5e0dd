//! Countdown tick task
//!
//! Drives a started [`CountdownTimer`] from a periodic tick and publishes every
//! change. The first tick fires one period after the start.

use std::sync::Arc;

use tokio::{
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{
    error::ControlError,
    scenario::timer::{CountdownTimer, TickOutcome},
    state::{AppState, RigEvent},
};

/// Handle to a counting timer task
#[derive(Debug)]
pub struct RunningTimer {
    stop: CancellationToken,
    handle: JoinHandle<u64>,
}

impl RunningTimer {
    /// Stop counting without firing the expiry action; returns the elapsed seconds
    pub async fn stop(self) -> Result<u64, ControlError> {
        self.stop.cancel();
        self.join().await
    }

    /// Wait for the task to end on its own; returns the elapsed seconds
    pub async fn join(self) -> Result<u64, ControlError> {
        self.handle
            .await
            .map_err(|e| ControlError::Internal(format!("timer task failed: {}", e)))
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Spawn the tick loop for a timer that was already started
pub fn spawn_countdown(state: Arc<AppState>, timer: CountdownTimer, stage: Option<usize>) -> RunningTimer {
    let stop = CancellationToken::new();
    let handle = tokio::spawn(countdown_task(state, timer, stage, stop.clone()));
    RunningTimer { stop, handle }
}

async fn countdown_task(
    state: Arc<AppState>,
    mut timer: CountdownTimer,
    stage: Option<usize>,
    stop: CancellationToken,
) -> u64 {
    publish(&state, &timer, stage);
    if !timer.is_running() {
        return 0;
    }
    info!("Timer started: {} mode, {} s", timer.mode(), timer.remaining_seconds());

    let period = state.settings.tick;
    let mut ticks = interval_at(Instant::now() + period, period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = stop.cancelled() => {
                let elapsed = timer.elapsed_seconds();
                timer.reset();
                state.reset_timer_state();
                debug!("Timer stopped after {} s", elapsed);
                return elapsed;
            }

            _ = ticks.tick() => {
                match timer.tick() {
                    TickOutcome::Idle => return timer.elapsed_seconds(),
                    TickOutcome::Counting { remaining_seconds, elapsed_seconds } => {
                        debug!("Tick: remaining={} elapsed={}", remaining_seconds, elapsed_seconds);
                        publish(&state, &timer, stage);
                        state.emit(RigEvent::TimerTick { stage, remaining_seconds, elapsed_seconds });
                    }
                    TickOutcome::Expired { elapsed_seconds } => {
                        info!("Timer expired after {} s", elapsed_seconds);
                        state.reset_timer_state();
                        state.emit(RigEvent::TimerTick { stage, remaining_seconds: 0, elapsed_seconds });
                        state.emit(RigEvent::TimerExpired { stage, elapsed_seconds });
                        return elapsed_seconds;
                    }
                }
            }
        }
    }
}

fn publish(state: &AppState, timer: &CountdownTimer, stage: Option<usize>) {
    if let Err(e) = state.publish_timer_state(timer.snapshot(stage)) {
        error!("Failed to publish timer state: {}", e);
    }
}

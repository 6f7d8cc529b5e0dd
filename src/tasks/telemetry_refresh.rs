//! Telemetry refresh background task

use std::sync::Arc;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::state::{AppState, NoticeLevel};

/// Background task that reads output current and voltage while the supply is on.
/// It only updates the displayed telemetry.
pub async fn telemetry_refresh_task(state: Arc<AppState>) {
    info!("Starting telemetry refresh task");

    let mut interval = interval(state.settings.telemetry_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        refresh_once(&state).await;
    }
}

/// One refresh pass; does nothing unless the output is on
pub async fn refresh_once(state: &AppState) {
    match state.get_rig_state() {
        Ok(rig) if rig.power_supply_connected && rig.output_on => {}
        Ok(_) => return,
        Err(e) => {
            warn!("Failed to check power supply state: {}", e);
            return;
        }
    }

    let telemetry = state.power_supply.read_telemetry().await;
    for e in telemetry.errors() {
        state.notify(NoticeLevel::Warning, "telemetry", e.to_string());
    }

    let current = telemetry.current.as_ref().ok().copied();
    let voltage = telemetry.voltage_volts();
    debug!("Telemetry: current={:?} A, voltage={:?} V", current, voltage);

    if let Err(e) = state.store_telemetry(current, voltage) {
        warn!("Failed to store telemetry: {}", e);
    }
}

//! Serial port rescan background task

use std::sync::Arc;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::{
    devices::ports::available_ports,
    state::{AppState, NoticeLevel},
};

/// Background task that keeps the list of present serial ports current
pub async fn port_scan_task(state: Arc<AppState>) {
    info!("Starting port scan task");

    let mut interval = interval(state.settings.port_scan_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;

        match tokio::task::spawn_blocking(available_ports).await {
            Ok(Ok(ports)) => apply_ports(&state, ports),
            Ok(Err(e)) => warn!("Failed to enumerate serial ports: {}", e),
            Err(e) => warn!("Port enumeration task failed: {}", e),
        }
    }
}

/// Store a fresh port list, dropping selections whose port disappeared
pub fn apply_ports(state: &AppState, mut ports: Vec<String>) {
    ports.extend(state.settings.virtual_ports.iter().cloned());
    ports.sort();
    ports.dedup();

    let unchanged = state
        .get_rig_state()
        .map(|rig| rig.available_ports == ports)
        .unwrap_or(false);
    if unchanged {
        return;
    }

    debug!("Serial ports changed: {:?}", ports);
    let mut cleared = Vec::new();
    if let Err(e) = state.update_rig("port-scan", |rig| cleared = rig.set_available_ports(ports)) {
        warn!("Failed to store port list: {}", e);
        return;
    }
    for device in cleared {
        state.notify(
            NoticeLevel::Warning,
            "ports",
            format!("The {} port disappeared; selection cleared", device),
        );
    }
}

//! Port selection and rig shutdown

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::power_supply::stop_manual_timer;
use crate::{
    devices::{ports::available_ports, DeviceKind},
    error::ControlError,
    scenario::ScenarioController,
    state::{AppState, RigState, SupplyOwner},
    tasks::port_scan::apply_ports,
};

/// Port selection form; an absent field is left unchanged, an empty one clears it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortSelection {
    pub power_supply_port: Option<String>,
    pub shutter_port: Option<String>,
}

pub fn select_ports(state: &AppState, selection: PortSelection) -> Result<RigState, ControlError> {
    if state.supply_owner().is_some() || state.scenario_active() {
        return Err(ControlError::Busy("ports cannot change while the power supply is in use"));
    }
    state.update_rig("select-ports", |rig| {
        if let Some(port) = selection.power_supply_port {
            rig.select_port(DeviceKind::PowerSupply, Some(port));
        }
        if let Some(port) = selection.shutter_port {
            rig.select_port(DeviceKind::Shutter, Some(port));
        }
    })
}

/// Enumerate serial ports now instead of waiting for the next scan
pub async fn refresh_ports(state: &AppState) -> Result<RigState, ControlError> {
    let ports = tokio::task::spawn_blocking(available_ports)
        .await
        .map_err(|e| ControlError::Internal(format!("port enumeration task failed: {}", e)))?
        .map_err(|e| ControlError::Internal(format!("failed to enumerate serial ports: {}", e)))?;
    apply_ports(state, ports);
    state.get_rig_state()
}

/// Bring the rig to a safe state before the process exits
pub async fn shutdown_rig(controller: &ScenarioController) {
    let state = controller.state();
    info!("Shutting the rig down");

    match controller.stop().await {
        Ok(Some(report)) => info!("Scenario stopped on shutdown: {}", report.status),
        Ok(None) => {}
        Err(e) => error!("Failed to stop scenario on shutdown: {}", e),
    }
    stop_manual_timer(state).await;

    let rig = match state.get_rig_state() {
        Ok(rig) => rig,
        Err(e) => {
            error!("Failed to read panel state on shutdown: {}", e);
            return;
        }
    };

    if rig.power_supply_connected {
        match state.power_supply.turn_off().await {
            Ok(()) => info!("Power supply switched off"),
            Err(e) => warn!("Power off on shutdown failed: {}", e),
        }
    }
    if let Some(port) = rig.shutter_port {
        let stopped = match state.shutter.connect(&port).await {
            Ok(()) => state.shutter.stop().await,
            Err(e) => Err(e),
        };
        if let Err(e) = stopped {
            warn!("Stopping the shutter on shutdown failed: {}", e);
        }
    }
    if let Err(e) = state.update_rig("shutdown", |rig| rig.mark_disconnected()) {
        error!("Failed to update panel state: {}", e);
    }
    state.release_supply(SupplyOwner::Manual);
}

//! Manual power supply control

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::{
    devices::DeviceKind,
    error::{ControlError, DeviceError, ValidationError},
    scenario::{
        stage::{parse_setpoint, OVERHEAT_WARNING_AMPERES},
        timer::{CountdownTimer, TimeFields, TimerMode},
    },
    state::{AppState, NoticeLevel, RigState, SupplyOwner, TimerState},
    tasks::spawn_countdown,
};

const SOURCE: &str = "power supply";

/// Manual session form: a setpoint and the single global timer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManualSessionRequest {
    #[serde(default, deserialize_with = "crate::utils::fields::lenient_text")]
    pub setpoint: String,
    #[serde(default)]
    pub mode: TimerMode,
    #[serde(flatten)]
    pub time: TimeFields,
}

/// Take the supply for a one-off manual action. An active manual session already
/// holds it; returns whether the claim is new and must be released afterwards.
fn claim_for_manual_action(state: &AppState) -> Result<bool, ControlError> {
    if state.supply_owner() == Some(SupplyOwner::Manual) {
        return Ok(false);
    }
    state.claim_supply(SupplyOwner::Manual)?;
    Ok(true)
}

fn mark_disconnected(state: &AppState, action: &str) {
    if let Err(e) = state.update_rig(action, |rig| rig.mark_disconnected()) {
        error!("Failed to update panel state: {}", e);
    }
}

/// Connect to the power supply on the selected port
pub async fn enable_power_supply(state: &Arc<AppState>) -> Result<RigState, ControlError> {
    let claimed = claim_for_manual_action(state)?;
    let result = connect_power_supply(state).await;
    if claimed {
        state.release_supply(SupplyOwner::Manual);
    }
    result
}

async fn connect_power_supply(state: &AppState) -> Result<RigState, ControlError> {
    let rig = state.get_rig_state()?;
    let Some(port) = rig.power_supply_port.clone() else {
        let e = ValidationError::PortNotSelected(DeviceKind::PowerSupply);
        state.notify(NoticeLevel::Warning, SOURCE, e.to_string());
        return Err(e.into());
    };
    if rig.shutter_port.is_none() {
        let e = ValidationError::PortNotSelected(DeviceKind::Shutter);
        state.notify(NoticeLevel::Warning, SOURCE, e.to_string());
        return Err(e.into());
    }

    match state.power_supply.connect(&port).await {
        Ok(()) => {
            info!("Power supply connected on {}", port);
            state.update_rig("power-supply-enable", |rig| rig.power_supply_connected = true)
        }
        Err(e) => {
            state.notify(NoticeLevel::Error, SOURCE, e.to_string());
            mark_disconnected(state, "power-supply-enable-failed");
            Err(e.into())
        }
    }
}

/// Stop a manual session, switch the output off and forget the connection
pub async fn disable_power_supply(state: &Arc<AppState>) -> Result<RigState, ControlError> {
    claim_for_manual_action(state)?;
    stop_manual_timer(state).await;

    let result = match state.get_rig_state() {
        Ok(rig) if rig.power_supply_connected => state.power_supply.turn_off().await,
        Ok(_) => Ok(()),
        Err(e) => {
            state.release_supply(SupplyOwner::Manual);
            return Err(e);
        }
    };
    mark_disconnected(state, "power-supply-disable");
    state.release_supply(SupplyOwner::Manual);

    match result {
        Ok(()) => {
            info!("Power supply disabled");
            state.get_rig_state()
        }
        Err(e) => {
            state.notify(NoticeLevel::Error, SOURCE, e.to_string());
            Err(e.into())
        }
    }
}

/// Apply a manual setpoint and start the global timer; its expiry switches the output off.
///
/// The supply is claimed for the session before any device call and stays
/// claimed until the session is stopped or expires.
pub async fn start_manual_session(
    state: &Arc<AppState>,
    request: ManualSessionRequest,
) -> Result<TimerState, ControlError> {
    state.claim_supply(SupplyOwner::Manual)?;
    let started = begin_manual_session(state, request).await;
    if started.is_err() {
        state.release_supply(SupplyOwner::Manual);
    }
    started
}

async fn begin_manual_session(
    state: &Arc<AppState>,
    request: ManualSessionRequest,
) -> Result<TimerState, ControlError> {
    if !state.get_rig_state()?.power_supply_connected {
        state.notify(NoticeLevel::Warning, SOURCE, "Connect the power supply first");
        return Err(ControlError::NotConnected);
    }

    let setpoint = match parse_setpoint(&request.setpoint) {
        Ok(value) => value,
        Err(e) => {
            state.notify(NoticeLevel::Warning, SOURCE, e.to_string());
            return Err(e.into());
        }
    };
    if setpoint >= OVERHEAT_WARNING_AMPERES {
        state.notify(
            NoticeLevel::Warning,
            SOURCE,
            "Crucible overheating risk: the current is close to the 200 A maximum",
        );
    }

    let mut timer = CountdownTimer::new();
    let expiry_state = Arc::clone(state);
    let started = timer.start(request.mode, &request.time, move || {
        tokio::spawn(manual_session_expired(expiry_state));
    });
    if let Err(e) = started {
        if let Err(publish_err) = state.publish_timer_state(TimerState::rejected(e.invalid_fields())) {
            error!("Failed to publish timer state: {}", publish_err);
        }
        state.notify(NoticeLevel::Warning, SOURCE, e.to_string());
        return Err(e.into());
    }

    // Setpoints are whole amperes on the device side
    let current = setpoint as u16;
    if let Err(e) = apply_setpoint(state, current).await {
        state.notify(NoticeLevel::Warning, SOURCE, e.to_string());
        if let Err(off_err) = state.power_supply.turn_off().await {
            warn!("Power off after failed start also failed: {}", off_err);
        }
        mark_disconnected(state, "manual-start-failed");
        state.reset_timer_state();
        return Err(e.into());
    }

    let running = spawn_countdown(Arc::clone(state), timer, None);
    let orphaned = match state.manual_timer.lock() {
        Ok(mut slot) => {
            *slot = Some(running);
            None
        }
        Err(e) => Some((running, format!("Failed to lock manual timer: {}", e))),
    };
    if let Some((running, message)) = orphaned {
        if let Err(stop_err) = running.stop().await {
            error!("Failed to stop orphaned timer: {}", stop_err);
        }
        if let Err(off_err) = power_off(state, "manual-start-failed").await {
            warn!("Power off after failed start also failed: {}", off_err);
        }
        return Err(ControlError::Internal(message));
    }
    state.update_rig("manual-start", |rig| rig.manual_session_active = true)?;

    info!("Manual session started at {} A", current);
    state.get_timer_state()
}

async fn apply_setpoint(state: &AppState, current: u16) -> Result<(), DeviceError> {
    let ps = &state.power_supply;
    ps.turn_on().await?;
    ps.set_current_voltage(current, state.settings.voltage).await?;

    let telemetry = ps.read_telemetry().await;
    for e in telemetry.errors() {
        state.notify(NoticeLevel::Warning, "telemetry", e.to_string());
    }
    let measured_current = telemetry.current.as_ref().ok().copied();
    let measured_voltage = telemetry.voltage_volts();
    if let Err(e) = state.update_rig("manual-setpoint", |rig| {
        rig.output_on = true;
        rig.setpoint_amperes = Some(current);
        rig.measured_current = measured_current;
        rig.measured_voltage = measured_voltage;
    }) {
        warn!("Failed to update panel state: {}", e);
    }

    ps.reset().await
}

/// Stop the manual timer and switch the output off
pub async fn stop_manual_session(state: &Arc<AppState>) -> Result<RigState, ControlError> {
    claim_for_manual_action(state)?;
    stop_manual_timer(state).await;
    let result = power_off(state, "manual-stop").await;
    state.release_supply(SupplyOwner::Manual);
    result?;
    info!("Manual session stopped");
    state.get_rig_state()
}

async fn manual_session_expired(state: Arc<AppState>) {
    // An empty slot means the session was already stopped
    let ended = match state.manual_timer.lock() {
        Ok(mut slot) => slot.take().is_some(),
        Err(e) => {
            error!("Failed to lock manual timer: {}", e);
            true
        }
    };
    if !ended {
        return;
    }
    match power_off(&state, "manual-expired").await {
        Ok(()) => state.notify(NoticeLevel::Info, SOURCE, "Time is up, power supply switched off"),
        Err(e) => error!("Power off on timer expiry failed: {}", e),
    }
    state.release_supply(SupplyOwner::Manual);
}

pub(crate) async fn stop_manual_timer(state: &AppState) {
    let running = match state.manual_timer.lock() {
        Ok(mut slot) => slot.take(),
        Err(e) => {
            error!("Failed to lock manual timer: {}", e);
            None
        }
    };
    if let Some(running) = running {
        if let Err(e) = running.stop().await {
            error!("Failed to stop manual timer: {}", e);
        }
    }
    if let Err(e) = state.update_rig("manual-timer-stop", |rig| rig.manual_session_active = false) {
        error!("Failed to update panel state: {}", e);
    }
}

async fn power_off(state: &AppState, action: &str) -> Result<(), ControlError> {
    match state.power_supply.turn_off().await {
        Ok(()) => {
            state.update_rig(action, |rig| {
                rig.output_on = false;
                rig.manual_session_active = false;
                rig.setpoint_amperes = None;
                rig.clear_telemetry();
            })?;
            Ok(())
        }
        Err(e) => {
            state.notify(NoticeLevel::Warning, SOURCE, e.to_string());
            mark_disconnected(state, action);
            Err(e.into())
        }
    }
}

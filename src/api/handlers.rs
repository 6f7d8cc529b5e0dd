//! HTTP endpoint handlers

use axum::{extract::State, response::Json};
use tracing::{info, warn};

use super::{
    responses::{ApiError, ApiResponse, HealthResponse, StatusResponse},
    ApiContext,
};
use crate::{
    scenario::{RunReport, ScenarioRequest},
    services::{self, ManualSessionRequest, PortSelection},
    state::{RigState, ScenarioRunState, TimerState},
};

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

/// Handle GET /status - Panel, timer and scenario state
pub async fn status_handler(State(ctx): State<ApiContext>) -> Result<Json<StatusResponse>, ApiError> {
    let (last_action, last_action_time) = ctx.state.get_last_action();
    Ok(Json(StatusResponse {
        rig: ctx.state.get_rig_state()?,
        timer: ctx.state.get_timer_state()?,
        scenario: ctx.state.get_run_state()?,
        uptime: ctx.state.get_uptime(),
        last_action,
        last_action_time,
    }))
}

/// Handle GET /ports - Rescan and list serial ports
pub async fn ports_handler(State(ctx): State<ApiContext>) -> ApiResult<RigState> {
    let rig = match services::refresh_ports(&ctx.state).await {
        Ok(rig) => rig,
        Err(e) => {
            warn!("Port rescan failed, returning last known list: {}", e);
            ctx.state.get_rig_state()?
        }
    };
    Ok(Json(ApiResponse::ok(format!("{} serial ports", rig.available_ports.len()), rig)))
}

/// Handle POST /ports - Select the power supply and shutter ports
pub async fn select_ports_handler(
    State(ctx): State<ApiContext>,
    Json(selection): Json<PortSelection>,
) -> ApiResult<RigState> {
    let rig = services::select_ports(&ctx.state, selection)?;
    info!(
        "Ports selected: power supply={:?}, shutter={:?}",
        rig.power_supply_port, rig.shutter_port
    );
    Ok(Json(ApiResponse::ok("Ports selected", rig)))
}

/// Handle POST /power-supply/enable
pub async fn power_supply_enable_handler(State(ctx): State<ApiContext>) -> ApiResult<RigState> {
    let rig = services::enable_power_supply(&ctx.state).await?;
    Ok(Json(ApiResponse::ok("Power supply connected", rig)))
}

/// Handle POST /power-supply/disable
pub async fn power_supply_disable_handler(State(ctx): State<ApiContext>) -> ApiResult<RigState> {
    let rig = services::disable_power_supply(&ctx.state).await?;
    Ok(Json(ApiResponse::ok("Power supply disabled", rig)))
}

/// Handle POST /power-supply/start - Apply a setpoint and start the timer
pub async fn power_supply_start_handler(
    State(ctx): State<ApiContext>,
    Json(request): Json<ManualSessionRequest>,
) -> ApiResult<TimerState> {
    let timer = services::start_manual_session(&ctx.state, request).await?;
    Ok(Json(ApiResponse::ok("Manual session started", timer)))
}

/// Handle POST /power-supply/stop
pub async fn power_supply_stop_handler(State(ctx): State<ApiContext>) -> ApiResult<RigState> {
    let rig = services::stop_manual_session(&ctx.state).await?;
    Ok(Json(ApiResponse::ok("Manual session stopped", rig)))
}

/// Handle POST /shutter/open
pub async fn shutter_open_handler(State(ctx): State<ApiContext>) -> ApiResult<RigState> {
    let rig = services::open_shutter(&ctx.state).await?;
    Ok(Json(ApiResponse::ok("Shutter opening", rig)))
}

/// Handle POST /shutter/close
pub async fn shutter_close_handler(State(ctx): State<ApiContext>) -> ApiResult<RigState> {
    let rig = services::close_shutter(&ctx.state).await?;
    Ok(Json(ApiResponse::ok("Shutter closing", rig)))
}

/// Handle POST /shutter/stop
pub async fn shutter_stop_handler(State(ctx): State<ApiContext>) -> ApiResult<RigState> {
    let rig = services::stop_shutter(&ctx.state).await?;
    Ok(Json(ApiResponse::ok("Shutter motor stopped", rig)))
}

/// Handle GET /scenario - Run state and last report
pub async fn scenario_handler(State(ctx): State<ApiContext>) -> ApiResult<ScenarioRunState> {
    let run = ctx.state.get_run_state()?;
    Ok(Json(ApiResponse::ok(format!("Scenario {:?}", run.phase).to_lowercase(), run)))
}

/// Handle POST /scenario/start
pub async fn scenario_start_handler(
    State(ctx): State<ApiContext>,
    Json(request): Json<ScenarioRequest>,
) -> ApiResult<ScenarioRunState> {
    let run = ctx.scenarios.start(request).await?;
    Ok(Json(ApiResponse::ok(format!("Scenario started with {} stages", run.stages_total), run)))
}

/// Handle POST /scenario/stop - Cancel and wait for the power off
pub async fn scenario_stop_handler(State(ctx): State<ApiContext>) -> ApiResult<Option<RunReport>> {
    let report = ctx.scenarios.stop().await?;
    let message = match &report {
        Some(report) => format!("Scenario {}", report.status),
        None => "No scenario was running".to_string(),
    };
    Ok(Json(ApiResponse::ok(message, report)))
}

/// Handle POST /notices/clear
pub async fn clear_notices_handler(State(ctx): State<ApiContext>) -> ApiResult<usize> {
    let cleared = ctx.state.clear_notices()?;
    Ok(Json(ApiResponse::ok(format!("Cleared {} notices", cleared), cleared)))
}

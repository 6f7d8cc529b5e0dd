//! HTTP API module
//!
//! Operator endpoints for the manual controls and the scenario runner.

pub mod handlers;
pub mod responses;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{scenario::ScenarioController, state::AppState};
use handlers::*;

/// Shared handler state
#[derive(Clone)]
pub struct ApiContext {
    pub state: Arc<AppState>,
    pub scenarios: Arc<ScenarioController>,
}

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>, scenarios: Arc<ScenarioController>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/ports", get(ports_handler).post(select_ports_handler))
        .route("/power-supply/enable", post(power_supply_enable_handler))
        .route("/power-supply/disable", post(power_supply_disable_handler))
        .route("/power-supply/start", post(power_supply_start_handler))
        .route("/power-supply/stop", post(power_supply_stop_handler))
        .route("/shutter/open", post(shutter_open_handler))
        .route("/shutter/close", post(shutter_close_handler))
        .route("/shutter/stop", post(shutter_stop_handler))
        .route("/scenario", get(scenario_handler))
        .route("/scenario/start", post(scenario_start_handler))
        .route("/scenario/stop", post(scenario_stop_handler))
        .route("/notices/clear", post(clear_notices_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(ApiContext { state, scenarios })
}

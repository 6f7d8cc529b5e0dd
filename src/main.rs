//! Evaporator Control - operator API and headless scenario runner
//!
//! This is the main entry point for the evaporator-control application.

use std::{path::Path, sync::Arc};

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use evaporator_control::{
    api::create_router,
    config::{Command, Config},
    devices::{
        ports::available_ports, DeviceKind, PowerSupply, Shutter, SimulatedPowerSupply, SimulatedShutter,
        SIMULATED_POWER_SUPPLY_PORT, SIMULATED_SHUTTER_PORT,
    },
    scenario::{RunStatus, ScenarioController, ScenarioRequest},
    services::{enable_power_supply, shutdown_rig},
    state::AppState,
    tasks::{port_scan_task, telemetry_refresh_task},
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("evaporator_control={},tower_http=info", config.log_level()))
        .init();

    info!("Starting evaporator-control v{}", env!("CARGO_PKG_VERSION"));

    let command = config.command();
    if command == Command::Ports {
        let ports = available_ports().context("failed to enumerate serial ports")?;
        if ports.is_empty() {
            info!("No serial ports found");
        }
        for port in ports {
            println!("{}", port);
        }
        return Ok(());
    }

    // The bench simulator stands in for the vendor drivers
    let mut settings = config.settings();
    settings.virtual_ports = vec![SIMULATED_POWER_SUPPLY_PORT.to_string(), SIMULATED_SHUTTER_PORT.to_string()];
    info!(
        "Configuration: voltage={} V, tick={:?}, scenario_dir={}, language={:?}",
        settings.voltage,
        settings.tick,
        settings.scenario_dir.display(),
        settings.language
    );

    let power_supply = PowerSupply::new(SimulatedPowerSupply::new(), settings.language);
    let shutter = Shutter::new(SimulatedShutter::new(), settings.language);
    let state = Arc::new(AppState::new(settings, power_supply, shutter));

    let power_supply_port = config
        .power_supply_port
        .clone()
        .unwrap_or_else(|| SIMULATED_POWER_SUPPLY_PORT.to_string());
    let shutter_port = config
        .shutter_port
        .clone()
        .unwrap_or_else(|| SIMULATED_SHUTTER_PORT.to_string());
    state.update_rig("startup", |rig| {
        rig.select_port(DeviceKind::PowerSupply, Some(power_supply_port));
        rig.select_port(DeviceKind::Shutter, Some(shutter_port));
    })?;

    let scenarios = Arc::new(ScenarioController::new(Arc::clone(&state)));

    // Start the background refresh tasks
    let telemetry_state = Arc::clone(&state);
    tokio::spawn(async move {
        telemetry_refresh_task(telemetry_state).await;
    });
    let port_state = Arc::clone(&state);
    tokio::spawn(async move {
        port_scan_task(port_state).await;
    });

    let result = match command {
        Command::Run { file } => run_scenario_file(&scenarios, &file).await,
        Command::Serve | Command::Ports => serve(&config, &state, &scenarios).await,
    };

    shutdown_rig(&scenarios).await;
    info!("Shutdown complete");
    result
}

async fn serve(config: &Config, state: &Arc<AppState>, scenarios: &Arc<ScenarioController>) -> anyhow::Result<()> {
    // Create HTTP router with all endpoints
    let app = create_router(Arc::clone(state), Arc::clone(scenarios));

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  GET  /status, /health, /ports, /scenario");
    info!("  POST /ports                          - Select device ports");
    info!("  POST /power-supply/{{enable,disable}}  - Connect / disconnect the supply");
    info!("  POST /power-supply/{{start,stop}}      - Manual setpoint session");
    info!("  POST /shutter/{{open,close,stop}}      - Shutter motor");
    info!("  POST /scenario/{{start,stop}}          - Scenario runner");
    info!("  POST /notices/clear");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }
    Ok(())
}

async fn run_scenario_file(scenarios: &ScenarioController, file: &Path) -> anyhow::Result<()> {
    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let request: ScenarioRequest =
        serde_json::from_str(&text).with_context(|| format!("failed to parse {}", file.display()))?;

    enable_power_supply(scenarios.state()).await?;
    scenarios.start(request).await?;

    let report = tokio::select! {
        report = scenarios.wait() => report,
        _ = shutdown_signal() => {
            warn!("Interrupted, stopping the scenario");
            scenarios.stop().await?
        }
    };

    let Some(report) = report else {
        anyhow::bail!("scenario ended without a report");
    };
    for stage in &report.stages {
        println!(
            "stage {}: {} A, {} s, {}",
            stage.number, stage.current_amperes, stage.elapsed_seconds, stage.outcome
        );
    }
    println!("status: {}", report.status);
    if let Some(path) = &report.log_path {
        println!("log: {}", path.display());
    }

    if report.status == RunStatus::Failed {
        anyhow::bail!("scenario failed");
    }
    Ok(())
}

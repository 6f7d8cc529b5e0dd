#![allow(dead_code)]

use std::{path::PathBuf, sync::Arc};

use evaporator_control::{
    config::RigSettings,
    devices::{
        CallJournal, FaultPlan, PowerSupply, Shutter, SimulatedPowerSupply, SimulatedShutter,
        SIMULATED_POWER_SUPPLY_PORT, SIMULATED_SHUTTER_PORT,
    },
    scenario::{ScenarioController, ScenarioRequest, StageInput, TimerMode},
    services::{self, PortSelection},
    state::{AppState, RigEvent},
};
use tokio::sync::broadcast;

/// Controller wired to the bench simulator, with handles on its journals and fault plans
pub struct Bench {
    pub state: Arc<AppState>,
    pub controller: ScenarioController,
    pub journal: CallJournal,
    pub faults: FaultPlan,
    pub shutter_journal: CallJournal,
    pub shutter_faults: FaultPlan,
    pub scenario_dir: PathBuf,
}

impl Bench {
    pub fn new(name: &str) -> Self {
        let journal = CallJournal::default();
        let faults = FaultPlan::default();
        let shutter_journal = CallJournal::default();
        let shutter_faults = FaultPlan::default();

        let scenario_dir = std::env::temp_dir().join(format!("evaporator-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&scenario_dir);
        let settings = RigSettings {
            scenario_dir: scenario_dir.clone(),
            ..RigSettings::default()
        };

        let power_supply = PowerSupply::new(
            SimulatedPowerSupply::with_journal(journal.clone(), faults.clone()),
            settings.language,
        );
        let shutter = Shutter::new(
            SimulatedShutter::with_journal(shutter_journal.clone(), shutter_faults.clone()),
            settings.language,
        );
        let state = Arc::new(AppState::new(settings, power_supply, shutter));
        let controller = ScenarioController::new(Arc::clone(&state));

        Self {
            state,
            controller,
            journal,
            faults,
            shutter_journal,
            shutter_faults,
            scenario_dir,
        }
    }

    pub fn select_ports(&self) {
        services::select_ports(
            &self.state,
            PortSelection {
                power_supply_port: Some(SIMULATED_POWER_SUPPLY_PORT.to_string()),
                shutter_port: Some(SIMULATED_SHUTTER_PORT.to_string()),
            },
        )
        .unwrap();
    }

    /// Ports selected and the supply connected; the journal starts empty
    pub async fn connected(name: &str) -> Self {
        let bench = Self::new(name);
        bench.select_ports();
        services::enable_power_supply(&bench.state).await.unwrap();
        bench.journal.clear();
        bench
    }

    pub fn events(&self) -> broadcast::Receiver<RigEvent> {
        self.state.event_tx.subscribe()
    }
}

impl Drop for Bench {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.scenario_dir);
    }
}

pub fn scenario(mode: TimerMode, stages: &[(&str, &str, &str, &str)]) -> ScenarioRequest {
    ScenarioRequest {
        mode,
        stages: stages
            .iter()
            .map(|(current, h, m, s)| StageInput::new(*current, *h, *m, *s))
            .collect(),
    }
}

/// Drain whatever events are already queued
pub fn drain(events: &mut broadcast::Receiver<RigEvent>) -> Vec<RigEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

/// Wait for the start of a given stage
pub async fn wait_for_stage(events: &mut broadcast::Receiver<RigEvent>, stage: usize) {
    loop {
        match events.recv().await {
            Ok(RigEvent::StageStarted { stage: started, .. }) if started == stage => return,
            Ok(_) => continue,
            Err(e) => panic!("event stream ended before stage {}: {}", stage, e),
        }
    }
}

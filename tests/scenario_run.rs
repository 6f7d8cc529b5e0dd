mod common;

use std::time::Duration;

use common::{drain, scenario, wait_for_stage, Bench};
use evaporator_control::{
    devices::{DeviceKind, DriverCall, Operation, SIMULATED_POWER_SUPPLY_PORT},
    error::{ControlError, ValidationError},
    scenario::{RunStatus, StageOutcome, TimerMode},
    state::{NoticeLevel, RigEvent, RunPhase, TimerState},
};

fn connect() -> DriverCall {
    DriverCall::Connect(SIMULATED_POWER_SUPPLY_PORT.to_string())
}

fn ticks_for(events: &[RigEvent], stage: usize) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, RigEvent::TimerTick { stage: Some(s), .. } if *s == stage))
        .count()
}

#[tokio::test(start_paused = true)]
async fn two_stage_countdown_runs_in_order_and_powers_off_once() {
    let bench = Bench::connected("two-stage").await;
    let mut events = bench.events();

    bench
        .controller
        .start(scenario(
            TimerMode::ReverseCountdown,
            &[("50", "0", "0", "2"), ("100", "0", "0", "3")],
        ))
        .await
        .unwrap();
    let report = bench.controller.wait().await.unwrap();

    assert_eq!(report.status, RunStatus::Success);
    assert_eq!(
        bench.journal.commands(),
        vec![
            connect(),
            DriverCall::TurnOn,
            DriverCall::SetCurrentVoltage(50, 6),
            DriverCall::Reset,
            connect(),
            DriverCall::TurnOn,
            DriverCall::SetCurrentVoltage(100, 6),
            DriverCall::Reset,
            DriverCall::TurnOff,
        ]
    );

    let events = drain(&mut events);
    assert_eq!(ticks_for(&events, 1), 2);
    assert_eq!(ticks_for(&events, 2), 3);
    assert!(events.contains(&RigEvent::RunFinished { status: RunStatus::Success }));

    assert_eq!(report.stages.len(), 2);
    assert_eq!(report.stages[0].elapsed_seconds, 2);
    assert_eq!(report.stages[1].elapsed_seconds, 3);

    let log_path = report.log_path.clone().expect("run log path");
    assert!(log_path.starts_with(&bench.scenario_dir));
    assert!(log_path.to_string_lossy().ends_with("_scenario_params.log"));
    let log = std::fs::read_to_string(&log_path).unwrap();
    assert!(log.starts_with("Status: success\n"));
    assert_eq!(log.matches("Outcome: success").count(), 2);

    let run = bench.state.get_run_state().unwrap();
    assert_eq!(run.phase, RunPhase::Idle);
    assert!(!run.is_running);
    assert_eq!(bench.state.get_timer_state().unwrap(), TimerState::inactive());
    assert!(!bench.state.get_rig_state().unwrap().output_on);
    assert_eq!(bench.state.supply_owner(), None);
}

#[tokio::test(start_paused = true)]
async fn cancelling_mid_stage_skips_the_rest_and_powers_off() {
    let bench = Bench::connected("cancel").await;
    let mut events = bench.events();

    bench
        .controller
        .start(scenario(
            TimerMode::ReverseCountdown,
            &[("50", "0", "0", "10"), ("80", "0", "0", "10"), ("120", "0", "0", "10")],
        ))
        .await
        .unwrap();

    wait_for_stage(&mut events, 2).await;
    tokio::time::sleep(Duration::from_secs(3)).await;
    let report = bench.controller.stop().await.unwrap().expect("a run was active");

    assert_eq!(report.status, RunStatus::Stopped);
    assert_eq!(report.stages.len(), 2);
    assert_eq!(report.stages[0].outcome, StageOutcome::Succeeded);
    assert_eq!(report.stages[1].outcome, StageOutcome::Cancelled);
    assert_eq!(report.cancelled_stages(), vec![2]);

    assert_eq!(bench.journal.count(Operation::SetCurrentVoltage), 2);
    assert_eq!(bench.journal.count(Operation::TurnOff), 1);
    assert_eq!(bench.journal.commands().last(), Some(&DriverCall::TurnOff));

    let run = bench.state.get_run_state().unwrap();
    assert_eq!(run.phase, RunPhase::Idle);
    assert!(run.cancellation_requested);
    assert!(run.cancelled_stages.contains(&2));
    assert_eq!(bench.state.get_timer_state().unwrap(), TimerState::inactive());

    let log = std::fs::read_to_string(report.log_path.unwrap()).unwrap();
    assert!(log.starts_with("Status: stopped\n"));
    assert!(log.contains("Outcome: cancelled"));

    // a second stop is a no-op
    assert!(bench.controller.stop().await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn device_error_aborts_the_run_and_is_logged() {
    let bench = Bench::connected("device-error").await;
    bench.faults.fail_nth(Operation::SetCurrentVoltage, 2, 4);

    bench
        .controller
        .start(scenario(
            TimerMode::ReverseCountdown,
            &[("50", "0", "0", "1"), ("100", "0", "0", "1"), ("150", "0", "0", "1")],
        ))
        .await
        .unwrap();
    let report = bench.controller.wait().await.unwrap();

    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.stages.len(), 2);
    assert_eq!(
        report.stages[1].outcome,
        StageOutcome::Failed {
            message: "power supply: error code 4. Failed to set current setpoint.".into()
        }
    );
    assert_eq!(
        bench.journal.commands(),
        vec![
            connect(),
            DriverCall::TurnOn,
            DriverCall::SetCurrentVoltage(50, 6),
            DriverCall::Reset,
            connect(),
            DriverCall::TurnOn,
            DriverCall::SetCurrentVoltage(100, 6),
            DriverCall::TurnOff,
        ]
    );

    let log = std::fs::read_to_string(report.log_path.unwrap()).unwrap();
    assert!(log.starts_with("Status: failed\n"));
    assert!(log.contains("Outcome: failed: power supply: error code 4"));

    let rig = bench.state.get_rig_state().unwrap();
    assert!(!rig.power_supply_connected);
    assert!(rig
        .notices
        .iter()
        .any(|n| n.level == NoticeLevel::Error && n.message.contains("Stage 2 failed")));
}

#[tokio::test(start_paused = true)]
async fn failed_power_off_is_recorded_and_run_still_ends() {
    let bench = Bench::connected("power-off").await;
    bench.faults.fail_nth(Operation::TurnOff, 1, 7);

    bench
        .controller
        .start(scenario(TimerMode::ReverseCountdown, &[("50", "0", "0", "1")]))
        .await
        .unwrap();
    let report = bench.controller.wait().await.unwrap();

    assert_eq!(report.status, RunStatus::Success);
    assert!(report.power_off_error.as_deref().unwrap_or_default().contains("error code 7"));
    assert_eq!(bench.state.run_phase(), RunPhase::Idle);
    assert!(!bench.state.get_rig_state().unwrap().power_supply_connected);

    let log = std::fs::read_to_string(report.log_path.unwrap()).unwrap();
    assert!(log.contains("Power off failed: power supply: error code 7"));
}

#[tokio::test(start_paused = true)]
async fn invalid_scenarios_never_touch_the_devices() {
    let bench = Bench::connected("validation").await;

    let zero_current = bench
        .controller
        .start(scenario(TimerMode::ReverseCountdown, &[("0", "0", "0", "5"), ("0", "0", "1", "0")]))
        .await
        .unwrap_err();
    assert!(matches!(zero_current, ControlError::Validation(ValidationError::NoCurrent)));

    let zero_duration = bench
        .controller
        .start(scenario(TimerMode::ReverseCountdown, &[("50", "0", "0", "0"), ("60", "", "", "")]))
        .await
        .unwrap_err();
    assert!(matches!(zero_duration, ControlError::Validation(ValidationError::NoDuration)));

    let out_of_range = bench
        .controller
        .start(scenario(TimerMode::ReverseCountdown, &[("50", "24", "0", "0")]))
        .await
        .unwrap_err();
    assert!(matches!(out_of_range, ControlError::Validation(ValidationError::InvalidStages(_))));

    assert!(bench.journal.calls().is_empty());
    assert_eq!(bench.state.run_phase(), RunPhase::Idle);
    assert!(bench.state.get_run_state().unwrap().last_report.is_none());
}

#[tokio::test(start_paused = true)]
async fn start_requires_ports_and_a_connected_supply() {
    let bench = Bench::new("preconditions");
    let request = scenario(TimerMode::ReverseCountdown, &[("50", "0", "0", "1")]);

    let no_ports = bench.controller.start(request.clone()).await.unwrap_err();
    assert!(matches!(
        no_ports,
        ControlError::Validation(ValidationError::PortNotSelected(DeviceKind::PowerSupply))
    ));

    bench.select_ports();
    let disconnected = bench.controller.start(request).await.unwrap_err();
    assert!(matches!(disconnected, ControlError::NotConnected));

    assert!(bench.journal.calls().is_empty());
    assert!(!bench.controller.is_running());
    assert_eq!(bench.state.supply_owner(), None);
}

#[tokio::test(start_paused = true)]
async fn second_start_is_rejected_while_running() {
    let bench = Bench::connected("already-running").await;
    let request = scenario(TimerMode::ReverseCountdown, &[("50", "0", "1", "0")]);

    bench.controller.start(request.clone()).await.unwrap();
    assert!(bench.controller.is_running());
    assert!(matches!(
        bench.controller.start(request).await.unwrap_err(),
        ControlError::AlreadyRunning
    ));

    let report = bench.controller.stop().await.unwrap().unwrap();
    assert_eq!(report.status, RunStatus::Stopped);
    assert_eq!(bench.journal.count(Operation::TurnOff), 1);
}

#[tokio::test(start_paused = true)]
async fn elapsed_mode_runs_first_stage_until_stopped() {
    let bench = Bench::connected("elapsed").await;
    let mut events = bench.events();

    bench
        .controller
        .start(scenario(TimerMode::DirectElapsed, &[("70", "", "", ""), ("90", "0", "0", "5")]))
        .await
        .unwrap();
    wait_for_stage(&mut events, 1).await;
    tokio::time::sleep(Duration::from_millis(5_500)).await;

    let timer = bench.state.get_timer_state().unwrap();
    assert!(timer.active);
    assert_eq!(timer.mode, Some(TimerMode::DirectElapsed));
    assert_eq!(timer.remaining_seconds, Some(5));
    assert_eq!(timer.display.seconds, "05");

    let report = bench.controller.stop().await.unwrap().unwrap();
    assert_eq!(report.stages_total, 1);
    assert_eq!(report.stages.len(), 1);
    assert_eq!(report.stages[0].mode, TimerMode::DirectElapsed);
    assert_eq!(report.stages[0].elapsed_seconds, 5);
    assert_eq!(report.stages[0].outcome, StageOutcome::Cancelled);
    assert_eq!(report.status, RunStatus::Stopped);
    assert_eq!(bench.journal.count(Operation::SetCurrentVoltage), 1);

    let log = std::fs::read_to_string(report.log_path.unwrap()).unwrap();
    assert!(log.contains("Elapsed time: 00:00:05"));

    let rig = bench.state.get_rig_state().unwrap();
    assert!(rig
        .notices
        .iter()
        .any(|n| n.level == NoticeLevel::Warning && n.message.contains("1 stage(s) ignored")));
}

#[tokio::test(start_paused = true)]
async fn zero_duration_countdown_stage_completes_and_the_run_moves_on() {
    let bench = Bench::connected("zero-stage").await;
    let mut events = bench.events();

    bench
        .controller
        .start(scenario(
            TimerMode::ReverseCountdown,
            &[("50", "0", "0", "0"), ("100", "0", "0", "3")],
        ))
        .await
        .unwrap();
    let report = tokio::time::timeout(Duration::from_secs(60), bench.controller.wait())
        .await
        .expect("run finishes on its own")
        .unwrap();

    assert_eq!(report.status, RunStatus::Success);
    assert_eq!(report.stages.len(), 2);
    assert_eq!(report.stages[0].mode, TimerMode::ReverseCountdown);
    assert_eq!(report.stages[0].elapsed_seconds, 1);
    assert_eq!(report.stages[1].elapsed_seconds, 3);
    assert_eq!(
        bench.journal.commands(),
        vec![
            connect(),
            DriverCall::TurnOn,
            DriverCall::SetCurrentVoltage(50, 6),
            DriverCall::Reset,
            connect(),
            DriverCall::TurnOn,
            DriverCall::SetCurrentVoltage(100, 6),
            DriverCall::Reset,
            DriverCall::TurnOff,
        ]
    );

    let events = drain(&mut events);
    assert_eq!(ticks_for(&events, 1), 1);
    assert_eq!(ticks_for(&events, 2), 3);
}

#[tokio::test(start_paused = true)]
async fn telemetry_read_failure_is_a_warning_not_a_stop() {
    let bench = Bench::connected("telemetry-warning").await;
    bench.faults.fail_nth(Operation::ReadCurrent, 1, -1);

    bench
        .controller
        .start(scenario(TimerMode::ReverseCountdown, &[("50", "0", "0", "2")]))
        .await
        .unwrap();
    let report = bench.controller.wait().await.unwrap();

    assert_eq!(report.status, RunStatus::Success);
    assert_eq!(report.stages[0].outcome, StageOutcome::Succeeded);
    assert_eq!(bench.journal.count(Operation::ReadCurrent), 1);
    assert_eq!(bench.journal.count(Operation::TurnOff), 1);

    let rig = bench.state.get_rig_state().unwrap();
    assert!(rig.power_supply_connected);
    assert!(rig.notices.iter().any(|n| n.level == NoticeLevel::Warning
        && n.source == "telemetry"
        && n.message.contains("error code -1")));
}

#[tokio::test(start_paused = true)]
async fn elapsed_mode_validates_every_row_before_dropping_extras() {
    let bench = Bench::connected("elapsed-invalid").await;

    let err = bench
        .controller
        .start(scenario(TimerMode::DirectElapsed, &[("70", "", "", ""), ("250", "0", "0", "5")]))
        .await
        .unwrap_err();
    assert!(matches!(err, ControlError::Validation(ValidationError::InvalidStages(_))));

    let rig = bench.state.get_rig_state().unwrap();
    assert!(!rig.notices.iter().any(|n| n.message.contains("ignored")));
    assert!(bench.journal.calls().is_empty());
    assert_eq!(bench.state.run_phase(), RunPhase::Idle);
    assert_eq!(bench.state.supply_owner(), None);
}

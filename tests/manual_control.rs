mod common;

use std::time::Duration;

use common::{scenario, Bench};
use evaporator_control::{
    devices::{DriverCall, MotorMotion, Operation, ShutterPosition, SIMULATED_SHUTTER_PORT},
    error::{ControlError, Field, ValidationError},
    scenario::{TimeFields, TimerMode},
    services::{self, ManualSessionRequest},
    state::{NoticeLevel, SupplyOwner},
};

fn session(setpoint: &str, h: &str, m: &str, s: &str, mode: TimerMode) -> ManualSessionRequest {
    ManualSessionRequest {
        setpoint: setpoint.to_string(),
        mode,
        time: TimeFields::new(h, m, s),
    }
}

#[tokio::test(start_paused = true)]
async fn manual_countdown_expiry_switches_the_output_off() {
    let bench = Bench::connected("manual-expiry").await;

    let timer = services::start_manual_session(
        &bench.state,
        session("12,5", "0", "0", "3", TimerMode::ReverseCountdown),
    )
    .await
    .unwrap();
    assert!(timer.active);
    assert!(timer.fields_locked);
    assert_eq!(timer.progress.maximum, 3);
    assert!(bench.state.manual_session_active());
    assert!(bench.state.get_rig_state().unwrap().output_on);

    tokio::time::sleep(Duration::from_secs(4)).await;

    assert_eq!(
        bench.journal.commands(),
        vec![
            DriverCall::TurnOn,
            DriverCall::SetCurrentVoltage(12, 6),
            DriverCall::Reset,
            DriverCall::TurnOff,
        ]
    );
    let rig = bench.state.get_rig_state().unwrap();
    assert!(!rig.output_on);
    assert!(!rig.manual_session_active);
    assert!(!bench.state.manual_session_active());
    assert!(!bench.state.get_timer_state().unwrap().active);
    assert_eq!(bench.state.supply_owner(), None);
}

#[tokio::test(start_paused = true)]
async fn manual_stop_cancels_the_timer_before_expiry() {
    let bench = Bench::connected("manual-stop").await;

    services::start_manual_session(&bench.state, session("40", "0", "1", "0", TimerMode::ReverseCountdown))
        .await
        .unwrap();
    assert_eq!(bench.state.supply_owner(), Some(SupplyOwner::Manual));
    tokio::time::sleep(Duration::from_millis(10_500)).await;
    assert_eq!(bench.state.get_timer_state().unwrap().remaining_seconds, Some(50));

    services::stop_manual_session(&bench.state).await.unwrap();
    tokio::time::sleep(Duration::from_secs(120)).await;

    assert_eq!(bench.journal.count(Operation::TurnOff), 1);
    assert!(!bench.state.get_timer_state().unwrap().active);
    assert!(!bench.state.manual_session_active());
}

#[tokio::test(start_paused = true)]
async fn invalid_manual_input_is_rejected_before_device_io() {
    let bench = Bench::connected("manual-invalid").await;

    let setpoint = services::start_manual_session(
        &bench.state,
        session("250", "0", "0", "5", TimerMode::ReverseCountdown),
    )
    .await
    .unwrap_err();
    assert!(matches!(setpoint, ControlError::Validation(ValidationError::SetpointOutOfRange(_))));

    let blank = services::start_manual_session(&bench.state, session("50", "", "", "", TimerMode::ReverseCountdown))
        .await
        .unwrap_err();
    assert!(matches!(blank, ControlError::Validation(ValidationError::EmptyTimeFields)));

    let fields = services::start_manual_session(
        &bench.state,
        session("50", "1", "75", "x", TimerMode::ReverseCountdown),
    )
    .await
    .unwrap_err();
    assert!(matches!(fields, ControlError::Validation(ValidationError::InvalidTimeFields(_))));
    assert_eq!(
        bench.state.get_timer_state().unwrap().invalid_fields,
        vec![Field::Minutes, Field::Seconds]
    );

    assert!(bench.journal.calls().is_empty());
    assert_eq!(bench.state.supply_owner(), None);
}

#[tokio::test(start_paused = true)]
async fn high_setpoint_warns_about_overheating() {
    let bench = Bench::connected("manual-overheat").await;

    services::start_manual_session(&bench.state, session("165", "", "", "", TimerMode::DirectElapsed))
        .await
        .unwrap();

    let rig = bench.state.get_rig_state().unwrap();
    assert!(rig
        .notices
        .iter()
        .any(|n| n.level == NoticeLevel::Warning && n.message.contains("overheating")));
    assert_eq!(rig.setpoint_amperes, Some(165));

    services::stop_manual_session(&bench.state).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn manual_session_and_scenario_exclude_each_other() {
    let bench = Bench::connected("exclusion").await;

    services::start_manual_session(&bench.state, session("30", "0", "5", "0", TimerMode::ReverseCountdown))
        .await
        .unwrap();
    let err = bench
        .controller
        .start(scenario(TimerMode::ReverseCountdown, &[("50", "0", "0", "2")]))
        .await
        .unwrap_err();
    assert!(matches!(err, ControlError::Busy(_)));
    services::stop_manual_session(&bench.state).await.unwrap();

    bench
        .controller
        .start(scenario(TimerMode::ReverseCountdown, &[("50", "0", "0", "20")]))
        .await
        .unwrap();
    let err = services::start_manual_session(&bench.state, session("30", "0", "0", "5", TimerMode::ReverseCountdown))
        .await
        .unwrap_err();
    assert!(matches!(err, ControlError::Busy(_)));
    bench.controller.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn simultaneous_manual_and_scenario_starts_admit_only_one() {
    let bench = Bench::connected("simultaneous").await;

    let (manual, run) = tokio::join!(
        services::start_manual_session(&bench.state, session("40", "0", "1", "0", TimerMode::ReverseCountdown)),
        bench
            .controller
            .start(scenario(TimerMode::ReverseCountdown, &[("150", "0", "1", "0")])),
    );
    assert!(manual.is_ok() != run.is_ok());
    let err = if manual.is_ok() { run.unwrap_err() } else { manual.unwrap_err() };
    assert!(matches!(err, ControlError::Busy(_)));

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(bench.journal.count(Operation::TurnOn), 1);
    assert_eq!(bench.journal.count(Operation::SetCurrentVoltage), 1);

    if bench.controller.is_running() {
        assert_eq!(bench.state.supply_owner(), Some(SupplyOwner::Scenario));
        bench.controller.stop().await.unwrap();
    } else {
        assert_eq!(bench.state.supply_owner(), Some(SupplyOwner::Manual));
        services::stop_manual_session(&bench.state).await.unwrap();
    }
    assert_eq!(bench.state.supply_owner(), None);
}

#[tokio::test(start_paused = true)]
async fn connect_failure_marks_the_supply_disconnected() {
    let bench = Bench::new("connect-failure");
    bench.select_ports();
    bench.faults.fail_nth(Operation::Connect, 1, 1);

    let err = services::enable_power_supply(&bench.state).await.unwrap_err();
    assert!(matches!(err, ControlError::Device(_)));
    let rig = bench.state.get_rig_state().unwrap();
    assert!(!rig.power_supply_connected);
    assert!(rig.notices.iter().any(|n| n.level == NoticeLevel::Error));

    services::enable_power_supply(&bench.state).await.unwrap();
    assert!(bench.state.get_rig_state().unwrap().power_supply_connected);
}

#[tokio::test(start_paused = true)]
async fn shutter_error_assumes_closed() {
    let bench = Bench::new("shutter");
    bench.select_ports();

    let rig = services::close_shutter(&bench.state).await.unwrap();
    assert_eq!(rig.shutter_position, ShutterPosition::Closed);
    assert_eq!(rig.motor_motion, MotorMotion::Reverse);

    // closing again reports the shutter as already closed
    let err = services::close_shutter(&bench.state).await.unwrap_err();
    assert!(matches!(err, ControlError::Device(ref e) if e.to_string().contains("error code 8")));

    bench.shutter_faults.fail_nth(Operation::Forward, 1, 3);
    assert!(services::open_shutter(&bench.state).await.is_err());
    let rig = bench.state.get_rig_state().unwrap();
    assert_eq!(rig.shutter_position, ShutterPosition::Closed);
    assert_eq!(rig.motor_motion, MotorMotion::Idle);

    let rig = services::open_shutter(&bench.state).await.unwrap();
    assert_eq!(rig.shutter_position, ShutterPosition::Open);

    let port = || DriverCall::Connect(SIMULATED_SHUTTER_PORT.to_string());
    assert_eq!(
        bench.shutter_journal.calls(),
        vec![
            port(),
            DriverCall::Reverse,
            port(),
            DriverCall::Reverse,
            port(),
            DriverCall::Forward,
            port(),
            DriverCall::Forward,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_everything() {
    let bench = Bench::connected("shutdown").await;
    bench
        .controller
        .start(scenario(TimerMode::ReverseCountdown, &[("50", "0", "1", "0")]))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;

    services::shutdown_rig(&bench.controller).await;

    assert!(!bench.controller.is_running());
    let report = bench.state.get_run_state().unwrap().last_report.unwrap();
    assert_eq!(report.cancelled_stages(), vec![1]);
    assert!(bench.journal.count(Operation::TurnOff) >= 1);
    assert_eq!(bench.shutter_journal.commands().last(), Some(&DriverCall::Stop));
    assert!(!bench.state.get_rig_state().unwrap().power_supply_connected);
}

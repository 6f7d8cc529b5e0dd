//! Manual shutter control

use tracing::{error, info};

use crate::{
    devices::{DeviceKind, MotorMotion, ShutterPosition},
    error::{ControlError, DeviceError, ValidationError},
    state::{AppState, NoticeLevel, RigState},
};

const SOURCE: &str = "shutter";

/// Drive the shutter open
pub async fn open_shutter(state: &AppState) -> Result<RigState, ControlError> {
    shutter_command(state, MotorMotion::Forward).await
}

/// Drive the shutter closed
pub async fn close_shutter(state: &AppState) -> Result<RigState, ControlError> {
    shutter_command(state, MotorMotion::Reverse).await
}

/// Stop the shutter motor
pub async fn stop_shutter(state: &AppState) -> Result<RigState, ControlError> {
    shutter_command(state, MotorMotion::Idle).await
}

async fn shutter_command(state: &AppState, motion: MotorMotion) -> Result<RigState, ControlError> {
    let Some(port) = state.get_rig_state()?.shutter_port else {
        let e = ValidationError::PortNotSelected(DeviceKind::Shutter);
        state.notify(NoticeLevel::Warning, SOURCE, e.to_string());
        return Err(e.into());
    };

    match drive(state, &port, motion).await {
        Ok(()) => {
            info!("Shutter command {:?} done on {}", motion, port);
            state.update_rig("shutter", |rig| {
                rig.motor_motion = motion;
                match motion {
                    MotorMotion::Forward => rig.shutter_position = ShutterPosition::Open,
                    MotorMotion::Reverse => rig.shutter_position = ShutterPosition::Closed,
                    MotorMotion::Idle => {}
                }
            })
        }
        Err(e) => {
            state.notify(NoticeLevel::Warning, SOURCE, e.to_string());
            // Safe assumption after any shutter error
            if let Err(update_err) = state.update_rig("shutter-error", |rig| {
                rig.shutter_position = ShutterPosition::Closed;
                rig.motor_motion = MotorMotion::Idle;
            }) {
                error!("Failed to update panel state: {}", update_err);
            }
            Err(e.into())
        }
    }
}

async fn drive(state: &AppState, port: &str, motion: MotorMotion) -> Result<(), DeviceError> {
    let shutter = &state.shutter;
    shutter.connect(port).await?;
    match motion {
        MotorMotion::Forward => shutter.forward().await,
        MotorMotion::Reverse => shutter.reverse().await,
        MotorMotion::Idle => shutter.stop().await,
    }
}

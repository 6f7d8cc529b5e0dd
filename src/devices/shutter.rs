//! Shutter stepper-motor driver capability and its owning handle

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::codes::{DeviceKind, Language, STATUS_OK};
use crate::error::DeviceError;

/// Raw shutter motor driver, same status-code convention as the power supply
pub trait ShutterDriver: Send {
    fn connect(&mut self, port: &str) -> i32;
    fn forward(&mut self) -> i32;
    fn reverse(&mut self) -> i32;
    fn stop(&mut self) -> i32;
}

/// Last known shutter position
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutterPosition {
    #[default]
    Unknown,
    Open,
    Closed,
}

/// Last command sent to the stepper motor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotorMotion {
    #[default]
    Idle,
    Forward,
    Reverse,
}

/// Single owner of the shutter motor
#[derive(Clone)]
pub struct Shutter {
    driver: Arc<Mutex<Box<dyn ShutterDriver>>>,
    language: Language,
}

impl Shutter {
    pub fn new<D: ShutterDriver + 'static>(driver: D, language: Language) -> Self {
        Self {
            driver: Arc::new(Mutex::new(Box::new(driver))),
            language,
        }
    }

    async fn command<F>(&self, op: &'static str, f: F) -> Result<(), DeviceError>
    where
        F: FnOnce(&mut dyn ShutterDriver) -> i32 + Send + 'static,
    {
        let driver = Arc::clone(&self.driver);
        let code = tokio::task::spawn_blocking(move || {
            let mut guard = driver.lock().map_err(|e| DeviceError::Unavailable {
                device: DeviceKind::Shutter,
                reason: format!("driver lock poisoned: {}", e),
            })?;
            Ok(f(guard.as_mut()))
        })
        .await
        .map_err(|e| DeviceError::Unavailable {
            device: DeviceKind::Shutter,
            reason: format!("{} did not complete: {}", op, e),
        })??;

        debug!("shutter {} -> {}", op, code);
        match code {
            STATUS_OK => Ok(()),
            code => Err(DeviceError::from_status(DeviceKind::Shutter, code, self.language)),
        }
    }

    pub async fn connect(&self, port: &str) -> Result<(), DeviceError> {
        let port = port.to_string();
        self.command("connect", move |d| d.connect(&port)).await
    }

    pub async fn forward(&self) -> Result<(), DeviceError> {
        self.command("forward", |d| d.forward()).await
    }

    pub async fn reverse(&self) -> Result<(), DeviceError> {
        self.command("reverse", |d| d.reverse()).await
    }

    pub async fn stop(&self) -> Result<(), DeviceError> {
        self.command("stop", |d| d.stop()).await
    }
}

//! Power supply driver capability and its owning handle

use std::sync::{Arc, Mutex};

use tracing::debug;

use super::codes::{Language, DeviceKind, STATUS_OK};
use crate::error::DeviceError;

/// Raw power supply driver. Every call returns a status code: 0 on success,
/// a positive device error otherwise. Reads return the value or a negative sentinel.
pub trait PowerSupplyDriver: Send {
    fn connect(&mut self, port: &str) -> i32;
    fn turn_on(&mut self) -> i32;
    fn turn_off(&mut self) -> i32;
    fn set_current_voltage(&mut self, current: u16, voltage: u16) -> i32;
    /// Output current in amperes, or `READ_CURRENT_FAILED`
    fn read_current(&mut self) -> i32;
    /// Output voltage in centivolts, or `READ_VOLTAGE_FAILED`
    fn read_voltage(&mut self) -> i32;
    /// Clears the ZP register after a new setpoint was applied
    fn reset(&mut self) -> i32;
}

/// Single owner of the power supply. Calls are serialized through a mutex and
/// executed on the blocking pool; an issued call always runs to completion.
#[derive(Clone)]
pub struct PowerSupply {
    driver: Arc<Mutex<Box<dyn PowerSupplyDriver>>>,
    language: Language,
}

impl PowerSupply {
    pub fn new<D: PowerSupplyDriver + 'static>(driver: D, language: Language) -> Self {
        Self {
            driver: Arc::new(Mutex::new(Box::new(driver))),
            language,
        }
    }

    async fn call<F>(&self, op: &'static str, f: F) -> Result<i32, DeviceError>
    where
        F: FnOnce(&mut dyn PowerSupplyDriver) -> i32 + Send + 'static,
    {
        let driver = Arc::clone(&self.driver);
        let code = tokio::task::spawn_blocking(move || {
            let mut guard = driver.lock().map_err(|e| DeviceError::Unavailable {
                device: DeviceKind::PowerSupply,
                reason: format!("driver lock poisoned: {}", e),
            })?;
            Ok(f(guard.as_mut()))
        })
        .await
        .map_err(|e| DeviceError::Unavailable {
            device: DeviceKind::PowerSupply,
            reason: format!("{} did not complete: {}", op, e),
        })??;

        debug!("power supply {} -> {}", op, code);
        Ok(code)
    }

    async fn command<F>(&self, op: &'static str, f: F) -> Result<(), DeviceError>
    where
        F: FnOnce(&mut dyn PowerSupplyDriver) -> i32 + Send + 'static,
    {
        match self.call(op, f).await? {
            STATUS_OK => Ok(()),
            code => Err(DeviceError::from_status(DeviceKind::PowerSupply, code, self.language)),
        }
    }

    async fn read<F>(&self, op: &'static str, f: F) -> Result<u16, DeviceError>
    where
        F: FnOnce(&mut dyn PowerSupplyDriver) -> i32 + Send + 'static,
    {
        let value = self.call(op, f).await?;
        if value < 0 {
            return Err(DeviceError::from_status(DeviceKind::PowerSupply, value, self.language));
        }
        Ok(value.min(u16::MAX as i32) as u16)
    }

    pub async fn connect(&self, port: &str) -> Result<(), DeviceError> {
        let port = port.to_string();
        self.command("connect", move |d| d.connect(&port)).await
    }

    pub async fn turn_on(&self) -> Result<(), DeviceError> {
        self.command("turn_on", |d| d.turn_on()).await
    }

    pub async fn turn_off(&self) -> Result<(), DeviceError> {
        self.command("turn_off", |d| d.turn_off()).await
    }

    pub async fn reset(&self) -> Result<(), DeviceError> {
        self.command("reset", |d| d.reset()).await
    }

    pub async fn set_current_voltage(&self, current: u16, voltage: u16) -> Result<(), DeviceError> {
        self.command("set_current_voltage", move |d| d.set_current_voltage(current, voltage))
            .await
    }

    /// Measured output current in amperes
    pub async fn read_current(&self) -> Result<u16, DeviceError> {
        self.read("read_current", |d| d.read_current()).await
    }

    /// Measured output voltage in centivolts
    pub async fn read_voltage(&self) -> Result<u16, DeviceError> {
        self.read("read_voltage", |d| d.read_voltage()).await
    }

    /// Read both channels; each read failure is reported on its own
    pub async fn read_telemetry(&self) -> Telemetry {
        Telemetry {
            current: self.read_current().await,
            voltage_centivolts: self.read_voltage().await,
        }
    }
}

/// Result of one telemetry refresh
#[derive(Debug, Clone)]
pub struct Telemetry {
    pub current: Result<u16, DeviceError>,
    pub voltage_centivolts: Result<u16, DeviceError>,
}

impl Telemetry {
    pub fn voltage_volts(&self) -> Option<f32> {
        self.voltage_centivolts.as_ref().ok().map(|cv| *cv as f32 / 100.0)
    }

    pub fn errors(&self) -> Vec<&DeviceError> {
        [self.current.as_ref().err(), self.voltage_centivolts.as_ref().err()]
            .into_iter()
            .flatten()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::codes::{READ_CURRENT_FAILED, READ_VOLTAGE_FAILED};

    struct Scripted {
        status: i32,
        current: i32,
        voltage: i32,
    }

    impl PowerSupplyDriver for Scripted {
        fn connect(&mut self, _port: &str) -> i32 {
            self.status
        }

        fn turn_on(&mut self) -> i32 {
            self.status
        }

        fn turn_off(&mut self) -> i32 {
            self.status
        }

        fn set_current_voltage(&mut self, _current: u16, _voltage: u16) -> i32 {
            self.status
        }

        fn read_current(&mut self) -> i32 {
            self.current
        }

        fn read_voltage(&mut self) -> i32 {
            self.voltage
        }

        fn reset(&mut self) -> i32 {
            self.status
        }
    }

    #[tokio::test]
    async fn positive_status_becomes_device_error() {
        let ps = PowerSupply::new(Scripted { status: 6, current: 0, voltage: 0 }, Language::En);
        let err = ps.turn_on().await.unwrap_err();
        assert_eq!(
            err,
            DeviceError::Status {
                device: DeviceKind::PowerSupply,
                code: 6,
                message: "Failed to turn on the power supply.".into(),
            }
        );
    }

    #[tokio::test]
    async fn read_sentinels_are_telemetry_errors() {
        let ps = PowerSupply::new(
            Scripted { status: 0, current: READ_CURRENT_FAILED, voltage: READ_VOLTAGE_FAILED },
            Language::En,
        );
        let telemetry = ps.read_telemetry().await;
        assert_eq!(telemetry.errors().len(), 2);
        assert!(telemetry.errors().iter().all(|e| e.is_telemetry()));
        assert_eq!(telemetry.voltage_volts(), None);
    }

    #[tokio::test]
    async fn voltage_is_reported_in_volts() {
        let ps = PowerSupply::new(Scripted { status: 0, current: 50, voltage: 612 }, Language::En);
        let telemetry = ps.read_telemetry().await;
        assert_eq!(telemetry.current, Ok(50));
        assert_eq!(telemetry.voltage_volts(), Some(6.12));
    }
}

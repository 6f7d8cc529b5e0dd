//! Operator panel state: port selection, device flags, telemetry and notices

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::devices::{DeviceKind, MotorMotion, ShutterPosition};

/// Newest notices kept on the panel
pub const MAX_NOTICES: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A message shown to the operator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub source: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Panel state holding everything the manual controls show
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RigState {
    pub power_supply_port: Option<String>,
    pub shutter_port: Option<String>,
    pub available_ports: Vec<String>,
    pub power_supply_connected: bool,
    pub output_on: bool,
    /// Current setpoint last sent to the supply, in amperes
    pub setpoint_amperes: Option<u16>,
    pub measured_current: Option<u16>,
    pub measured_voltage: Option<f32>,
    pub manual_session_active: bool,
    pub shutter_position: ShutterPosition,
    pub motor_motion: MotorMotion,
    pub notices: Vec<Notice>,
}

impl RigState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn port_for(&self, device: DeviceKind) -> Option<&str> {
        match device {
            DeviceKind::PowerSupply => self.power_supply_port.as_deref(),
            DeviceKind::Shutter => self.shutter_port.as_deref(),
        }
    }

    /// Select a port for one device. A port is never shared: picking the port
    /// held by the other device clears the other selection.
    pub fn select_port(&mut self, device: DeviceKind, port: Option<String>) {
        let port = port.filter(|p| !p.trim().is_empty());
        match device {
            DeviceKind::PowerSupply => {
                if port.is_some() && port == self.shutter_port {
                    self.shutter_port = None;
                }
                if port != self.power_supply_port {
                    self.mark_disconnected();
                }
                self.power_supply_port = port;
            }
            DeviceKind::Shutter => {
                if port.is_some() && port == self.power_supply_port {
                    self.power_supply_port = None;
                    self.mark_disconnected();
                }
                self.shutter_port = port;
            }
        }
    }

    /// Replace the list of present ports; returns the devices whose selected port vanished
    pub fn set_available_ports(&mut self, ports: Vec<String>) -> Vec<DeviceKind> {
        let mut cleared = Vec::new();
        if let Some(port) = &self.power_supply_port {
            if !ports.contains(port) {
                self.power_supply_port = None;
                self.mark_disconnected();
                cleared.push(DeviceKind::PowerSupply);
            }
        }
        if let Some(port) = &self.shutter_port {
            if !ports.contains(port) {
                self.shutter_port = None;
                cleared.push(DeviceKind::Shutter);
            }
        }
        self.available_ports = ports;
        cleared
    }

    /// Assume the supply is off and disconnected after a device error
    pub fn mark_disconnected(&mut self) {
        self.power_supply_connected = false;
        self.output_on = false;
        self.manual_session_active = false;
        self.setpoint_amperes = None;
        self.clear_telemetry();
    }

    pub fn clear_telemetry(&mut self) {
        self.measured_current = None;
        self.measured_voltage = None;
    }

    pub fn push_notice(&mut self, notice: Notice) {
        self.notices.push(notice);
        if self.notices.len() > MAX_NOTICES {
            let overflow = self.notices.len() - MAX_NOTICES;
            self.notices.drain(..overflow);
        }
    }

    pub fn clear_notices(&mut self) -> usize {
        let count = self.notices.len();
        self.notices.clear();
        count
    }
}

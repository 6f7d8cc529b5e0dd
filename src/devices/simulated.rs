//! Bench simulator for the power supply and the shutter motor
//!
//! Both simulators record every driver call into a shared [`CallJournal`] and
//! consult a shared [`FaultPlan`] so a caller can make the n-th occurrence of an
//! operation fail with a chosen status code.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use super::{
    codes::{READ_CURRENT_FAILED, READ_VOLTAGE_FAILED, SHUTTER_ALREADY_CLOSED, STATUS_OK},
    power_supply::PowerSupplyDriver,
    shutter::ShutterDriver,
};

/// Port names the bench simulator answers on
pub const SIMULATED_POWER_SUPPLY_PORT: &str = "SIM-PS";
pub const SIMULATED_SHUTTER_PORT: &str = "SIM-SHUTTER";

/// Driver operation, used both as journal entry key and fault key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Connect,
    TurnOn,
    TurnOff,
    SetCurrentVoltage,
    ReadCurrent,
    ReadVoltage,
    Reset,
    Forward,
    Reverse,
    Stop,
}

/// One recorded driver call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    Connect(String),
    TurnOn,
    TurnOff,
    SetCurrentVoltage(u16, u16),
    ReadCurrent,
    ReadVoltage,
    Reset,
    Forward,
    Reverse,
    Stop,
}

impl DriverCall {
    pub fn operation(&self) -> Operation {
        match self {
            DriverCall::Connect(_) => Operation::Connect,
            DriverCall::TurnOn => Operation::TurnOn,
            DriverCall::TurnOff => Operation::TurnOff,
            DriverCall::SetCurrentVoltage(..) => Operation::SetCurrentVoltage,
            DriverCall::ReadCurrent => Operation::ReadCurrent,
            DriverCall::ReadVoltage => Operation::ReadVoltage,
            DriverCall::Reset => Operation::Reset,
            DriverCall::Forward => Operation::Forward,
            DriverCall::Reverse => Operation::Reverse,
            DriverCall::Stop => Operation::Stop,
        }
    }

    pub fn is_telemetry(&self) -> bool {
        matches!(self, DriverCall::ReadCurrent | DriverCall::ReadVoltage)
    }
}

/// Shared, cloneable record of driver calls
#[derive(Debug, Clone, Default)]
pub struct CallJournal {
    calls: Arc<Mutex<Vec<DriverCall>>>,
}

impl CallJournal {
    fn push(&self, call: DriverCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Calls without the telemetry reads
    pub fn commands(&self) -> Vec<DriverCall> {
        self.calls().into_iter().filter(|c| !c.is_telemetry()).collect()
    }

    pub fn count(&self, op: Operation) -> usize {
        self.calls().iter().filter(|c| c.operation() == op).count()
    }

    pub fn clear(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }
}

#[derive(Debug, Default)]
struct FaultTable {
    /// (operation, 1-based occurrence) -> status code
    planned: HashMap<(Operation, usize), i32>,
    seen: HashMap<Operation, usize>,
}

/// Shared, cloneable fault schedule
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    table: Arc<Mutex<FaultTable>>,
}

impl FaultPlan {
    /// Make the `occurrence`-th call (counting from 1) of `op` return `code`
    pub fn fail_nth(&self, op: Operation, occurrence: usize, code: i32) {
        if let Ok(mut table) = self.table.lock() {
            table.planned.insert((op, occurrence), code);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut table) = self.table.lock() {
            table.planned.clear();
            table.seen.clear();
        }
    }

    fn next(&self, op: Operation) -> Option<i32> {
        let mut table = self.table.lock().ok()?;
        let seen = table.seen.entry(op).or_insert(0);
        *seen += 1;
        let occurrence = *seen;
        table.planned.get(&(op, occurrence)).copied()
    }
}

/// Simulated power supply: output follows the last setpoint while switched on
#[derive(Debug, Default)]
pub struct SimulatedPowerSupply {
    journal: CallJournal,
    faults: FaultPlan,
    connected: bool,
    output_on: bool,
    current: u16,
    voltage: u16,
}

impl SimulatedPowerSupply {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_journal(journal: CallJournal, faults: FaultPlan) -> Self {
        Self {
            journal,
            faults,
            ..Self::default()
        }
    }

    pub fn journal(&self) -> CallJournal {
        self.journal.clone()
    }

    pub fn faults(&self) -> FaultPlan {
        self.faults.clone()
    }

    fn record(&mut self, call: DriverCall) -> Option<i32> {
        let op = call.operation();
        self.journal.push(call);
        self.faults.next(op)
    }
}

impl PowerSupplyDriver for SimulatedPowerSupply {
    fn connect(&mut self, port: &str) -> i32 {
        if let Some(code) = self.record(DriverCall::Connect(port.to_string())) {
            self.connected = false;
            return code;
        }
        self.connected = true;
        STATUS_OK
    }

    fn turn_on(&mut self) -> i32 {
        if let Some(code) = self.record(DriverCall::TurnOn) {
            return code;
        }
        self.output_on = true;
        STATUS_OK
    }

    fn turn_off(&mut self) -> i32 {
        if let Some(code) = self.record(DriverCall::TurnOff) {
            return code;
        }
        self.output_on = false;
        self.current = 0;
        self.voltage = 0;
        STATUS_OK
    }

    fn set_current_voltage(&mut self, current: u16, voltage: u16) -> i32 {
        if let Some(code) = self.record(DriverCall::SetCurrentVoltage(current, voltage)) {
            return code;
        }
        self.current = current;
        self.voltage = voltage;
        STATUS_OK
    }

    fn read_current(&mut self) -> i32 {
        if self.record(DriverCall::ReadCurrent).is_some() || !self.connected {
            return READ_CURRENT_FAILED;
        }
        if self.output_on {
            self.current as i32
        } else {
            0
        }
    }

    fn read_voltage(&mut self) -> i32 {
        if self.record(DriverCall::ReadVoltage).is_some() || !self.connected {
            return READ_VOLTAGE_FAILED;
        }
        if self.output_on {
            self.voltage as i32 * 100
        } else {
            0
        }
    }

    fn reset(&mut self) -> i32 {
        self.record(DriverCall::Reset).unwrap_or(STATUS_OK)
    }
}

/// Simulated shutter: refuses to close an already closed shutter, like the real controller
#[derive(Debug, Default)]
pub struct SimulatedShutter {
    journal: CallJournal,
    faults: FaultPlan,
    closed: bool,
}

impl SimulatedShutter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_journal(journal: CallJournal, faults: FaultPlan) -> Self {
        Self {
            journal,
            faults,
            closed: false,
        }
    }

    pub fn journal(&self) -> CallJournal {
        self.journal.clone()
    }

    pub fn faults(&self) -> FaultPlan {
        self.faults.clone()
    }

    fn record(&mut self, call: DriverCall) -> Option<i32> {
        let op = call.operation();
        self.journal.push(call);
        self.faults.next(op)
    }
}

impl ShutterDriver for SimulatedShutter {
    fn connect(&mut self, port: &str) -> i32 {
        self.record(DriverCall::Connect(port.to_string())).unwrap_or(STATUS_OK)
    }

    fn forward(&mut self) -> i32 {
        if let Some(code) = self.record(DriverCall::Forward) {
            return code;
        }
        self.closed = false;
        STATUS_OK
    }

    fn reverse(&mut self) -> i32 {
        if let Some(code) = self.record(DriverCall::Reverse) {
            return code;
        }
        if self.closed {
            return SHUTTER_ALREADY_CLOSED;
        }
        self.closed = true;
        STATUS_OK
    }

    fn stop(&mut self) -> i32 {
        self.record(DriverCall::Stop).unwrap_or(STATUS_OK)
    }
}

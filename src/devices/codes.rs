//! Driver status codes and their human-readable tables

use std::fmt;

use serde::{Deserialize, Serialize};

pub const STATUS_OK: i32 = 0;

/// Sentinel returned by `read_current` when the current register could not be read
pub const READ_CURRENT_FAILED: i32 = -1;
/// Sentinel returned by `read_voltage` when the voltage register could not be read
pub const READ_VOLTAGE_FAILED: i32 = -2;

pub const SHUTTER_ALREADY_CLOSED: i32 = 8;

/// Language of the device error tables
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Ru,
}

/// Which piece of hardware produced a status code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    PowerSupply,
    Shutter,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::PowerSupply => write!(f, "power supply"),
            DeviceKind::Shutter => write!(f, "shutter"),
        }
    }
}

fn power_supply_en(code: i32) -> &'static str {
    match code {
        -2 => "Error reading voltage register 21 (0x15).",
        -1 => "Error reading current register 20 (0x14).",
        0 => "Operation successful.",
        1 => "Failed to initialize connection.",
        2 => "Failed to set device as slave.",
        3 => "Failed to connect to the device.",
        4 => "Failed to set current setpoint.",
        5 => "Failed to set voltage setpoint.",
        6 => "Failed to turn on the power supply.",
        7 => "Failed to activate work mode.",
        8 => "Failed to reset current setpoint.",
        9 => "Failed to reset voltage setpoint.",
        10 => "Failed to reset work mode.",
        11 => "Failed to turn off the power supply.",
        12 => "Failed to reset ZP register (36).",
        _ => "Unknown error.",
    }
}

fn power_supply_ru(code: i32) -> &'static str {
    match code {
        -2 => "Не удалось прочитать значение напряжения с регистра 21 (0x15).",
        -1 => "Не удалось прочитать значение тока с регистра 20 (0x14).",
        0 => "Операция прошла успешно.",
        1 => "Не удалось инициализировать соединение.",
        2 => "Не удалось установить устройство как slave.",
        3 => "Не удалось подключиться к устройству.",
        4 => "Не удалось установить уставку тока.",
        5 => "Не удалось установить уставку напряжения.",
        6 => "Не удалось включить блок питания.",
        7 => "Не удалось активировать рабочий режим.",
        8 => "Не удалось сбросить уставку тока.",
        9 => "Не удалось сбросить уставку напряжения.",
        10 => "Не удалось сбросить рабочий режим.",
        11 => "Не удалось выключить блок питания.",
        12 => "Не удалось сбросить регистр ЗП (36).",
        _ => "Неизвестная ошибка.",
    }
}

fn shutter_en(code: i32) -> &'static str {
    match code {
        0 => "Operation successful.",
        1 => "Failed to initialize connection.",
        2 => "Failed to set device as slave.",
        3 => "Failed to connect to the device.",
        4 => "The stepper motor could not be started in FORWARD mode (register 512 := 1).",
        5 => "The stepper motor could not be started in REVERSE mode (register 513 := 1).",
        6 => "Could not reset FORWARD mode of the stepper motor (register 512 := 0).",
        7 => "Could not reset REVERSE mode of the stepper motor (register 513 := 0).",
        8 => "Shutter already closed.",
        _ => "Unknown error.",
    }
}

fn shutter_ru(code: i32) -> &'static str {
    match code {
        0 => "Операция прошла успешно.",
        1 => "Не удалось инициализировать соединение.",
        2 => "Не удалось установить устройство как slave.",
        3 => "Не удалось подключиться к устройству.",
        4 => "Не удалось запустить шаговый двигатель в режиме FORWARD (регистр 512 := 1).",
        5 => "Не удалось запустить шаговый двигатель в режиме REVERSE (регистр 513 := 1).",
        6 => "Не удалось сбросить режим FORWARD шагового двигателя (регистр 512 := 0).",
        7 => "Не удалось сбросить режим REVERSE шагового двигателя (регистр 513 := 0).",
        8 => "Заслонка уже закрыта.",
        _ => "Неизвестная ошибка.",
    }
}

/// Look up the table entry for a status code
pub fn status_message(device: DeviceKind, code: i32, language: Language) -> &'static str {
    match (device, language) {
        (DeviceKind::PowerSupply, Language::En) => power_supply_en(code),
        (DeviceKind::PowerSupply, Language::Ru) => power_supply_ru(code),
        (DeviceKind::Shutter, Language::En) => shutter_en(code),
        (DeviceKind::Shutter, Language::Ru) => shutter_ru(code),
    }
}

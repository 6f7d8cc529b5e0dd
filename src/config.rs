//! Configuration and CLI argument handling

use std::{path::PathBuf, time::Duration};

use clap::{Parser, Subcommand};

use crate::devices::Language;

/// CLI argument parsing structure
#[derive(Parser, Debug)]
#[command(name = "evaporator-control")]
#[command(about = "Power supply, shutter and scenario control for a thermoresistive evaporator")]
#[command(version = "1.0.0")]
pub struct Config {
    /// Port to bind the operator API to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Serial port of the power supply
    #[arg(long)]
    pub power_supply_port: Option<String>,

    /// Serial port of the shutter stepper motor
    #[arg(long)]
    pub shutter_port: Option<String>,

    /// Voltage setpoint sent with every current setpoint, in volts
    #[arg(long, default_value = "6")]
    pub voltage: u16,

    /// Directory for scenario run logs
    #[arg(long, default_value = "scenarios")]
    pub scenario_dir: PathBuf,

    /// Timer tick period in milliseconds
    #[arg(long, default_value = "1000", value_parser = clap::value_parser!(u64).range(1..))]
    pub tick_ms: u64,

    /// Telemetry refresh period in milliseconds
    #[arg(long, default_value = "1000", value_parser = clap::value_parser!(u64).range(1..))]
    pub telemetry_interval_ms: u64,

    /// Serial port rescan period in seconds
    #[arg(long, default_value = "2", value_parser = clap::value_parser!(u64).range(1..))]
    pub port_scan_interval_secs: u64,

    /// Language of device error messages
    #[arg(long, value_enum, default_value_t = Language::En)]
    pub language: Language,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Serve the operator API (default)
    Serve,
    /// Run one scenario file headless and exit
    Run {
        /// Scenario description in JSON
        file: PathBuf,
    },
    /// List the serial ports present on this machine
    Ports,
}

/// Runtime settings consumed by the control core
#[derive(Debug, Clone)]
pub struct RigSettings {
    pub voltage: u16,
    pub tick: Duration,
    pub telemetry_interval: Duration,
    pub port_scan_interval: Duration,
    pub scenario_dir: PathBuf,
    pub language: Language,
    /// Ports always reported present, such as those of the bench simulator
    pub virtual_ports: Vec<String>,
}

impl Default for RigSettings {
    fn default() -> Self {
        Self {
            voltage: 6,
            tick: Duration::from_secs(1),
            telemetry_interval: Duration::from_secs(1),
            port_scan_interval: Duration::from_secs(2),
            scenario_dir: PathBuf::from("scenarios"),
            language: Language::En,
            virtual_ports: Vec::new(),
        }
    }
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve)
    }

    pub fn settings(&self) -> RigSettings {
        RigSettings {
            voltage: self.voltage,
            tick: Duration::from_millis(self.tick_ms),
            telemetry_interval: Duration::from_millis(self.telemetry_interval_ms),
            port_scan_interval: Duration::from_secs(self.port_scan_interval_secs),
            scenario_dir: self.scenario_dir.clone(),
            language: self.language,
            virtual_ports: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_bench_setup() {
        let config = Config::try_parse_from(["evaporator-control"]).unwrap();
        assert_eq!(config.address(), "127.0.0.1:20554");
        assert_eq!(config.command(), Command::Serve);
        let settings = config.settings();
        assert_eq!(settings.voltage, 6);
        assert_eq!(settings.tick, Duration::from_secs(1));
        assert_eq!(settings.scenario_dir, PathBuf::from("scenarios"));
    }

    #[test]
    fn run_subcommand_takes_a_file() {
        let config = Config::try_parse_from([
            "evaporator-control",
            "--language",
            "ru",
            "-v",
            "run",
            "scenario.json",
        ])
        .unwrap();
        assert_eq!(config.command(), Command::Run { file: PathBuf::from("scenario.json") });
        assert_eq!(config.language, Language::Ru);
        assert_eq!(config.log_level(), "debug");
    }

    #[test]
    fn zero_tick_is_rejected() {
        assert!(Config::try_parse_from(["evaporator-control", "--tick-ms", "0"]).is_err());
    }
}

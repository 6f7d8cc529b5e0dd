//! Serial port enumeration

use tracing::debug;

/// Names of the serial ports currently present on the system, sorted
pub fn available_ports() -> Result<Vec<String>, serialport::Error> {
    let mut names: Vec<String> = serialport::available_ports()?
        .into_iter()
        .map(|p| p.port_name)
        .collect();
    names.sort();
    names.dedup();
    debug!("Found {} serial ports", names.len());
    Ok(names)
}

//! Hour/minute/second helpers

pub const SECONDS_IN_HOUR: u64 = 3600;
pub const SECONDS_IN_MINUTE: u64 = 60;
pub const SECONDS_IN_DAY: u64 = 86_400;

/// Split a number of seconds into (hours, minutes, seconds)
pub fn split_hms(total: u64) -> (u64, u64, u64) {
    (
        total / SECONDS_IN_HOUR,
        (total % SECONDS_IN_HOUR) / SECONDS_IN_MINUTE,
        total % SECONDS_IN_MINUTE,
    )
}

/// Format seconds as `HH:MM:SS`
pub fn format_hms(total: u64) -> String {
    let (h, m, s) = split_hms(total);
    format!("{:02}:{:02}:{:02}", h, m, s)
}

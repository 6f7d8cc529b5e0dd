//! Plain-text run log written after every scenario run

use std::{
    fmt::Write as _,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local};
use tokio::{fs, io::AsyncWriteExt};
use tracing::info;

use super::{
    report::RunReport,
    timer::TimerMode,
};
use crate::utils::format_hms;

pub fn log_file_name(started_at: &DateTime<Local>) -> String {
    format!("{}_scenario_params.log", started_at.format("%Y-%m-%d_%H-%M-%S"))
}

pub fn render(report: &RunReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Status: {}", report.status);
    let _ = writeln!(out, "Timer mode: {}", report.mode);
    let _ = writeln!(
        out,
        "Started: {}, finished: {}",
        report.started_at.format("%Y-%m-%d %H:%M:%S"),
        report.finished_at.format("%Y-%m-%d %H:%M:%S")
    );
    let _ = writeln!(out, "Stages attempted: {}/{}", report.stages.len(), report.stages_total);

    for stage in &report.stages {
        let _ = writeln!(out);
        let _ = writeln!(out, "Stage {}", stage.number);
        let _ = writeln!(out, "  Current: {} A", stage.current_amperes);
        let _ = writeln!(out, "  Timer mode: {}", stage.mode);
        match stage.mode {
            TimerMode::ReverseCountdown => {
                let d = stage.duration;
                let _ = writeln!(
                    out,
                    "  Timer settings: {} h {} min {} s",
                    d.hours, d.minutes, d.seconds
                );
            }
            TimerMode::DirectElapsed => {
                let _ = writeln!(out, "  Elapsed time: {}", format_hms(stage.elapsed_seconds));
            }
        }
        let _ = writeln!(out, "  Outcome: {}", stage.outcome);
    }

    if let Some(e) = &report.power_off_error {
        let _ = writeln!(out);
        let _ = writeln!(out, "Power off failed: {}", e);
    }
    out
}

/// Append the rendered report to `<dir>/<start time>_scenario_params.log`
pub async fn write_run_log(dir: &Path, report: &RunReport) -> std::io::Result<PathBuf> {
    fs::create_dir_all(dir).await?;
    let path = dir.join(log_file_name(&report.started_at));

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .await?;
    file.write_all(render(report).as_bytes()).await?;
    file.flush().await?;

    info!("Run log written to {}", path.display());
    Ok(path)
}

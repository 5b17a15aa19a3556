//! Formatting helpers for frame times and unit progress.

use crate::types::UnitRun;
use std::time::Duration;

/// Placeholder for values the log never reported.
pub const MISSING: &str = "-";

/// Format a frame duration as `mm:ss`, or `h:mm:ss` past one hour.
pub fn format_frame_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// Format an optional duration, or a dash if missing.
pub fn format_duration_opt(duration: Option<Duration>) -> String {
    match duration {
        Some(d) => format_frame_duration(d),
        None => MISSING.to_string(),
    }
}

/// One-line progress summary for a unit, e.g. `P2669 (R13, C28, G71) 42% 05:12/frame`.
pub fn format_unit_progress(unit: &UnitRun) -> String {
    let project = unit
        .data
        .project
        .map(|p| p.to_string())
        .unwrap_or_else(|| MISSING.to_string());
    let percent = unit
        .last_frame()
        .map(|f| format!("{}%", f.frame_id))
        .unwrap_or_else(|| MISSING.to_string());
    format!(
        "{} {} {}/frame",
        project,
        percent,
        format_duration_opt(unit.average_frame_duration())
    )
}

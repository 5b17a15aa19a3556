//! Line payload extraction
//!
//! Turns a classified line into a [`LogLine`] with its typed payload.
//! Pattern objects stay in this module; the model only holds parsed values.
//! Nothing here panics or returns a fatal error: a payload that cannot be
//! extracted becomes a [`LineError`] on the line itself.

use super::classify::classify;
use super::frames::reconcile_percent;
use crate::error::LineError;
use crate::types::{FrameProgress, LineData, LineKind, LogLine, ProjectInfo, WorkUnitResult};
use chrono::NaiveTime;
use once_cell::sync::Lazy;
use regex::Regex;

/// Total steps assumed for GPU frame lines, which report percent only.
pub const GPU_TOTAL_STEPS: u64 = 100;

static LOG_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"--- Opening Log file \[(?P<when>[^\]]+)\]").unwrap());
static CLIENT_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Folding@Home Client Version\s+(?P<version>\S.*?)\s*$").unwrap());
static ARGUMENTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Arguments:\s*(?P<args>.*?)\s*$").unwrap());
static USER_TEAM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"- User name: (?P<user>.*) \(Team (?P<team>[^)]*)\)").unwrap()
});
static USER_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:- User ID:|Received User ID =)\s*(?P<id>\S+)").unwrap());
static MACHINE_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"- Machine ID:\s*(?P<id>\S+)").unwrap());
static QUEUE_INDEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Working on queue slot (?P<index>\d+)").unwrap());
static UNITS_COMPLETED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Number of Units Completed:\s*(?P<count>\S+)").unwrap());
static CORE_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\]\s+Version:?\s+(?P<version>[^\s(]+)").unwrap());
static PROJECT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"Project: (?P<project>\d+) \(Run (?P<run>\d+), Clone (?P<clone>\d+), Gen (?P<gen>\d+)\)",
    )
    .unwrap()
});
static CPU_FRAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"Completed (?P<completed>\d+) out of (?P<total>\d+) steps\s*\((?P<percent>\d+)(?:%| percent)?\)",
    )
    .unwrap()
});
static GPU_FRAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\] Completed (?P<percent>\d{1,3})%").unwrap());
static CORE_SHUTDOWN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Folding@home Core Shutdown:\s*(?P<token>\S+)").unwrap());

/// Classify a raw line and extract its payload.
pub fn parse_line(index: usize, text: &str) -> LogLine {
    let kind = classify(text);
    if kind == LineKind::Unknown {
        return LogLine {
            index,
            text: text.to_string(),
            kind,
            timestamp: None,
            data: None,
            error: None,
        };
    }

    let (timestamp, timestamp_error) = match parse_timestamp(text) {
        Some(Ok(ts)) => (Some(ts), None),
        Some(Err(e)) => (None, Some(e)),
        None => (None, None),
    };

    match extract(kind, text, timestamp, timestamp_error.as_ref()) {
        Ok(data) => LogLine {
            index,
            text: text.to_string(),
            kind,
            timestamp,
            data,
            error: timestamp_error,
        },
        Err(error) => {
            tracing::debug!(index, kind = %kind, %error, "line payload rejected");
            LogLine {
                index,
                text: text.to_string(),
                kind: LineKind::Error,
                timestamp,
                data: None,
                error: Some(error),
            }
        }
    }
}

/// Parse the `[HH:MM:SS]` prefix.
///
/// Returns `None` when the line has no bracketed prefix at all.
pub fn parse_timestamp(text: &str) -> Option<Result<NaiveTime, LineError>> {
    if !text.starts_with('[') || text.as_bytes().get(9) != Some(&b']') {
        return None;
    }
    let token = match text.get(1..9) {
        Some(token) => token,
        None => {
            return Some(Err(LineError::Timestamp {
                token: text.chars().skip(1).take(8).collect(),
            }))
        }
    };
    Some(
        NaiveTime::parse_from_str(token, "%H:%M:%S").map_err(|_| LineError::Timestamp {
            token: token.to_string(),
        }),
    )
}

/// Extract the kind-specific payload.
///
/// Kinds without a payload yield `Ok(None)`; structural markers never fail.
pub fn extract(
    kind: LineKind,
    text: &str,
    timestamp: Option<NaiveTime>,
    timestamp_error: Option<&LineError>,
) -> Result<Option<LineData>, LineError> {
    let data = match kind {
        LineKind::LogOpen => LOG_OPEN
            .captures(text)
            .map(|c| LineData::LogOpened(c["when"].trim().to_string())),
        LineKind::ClientVersion => {
            let caps = captures(&CLIENT_VERSION, kind, text)?;
            Some(LineData::ClientVersion(caps["version"].to_string()))
        }
        LineKind::ClientArguments => {
            let caps = captures(&ARGUMENTS, kind, text)?;
            Some(LineData::Arguments(caps["args"].to_string()))
        }
        LineKind::ClientUserNameTeam => {
            let caps = captures(&USER_TEAM, kind, text)?;
            Some(LineData::UserTeam {
                user: caps["user"].trim().to_string(),
                team: number("team", &caps["team"])?,
            })
        }
        LineKind::ClientUserId | LineKind::ClientReceivedUserId => {
            let caps = captures(&USER_ID, kind, text)?;
            Some(LineData::UserId(caps["id"].to_string()))
        }
        LineKind::ClientMachineId => {
            let caps = captures(&MACHINE_ID, kind, text)?;
            Some(LineData::MachineId(number("machine id", &caps["id"])?))
        }
        LineKind::WorkUnitQueueIndex => {
            let caps = captures(&QUEUE_INDEX, kind, text)?;
            let index: u8 = number("queue index", &caps["index"])?;
            if index > 9 {
                return Err(LineError::Number {
                    field: "queue index".to_string(),
                    value: caps["index"].to_string(),
                });
            }
            Some(LineData::QueueIndex(index))
        }
        LineKind::ClientNumberOfUnitsCompleted => {
            let caps = captures(&UNITS_COMPLETED, kind, text)?;
            Some(LineData::UnitsCompleted(number("units completed", &caps["count"])?))
        }
        LineKind::WorkUnitCoreVersion => {
            let caps = captures(&CORE_VERSION, kind, text)?;
            Some(LineData::CoreVersion(caps["version"].to_string()))
        }
        LineKind::WorkUnitProject => {
            let caps = captures(&PROJECT, kind, text)?;
            Some(LineData::Project(ProjectInfo::new(
                number("project", &caps["project"])?,
                number("run", &caps["run"])?,
                number("clone", &caps["clone"])?,
                number("gen", &caps["gen"])?,
            )))
        }
        LineKind::WorkUnitFrame => {
            if timestamp.is_none() {
                return Err(timestamp_error.cloned().unwrap_or(LineError::Timestamp {
                    token: String::new(),
                }));
            }
            Some(LineData::Frame(extract_frame(text)?))
        }
        LineKind::WorkUnitCoreShutdown => {
            let caps = captures(&CORE_SHUTDOWN, kind, text)?;
            Some(LineData::UnitResult(WorkUnitResult::from_token(&caps["token"])))
        }
        _ => None,
    };
    Ok(data)
}

/// Frame progress from either the CPU or GPU phrasing.
fn extract_frame(text: &str) -> Result<FrameProgress, LineError> {
    if let Some(caps) = CPU_FRAME.captures(text) {
        let completed: u64 = number("completed steps", &caps["completed"])?;
        let total: u64 = number("total steps", &caps["total"])?;
        let declared: u32 = number("percent", &caps["percent"])?;
        let percent = reconcile_percent(declared, completed, total)?;
        return Ok(FrameProgress {
            percent,
            completed_steps: completed,
            total_steps: total,
        });
    }

    if let Some(caps) = GPU_FRAME.captures(text) {
        let percent: u32 = number("percent", &caps["percent"])?;
        if u64::from(percent) > GPU_TOTAL_STEPS {
            return Err(LineError::Number {
                field: "percent".to_string(),
                value: caps["percent"].to_string(),
            });
        }
        return Ok(FrameProgress {
            percent,
            completed_steps: u64::from(percent),
            total_steps: GPU_TOTAL_STEPS,
        });
    }

    Err(LineError::Pattern {
        kind: LineKind::WorkUnitFrame.to_string(),
    })
}

fn captures<'t>(
    re: &Regex,
    kind: LineKind,
    text: &'t str,
) -> Result<regex::Captures<'t>, LineError> {
    re.captures(text).ok_or_else(|| LineError::Pattern {
        kind: kind.to_string(),
    })
}

fn number<T: std::str::FromStr>(field: &str, value: &str) -> Result<T, LineError> {
    value.trim().parse().map_err(|_| LineError::Number {
        field: field.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(
            parse_timestamp("[08:18:02] - Machine ID: 1"),
            Some(Ok(NaiveTime::from_hms_opt(8, 18, 2).unwrap()))
        );
        assert!(matches!(
            parse_timestamp("[08:7x:02] - Machine ID: 1"),
            Some(Err(LineError::Timestamp { .. }))
        ));
        assert_eq!(parse_timestamp("Arguments: -smp"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn test_user_team() {
        let line = parse_line(4, "[07:55:35] - User name: harlam357 (Team 32)");
        assert_eq!(line.kind, LineKind::ClientUserNameTeam);
        assert_eq!(
            line.data,
            Some(LineData::UserTeam {
                user: "harlam357".to_string(),
                team: 32
            })
        );
    }

    #[test]
    fn test_bad_team_is_line_error() {
        let line = parse_line(4, "[07:55:35] - User name: harlam357 (Team abc)");
        assert_eq!(line.kind, LineKind::Error);
        assert!(matches!(line.error, Some(LineError::Number { .. })));
    }

    #[test]
    fn test_project_round_trips_short_form() {
        let line = parse_line(0, "[08:19:06] Project: 2677 (Run 10, Clone 29, Gen 28)");
        let Some(LineData::Project(project)) = line.data.clone() else {
            panic!("expected project payload");
        };
        assert_eq!(project.to_string(), "P2677 (R10, C29, G28)");
    }

    #[test]
    fn test_cpu_frame_forms() {
        for text in [
            "[08:32:58] Completed 2500 out of 250000 steps  (1%)",
            "[08:32:58] Completed 2500 out of 250000 steps (1 percent)",
            "[08:32:58] Completed 2500 out of 250000 steps  (1)",
        ] {
            let line = parse_line(0, text);
            assert_eq!(
                line.data,
                Some(LineData::Frame(FrameProgress {
                    percent: 1,
                    completed_steps: 2500,
                    total_steps: 250_000
                })),
                "{}",
                text
            );
        }
    }

    #[test]
    fn test_cpu_frame_off_by_one_shift() {
        let line = parse_line(0, "[08:32:58] Completed 5000 out of 250000 steps  (1%)");
        assert!(matches!(
            line.data,
            Some(LineData::Frame(FrameProgress { percent: 2, .. }))
        ));
    }

    #[test]
    fn test_cpu_frame_mismatch_does_not_raise() {
        let line = parse_line(7, "[08:32:58] Completed 2500 out of 250000 steps  (40%)");
        assert_eq!(line.kind, LineKind::Error);
        assert_eq!(line.data, None);
        assert!(matches!(
            line.error,
            Some(LineError::PercentMismatch { declared: 40, .. })
        ));
    }

    #[test]
    fn test_gpu_frame() {
        let line = parse_line(0, "[13:07:36] Completed 37%");
        assert_eq!(
            line.data,
            Some(LineData::Frame(FrameProgress {
                percent: 37,
                completed_steps: 37,
                total_steps: 100
            }))
        );
    }

    #[test]
    fn test_frame_without_valid_timestamp_is_error() {
        let line = parse_line(0, "[13:xx:36] Completed 37%");
        assert_eq!(line.kind, LineKind::Error);
        assert!(matches!(line.error, Some(LineError::Timestamp { .. })));
    }

    #[test]
    fn test_core_versions() {
        let gromacs = parse_line(0, "[08:19:05] Version 2.08 (Mon May 18 14:47:42 PDT 2009)");
        assert_eq!(gromacs.data, Some(LineData::CoreVersion("2.08".to_string())));
        let protomol = parse_line(0, "[21:57:04]   Version: 0.80");
        assert_eq!(protomol.data, Some(LineData::CoreVersion("0.80".to_string())));
    }

    #[test]
    fn test_core_shutdown_tokens() {
        let line = parse_line(0, "[22:55:48] Folding@home Core Shutdown: EARLY_UNIT_END");
        assert_eq!(
            line.data,
            Some(LineData::UnitResult(WorkUnitResult::EarlyUnitEnd))
        );
        let line = parse_line(0, "[22:55:48] Folding@home Core Shutdown: NEW_TOKEN");
        assert_eq!(line.data, Some(LineData::UnitResult(WorkUnitResult::Unknown)));
        assert_eq!(line.error, None);
    }

    #[test]
    fn test_queue_index_and_log_open() {
        let line = parse_line(0, "[08:19:04] Working on queue slot 07 [July 6 08:19:04 UTC]");
        assert_eq!(line.data, Some(LineData::QueueIndex(7)));

        let line = parse_line(0, "--- Opening Log file [July 6 07:55:34 UTC] ");
        assert_eq!(
            line.data,
            Some(LineData::LogOpened("July 6 07:55:34 UTC".to_string()))
        );
        assert_eq!(line.timestamp, None);
    }

    #[test]
    fn test_structural_line_keeps_kind_on_bad_timestamp() {
        let line = parse_line(0, "[0x:19:04] + Processing work unit");
        assert_eq!(line.kind, LineKind::WorkUnitProcessing);
        assert!(line.has_error());
    }

    #[test]
    fn test_unknown_line_carries_nothing() {
        let line = parse_line(3, "[08:19:06] - Files status OK");
        assert_eq!(line.kind, LineKind::Unknown);
        assert_eq!(line.timestamp, None);
        assert_eq!(line.data, None);
        assert_eq!(line.error, None);
    }
}

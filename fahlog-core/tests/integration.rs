//! Integration tests for the FAHlog parser
//!
//! These tests drive [`FahLog`] over the fixture logs in `tests/fixtures/`
//! and check the reconstructed run/slot/unit tree end to end.

use fahlog_core::ingest::{parse_line, read_log_file};
use fahlog_core::types::{LineKind, ProjectInfo, SlotStatus, WorkUnitResult};
use fahlog_core::{Error, FahLog, LineError, LogLine};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::time::Duration;

/// Get the path to a fixture file
fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// Parse a fixture through the facade
fn parse_fixture(name: &str) -> FahLog {
    let lines = read_log_file(fixture_path(name)).expect("fixture should be readable");
    let mut log = FahLog::new();
    log.parse(&lines);
    log
}

/// Runs must tile the input from the first run's start to the end.
fn assert_contiguous(log: &FahLog) {
    let runs = log.client_runs();
    assert!(!runs.is_empty());
    for pair in runs.windows(2) {
        assert_eq!(pair[0].end, pair[1].start, "runs must not overlap or gap");
    }
    assert_eq!(runs.last().unwrap().end, log.lines().len());
    for line in &log.lines()[..runs[0].start] {
        assert_eq!(line.kind, LineKind::Unknown);
    }
    for run in runs {
        for slot in &run.slots {
            for pair in slot.units.windows(2) {
                assert_eq!(pair[0].end, pair[1].start);
            }
            if let Some(last) = slot.units.last() {
                assert_eq!(last.end, run.end);
            }
        }
    }
}

// ============================================
// SMP client with a restart
// ============================================

#[test]
fn test_smp_1_boundaries() {
    let log = parse_fixture("smp_1.txt");
    assert_contiguous(&log);

    let runs = log.client_runs();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].line_range(), 2..274);
    assert_eq!(runs[1].start, 274);

    let run = &runs[0];
    assert_eq!(run.slots.len(), 1);
    let slot = &run.slots[0];
    assert_eq!(slot.units.len(), 2);
    assert_eq!(slot.units[0].line_range(), 30..150);
    assert_eq!(slot.units[1].line_range(), 150..274);
    assert_eq!(slot.data.status, SlotStatus::RunningNoFrameTimes);
    assert_eq!(slot.data.completed_units, 1);
    assert_eq!(slot.data.failed_units, 0);
    assert_eq!(slot.data.total_completed_units, Some(261));

    assert!(log.warnings().is_empty(), "{:?}", log.warnings());
    assert_eq!(log.error_lines().count(), 0);
}

#[test]
fn test_smp_1_client_and_unit_data() {
    let log = parse_fixture("smp_1.txt");
    let run = &log.client_runs()[0];

    assert_eq!(run.data.start_time_text.as_deref(), Some("July 19 21:44:59 UTC"));
    assert_eq!(run.data.client_version.as_deref(), Some("6.24beta"));
    assert_eq!(run.data.arguments.as_deref(), Some("-smp -verbosity 9"));
    assert_eq!(run.data.user_name.as_deref(), Some("harlam357"));
    assert_eq!(run.data.team, Some(32));
    assert_eq!(run.data.user_id.as_deref(), Some("1E19BD450434A6ED"));
    assert_eq!(run.data.machine_id, Some(1));
    assert_eq!(run.data.start_time, chrono::NaiveTime::from_hms_opt(21, 44, 59));

    let first = &run.slots[0].units[0];
    assert_eq!(first.queue_index, Some(1));
    assert_eq!(first.data.project, Some(ProjectInfo::new(2677, 10, 29, 28)));
    assert_eq!(first.data.core_version.as_deref(), Some("2.08"));
    assert_eq!(first.data.result, Some(WorkUnitResult::FinishedUnit));
    assert_eq!(first.frames_observed(), 71);
    assert_eq!(first.last_frame().map(|f| f.frame_id), Some(100));
    assert_eq!(first.average_frame_duration(), Some(Duration::from_secs(150)));

    let second = &run.slots[0].units[1];
    assert_eq!(second.queue_index, Some(2));
    assert_eq!(second.data.project.map(|p| p.to_string()).as_deref(), Some("P2669 (R13, C28, G71)"));
    assert_eq!(second.data.result, None);
    assert_eq!(second.data.frames.len(), 100);
    assert_eq!(second.average_frame_duration(), Some(Duration::from_secs(152)));
}

#[test]
fn test_smp_1_restart_run() {
    let log = parse_fixture("smp_1.txt");
    let run = &log.client_runs()[1];

    // restarted without an "Opening Log file" line
    assert_eq!(run.data.start_time_text, None);
    assert_eq!(run.data.client_version.as_deref(), Some("6.24beta"));

    let slot = &run.slots[0];
    assert_eq!(slot.units.len(), 1);
    assert_eq!(slot.units[0].queue_index, Some(2));
    assert_eq!(slot.data.completed_units, 1);
    assert_eq!(slot.data.total_completed_units, Some(262));
    assert_eq!(slot.data.status, SlotStatus::Stopped);
    assert_eq!(log.current_run().map(|r| r.start), Some(274));
}

#[test]
fn test_smp_1_slices() {
    let log = parse_fixture("smp_1.txt");

    let unit = log.lines_for_unit(0, 0, 0).unwrap();
    assert_eq!(unit.len(), 120);
    assert_eq!(unit[0].kind, LineKind::WorkUnitProcessing);
    assert_eq!(unit[0].index, 30);

    // queue slot 02 is reused after the restart; the newest unit wins
    let range = log.queue_index_range(2).unwrap();
    assert!(range.start > 274);
    assert_eq!(log.queue_index_range(1), Some(30..150));
    assert!(log.lines_for_queue_index(9).is_none());
}

#[test]
fn test_smp_1_parse_reader_matches_file() {
    let from_file = parse_fixture("smp_1.txt");

    let file = File::open(fixture_path("smp_1.txt")).unwrap();
    let mut from_reader = FahLog::new();
    from_reader.parse_reader(BufReader::new(file)).unwrap();

    assert_eq!(from_reader.lines(), from_file.lines());
    assert_eq!(from_reader.client_runs(), from_file.client_runs());
}

#[test]
fn test_clear_then_reparse_twice_is_identical() {
    let lines = read_log_file(fixture_path("smp_1.txt")).unwrap();
    let mut log = FahLog::new();
    log.parse(&lines);
    let first = log.client_runs().to_vec();

    log.clear();
    assert!(log.client_runs().is_empty());
    log.parse(&lines);
    log.parse(&lines);
    assert_eq!(log.client_runs(), first.as_slice());
}

// ============================================
// Dialects and degraded input
// ============================================

#[test]
fn test_normal_verbosity_without_user_id() {
    let log = parse_fixture("normal_verbosity.txt");
    assert_contiguous(&log);

    let run = &log.client_runs()[0];
    assert_eq!(run.data.user_id, None);
    assert_eq!(run.data.machine_id, None);
    assert_eq!(run.data.user_name.as_deref(), Some("harlam357"));
    assert_eq!(run.data.arguments.as_deref(), Some("-smp"));

    let unit = &run.slots[0].units[0];
    assert_eq!(unit.queue_index, Some(7));
    assert_eq!(unit.data.core_version.as_deref(), Some("2.17"));
    assert_eq!(unit.frames_observed(), 4);
}

#[test]
fn test_gpu_pause_resets_frame_timing() {
    let log = parse_fixture("gpu2_pause.txt");
    assert_contiguous(&log);

    let slot = &log.client_runs()[0].slots[0];
    assert_eq!(slot.data.status, SlotStatus::RunningNoFrameTimes);

    let unit = &slot.units[0];
    assert_eq!(unit.queue_index, Some(3));
    assert_eq!(unit.data.project, Some(ProjectInfo::new(5781, 2, 700, 2)));
    assert_eq!(unit.data.core_version.as_deref(), Some("1.31"));
    assert_eq!(unit.data.frames.len(), 7);
    // only frames since the resume count as observed
    assert_eq!(unit.frames_observed(), 3);
    assert_eq!(unit.data.frames[&4].duration, Duration::ZERO);
    assert_eq!(unit.data.frames[&5].duration, Duration::from_secs(89));
    assert_eq!(unit.data.frames[&6].total_steps, 100);
    assert_eq!(unit.average_frame_duration(), Some(Duration::from_secs(89)));
}

#[test]
fn test_corrupted_section_is_isolated() {
    let log = parse_fixture("corrupted_section.txt");
    assert_contiguous(&log);

    let errors: Vec<&LogLine> = log.error_lines().collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].index, 64);
    assert_eq!(errors[0].kind, LineKind::Error);
    assert!(matches!(
        errors[0].error,
        Some(LineError::PercentMismatch { declared: 8, .. })
    ));

    let runs = log.client_runs();
    assert_eq!(runs.len(), 3);
    assert_eq!(runs[0].line_range(), 0..34);
    assert_eq!(runs[1].line_range(), 34..68);
    assert_eq!(runs[2].line_range(), 68..102);

    for (run, queue) in runs.iter().zip([4u8, 5, 6]) {
        let unit = &run.slots[0].units[0];
        assert_eq!(unit.queue_index, Some(queue));
        assert_eq!(unit.start, run.start + 19);
    }
    assert_eq!(runs[0].slots[0].units[0].data.frames.len(), 6);
    assert_eq!(runs[1].slots[0].units[0].data.frames.len(), 5);
    assert_eq!(runs[2].slots[0].units[0].data.frames.len(), 6);
}

#[test]
fn test_garbage_never_fails() {
    let input = [
        "\u{0}\u{1}binary junk",
        "[99:99:99] Completed 1 out of 2 steps  (50%)",
        "[12:00:00] Working on queue slot 42 [never]",
        "[12:00:01] - User name: someone (Team abc)",
        "",
    ];
    let mut log = FahLog::new();
    log.parse(input);

    assert_eq!(log.lines().len(), input.len());
    assert_eq!(log.error_lines().count(), 3);
    // the first classified line opens an implicit run covering the whole input
    assert_eq!(log.client_runs().len(), 1);
    assert_eq!(log.client_runs()[0].line_range(), 0..5);
}

#[test]
fn test_restart_after_unitless_run() {
    let input = [
        "--- Opening Log file [July 6 07:55:34 UTC]",
        "###############################################################################",
        "                       Folding@Home Client Version 6.24beta",
        "###############################################################################",
        "Arguments: -smp -verbosity 9",
        "[07:55:35] - User name: harlam357 (Team 32)",
        "[07:55:40] + Attempting to get work packet",
        "[07:56:00] Folding@Home Client Shutdown.",
        "###############################################################################",
        "                       Folding@Home Client Version 6.24beta",
        "###############################################################################",
        "Arguments: -smp",
    ];
    let mut log = FahLog::new();
    log.parse(input);

    let runs = log.client_runs();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].line_range(), 0..8);
    assert_eq!(runs[1].line_range(), 8..12);
    assert_eq!(runs[0].data.arguments.as_deref(), Some("-smp -verbosity 9"));
    assert_eq!(runs[1].data.arguments.as_deref(), Some("-smp"));
    assert_eq!(log.current_run().map(|r| r.start), Some(8));
}

#[test]
fn test_single_line_matches_facade() {
    let text = "[21:45:13] Project: 2677 (Run 10, Clone 29, Gen 28)";
    let line = parse_line(0, text);
    let mut log = FahLog::new();
    log.parse([text]);
    assert_eq!(log.lines()[0], line);
}

#[test]
fn test_read_log_file_missing() {
    assert!(matches!(read_log_file(""), Err(Error::MissingPath)));
    assert!(read_log_file(fixture_path("does-not-exist.txt")).is_err());
}

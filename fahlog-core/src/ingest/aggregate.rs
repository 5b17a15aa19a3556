//! Run, slot and unit data aggregation
//!
//! Replays only the lines inside each boundary's range and folds them into
//! the boundary's data record. First occurrence wins for identity fields.

use super::detect::DEFAULT_SLOT_ID;
use super::frames::FrameTimer;
use crate::types::{ClientRun, LineData, LineKind, LogLine, SlotStatus, UnitRun};

/// Fill in data for every run, slot and unit.
pub fn aggregate(lines: &[LogLine], runs: &mut [ClientRun]) {
    for run in runs.iter_mut() {
        let Some(run_lines) = lines.get(run.start..run.end) else {
            continue;
        };
        aggregate_client(run_lines, run);

        let status = slot_status(run_lines);
        if status != SlotStatus::Unknown && run.slots.is_empty() {
            run.slot_or_insert(DEFAULT_SLOT_ID);
        }
        for slot in &mut run.slots {
            // single-slot logs: every slot shares the run's status lines
            slot.data.status = status;
            for unit in &mut slot.units {
                if let Some(unit_lines) = lines.get(unit.start..unit.end) {
                    aggregate_unit(unit_lines, unit);
                }
            }
        }
    }
}

fn aggregate_client(lines: &[LogLine], run: &mut ClientRun) {
    let data = &mut run.data;
    for line in lines {
        if data.start_time.is_none() {
            data.start_time = line.timestamp;
        }
        let Some(payload) = &line.data else {
            continue;
        };
        match payload {
            LineData::LogOpened(text) if data.start_time_text.is_none() => {
                data.start_time_text = Some(text.clone());
            }
            LineData::ClientVersion(version) if data.client_version.is_none() => {
                data.client_version = Some(version.clone());
            }
            LineData::Arguments(args) if data.arguments.is_none() => {
                data.arguments = Some(args.clone());
            }
            LineData::UserTeam { user, team } if data.user_name.is_none() => {
                data.user_name = Some(user.clone());
                data.team = Some(*team);
            }
            LineData::UserId(id) if data.user_id.is_none() => {
                data.user_id = Some(id.clone());
            }
            LineData::MachineId(id) if data.machine_id.is_none() => {
                data.machine_id = Some(*id);
            }
            _ => {}
        }
    }
}

/// Status from the last status-relevant line. `Stopped` is terminal.
pub fn slot_status(lines: &[LogLine]) -> SlotStatus {
    let mut status = SlotStatus::Unknown;
    for line in lines {
        let Some(next) = SlotStatus::from_line_kind(line.kind) else {
            continue;
        };
        if status == SlotStatus::Stopped {
            break;
        }
        status = next;
    }
    status
}

fn aggregate_unit(lines: &[LogLine], unit: &mut UnitRun) {
    let data = &mut unit.data;
    let mut timer = FrameTimer::new();
    // a shutdown only counts right after a running marker, same as the detector
    let mut lifecycle = None;

    for line in lines {
        if data.unit_start_time.is_none() {
            data.unit_start_time = line.timestamp;
        }
        match (&line.data, line.kind) {
            (Some(LineData::CoreVersion(version)), _) if data.core_version.is_none() => {
                data.core_version = Some(version.clone());
            }
            (Some(LineData::Project(project)), _) if data.project.is_none() => {
                data.project = Some(*project);
            }
            (Some(LineData::UnitResult(result)), _)
                if data.result.is_none() && lifecycle == Some(LineKind::WorkUnitRunning) =>
            {
                data.result = Some(*result);
            }
            (_, LineKind::WorkUnitFrame)
            | (_, LineKind::WorkUnitPaused)
            | (_, LineKind::WorkUnitResumed)
            | (_, LineKind::WorkUnitWorking)
            | (_, LineKind::WorkUnitRunning) => timer.observe(line),
            _ => {}
        }
        if line.kind.is_structural() {
            lifecycle = Some(line.kind);
        }
    }

    let (frames, observed) = timer.finish();
    data.frames = frames;
    data.frames_observed = observed;
}

//! Run boundary detection
//!
//! A single pass over classified lines that partitions them into client runs,
//! slot runs and unit runs. State is limited to the previous classified
//! kind (for the log-header restart guard), the previous unit lifecycle kind
//! (for running and shutdown handling), and a record of pending unit-start
//! candidates, because client dialects announce a new unit at different
//! points.
//!
//! Boundaries only; the aggregator fills in run, slot and unit data later.

use crate::types::{ClientRun, LineData, LineKind, LogLine, UnitRun};

/// Slot used when the log does not name one. Single-slot clients log no
/// slot identifiers at all.
pub const DEFAULT_SLOT_ID: u32 = 0;

/// Competing candidates for the first line of the next unit.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PendingUnitStart {
    pub core_download: Option<usize>,
    pub processing: Option<usize>,
    pub working: Option<usize>,
    pub start: Option<usize>,
    pub queue_index: Option<u8>,
}

impl PendingUnitStart {
    /// Highest-priority candidate: processing, working, unit start, then a
    /// core download as last resort.
    pub fn best_start(&self) -> Option<usize> {
        self.processing
            .or(self.working)
            .or(self.start)
            .or(self.core_download)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Output of a detection pass.
#[derive(Debug, Default)]
pub struct Detection {
    pub runs: Vec<ClientRun>,
    pub warnings: Vec<String>,
}

/// Explicit detection state threaded through the line loop.
#[derive(Debug, Default)]
pub struct RunDetector {
    runs: Vec<ClientRun>,
    previous: Option<LineKind>,
    lifecycle: Option<LineKind>,
    pending: PendingUnitStart,
    warnings: Vec<String>,
}

impl RunDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run detection over a full line list.
    pub fn detect(lines: &[LogLine]) -> Detection {
        let mut detector = Self::new();
        for line in lines {
            detector.accept(line);
        }
        detector.finish(lines.len())
    }

    /// Feed one line.
    pub fn accept(&mut self, line: &LogLine) {
        let index = line.index;

        match line.kind {
            LineKind::Unknown => return,
            LineKind::LogOpen => self.start_run(index),
            LineKind::LogHeader => {
                if !matches!(
                    self.previous,
                    Some(LineKind::LogOpen) | Some(LineKind::LogHeader)
                ) {
                    self.start_run(index);
                }
            }
            _ => {
                // a log that starts mid-run still gets a run
                if self.runs.is_empty() {
                    self.start_run(0);
                }
            }
        }

        match line.kind {
            LineKind::WorkUnitProcessing => self.pending.processing = Some(index),
            LineKind::WorkUnitCoreDownload => self.pending.core_download = Some(index),
            LineKind::WorkUnitWorking => self.pending.working = Some(index),
            LineKind::WorkUnitStart => self.pending.start = Some(index),
            LineKind::WorkUnitQueueIndex => {
                if let Some(LineData::QueueIndex(queue_index)) = line.data {
                    self.pending.queue_index = Some(queue_index);
                }
            }
            LineKind::WorkUnitRunning => {
                // repeated running signals belong to the unit already open
                if self.lifecycle != Some(LineKind::WorkUnitRunning) {
                    self.finalize_unit(index);
                }
            }
            LineKind::WorkUnitCoreShutdown => self.core_shutdown(line),
            LineKind::ClientNumberOfUnitsCompleted => {
                if let Some(LineData::UnitsCompleted(total)) = line.data {
                    if let Some(run) = self.runs.last_mut() {
                        let slot_id = run.last_slot().map_or(DEFAULT_SLOT_ID, |s| s.slot_id);
                        run.slot_or_insert(slot_id).data.total_completed_units = Some(total);
                    }
                }
            }
            _ => {}
        }

        if line.kind.is_header_context() {
            self.previous = Some(line.kind);
        }
        if line.kind.is_structural() {
            self.lifecycle = Some(line.kind);
        }
    }

    /// Close all open boundaries against the total line count.
    pub fn finish(mut self, line_count: usize) -> Detection {
        self.close_current_run(line_count);
        Detection {
            runs: self.runs,
            warnings: self.warnings,
        }
    }

    fn start_run(&mut self, index: usize) {
        self.close_current_run(index);
        tracing::debug!(index, "client run started");
        self.runs.push(ClientRun::new(index));
        self.pending.reset();
    }

    fn close_current_run(&mut self, end: usize) {
        let Some(run) = self.runs.last_mut() else {
            return;
        };
        run.end = end.max(run.start);
        for slot in &mut run.slots {
            if let Some(unit) = slot.units.last_mut() {
                unit.end = end.max(unit.start + 1);
            }
        }
    }

    fn finalize_unit(&mut self, index: usize) {
        let Some(start) = self.pending.best_start() else {
            self.warn(format!(
                "line {}: work unit running without a start marker, skipping unit",
                index
            ));
            self.pending.reset();
            return;
        };
        let queue_index = self.pending.queue_index;
        self.pending.reset();

        let Some(run) = self.runs.last_mut() else {
            return;
        };
        let slot = run.slot_or_insert(DEFAULT_SLOT_ID);
        if let Some(previous) = slot.units.last_mut() {
            previous.end = start;
        }
        tracing::debug!(start, ?queue_index, "unit run started");
        slot.units.push(UnitRun::new(queue_index, start));
    }

    fn core_shutdown(&mut self, line: &LogLine) {
        let Some(LineData::UnitResult(result)) = line.data else {
            return;
        };
        if self.lifecycle != Some(LineKind::WorkUnitRunning) {
            self.warn(format!(
                "line {}: core shutdown ({}) outside a running unit, not counted",
                line.index, result
            ));
            return;
        }
        let Some(run) = self.runs.last_mut() else {
            return;
        };
        let slot_id = run.last_slot().map_or(DEFAULT_SLOT_ID, |s| s.slot_id);
        let slot = run.slot_or_insert(slot_id);
        if result == crate::types::WorkUnitResult::FinishedUnit {
            slot.data.completed_units += 1;
        } else if result.is_failure() {
            slot.data.failed_units += 1;
        }
    }

    fn warn(&mut self, message: String) {
        tracing::warn!("{}", message);
        self.warnings.push(message);
    }
}

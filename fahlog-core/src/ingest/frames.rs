//! Frame timing
//!
//! Cross-checks declared frame percentages against the step counters and
//! turns frame timestamps into per-frame durations.

use crate::error::LineError;
use crate::types::{LineData, LineKind, LogLine, WorkUnitFrameData};
use chrono::NaiveTime;
use std::collections::BTreeMap;
use std::time::Duration;

/// Absolute tolerance between declared and computed percent.
pub const PERCENT_TOLERANCE: f64 = 0.1;

/// Widest gap accepted by the off-by-one correction.
const OFF_BY_ONE_TOLERANCE: f64 = 1.1;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Reconcile a declared percentage with `completed / total * 100`.
///
/// Returns the frame id to use. A declared value exactly one below the
/// rounded computed value is accepted incremented by one.
pub fn reconcile_percent(declared: u32, completed: u64, total: u64) -> Result<u32, LineError> {
    let mismatch = || LineError::PercentMismatch {
        declared,
        completed,
        total,
    };

    if total == 0 || completed > total {
        return Err(mismatch());
    }

    let computed = completed as f64 / total as f64 * 100.0;
    let diff = computed - f64::from(declared);

    if diff.abs() <= PERCENT_TOLERANCE {
        return Ok(declared);
    }
    if diff > PERCENT_TOLERANCE
        && diff <= OFF_BY_ONE_TOLERANCE
        && computed.round() as u32 == declared + 1
    {
        return Ok(declared + 1);
    }
    Err(mismatch())
}

/// Time between two frames, rolling over midnight.
pub fn frame_delta(previous: NaiveTime, current: NaiveTime) -> Duration {
    let mut secs = current.signed_duration_since(previous).num_seconds();
    if secs < 0 {
        secs += SECONDS_PER_DAY;
    }
    Duration::from_secs(secs as u64)
}

/// Folds the lines of one unit into its frame map.
///
/// A pause followed by a resume (or a working/running marker) clears the
/// duration baseline and the observed counter, so the paused gap is never
/// counted as processing time.
#[derive(Debug, Default)]
pub struct FrameTimer {
    frames: BTreeMap<u32, WorkUnitFrameData>,
    previous: Option<NaiveTime>,
    paused: bool,
    observed: u32,
}

impl FrameTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, line: &LogLine) {
        match line.kind {
            LineKind::WorkUnitPaused => self.paused = true,
            LineKind::WorkUnitResumed | LineKind::WorkUnitWorking | LineKind::WorkUnitRunning
                if self.paused =>
            {
                self.paused = false;
                self.previous = None;
                self.observed = 0;
            }
            LineKind::WorkUnitFrame => {
                if let (Some(LineData::Frame(progress)), Some(ts)) = (&line.data, line.timestamp) {
                    let duration = self
                        .previous
                        .map(|prev| frame_delta(prev, ts))
                        .unwrap_or_default();
                    self.frames.insert(
                        progress.percent,
                        WorkUnitFrameData {
                            frame_id: progress.percent,
                            completed_steps: progress.completed_steps,
                            total_steps: progress.total_steps,
                            timestamp: ts,
                            duration,
                        },
                    );
                    self.previous = Some(ts);
                    self.observed += 1;
                }
            }
            _ => {}
        }
    }

    pub fn observed(&self) -> u32 {
        self.observed
    }

    pub fn finish(self) -> (BTreeMap<u32, WorkUnitFrameData>, u32) {
        (self.frames, self.observed)
    }
}

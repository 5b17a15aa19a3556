//! Core domain types for fahlog
//!
//! These types form the structured model rebuilt from a client log file.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Client Run** | One lifetime of the client process, bounded by restart markers |
//! | **Slot Run** | One processing slot's activity within a Client Run |
//! | **Unit Run** | One work unit's processing session within a Slot Run |
//! | **Frame** | A percentage checkpoint (0-100) of progress within a unit |
//! | **Queue index** | The queue slot (0-9) a unit was loaded into; reused over time |
//!
//! Boundary records never own log text. They hold index ranges into the
//! flat [`LogLine`] list kept by [`FahLog`](crate::ingest::FahLog).

use crate::error::LineError;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;
use std::time::Duration;

// ============================================
// Line classification
// ============================================

/// Kind of a single log line.
///
/// Assigned once when the line is classified. `Unknown` marks an
/// uninteresting line, `Error` a line whose payload could not be extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    LogOpen,
    LogHeader,
    ClientVersion,
    ClientArguments,
    ClientUserNameTeam,
    ClientUserId,
    ClientReceivedUserId,
    ClientMachineId,
    ClientAttemptGetWorkPacket,
    ClientSendStart,
    ClientSendComplete,
    ClientSendFailed,
    ClientAutosendStart,
    ClientAutosendComplete,
    ClientNumberOfUnitsCompleted,
    ClientEuePause,
    ClientCoreCommunicationsErrorShutdown,
    ClientShutdown,
    WorkUnitProcessing,
    WorkUnitCoreDownload,
    WorkUnitQueueIndex,
    WorkUnitWorking,
    WorkUnitStart,
    /// Any of the "core is now running" signals
    WorkUnitRunning,
    WorkUnitCoreVersion,
    WorkUnitProtein,
    WorkUnitProject,
    WorkUnitFrame,
    WorkUnitPaused,
    WorkUnitResumed,
    WorkUnitCoreShutdown,
    WorkUnitCoreReturn,
    Unknown,
    Error,
}

impl LineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineKind::LogOpen => "log_open",
            LineKind::LogHeader => "log_header",
            LineKind::ClientVersion => "client_version",
            LineKind::ClientArguments => "client_arguments",
            LineKind::ClientUserNameTeam => "client_user_name_team",
            LineKind::ClientUserId => "client_user_id",
            LineKind::ClientReceivedUserId => "client_received_user_id",
            LineKind::ClientMachineId => "client_machine_id",
            LineKind::ClientAttemptGetWorkPacket => "client_attempt_get_work_packet",
            LineKind::ClientSendStart => "client_send_start",
            LineKind::ClientSendComplete => "client_send_complete",
            LineKind::ClientSendFailed => "client_send_failed",
            LineKind::ClientAutosendStart => "client_autosend_start",
            LineKind::ClientAutosendComplete => "client_autosend_complete",
            LineKind::ClientNumberOfUnitsCompleted => "client_number_of_units_completed",
            LineKind::ClientEuePause => "client_eue_pause",
            LineKind::ClientCoreCommunicationsErrorShutdown => {
                "client_core_communications_error_shutdown"
            }
            LineKind::ClientShutdown => "client_shutdown",
            LineKind::WorkUnitProcessing => "work_unit_processing",
            LineKind::WorkUnitCoreDownload => "work_unit_core_download",
            LineKind::WorkUnitQueueIndex => "work_unit_queue_index",
            LineKind::WorkUnitWorking => "work_unit_working",
            LineKind::WorkUnitStart => "work_unit_start",
            LineKind::WorkUnitRunning => "work_unit_running",
            LineKind::WorkUnitCoreVersion => "work_unit_core_version",
            LineKind::WorkUnitProtein => "work_unit_protein",
            LineKind::WorkUnitProject => "work_unit_project",
            LineKind::WorkUnitFrame => "work_unit_frame",
            LineKind::WorkUnitPaused => "work_unit_paused",
            LineKind::WorkUnitResumed => "work_unit_resumed",
            LineKind::WorkUnitCoreShutdown => "work_unit_core_shutdown",
            LineKind::WorkUnitCoreReturn => "work_unit_core_return",
            LineKind::Unknown => "unknown",
            LineKind::Error => "error",
        }
    }

    /// Unit lifecycle kinds.
    ///
    /// Only these move the detector's running-context state, so frame and
    /// payload lines between a running marker and a shutdown are transparent.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            LineKind::LogOpen
                | LineKind::LogHeader
                | LineKind::WorkUnitProcessing
                | LineKind::WorkUnitCoreDownload
                | LineKind::WorkUnitQueueIndex
                | LineKind::WorkUnitWorking
                | LineKind::WorkUnitStart
                | LineKind::WorkUnitRunning
                | LineKind::WorkUnitCoreShutdown
        )
    }

    /// Kinds that count as the previous line for the log-header restart
    /// guard. The version line sits between header rows, so it is skipped.
    pub fn is_header_context(&self) -> bool {
        !matches!(
            self,
            LineKind::Unknown | LineKind::Error | LineKind::ClientVersion
        )
    }
}

impl fmt::Display for LineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed payload extracted from a classified line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum LineData {
    /// Wall-clock text from `--- Opening Log file [July 6 07:55:34 UTC]`
    LogOpened(String),
    ClientVersion(String),
    Arguments(String),
    UserTeam { user: String, team: u32 },
    UserId(String),
    MachineId(u32),
    QueueIndex(u8),
    UnitsCompleted(u32),
    CoreVersion(String),
    Project(ProjectInfo),
    Frame(FrameProgress),
    UnitResult(WorkUnitResult),
}

/// Validated progress counters from a frame-completion line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameProgress {
    /// Frame id (percent complete) after reconciliation
    pub percent: u32,
    pub completed_steps: u64,
    pub total_steps: u64,
}

/// One line of the source log.
///
/// Created once during classification and never mutated afterward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    /// 0-based position in the source
    pub index: usize,
    pub text: String,
    pub kind: LineKind,
    /// Time of day from the `[HH:MM:SS]` prefix, when present and valid
    pub timestamp: Option<NaiveTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<LineData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<LineError>,
}

impl LogLine {
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }
}

// ============================================
// Work unit identity and results
// ============================================

/// Project identifiers of a work unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub project: u32,
    pub run: u32,
    pub clone: u32,
    pub gen: u32,
}

impl ProjectInfo {
    pub fn new(project: u32, run: u32, clone: u32, gen: u32) -> Self {
        Self {
            project,
            run,
            clone,
            gen,
        }
    }

    /// Parse a unitinfo tag of the form `P<id>R<run>C<clone>G<gen>`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let rest = tag.trim().strip_prefix('P')?;
        let (project, rest) = rest.split_once('R')?;
        let (run, rest) = rest.split_once('C')?;
        let (clone, gen) = rest.split_once('G')?;
        Some(Self {
            project: project.parse().ok()?,
            run: run.parse().ok()?,
            clone: clone.parse().ok()?,
            gen: gen.parse().ok()?,
        })
    }
}

impl fmt::Display for ProjectInfo {
    /// Short form, e.g. `P2677 (R10, C29, G28)`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "P{} (R{}, C{}, G{})",
            self.project, self.run, self.clone, self.gen
        )
    }
}

/// Final result reported by the core on shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkUnitResult {
    FinishedUnit,
    EarlyUnitEnd,
    UnstableMachine,
    Interrupted,
    BadWorkUnit,
    CoreOutdated,
    GpuMemtestError,
    Unknown,
}

impl WorkUnitResult {
    /// Map a core shutdown token. Unrecognized tokens map to `Unknown`.
    pub fn from_token(token: &str) -> Self {
        match token.trim() {
            "FINISHED_UNIT" => WorkUnitResult::FinishedUnit,
            "EARLY_UNIT_END" => WorkUnitResult::EarlyUnitEnd,
            "UNSTABLE_MACHINE" => WorkUnitResult::UnstableMachine,
            "INTERRUPTED" => WorkUnitResult::Interrupted,
            "BAD_WORK_UNIT" => WorkUnitResult::BadWorkUnit,
            "CORE_OUTDATED" => WorkUnitResult::CoreOutdated,
            "GPU_MEMTEST_ERROR" => WorkUnitResult::GpuMemtestError,
            _ => WorkUnitResult::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkUnitResult::FinishedUnit => "FINISHED_UNIT",
            WorkUnitResult::EarlyUnitEnd => "EARLY_UNIT_END",
            WorkUnitResult::UnstableMachine => "UNSTABLE_MACHINE",
            WorkUnitResult::Interrupted => "INTERRUPTED",
            WorkUnitResult::BadWorkUnit => "BAD_WORK_UNIT",
            WorkUnitResult::CoreOutdated => "CORE_OUTDATED",
            WorkUnitResult::GpuMemtestError => "GPU_MEMTEST_ERROR",
            WorkUnitResult::Unknown => "UNKNOWN",
        }
    }

    /// Whether this result counts against the slot's failed units.
    pub fn is_failure(&self) -> bool {
        !matches!(
            self,
            WorkUnitResult::FinishedUnit | WorkUnitResult::Unknown
        )
    }
}

impl fmt::Display for WorkUnitResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================
// Slot status
// ============================================

/// Status of a slot as of the last status-relevant line in its range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    #[default]
    Unknown,
    Stopped,
    EuePause,
    SendingWorkPacket,
    GettingWorkPacket,
    Paused,
    /// Running; frame times are left to the consumer
    RunningNoFrameTimes,
}

impl SlotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Unknown => "unknown",
            SlotStatus::Stopped => "stopped",
            SlotStatus::EuePause => "eue_pause",
            SlotStatus::SendingWorkPacket => "sending_work_packet",
            SlotStatus::GettingWorkPacket => "getting_work_packet",
            SlotStatus::Paused => "paused",
            SlotStatus::RunningNoFrameTimes => "running_no_frame_times",
        }
    }

    /// Status implied by a line kind, if any.
    pub fn from_line_kind(kind: LineKind) -> Option<Self> {
        match kind {
            LineKind::ClientShutdown | LineKind::ClientCoreCommunicationsErrorShutdown => {
                Some(SlotStatus::Stopped)
            }
            LineKind::ClientEuePause => Some(SlotStatus::EuePause),
            LineKind::ClientSendStart | LineKind::ClientAutosendStart => {
                Some(SlotStatus::SendingWorkPacket)
            }
            LineKind::ClientAttemptGetWorkPacket => Some(SlotStatus::GettingWorkPacket),
            LineKind::WorkUnitPaused => Some(SlotStatus::Paused),
            LineKind::WorkUnitProcessing
            | LineKind::WorkUnitWorking
            | LineKind::WorkUnitStart
            | LineKind::WorkUnitRunning
            | LineKind::WorkUnitFrame
            | LineKind::WorkUnitResumed => Some(SlotStatus::RunningNoFrameTimes),
            _ => None,
        }
    }
}

impl std::str::FromStr for SlotStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(SlotStatus::Unknown),
            "stopped" => Ok(SlotStatus::Stopped),
            "eue_pause" => Ok(SlotStatus::EuePause),
            "sending_work_packet" => Ok(SlotStatus::SendingWorkPacket),
            "getting_work_packet" => Ok(SlotStatus::GettingWorkPacket),
            "paused" => Ok(SlotStatus::Paused),
            "running_no_frame_times" => Ok(SlotStatus::RunningNoFrameTimes),
            _ => Err(format!("unknown slot status: {}", s)),
        }
    }
}

// ============================================
// Frames
// ============================================

/// One frame-completion observation within a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkUnitFrameData {
    /// Percent checkpoint, 0-100
    pub frame_id: u32,
    pub completed_steps: u64,
    pub total_steps: u64,
    /// Time of day the frame completed
    pub timestamp: NaiveTime,
    /// Time since the previous frame; zero for the first frame of a segment
    pub duration: Duration,
}

// ============================================
// Boundaries
// ============================================

/// Data folded from the lines of a client run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRunData {
    /// Bracketed wall-clock text from the log-open line
    pub start_time_text: Option<String>,
    /// First valid time of day seen in the run
    pub start_time: Option<NaiveTime>,
    pub client_version: Option<String>,
    pub arguments: Option<String>,
    pub user_name: Option<String>,
    pub team: Option<u32>,
    pub user_id: Option<String>,
    pub machine_id: Option<u32>,
}

/// One lifetime of the client process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRun {
    /// Index of the line that opened this run
    pub start: usize,
    /// Exclusive end: start of the next run, or end of input
    pub end: usize,
    /// Slot runs in order of first appearance
    pub slots: Vec<SlotRun>,
    pub data: ClientRunData,
}

impl ClientRun {
    pub fn new(start: usize) -> Self {
        Self {
            start,
            end: start,
            slots: Vec::new(),
            data: ClientRunData::default(),
        }
    }

    pub fn line_range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn slot(&self, slot_id: u32) -> Option<&SlotRun> {
        self.slots.iter().find(|s| s.slot_id == slot_id)
    }

    /// Get the slot with this id, adding an empty one if needed.
    pub fn slot_or_insert(&mut self, slot_id: u32) -> &mut SlotRun {
        match self.slots.iter().position(|s| s.slot_id == slot_id) {
            Some(pos) => &mut self.slots[pos],
            None => {
                self.slots.push(SlotRun::new(slot_id));
                let last = self.slots.len() - 1;
                &mut self.slots[last]
            }
        }
    }

    /// Most recently added slot
    pub fn last_slot(&self) -> Option<&SlotRun> {
        self.slots.last()
    }

    pub fn total_completed(&self) -> u32 {
        self.slots.iter().map(|s| s.data.completed_units).sum()
    }

    pub fn total_failed(&self) -> u32 {
        self.slots.iter().map(|s| s.data.failed_units).sum()
    }
}

/// Counters and status for a slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRunData {
    pub completed_units: u32,
    pub failed_units: u32,
    /// Lifetime total advertised by the client, if seen
    pub total_completed_units: Option<u32>,
    pub status: SlotStatus,
}

/// One slot's activity within a client run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRun {
    /// Unique only within the parent run
    pub slot_id: u32,
    /// Ordered by start index ascending
    pub units: Vec<UnitRun>,
    pub data: SlotRunData,
}

impl SlotRun {
    pub fn new(slot_id: u32) -> Self {
        Self {
            slot_id,
            units: Vec::new(),
            data: SlotRunData::default(),
        }
    }
}

/// Data folded from the lines of a unit run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitRunData {
    pub unit_start_time: Option<NaiveTime>,
    pub core_version: Option<String>,
    pub project: Option<ProjectInfo>,
    /// Keyed by frame id; a repeated id overwrites
    pub frames: BTreeMap<u32, WorkUnitFrameData>,
    /// Frames seen since the last pause/resume reset
    pub frames_observed: u32,
    /// `None` if the unit never finished in this run
    pub result: Option<WorkUnitResult>,
}

/// One work unit's processing session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitRun {
    /// Queue slot 0-9; reused over time
    pub queue_index: Option<u8>,
    pub start: usize,
    /// Exclusive end: next boundary, or end of input
    pub end: usize,
    pub data: UnitRunData,
}

impl UnitRun {
    pub fn new(queue_index: Option<u8>, start: usize) -> Self {
        Self {
            queue_index,
            start,
            end: start + 1,
            data: UnitRunData::default(),
        }
    }

    pub fn line_range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn frames_observed(&self) -> u32 {
        self.data.frames_observed
    }

    /// Frame with the highest id
    pub fn last_frame(&self) -> Option<&WorkUnitFrameData> {
        self.data.frames.values().next_back()
    }

    /// Mean of the non-zero frame durations.
    pub fn average_frame_duration(&self) -> Option<Duration> {
        let timed: Vec<Duration> = self
            .data
            .frames
            .values()
            .map(|f| f.duration)
            .filter(|d| !d.is_zero())
            .collect();
        if timed.is_empty() {
            return None;
        }
        let total: Duration = timed.iter().sum();
        Some(total / timed.len() as u32)
    }
}

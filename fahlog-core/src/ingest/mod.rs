//! Ingestion layer for client log files
//!
//! Rebuilds the run/slot/unit history from raw log text.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌────────────┐   ┌──────────────┐   ┌─────────────┐
//! │  raw text  │──►│  classify  │──►│    detect    │──►│  aggregate  │
//! │   lines    │   │ + extract  │   │ (boundaries) │   │ (+ frames)  │
//! └────────────┘   └────────────┘   └──────────────┘   └─────────────┘
//! ```
//!
//! [`FahLog`] is the only entry point collaborators need.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fahlog_core::ingest::{read_log_file, FahLog};
//!
//! let lines = read_log_file("FAHlog.txt")?;
//! let mut log = FahLog::new();
//! log.parse(&lines);
//! for run in log.client_runs() {
//!     println!("run at line {}: {} slots", run.start, run.slots.len());
//! }
//! ```

pub mod aggregate;
pub mod classify;
pub mod detect;
pub mod extract;
pub mod frames;

pub use classify::{classify, LineRule, Matcher, LINE_RULES};
pub use detect::{Detection, PendingUnitStart, RunDetector, DEFAULT_SLOT_ID};
pub use extract::parse_line;
pub use frames::{frame_delta, reconcile_percent, FrameTimer};

use crate::config::ParserConfig;
use crate::error::{Error, Result};
use crate::types::{ClientRun, LogLine, UnitRun};
use std::io::BufRead;
use std::ops::Range;
use std::path::Path;

/// Parsed view of one client log.
///
/// Holds the flat classified-line list and the run tree built over it.
/// One instance per log source; calls to [`FahLog::parse`] replace the
/// previous contents.
#[derive(Debug, Default)]
pub struct FahLog {
    config: ParserConfig,
    lines: Vec<LogLine>,
    runs: Vec<ClientRun>,
    warnings: Vec<String>,
}

impl FahLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ParserConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Parse a materialized sequence of lines.
    ///
    /// Never fails: malformed lines become `Unknown` or `Error` lines and
    /// stay attributed to whatever boundary is open.
    pub fn parse<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.clear();
        let cap = self.config.max_lines.unwrap_or(usize::MAX);
        self.lines = lines
            .into_iter()
            .take(cap)
            .enumerate()
            .map(|(index, text)| parse_line(index, text.as_ref()))
            .collect();
        self.build();
    }

    /// Parse from a line-by-line pull source.
    ///
    /// Invalid UTF-8 is replaced rather than rejected.
    pub fn parse_reader<R: BufRead>(&mut self, reader: R) -> Result<()> {
        let cap = self.config.max_lines.unwrap_or(usize::MAX);
        let texts = read_lines(reader, cap)?;
        self.parse(texts);
        Ok(())
    }

    /// Reset to the empty state.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.runs.clear();
        self.warnings.clear();
    }

    fn build(&mut self) {
        let detection = RunDetector::detect(&self.lines);
        self.runs = detection.runs;
        self.warnings = detection.warnings;
        aggregate::aggregate(&self.lines, &mut self.runs);

        tracing::info!(
            lines = self.lines.len(),
            runs = self.runs.len(),
            errors = self.error_lines().count(),
            warnings = self.warnings.len(),
            "log parsed"
        );
    }

    pub fn lines(&self) -> &[LogLine] {
        &self.lines
    }

    pub fn client_runs(&self) -> &[ClientRun] {
        &self.runs
    }

    /// Most recent client run
    pub fn current_run(&self) -> Option<&ClientRun> {
        self.runs.last()
    }

    /// Structural warnings from the last parse
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Lines carrying a parse-error payload
    pub fn error_lines(&self) -> impl Iterator<Item = &LogLine> {
        self.lines.iter().filter(|l| l.has_error())
    }

    /// Consume into the flat line list and run list.
    pub fn into_parts(self) -> (Vec<LogLine>, Vec<ClientRun>) {
        (self.lines, self.runs)
    }

    /// Line range of the unit at `unit_position` in the given run and slot.
    pub fn unit_range(
        &self,
        run_index: usize,
        slot_id: u32,
        unit_position: usize,
    ) -> Option<Range<usize>> {
        self.runs
            .get(run_index)?
            .slot(slot_id)?
            .units
            .get(unit_position)
            .map(UnitRun::line_range)
    }

    pub fn lines_for_unit(
        &self,
        run_index: usize,
        slot_id: u32,
        unit_position: usize,
    ) -> Option<&[LogLine]> {
        let range = self.unit_range(run_index, slot_id, unit_position)?;
        self.lines.get(range)
    }

    /// Line range of the most recent unit loaded into `queue_index`.
    ///
    /// Queue indices are reused, so runs and slots are searched newest first
    /// and the first match walking backward wins.
    pub fn queue_index_range(&self, queue_index: u8) -> Option<Range<usize>> {
        self.runs
            .iter()
            .rev()
            .flat_map(|run| run.slots.iter().rev())
            .flat_map(|slot| slot.units.iter().rev())
            .find(|unit| unit.queue_index == Some(queue_index))
            .map(UnitRun::line_range)
    }

    pub fn lines_for_queue_index(&self, queue_index: u8) -> Option<&[LogLine]> {
        let range = self.queue_index_range(queue_index)?;
        self.lines.get(range)
    }
}

/// Parse lines in one call, returning the flat list and run tree.
pub fn parse_lines<I, S>(lines: I) -> (Vec<LogLine>, Vec<ClientRun>)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut log = FahLog::new();
    log.parse(lines);
    log.into_parts()
}

/// Read a log file into lines.
///
/// Fails only when the path is empty or the file cannot be read.
pub fn read_log_file(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return Err(Error::MissingPath);
    }
    let file = std::fs::File::open(path).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to open {}: {}", path.display(), e),
        ))
    })?;
    read_lines(std::io::BufReader::new(file), usize::MAX)
}

fn read_lines<R: BufRead>(mut reader: R, cap: usize) -> Result<Vec<String>> {
    let mut texts = Vec::new();
    let mut buf = Vec::new();
    while texts.len() < cap {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        texts.push(decode_line(&buf));
    }
    Ok(texts)
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

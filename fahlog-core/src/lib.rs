//! # fahlog-core
//!
//! Core library for fahlog - a reader for Folding@Home v6 client logs
//! (`FAHlog.txt`).
//!
//! This library provides:
//! - Domain types for client runs, slot runs, unit runs and frames
//! - A line classifier and payload extractor
//! - Run boundary detection and per-boundary aggregation
//! - A reader for the `unitinfo.txt` companion file
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Architecture
//!
//! Parsing is two-phase:
//! - **Phase 1 (Lines):** every raw line becomes a [`LogLine`] with a kind,
//!   an optional timestamp and an optional payload
//! - **Phase 2 (Runs):** boundaries are detected over the line list and each
//!   boundary's data is aggregated from the lines inside it
//!
//! The run tree only stores line ranges into the flat line list, so raw
//! text for any unit can be recovered without copying.
//!
//! ## Example
//!
//! ```rust,no_run
//! use fahlog_core::{read_log_file, FahLog};
//!
//! let lines = read_log_file("FAHlog.txt").expect("failed to read log");
//! let mut log = FahLog::new();
//! log.parse(&lines);
//!
//! if let Some(run) = log.current_run() {
//!     println!("{} units completed", run.total_completed());
//! }
//! ```

// Re-export commonly used items at the crate root
pub use config::{Config, ParserConfig};
pub use error::{Error, LineError, Result};
pub use ingest::{parse_lines, read_log_file, FahLog};
pub use types::*;
pub use unitinfo::UnitInfo;

// Public modules
pub mod config;
pub mod error;
pub mod format;
pub mod ingest;
pub mod logging;
pub mod types;
pub mod unitinfo;

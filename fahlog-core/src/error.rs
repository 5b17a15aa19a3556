//! Error types for fahlog-core

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the fahlog-core library.
///
/// Only unusable input surfaces here. A corrupted line never does; see
/// [`LineError`] for those.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A required file path was empty
    #[error("path is empty")]
    MissingPath,

    /// unitinfo file could not be used
    #[error("unitinfo error in {}: {message}", path.display())]
    UnitInfo { path: PathBuf, message: String },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for fahlog-core
pub type Result<T> = std::result::Result<T, Error>;

/// A payload that could not be extracted from a classified line.
///
/// Attached to the offending [`LogLine`](crate::types::LogLine); parsing of
/// the rest of the log carries on.
#[derive(Error, Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LineError {
    /// The 8-character clock token was not a valid time of day
    #[error("invalid timestamp token '{token}'")]
    Timestamp { token: String },

    /// The line did not match the pattern for its kind
    #[error("{kind} line did not match the expected pattern")]
    Pattern { kind: String },

    /// A numeric field could not be parsed
    #[error("invalid number '{value}' in {field}")]
    Number { field: String, value: String },

    /// Declared percentage disagrees with the step counters
    #[error("declared {declared}% does not match {completed} of {total} steps")]
    PercentMismatch {
        declared: u32,
        completed: u64,
        total: u64,
    },
}

//! # Error Types
//!
//! Custom error types for the weather logger using `thiserror`.

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::record::protocol::RecordKind;

/// Main error type for the weather logger
#[derive(Debug, Error)]
pub enum StationError {
    /// Malformed, short or unparseable inbound payload
    #[error("Validation failure: {0}")]
    Validation(String),

    /// Append attempted at or before the latest stored timestamp
    #[error("Out-of-order {kind} write: {timestamp} is not after latest {latest}")]
    OutOfOrderWrite {
        kind: RecordKind,
        timestamp: NaiveDateTime,
        latest: NaiveDateTime,
    },

    /// Display formatting errors
    #[error("Format error: {0}")]
    Format(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial link errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// No roof link device could be opened
    #[error("No serial device found (tried: {0})")]
    SerialPortNotFound(String),
}

/// Result type alias for the weather logger
pub type Result<T> = std::result::Result<T, StationError>;

//! Error types for the entire application.
//!
//! We use `thiserror` for library-style errors with custom types,
//! and `anyhow` for application-level error propagation in main.rs and commands.

use thiserror::Error;

/// Errors that can occur while reading or interpreting the power table
#[derive(Error, Debug)]
pub enum PowerTableError {
    #[error("Power table is empty")]
    EmptyInput,

    #[error("Energy/Power columns not found in header:\n{header}")]
    MissingColumns { header: String },

    #[error("Failed to read power table: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed power table: {0}")]
    Csv(#[from] csv::Error),
}

/// Errors that can occur while reading the execution-sample source
///
/// Every variant is a "corrupt source" condition: ingestion stops and keeps
/// whatever it accumulated so far.
#[derive(Error, Debug)]
pub enum SampleSourceError {
    #[error("Failed to read sample source: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt event at line {line}: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Corrupt event at line {line}: {reason}")]
    InvalidEvent { line: usize, reason: String },
}

/// Errors that can occur during file output
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write file: {0}")]
    WriteFailed(#[from] std::io::Error),

    #[error("Failed to read file: {0}")]
    ReadFailed(std::io::Error),

    #[error("Failed to serialize JSON: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("Invalid output path: {0}")]
    InvalidPath(String),
}

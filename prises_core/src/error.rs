//! Error types for the prises_core library.

use std::io;
use std::path::PathBuf;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for prises_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV (tab-separated list) error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Form-boundary validation failure (never reaches the store)
    #[error("Validation error: {0}")]
    Validation(String),

    /// A single import document could not be applied
    #[error("Import error: {0}")]
    Import(String),

    /// Upload rejected before reading (only JSON files are accepted)
    #[error("Unsupported file {0:?}: only .json files can be imported")]
    UnsupportedFile(PathBuf),

    /// Referenced record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A date-and-time edit resolved to an instant after now
    #[error("Timestamp {0} is in the future")]
    FutureTimestamp(String),

    /// Local wall-clock time that cannot be mapped to an instant
    #[error("Invalid time: {0}")]
    InvalidTime(String),

    /// Durable storage error
    #[error("Storage error: {0}")]
    Storage(String),
}

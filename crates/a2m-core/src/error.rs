use std::path::PathBuf;
use thiserror::Error;

/// All errors produced while converting and importing export records.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// The configured input path does not exist. Carries the absolute path.
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// A timestamp value did not match any recognised format.
    #[error("Invalid timestamp format: {0}")]
    TimestampParse(String),

    /// Neither a directory, a file nor a stream was supplied.
    #[error("No input supplied: expected a directory, a file or a stream")]
    NoInput,

    /// A residency region string is not `US` or `EU`.
    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The importer could not complete a pipeline.
    #[error("Import error: {0}")]
    Import(String),

    /// One record type finished with failed records.
    #[error("{record_type} pipeline reported {failed} failed records")]
    PipelineFailure { record_type: String, failed: u64 },

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the converter crates.
pub type Result<T> = std::result::Result<T, ConvertError>;

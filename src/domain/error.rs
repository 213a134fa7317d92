// ============================================================
// Layer 3 — Data Errors
// ============================================================
// Typed failures for everything that touches example files.
// The application layer wraps these in anyhow with extra
// context; tests match on the variants directly.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias for data-layer operations.
pub type DataResult<T> = std::result::Result<T, DataError>;

#[derive(Error, Debug)]
pub enum DataError {
    /// The dataset or example file does not exist.
    #[error("example file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Any other I/O failure while reading or writing a file.
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file exists but is not valid JSON.
    #[error("malformed JSON in '{}': {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The JSON parsed but the expected list of records was not there.
    #[error("expected a JSON array of records in '{}'", .0.display())]
    NotAnArray(PathBuf),

    /// A record lacks a field an operation requires.
    #[error("record {index} is missing required field '{field}'")]
    MissingField { index: usize, field: String },

    /// A field exists but holds the wrong kind of value.
    #[error("record {index} has an invalid '{field}' value: {reason}")]
    InvalidField {
        index:  usize,
        field:  String,
        reason: String,
    },

    /// A batch index past the end of the epoch.
    #[error("batch index {index} out of range ({len} batches per epoch)")]
    BatchOutOfRange { index: usize, len: usize },
}

impl DataError {
    /// Map an `io::Error` for `path`, turning `NotFound` into its own variant.
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            DataError::NotFound(path)
        } else {
            DataError::Io { path, source }
        }
    }
}

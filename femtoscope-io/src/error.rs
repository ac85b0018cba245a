//! I/O error types.

use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed event record.
    #[error("malformed record on line {line}: {source}")]
    MalformedRecord {
        /// 1-based line number of the offending record.
        line: usize,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// Serialization error on output.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

//! Error types for femtoscope-algorithms.

use thiserror::Error;

/// Result type for algorithm operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Algorithm and configuration error types.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid bin-axis definition.
    #[error("invalid bin axis: {0}")]
    InvalidAxis(String),

    /// Invalid analysis configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Core library error.
    #[error("core error: {0}")]
    Core(#[from] femtoscope_core::Error),
}

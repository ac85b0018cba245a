//! Error types for femtoscope-core.

use thiserror::Error;

/// Result type alias for femtoscope operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for femtoscope operations.
#[derive(Error, Debug)]
pub enum Error {
    /// PDG code without an admission strategy.
    #[error("unsupported species code: {0}")]
    UnsupportedSpecies(i32),

    /// Particle role outside the two configured slots.
    #[error("invalid particle role: {0} (expected 1 or 2)")]
    InvalidRole(u8),

    /// Non-physical mass hypothesis.
    #[error("invalid mass hypothesis: {0}")]
    InvalidMass(f64),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

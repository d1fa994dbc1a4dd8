//! Error types for profile loading.
//!
//! Evaluation itself never fails; only reading a profile can.

use thiserror::Error;

/// Errors that can occur while loading or normalizing a profile.
#[derive(Debug, Error)]
pub enum RulesError {
    /// The profile file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The profile document is not valid JSON or has the wrong shape.
    #[error("profile parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A required numeric setting cannot be coerced to a finite float.
    #[error("invalid profile value at {field}: {value}")]
    InvalidValue { field: String, value: String },
}

/// Result type for rules operations.
pub type Result<T> = std::result::Result<T, RulesError>;

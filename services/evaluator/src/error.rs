//! services/evaluator/src/error.rs
//!
//! Defines the primary error type for the evaluator service.

use crate::config::ConfigError;
use grading_core::PortError;

/// The primary error type for the `evaluator` service.
#[derive(Debug, thiserror::Error)]
pub enum EvaluatorError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// The submission gate turned the request away. Recoverable: retry later.
    #[error("Submission rejected: {reason}")]
    AdmissionRejected {
        retry_after_seconds: Option<u64>,
        reason: String,
    },

    /// Represents a submission bundle that could not be read or written as JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Represents a standard Input/Output error (e.g., reading the submission file).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

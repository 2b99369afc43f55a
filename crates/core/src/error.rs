//! Shared error type for the runtime layer.

/// Errors surfaced at the runtime boundaries.
///
/// Per-metric sampling failures are deliberately *not* represented here:
/// they are logged at debug severity and replaced by the missed-sample
/// sentinel so that a sampling loop never aborts (see `gridflow-stats`).
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("execution failed: {0}")]
    Execution(String),

    #[error("submission failed: {0}")]
    Submission(String),

    #[error("invalid state: {0}")]
    InvalidState(String),
}

//! Error types shared across the record-linkage engine.
//!
//! These map to the error taxonomy described for the engine: data-quality
//! problems are never fatal, contract errors are surfaced to the caller,
//! and a small set of domain error codes are threaded through every crate
//! that re-exports this type.

use thiserror::Error;

/// Result type alias used throughout `linkage-core`.
pub type Result<T> = std::result::Result<T, Error>;

/// Shared error type for the record-linkage engine.
#[derive(Debug, Error)]
pub enum Error {
    // ==========================================================================
    // Contract errors (§6, §7) — no task or store mutation on these
    // ==========================================================================
    #[error("a matching task is already running for this primary source")]
    TaskAlreadyRunning,

    #[error("invalid task mode: {0}")]
    InvalidMode(String),

    #[error("primary source is empty")]
    EmptyPrimary,

    #[error("unknown task: {0}")]
    UnknownTask(String),

    #[error("task is not running: {0}")]
    TaskNotRunning(String),

    #[error("{entity} not found: {identifier}")]
    NotFound {
        entity: &'static str,
        identifier: String,
    },

    #[error("review record changed since it was read; re-read and retry")]
    StaleReview,

    #[error("enhanced association aggregation failed: {0}")]
    AggregationFailed(String),

    // ==========================================================================
    // Validation / data-quality errors — recorded as negative evidence,
    // never abort a task
    // ==========================================================================
    #[error("invalid argument: {field}: {message}")]
    InvalidArgument {
        field: &'static str,
        message: String,
    },

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    // ==========================================================================
    // Store errors
    // ==========================================================================
    #[error("store error: {0}")]
    Store(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// The stable domain error code used on the external interface (§6).
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::TaskAlreadyRunning => "TASK_ALREADY_RUNNING",
            Self::InvalidMode(_) => "INVALID_MODE",
            Self::EmptyPrimary => "EMPTY_PRIMARY",
            Self::UnknownTask(_) => "UNKNOWN_TASK",
            Self::TaskNotRunning(_) => "TASK_NOT_RUNNING",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::StaleReview => "STALE_REVIEW",
            Self::AggregationFailed(_) => "AGGREGATION_FAILED",
            Self::InvalidArgument { .. } | Self::MissingField(_) => "INVALID_ARGUMENT",
            Self::Store(_) | Self::Serialization(_) | Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether this error kind is safe to retry with backoff (§7 transient
    /// store errors).
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(_))
    }

    #[must_use]
    pub fn not_found(entity: &'static str, identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            identifier: identifier.into(),
        }
    }

    #[must_use]
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field,
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

//! Error types for the store layer.

use thiserror::Error;

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors raised by the `LinkageStore` / `AssociationStore` adapters.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Transient failure talking to the document store (timeout, connection
    /// reset). Retried with bounded exponential backoff by [`crate::retry`];
    /// surfaced here only once retries are exhausted.
    #[error("transient store error: {0}")]
    Transient(String),

    /// Missing collection or missing required index: fatal for the task
    /// (§7 persistent store errors).
    #[error("persistent store error: {0}")]
    Persistent(String),

    /// A query presupposed an index that §4.5 requires to be declared
    /// present but which this adapter has not declared.
    #[error("query requires undeclared index: {0}")]
    MissingIndex(&'static str),

    /// Record not found.
    #[error("{entity} not found: {identifier}")]
    NotFound {
        entity: &'static str,
        identifier: String,
    },

    /// Review write lost a compare-and-set race against a concurrent task
    /// write or another review (§5 shared-resource policy).
    #[error("stale review: {0} changed since it was read")]
    StaleReview(String),

    /// Circuit breaker open after repeated consecutive failures.
    #[error("circuit breaker open: {failures} consecutive failures, retry after {reset_after_secs:.1}s")]
    CircuitOpen { failures: u32, reset_after_secs: f64 },
}

impl StoreError {
    /// Whether this error kind is worth retrying with backoff.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<StoreError> for linkage_core::Error {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { entity, identifier } => {
                linkage_core::Error::not_found(entity, identifier)
            }
            StoreError::StaleReview(_) => linkage_core::Error::StaleReview,
            other => linkage_core::Error::Store(other.to_string()),
        }
    }
}

//! Error type for the secondary-source index (§4.3 "the Prefilter never
//! raises" — this type exists only so the read side can distinguish a
//! transient outage, which the Prefilter swallows, from a programmer
//! error).

use thiserror::Error;

pub type IndexResult<T> = std::result::Result<T, IndexError>;

#[derive(Debug, Error)]
pub enum IndexError {
    /// The underlying document store is transiently unavailable. The
    /// Prefilter catches this and degrades to an empty candidate list
    /// rather than propagating it.
    #[error("secondary index transiently unavailable: {0}")]
    Unavailable(String),
}

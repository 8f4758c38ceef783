//! Shared data model, text normalization, similarity kernels, and
//! configuration for the record-linkage engine.
//!
//! This crate has no I/O: everything in it is a pure function or a plain
//! data type, so it can be unit-tested without a store or a runtime.

pub mod config;
pub mod error;
pub mod kernels;
pub mod models;
pub mod normalizer;

pub use config::MatchConfig;
pub use error::{Error, Result};
pub use models::{
    AddressComponent, AddressToken, AssociatedRecord, AssociationStrategy, EnhancedAssociation,
    LinkageResult, MatchConfidence, MatchExplanation, MatchType, NormalizedUnit, ReviewStatus,
    Source, Unit,
};

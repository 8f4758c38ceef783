//! Candidate Prefilter and Layered Matcher (§4.3, §4.4).

pub mod error;
pub mod graph;
pub mod matcher;
pub mod prefilter;
pub mod secondary_index;

pub use error::{IndexError, IndexResult};
pub use graph::{AttributeGraph, EdgeKind};
pub use matcher::{match_record, MatchOutcome};
pub use prefilter::{prefilter, PrefilterOutcome};
pub use secondary_index::{InMemorySecondaryIndex, SecondaryIndex};

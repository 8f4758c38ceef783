//! Enhanced Association Aggregator (§4.7): 1:N grouping of SECONDARY
//! records under a PRIMARY unit.

pub mod aggregator;

pub use aggregator::{aggregate_for_primary, regenerate_all};

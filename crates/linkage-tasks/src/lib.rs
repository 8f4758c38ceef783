//! Batch Task Engine (§4.6): lifecycle, execution contract, and progress
//! reporting for PRIMARY-to-SECONDARY matching runs.

pub mod engine;
pub mod primary_source;
pub mod progress;
pub mod registry;
pub mod task;

pub use engine::{run, run_with_deadline, snapshot_total, validate_start, EngineContext};
pub use primary_source::{InMemoryPrimarySource, PrimarySource};
pub use progress::{EtaTracker, Progress};
pub use registry::TaskRegistry;
pub use task::{TaskMode, TaskState, TaskStatus};

//! The sync engine: per-source download orchestration and progress tracking.
//!
//! The control loop driving both lives in [`crate::daemon`].

pub mod orchestrator;
pub mod progress;

pub use orchestrator::{Orchestrator, SyncReport};
pub use progress::{FinishedItem, ProgressSnapshot};

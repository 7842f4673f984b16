// file: src/pipeline/mod.rs
// description: pipeline module exports and public api
// reference: pipeline orchestration

mod orchestrator;
mod progress;
mod report;
mod stage;

pub use orchestrator::ConveyorProcessor;
pub use progress::{ProgressTracker, RunStats};
pub use report::{ErrorReport, StageError, StageId};

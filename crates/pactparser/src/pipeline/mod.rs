//! Job orchestrator: drives one job through its checkpoints and writes its
//! terminal state.

pub mod error;
pub mod progress;
pub mod runner;

pub use error::{DispatchError, PipelineError};
pub use progress::{BroadcastProgress, NoopProgress, ProgressEvent, ProgressReporter};
pub use runner::{JobOutcome, Pipeline};

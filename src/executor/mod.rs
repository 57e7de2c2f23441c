//! Single-job mission execution.
//!
//! - `MissionExecutor`: drives one job from `PENDING` to a terminal state
//! - `TaskRegistry`: bounded pool for background dispatch, drained or detached on shutdown

mod pipeline;
mod registry;

pub use pipeline::MissionExecutor;
pub use registry::{ShutdownMode, TaskRegistry};

//! Domain model (ids, task descriptors, lifecycle state).

pub mod ids;
pub mod state;
pub mod task;

pub use ids::{RunId, TaskId};
pub use state::QueueState;
pub use task::{IntoTask, Operation, QueuedTask, Task, TaskError, TaskOptions, TaskSpec};

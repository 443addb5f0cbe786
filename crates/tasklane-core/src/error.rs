use thiserror::Error;

use crate::domain::{QueueState, TaskError, TaskId};

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no tokio runtime available to drive the queue")]
    NoRuntime,

    /// A task without `ignore_failure` failed; the execution loop stopped
    /// where it was and the queue stays in its running state.
    #[error("task {task_id} failed: {source}")]
    TaskFailed {
        task_id: TaskId,
        #[source]
        source: TaskError,
    },

    /// The execution loop settled into a combination the transition table
    /// does not allow.
    #[error("queue invariant violated: state={state} backlog={backlog}")]
    Invariant { state: QueueState, backlog: usize },

    #[error("execution loop panicked: {0}")]
    Panicked(String),
}

impl QueueError {
    /// Did a task body fail (as opposed to a config or internal fault)?
    pub fn is_task_failure(&self) -> bool {
        matches!(self, QueueError::TaskFailed { .. })
    }
}

//! Read-only views of a queue, for logs and status endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{QueueState, TaskId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub state: QueueState,
    pub state_name: String,
    pub state_ordinal: u8,

    /// Descriptors waiting in the backlog (the in-flight one is not counted).
    pub backlog: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_task: Option<TaskId>,

    pub auto_start: bool,
    pub captured_at: DateTime<Utc>,
}

impl QueueSnapshot {
    pub fn new(
        state: QueueState,
        backlog: usize,
        current_task: Option<TaskId>,
        auto_start: bool,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            state,
            state_name: state.name().to_string(),
            state_ordinal: state.ordinal(),
            backlog,
            current_task,
            auto_start,
            captured_at,
        }
    }

    /// Nothing queued and nothing running.
    pub fn is_idle(&self) -> bool {
        self.state == QueueState::Stopped && self.backlog == 0 && self.current_task.is_none()
    }
}

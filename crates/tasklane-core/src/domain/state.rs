//! Queue lifecycle state.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::QueueError;

/// Lifecycle state of a [`TaskQueue`](crate::queue::TaskQueue).
///
/// State transitions:
/// - Stopped -> Processing (process / add with auto start)
/// - Processing -> Pausing (pause while a task is in flight) -> Paused (task settled)
/// - Pausing -> Processing (process before the task settled)
/// - Paused -> Processing (process / pause)
/// - Processing | Pausing -> Stopping (reset while a task is in flight) -> Stopped
/// - Paused -> Stopped (reset)
/// - Processing -> Stopped (backlog drained)
///
/// `Pausing` and `Stopping` only record an intent; they exist because an
/// in-flight task is never interrupted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum QueueState {
    #[default]
    Stopped = 0,
    Processing = 1,
    Paused = 2,
    Stopping = 3,
    Pausing = 4,
}

impl QueueState {
    pub const ALL: [QueueState; 5] = [
        QueueState::Stopped,
        QueueState::Processing,
        QueueState::Paused,
        QueueState::Stopping,
        QueueState::Pausing,
    ];

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            QueueState::Stopped => "STOPPED",
            QueueState::Processing => "PROCESSING",
            QueueState::Paused => "PAUSED",
            QueueState::Stopping => "STOPPING",
            QueueState::Pausing => "PAUSING",
        }
    }

    /// Is a deferred intent pending on an in-flight task?
    pub fn is_intent(self) -> bool {
        matches!(self, QueueState::Stopping | QueueState::Pausing)
    }

    /// Is the execution loop alive (a task may be in flight)?
    pub fn is_running(self) -> bool {
        matches!(
            self,
            QueueState::Processing | QueueState::Pausing | QueueState::Stopping
        )
    }
}

impl fmt::Display for QueueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for QueueState {
    type Error = QueueError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        QueueState::ALL
            .get(usize::from(value))
            .copied()
            .ok_or_else(|| QueueError::InvalidInput(format!("unknown queue state ordinal {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(QueueState::Stopped, 0, "STOPPED")]
    #[case(QueueState::Processing, 1, "PROCESSING")]
    #[case(QueueState::Paused, 2, "PAUSED")]
    #[case(QueueState::Stopping, 3, "STOPPING")]
    #[case(QueueState::Pausing, 4, "PAUSING")]
    fn ordinal_and_name(#[case] state: QueueState, #[case] ordinal: u8, #[case] name: &str) {
        assert_eq!(state.ordinal(), ordinal);
        assert_eq!(state.name(), name);
        assert_eq!(state.to_string(), name);
        assert_eq!(QueueState::try_from(ordinal).unwrap(), state);
    }

    #[test]
    fn unknown_ordinal_is_rejected() {
        assert!(matches!(
            QueueState::try_from(5),
            Err(QueueError::InvalidInput(_))
        ));
    }

    #[test]
    fn serializes_as_upper_case_name() {
        let json = serde_json::to_string(&QueueState::Pausing).unwrap();
        assert_eq!(json, "\"PAUSING\"");
    }

    #[test]
    fn intent_states() {
        assert!(QueueState::Pausing.is_intent());
        assert!(QueueState::Stopping.is_intent());
        assert!(!QueueState::Paused.is_intent());
        assert!(!QueueState::Paused.is_running());
        assert!(QueueState::Stopping.is_running());
    }
}

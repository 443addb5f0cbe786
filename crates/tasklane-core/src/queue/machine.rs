//! Queue state machine: backlog + lifecycle state + current task.
//!
//! Design:
//! - This is the single source of truth for the queue.
//! - Every transition is a synchronous method returning what the caller
//!   still has to do (spawn the loop, fire the end callback) once the lock
//!   is released.
//! - No async, no callbacks in here.

use std::collections::VecDeque;

use crate::domain::{QueueState, QueuedTask};
use crate::error::QueueError;

/// Result of a `process()` request.
#[derive(Debug)]
pub(crate) enum ProcessAction {
    /// Already running or tearing down.
    Noop,
    /// A pending pause was cancelled; the running loop keeps going.
    PauseCancelled,
    /// State is now Processing and the head is already dequeued as the
    /// current task; the caller must spawn the execution loop with it.
    StartLoop(QueuedTask),
    /// Started with nothing to do: state is Stopped again, fire the end callback.
    Drained,
}

/// Result of a `pause()` request.
#[derive(Debug)]
pub(crate) enum PauseAction {
    Noop,
    /// Processing -> Pausing; honoured when the in-flight task settles.
    Deferred,
    /// The queue was paused, so this acted as `process()`.
    Resume(ProcessAction),
}

/// Result of a `reset()` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResetAction {
    Noop,
    /// Paused -> Stopped; fire the end callback now.
    Stopped,
    /// A task is in flight; the loop resolves Stopping when it settles.
    Deferred,
}

/// How the execution loop resolved once it stopped dequeuing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Settled {
    /// Backlog empty: Stopped, fire the end callback.
    Drained,
    /// Pausing honoured: Paused.
    Paused,
    /// Stopping honoured with tasks added after the reset still queued.
    /// Auto start: back to Processing, keep looping.
    Restarted,
    /// Same, without auto start: Stopped, backlog kept for an explicit process().
    StoppedWithBacklog,
}

/// Next thing the execution loop does.
#[derive(Debug)]
pub(crate) enum Step {
    Run(QueuedTask),
    Settle(Settled),
}

#[derive(Debug)]
pub(crate) struct QueueCore {
    backlog: VecDeque<QueuedTask>,
    state: QueueState,
    current: Option<QueuedTask>,
    auto_start: bool,
}

impl QueueCore {
    pub(crate) fn new(auto_start: bool) -> Self {
        Self {
            backlog: VecDeque::new(),
            state: QueueState::Stopped,
            current: None,
            auto_start,
        }
    }

    pub(crate) fn state(&self) -> QueueState {
        self.state
    }

    pub(crate) fn auto_start(&self) -> bool {
        self.auto_start
    }

    pub(crate) fn len(&self) -> usize {
        self.backlog.len()
    }

    pub(crate) fn current(&self) -> Option<&QueuedTask> {
        self.current.as_ref()
    }

    /// Append to the tail. Returns whether `process()` should follow.
    ///
    /// Adding work never cancels a pause, requested or honoured.
    pub(crate) fn push(&mut self, task: QueuedTask) -> bool {
        self.backlog.push_back(task);
        self.auto_start && !matches!(self.state, QueueState::Paused | QueueState::Pausing)
    }

    pub(crate) fn request_process(&mut self) -> ProcessAction {
        match self.state {
            QueueState::Processing | QueueState::Stopping => ProcessAction::Noop,
            QueueState::Pausing => {
                self.state = QueueState::Processing;
                ProcessAction::PauseCancelled
            }
            QueueState::Paused | QueueState::Stopped => match self.backlog.pop_front() {
                // dequeue now: a pause/reset issued before the loop gets
                // scheduled must find this task already in flight
                Some(first) => {
                    self.state = QueueState::Processing;
                    self.current = Some(first.clone());
                    ProcessAction::StartLoop(first)
                }
                None => {
                    // the loop would exit straight away; resolve it here
                    self.state = QueueState::Stopped;
                    ProcessAction::Drained
                }
            },
        }
    }

    pub(crate) fn request_pause(&mut self) -> PauseAction {
        match self.state {
            QueueState::Processing => {
                self.state = QueueState::Pausing;
                PauseAction::Deferred
            }
            QueueState::Paused => PauseAction::Resume(self.request_process()),
            QueueState::Pausing | QueueState::Stopping | QueueState::Stopped => PauseAction::Noop,
        }
    }

    /// Drop every queued descriptor, then resolve the stop request.
    /// Returns the action and how many descriptors were dropped.
    pub(crate) fn reset(&mut self) -> (ResetAction, usize) {
        let dropped = self.backlog.len();
        self.backlog.clear();

        let action = match self.state {
            QueueState::Stopped => ResetAction::Noop,
            QueueState::Paused => {
                self.state = QueueState::Stopped;
                ResetAction::Stopped
            }
            QueueState::Processing | QueueState::Pausing | QueueState::Stopping => {
                self.state = QueueState::Stopping;
                ResetAction::Deferred
            }
        };
        (action, dropped)
    }

    /// Called by the loop after the previous task settled (or on entry).
    ///
    /// Dequeues the head while Processing; otherwise resolves the post-loop state.
    pub(crate) fn advance(&mut self) -> Result<Step, QueueError> {
        self.current = None;

        if self.state == QueueState::Processing
            && let Some(next) = self.backlog.pop_front()
        {
            self.current = Some(next.clone());
            return Ok(Step::Run(next));
        }

        self.settle().map(Step::Settle)
    }

    /// Clear the in-flight slot without advancing (aborting the loop).
    pub(crate) fn abandon_current(&mut self) {
        self.current = None;
    }

    fn settle(&mut self) -> Result<Settled, QueueError> {
        if self.backlog.is_empty() {
            self.state = QueueState::Stopped;
            return Ok(Settled::Drained);
        }

        match self.state {
            QueueState::Pausing => {
                self.state = QueueState::Paused;
                Ok(Settled::Paused)
            }
            // reset cleared the backlog, so these were added after it
            QueueState::Stopping if self.auto_start => {
                self.state = QueueState::Processing;
                Ok(Settled::Restarted)
            }
            QueueState::Stopping => {
                self.state = QueueState::Stopped;
                Ok(Settled::StoppedWithBacklog)
            }
            state => Err(QueueError::Invariant {
                state,
                backlog: self.backlog.len(),
            }),
        }
    }

    #[cfg(test)]
    pub(crate) fn force_state(&mut self, state: QueueState) {
        self.state = state;
    }
}

//! Execution loop: run one task, await it, then dequeue the next until the
//! backlog drains or a deferred intent (pausing/stopping) is observed.

use std::sync::Arc;

use super::controller::Shared;
use super::machine::{QueueCore, Settled, Step};
use crate::domain::QueuedTask;
use crate::error::QueueError;

/// Drive the queue until it settles, starting with `first`.
///
/// Only spawned by `process()` from Stopped/Paused, which already moved
/// `first` out of the backlog, so at most one instance runs per queue. The
/// core lock is never held across the task await; calls to `add`, `pause`,
/// `process` or `reset` made meanwhile (from the task body included) are
/// observed at the next `advance`.
pub(crate) async fn drain(shared: Arc<Shared>, first: QueuedTask) -> Result<(), QueueError> {
    tracing::info!(backlog = shared.with_core(|core| core.len()), "execution loop started");

    let mut step = Step::Run(first);
    loop {
        match step {
            Step::Run(queued) => {
                let task_id = queued.id;
                tracing::debug!(%task_id, "task started");

                // ここだけが suspend point
                let result = queued.task.operation().run().await;

                match result {
                    Ok(()) => tracing::debug!(%task_id, "task finished"),
                    Err(source) if queued.task.ignores_failure() => {
                        tracing::warn!(%task_id, error = %source, "task failed, failure ignored");
                    }
                    Err(source) => {
                        // the queue keeps its running state: no recovery, no end callback
                        shared.with_core(QueueCore::abandon_current);
                        tracing::error!(%task_id, error = %source, "task failed, execution loop aborted");
                        return Err(QueueError::TaskFailed { task_id, source });
                    }
                }
            }
            Step::Settle(Settled::Drained) => {
                tracing::info!("backlog drained");
                shared.fire_end();
                return Ok(());
            }
            Step::Settle(Settled::Paused) => {
                tracing::info!("execution loop paused");
                return Ok(());
            }
            Step::Settle(Settled::Restarted) => {
                tracing::warn!("tasks were added while stopping, continuing with them");
            }
            Step::Settle(Settled::StoppedWithBacklog) => {
                tracing::warn!("stopped with tasks added after reset still queued");
                return Ok(());
            }
        }

        step = shared.with_core(QueueCore::advance).inspect_err(|err| {
            tracing::error!(error = %err, "execution loop settled into an invalid state");
        })?;
    }
}

//! TaskQueue - single-flight FIFO controller.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::Instrument;

use super::builder::QueueBuilder;
use super::machine::{PauseAction, ProcessAction, QueueCore, ResetAction};
use super::runner;
use crate::config::QueueConfig;
use crate::domain::{IntoTask, QueueState, QueuedTask};
use crate::error::QueueError;
use crate::observability::QueueSnapshot;
use crate::ports::{Clock, IdGenerator};

pub(crate) type EndCallback = Arc<dyn Fn() + Send + Sync>;

/// Every critical section leaves the guarded value consistent, so a panic
/// elsewhere never invalidates it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between the controller handles and the execution loop.
pub(crate) struct Shared {
    core: Mutex<QueueCore>,
    on_end: Mutex<EndCallback>,
    state_tx: watch::Sender<QueueState>,
    run: Mutex<Option<JoinHandle<Result<(), QueueError>>>>,
    runtime: Handle,
    ids: Box<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl Shared {
    pub(crate) fn new(
        config: QueueConfig,
        runtime: Handle,
        ids: Box<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
        on_end: EndCallback,
    ) -> Self {
        let (state_tx, _) = watch::channel(QueueState::Stopped);
        Self {
            core: Mutex::new(QueueCore::new(config.auto_start)),
            on_end: Mutex::new(on_end),
            state_tx,
            run: Mutex::new(None),
            runtime,
            ids,
            clock,
        }
    }

    /// Run `f` under the core lock and publish the resulting state.
    pub(crate) fn with_core<R>(&self, f: impl FnOnce(&mut QueueCore) -> R) -> R {
        let mut core = lock(&self.core);
        let out = f(&mut core);
        let state = core.state();
        self.state_tx.send_if_modified(|published| {
            if *published == state {
                return false;
            }
            tracing::debug!(from = %published, to = %state, "queue state changed");
            *published = state;
            true
        });
        out
    }

    /// Invoke the end callback outside every lock, so it may call back into the queue.
    pub(crate) fn fire_end(&self) {
        let callback = lock(&self.on_end).clone();
        callback();
    }

    fn apply_process(self: &Arc<Self>, action: ProcessAction) {
        match action {
            ProcessAction::Noop => {}
            ProcessAction::PauseCancelled => tracing::debug!("pending pause cancelled"),
            ProcessAction::StartLoop(first) => self.spawn_loop(first),
            ProcessAction::Drained => {
                tracing::debug!("process requested on an empty backlog");
                self.fire_end();
            }
        }
    }

    fn spawn_loop(self: &Arc<Self>, first: QueuedTask) {
        let run_id = self.ids.generate_run_id();
        let span = tracing::info_span!("drain", %run_id);
        // hold the slot while spawning so a faster follow-up run cannot be overwritten
        let mut slot = lock(&self.run);
        let handle = self
            .runtime
            .spawn(runner::drain(Arc::clone(self), first).instrument(span));
        *slot = Some(handle);
    }
}

/// Sequential task runner: at most one task in flight, FIFO order,
/// cooperative pause/resume and stop/reset.
///
/// Cloning yields another handle to the same queue, so task bodies can
/// capture it and enqueue follow-up work.
///
/// # 使用例
/// ```ignore
/// let queue = TaskQueue::new(QueueConfig::default())?;
/// queue
///     .on_end(|| println!("drained"))
///     .add(|| async { fetch_one().await })?
///     .add(TaskSpec::new(|| async { flaky().await }, json!({ "ignoreFailure": true })))?;
/// queue.join().await?;
/// ```
#[derive(Clone)]
pub struct TaskQueue {
    shared: Arc<Shared>,
}

impl TaskQueue {
    /// Build a queue driven by the current tokio runtime.
    pub fn new(config: QueueConfig) -> Result<Self, QueueError> {
        QueueBuilder::new().config(config).build()
    }

    pub fn builder() -> QueueBuilder {
        QueueBuilder::new()
    }

    pub(crate) fn from_shared(shared: Shared) -> Self {
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Replace the callback fired when the backlog drains (or a paused queue is reset).
    pub fn on_end<F>(&self, callback: F) -> &Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        *lock(&self.shared.on_end) = Arc::new(callback);
        self
    }

    /// Append a task to the backlog; starts processing under auto start
    /// unless the queue is paused.
    pub fn add<T: IntoTask>(&self, item: T) -> Result<&Self, QueueError> {
        let task = item.into_task()?;
        let queued = QueuedTask::new(self.shared.ids.generate_task_id(), task);
        let task_id = queued.id;

        let should_process = self.shared.with_core(|core| core.push(queued));
        tracing::debug!(%task_id, "task queued");

        if should_process {
            self.process();
        }
        Ok(self)
    }

    /// Start, or resume, processing. Cancels a pending pause.
    pub fn process(&self) {
        let action = self.shared.with_core(QueueCore::request_process);
        self.shared.apply_process(action);
    }

    /// Pause after the in-flight task settles; resumes a paused queue.
    pub fn pause(&self) {
        match self.shared.with_core(QueueCore::request_pause) {
            PauseAction::Noop => {}
            PauseAction::Deferred => tracing::debug!("pause deferred until the current task settles"),
            PauseAction::Resume(action) => self.shared.apply_process(action),
        }
    }

    /// Drop every queued task and stop. The in-flight task, if any, still runs
    /// to completion.
    pub fn reset(&self) {
        let (action, dropped) = self.shared.with_core(QueueCore::reset);
        tracing::debug!(dropped, "backlog cleared");

        match action {
            ResetAction::Noop => {}
            ResetAction::Stopped => self.shared.fire_end(),
            ResetAction::Deferred => tracing::debug!("stop deferred until the current task settles"),
        }
    }

    /// The descriptor currently executing, if any.
    pub fn current_task(&self) -> Option<QueuedTask> {
        lock(&self.shared.core).current().cloned()
    }

    pub fn auto_start(&self) -> bool {
        lock(&self.shared.core).auto_start()
    }

    /// Number of queued, not yet started descriptors.
    pub fn size(&self) -> usize {
        lock(&self.shared.core).len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn state(&self) -> QueueState {
        lock(&self.shared.core).state()
    }

    pub fn state_name(&self) -> &'static str {
        self.state().name()
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        let captured_at = self.shared.clock.now();
        let core = lock(&self.shared.core);
        QueueSnapshot::new(
            core.state(),
            core.len(),
            core.current().map(|t| t.id),
            core.auto_start(),
            captured_at,
        )
    }

    /// Watch state changes. Slow receivers may skip intermediate states.
    pub fn subscribe(&self) -> watch::Receiver<QueueState> {
        self.shared.state_tx.subscribe()
    }

    /// Wait for the most recently started execution loop to exit and return
    /// its outcome. Returns immediately when no loop was started since the
    /// last `join`.
    pub async fn join(&self) -> Result<(), QueueError> {
        let handle = lock(&self.shared.run).take();
        let Some(handle) = handle else {
            return Ok(());
        };

        match handle.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => {
                let payload = e.into_panic();
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(QueueError::Panicked(message))
            }
            Err(e) => Err(QueueError::Panicked(e.to_string())),
        }
    }
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let core = lock(&self.shared.core);
        f.debug_struct("TaskQueue")
            .field("state", &core.state())
            .field("backlog", &core.len())
            .field("auto_start", &core.auto_start())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Task, TaskError, TaskSpec};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn noop() -> impl Fn() -> std::future::Ready<Result<(), TaskError>> + Send + Sync + 'static {
        || std::future::ready(Ok(()))
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        (count, move || {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test]
    async fn manual_queue_waits_for_process() {
        let queue = TaskQueue::new(QueueConfig::new(false)).unwrap();
        queue.add(noop()).unwrap().add(noop()).unwrap();

        assert_eq!(queue.state(), QueueState::Stopped);
        assert_eq!(queue.size(), 2);
        assert!(queue.current_task().is_none());

        queue.process();
        // the head is in flight before the loop is even scheduled
        assert_eq!(queue.state(), QueueState::Processing);
        assert_eq!(queue.size(), 1);
        assert!(queue.current_task().is_some());

        queue.join().await.unwrap();
        assert_eq!(queue.state(), QueueState::Stopped);
        assert!(queue.is_empty());
        assert!(queue.current_task().is_none());
    }

    #[tokio::test]
    async fn malformed_spec_leaves_queue_untouched() {
        let queue = TaskQueue::new(QueueConfig::default()).unwrap();
        let err = queue
            .add(TaskSpec::new(noop(), json!("ignore")))
            .unwrap_err();

        assert!(matches!(err, QueueError::InvalidInput(_)));
        assert_eq!(queue.size(), 0);
        assert_eq!(queue.state(), QueueState::Stopped);
    }

    #[tokio::test]
    async fn on_end_replaces_previous_callback() {
        let queue = TaskQueue::new(QueueConfig::default()).unwrap();
        let (first, first_cb) = counter();
        let (second, second_cb) = counter();

        queue.on_end(first_cb).on_end(second_cb);
        queue.add(Task::new(noop())).unwrap();
        queue.join().await.unwrap();

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn process_on_empty_queue_fires_end_synchronously() {
        let queue = TaskQueue::new(QueueConfig::new(false)).unwrap();
        let (ends, cb) = counter();
        queue.on_end(cb);

        queue.process();

        assert_eq!(ends.load(Ordering::SeqCst), 1);
        assert_eq!(queue.state(), QueueState::Stopped);
        queue.join().await.unwrap();
    }

    #[tokio::test]
    async fn reset_on_stopped_queue_only_clears() {
        let queue = TaskQueue::new(QueueConfig::new(false)).unwrap();
        let (ends, cb) = counter();
        queue.on_end(cb);
        queue.add(noop()).unwrap();

        queue.reset();

        assert_eq!(queue.size(), 0);
        assert_eq!(queue.state(), QueueState::Stopped);
        assert_eq!(ends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn subscribers_observe_state_changes() {
        let queue = TaskQueue::new(QueueConfig::new(false)).unwrap();
        let mut rx = queue.subscribe();
        assert_eq!(*rx.borrow(), QueueState::Stopped);

        queue.add(noop()).unwrap();
        queue.process();
        assert_eq!(*rx.borrow_and_update(), QueueState::Processing);

        queue.join().await.unwrap();
        rx.wait_for(|s| *s == QueueState::Stopped).await.unwrap();
    }

    #[tokio::test]
    async fn debug_output_summarises_queue() {
        let queue = TaskQueue::new(QueueConfig::new(false)).unwrap();
        queue.add(noop()).unwrap();
        let rendered = format!("{queue:?}");
        assert!(rendered.contains("Stopped"));
        assert!(rendered.contains("backlog: 1"));
    }
}

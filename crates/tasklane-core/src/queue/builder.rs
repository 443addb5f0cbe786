//! QueueBuilder - queue の構築とワイヤリング
//!
//! Fail-fast: `build()` checks that a tokio runtime can drive the execution
//! loop, instead of failing later on the first `process()`.

use std::sync::Arc;

use tokio::runtime::Handle;

use super::controller::{EndCallback, Shared, TaskQueue};
use crate::config::QueueConfig;
use crate::error::QueueError;
use crate::ports::{Clock, IdGenerator, SystemClock, UlidGenerator};

/// Builder for [`TaskQueue`].
///
/// ```ignore
/// let queue = TaskQueue::builder()
///     .auto_start(false)
///     .on_end(|| tracing::info!("all done"))
///     .build()?;
/// ```
pub struct QueueBuilder {
    config: QueueConfig,
    runtime: Option<Handle>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Box<dyn IdGenerator>>,
    on_end: Option<EndCallback>,
}

impl QueueBuilder {
    pub fn new() -> Self {
        Self {
            config: QueueConfig::default(),
            runtime: None,
            clock: None,
            ids: None,
            on_end: None,
        }
    }

    pub fn config(mut self, config: QueueConfig) -> Self {
        self.config = config;
        self
    }

    pub fn auto_start(mut self, auto_start: bool) -> Self {
        self.config.auto_start = auto_start;
        self
    }

    /// Runtime that executes the loop. Defaults to the runtime `build()` is called from.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Clock used for snapshots and, unless an id generator is given, for ids.
    pub fn clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    pub fn id_generator<G: IdGenerator + 'static>(mut self, ids: G) -> Self {
        self.ids = Some(Box::new(ids));
        self
    }

    pub fn on_end<F>(mut self, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_end = Some(Arc::new(callback));
        self
    }

    pub fn build(self) -> Result<TaskQueue, QueueError> {
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|_| QueueError::NoRuntime)?,
        };
        let clock: Arc<dyn Clock> = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids = self
            .ids
            .unwrap_or_else(|| Box::new(UlidGenerator::new(Arc::clone(&clock))));
        let on_end = self.on_end.unwrap_or_else(|| Arc::new(|| {}));

        tracing::debug!(auto_start = self.config.auto_start, "task queue built");
        Ok(TaskQueue::from_shared(Shared::new(
            self.config,
            runtime,
            ids,
            clock,
            on_end,
        )))
    }
}

impl Default for QueueBuilder {
    fn default() -> Self {
        Self::new()
    }
}

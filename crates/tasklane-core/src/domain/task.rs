//! Task descriptor - 1 件の作業単位
//!
//! A descriptor is an async operation plus a failure policy. It carries no
//! execution logic; the queue decides when it runs.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::ids::TaskId;
use crate::error::QueueError;

/// Error type returned by task bodies.
pub type TaskError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The unit of work behind a descriptor.
///
/// Closures `Fn() -> impl Future<Output = Result<(), TaskError>>` implement
/// this automatically; implement it by hand for stateful operations.
///
/// ```ignore
/// struct Fetch { url: String }
///
/// #[async_trait]
/// impl Operation for Fetch {
///     async fn run(&self) -> Result<(), TaskError> {
///         client.get(&self.url).await?;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Operation: Send + Sync {
    async fn run(&self) -> Result<(), TaskError>;
}

#[async_trait]
impl<F, Fut> Operation for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    async fn run(&self) -> Result<(), TaskError> {
        (self)().await
    }
}

/// Per-task configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOptions {
    /// Swallow a failure of this task instead of aborting the execution loop.
    #[serde(default, alias = "ignoreFailure")]
    pub ignore_failure: bool,
}

impl TaskOptions {
    /// Read options from a JSON configuration object.
    ///
    /// A non-boolean `ignoreFailure` leaves the default in place; anything
    /// other than an object is rejected.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, QueueError> {
        let serde_json::Value::Object(map) = value else {
            return Err(QueueError::InvalidInput(format!(
                "task configuration should be an object, got {}",
                json_kind(value)
            )));
        };

        let mut options = TaskOptions::default();
        let flag = map.get("ignoreFailure").or_else(|| map.get("ignore_failure"));
        match flag {
            Some(serde_json::Value::Bool(b)) => options.ignore_failure = *b,
            Some(other) => {
                tracing::debug!(value = %other, "ignoring non-boolean ignoreFailure");
            }
            None => {}
        }
        Ok(options)
    }
}

/// Immutable descriptor of one queued unit of work.
#[derive(Clone)]
pub struct Task {
    operation: Arc<dyn Operation>,
    ignore_failure: bool,
}

impl Task {
    pub fn new<O: Operation + 'static>(operation: O) -> Self {
        Self {
            operation: Arc::new(operation),
            ignore_failure: false,
        }
    }

    /// Build a descriptor from an already shared operation.
    pub fn from_shared(operation: Arc<dyn Operation>) -> Self {
        Self {
            operation,
            ignore_failure: false,
        }
    }

    /// Copy another descriptor's operation and failure policy verbatim.
    pub fn copy_from(other: &Task) -> Self {
        Self {
            operation: Arc::clone(&other.operation),
            ignore_failure: other.ignore_failure,
        }
    }

    pub fn with_options(mut self, options: TaskOptions) -> Self {
        self.ignore_failure = options.ignore_failure;
        self
    }

    pub fn ignore_failure(self, ignore: bool) -> Self {
        self.with_options(TaskOptions {
            ignore_failure: ignore,
        })
    }

    pub fn ignores_failure(&self) -> bool {
        self.ignore_failure
    }

    pub fn options(&self) -> TaskOptions {
        TaskOptions {
            ignore_failure: self.ignore_failure,
        }
    }

    pub fn operation(&self) -> &Arc<dyn Operation> {
        &self.operation
    }

    /// Do both descriptors share the same operation?
    pub fn same_operation(&self, other: &Task) -> bool {
        Arc::ptr_eq(&self.operation, &other.operation)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("ignore_failure", &self.ignore_failure)
            .finish_non_exhaustive()
    }
}

/// An operation plus a loosely-typed configuration object.
///
/// The configuration is validated when the spec is turned into a [`Task`].
pub struct TaskSpec {
    operation: Arc<dyn Operation>,
    config: serde_json::Value,
}

impl TaskSpec {
    pub fn new<O: Operation + 'static>(operation: O, config: serde_json::Value) -> Self {
        Self {
            operation: Arc::new(operation),
            config,
        }
    }
}

/// Anything `TaskQueue::add` accepts.
pub trait IntoTask {
    fn into_task(self) -> Result<Task, QueueError>;
}

impl IntoTask for Task {
    fn into_task(self) -> Result<Task, QueueError> {
        Ok(self)
    }
}

impl IntoTask for TaskSpec {
    fn into_task(self) -> Result<Task, QueueError> {
        let options = TaskOptions::from_value(&self.config)?;
        Ok(Task::from_shared(self.operation).with_options(options))
    }
}

impl<F, Fut> IntoTask for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    fn into_task(self) -> Result<Task, QueueError> {
        Ok(Task::new(self))
    }
}

/// A descriptor that has entered the backlog.
#[derive(Debug, Clone)]
pub struct QueuedTask {
    pub id: TaskId,
    pub task: Task,
}

impl QueuedTask {
    pub fn new(id: TaskId, task: Task) -> Self {
        Self { id, task }
    }
}

pub(crate) fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ok_op() -> impl Fn() -> std::future::Ready<Result<(), TaskError>> + Send + Sync + 'static {
        || std::future::ready(Ok(()))
    }

    #[test]
    fn bare_callable_defaults_to_propagating_failures() {
        let task = ok_op().into_task().unwrap();
        assert!(!task.ignores_failure());
    }

    #[rstest]
    #[case::camel(json!({ "ignoreFailure": true }), true)]
    #[case::snake(json!({ "ignore_failure": true }), true)]
    #[case::explicit_false(json!({ "ignoreFailure": false }), false)]
    #[case::missing(json!({}), false)]
    #[case::not_a_bool(json!({ "ignoreFailure": "yes" }), false)]
    fn spec_reads_ignore_failure(#[case] config: serde_json::Value, #[case] expected: bool) {
        let task = TaskSpec::new(ok_op(), config).into_task().unwrap();
        assert_eq!(task.ignores_failure(), expected);
    }

    #[rstest]
    #[case::null(json!(null))]
    #[case::number(json!(3))]
    #[case::array(json!([true]))]
    fn spec_rejects_non_object_config(#[case] config: serde_json::Value) {
        let err = TaskSpec::new(ok_op(), config).into_task().unwrap_err();
        assert!(matches!(err, QueueError::InvalidInput(_)));
    }

    #[test]
    fn copy_from_keeps_operation_and_policy() {
        let original = Task::new(ok_op()).ignore_failure(true);
        let copy = Task::copy_from(&original);

        assert!(copy.ignores_failure());
        assert!(copy.same_operation(&original));
    }

    #[tokio::test]
    async fn closure_operation_runs_on_each_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let task = Task::new(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<(), TaskError>(())
            }
        });

        task.operation().run().await.unwrap();
        task.operation().run().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    struct Failing;

    #[async_trait]
    impl Operation for Failing {
        async fn run(&self) -> Result<(), TaskError> {
            Err("boom".into())
        }
    }

    #[tokio::test]
    async fn struct_operation_reports_failure() {
        let task = Task::new(Failing);
        let err = task.operation().run().await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}

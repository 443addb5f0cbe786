//! tasklane-core
//!
//! Sequential FIFO task runner with cooperative pause/resume and stop/reset.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task descriptor, queue state）
//! - **ports**: 抽象化レイヤー（Clock, IdGenerator）
//! - **queue**: state machine + execution loop + `TaskQueue`
//! - **config**: `QueueConfig` とその読み込み
//! - **observability**: `QueueSnapshot`
//! - **error**: `QueueError`

pub mod config;
pub mod domain;
pub mod error;
pub mod observability;
pub mod ports;
pub mod queue;

pub use config::QueueConfig;
pub use domain::{
    IntoTask, Operation, QueueState, QueuedTask, RunId, Task, TaskError, TaskId, TaskOptions,
    TaskSpec,
};
pub use error::QueueError;
pub use observability::QueueSnapshot;
pub use queue::{QueueBuilder, TaskQueue};

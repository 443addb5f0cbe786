use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::{Duration, sleep};
use tracing_subscriber::EnvFilter;

use tasklane_core::{Operation, QueueConfig, QueueError, Task, TaskError, TaskQueue, TaskSpec};

/// Simulated I/O call: waits `latency`, fails the first `failures` times.
struct FakeFetch {
    name: &'static str,
    latency: Duration,
    remaining_failures: AtomicU32,
}

impl FakeFetch {
    fn new(name: &'static str, latency_ms: u64, failures: u32) -> Self {
        Self {
            name,
            latency: Duration::from_millis(latency_ms),
            remaining_failures: AtomicU32::new(failures),
        }
    }
}

#[async_trait]
impl Operation for FakeFetch {
    async fn run(&self) -> Result<(), TaskError> {
        sleep(self.latency).await;

        let left = self.remaining_failures.load(Ordering::Relaxed);
        if left > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(format!("{}: intentional failure (left={left})", self.name).into());
        }

        println!("fetched {}", self.name);
        Ok(())
    }
}

/// 設定の読み込み: 引数のファイル > 環境変数 > デフォルト
fn load_config() -> Result<QueueConfig, QueueError> {
    match std::env::args().nth(1) {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .map_err(|e| QueueError::InvalidConfig(format!("{path}: {e}")))?;
            QueueConfig::from_json_str(&raw)
        }
        None => QueueConfig::from_env(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // (A) queue を用意
    let config = load_config()?;
    let queue = TaskQueue::new(config)?;

    let drained = Arc::new(Notify::new());
    let signal = Arc::clone(&drained);
    queue.on_end(move || signal.notify_one());

    // (B) タスク投入（1 件は失敗するが ignoreFailure）
    queue
        .add(Task::new(FakeFetch::new("users", 120, 0)))?
        .add(TaskSpec::new(
            FakeFetch::new("flaky", 40, 1),
            serde_json::json!({ "ignoreFailure": true }),
        ))?
        .add(Task::new(FakeFetch::new("orders", 80, 0)))?;

    // (C) pause: 実行中のタスクが終わるまで待ってから Paused になる
    queue.pause();
    tracing::info!(state = %queue.state(), "requested pause");
    if !queue.auto_start() {
        // manual queues are idle until told otherwise
        queue.process();
    }
    queue.join().await?;
    tracing::info!(state = queue.state_name(), backlog = queue.size(), "first run settled");

    queue.add(|| async {
        println!("late task");
        Ok::<(), TaskError>(())
    })?;
    queue.process();

    // (D) end callback を待つ
    drained.notified().await;
    queue.join().await?;

    println!("{}", serde_json::to_string_pretty(&queue.snapshot())?);
    Ok(())
}

//! 定期実行スケジューラー
//!
//! 登録したタスクごとにループを1つ起動し、tickごとにロックを試みて実行する。
//! 前回の実行が終わっていなければスキップ（警告ログ）

pub mod lock;

pub use lock::{TaskLock, TaskLockGuard};

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::TrackerConfig;
use crate::tasks::{TaskContext, TaskKind};

pub type TaskFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
pub type TaskHandler = Arc<dyn Fn() -> TaskFuture + Send + Sync>;

struct ScheduledTask {
    name: String,
    interval: Duration,
    lock: Arc<TaskLock>,
    handler: TaskHandler,
}

impl ScheduledTask {
    /// tickごとにロックを試み、取れれば別タスクで実行する
    async fn run_loop(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut runs = JoinSet::new();

        loop {
            tokio::select! {
                _ = ticker.tick() => self.dispatch(&mut runs),
                Some(result) = runs.join_next(), if !runs.is_empty() => {
                    if let Err(e) = result {
                        tracing::error!("❌ [{}] Task run aborted: {}", self.name, e);
                    }
                }
                _ = shutdown.changed() => break,
            }
        }

        if !runs.is_empty() {
            tracing::info!("⏳ [{}] Waiting for the running task to finish", self.name);
        }
        while runs.join_next().await.is_some() {}
        tracing::debug!("[{}] Loop stopped", self.name);
    }

    fn dispatch(&self, runs: &mut JoinSet<()>) {
        let Some(guard) = self.lock.try_guard() else {
            tracing::warn!("⏭️ [{}] Previous run still in progress, skipping", self.name);
            return;
        };

        let handler = Arc::clone(&self.handler);
        let name = self.name.clone();
        let span = tracing::info_span!("run", task = %self.name, run_id = %Uuid::new_v4());
        runs.spawn(
            async move {
                let _guard = guard;
                let started = Instant::now();
                handler().await;
                tracing::debug!("[{}] Run finished in {:?}", name, started.elapsed());
            }
            .instrument(span),
        );
    }
}

/// タイマー駆動のスケジューラー
pub struct Scheduler {
    lock_max_retries: u32,
    tasks: Vec<ScheduledTask>,
}

impl Scheduler {
    pub fn new(lock_max_retries: u32) -> Self {
        Self {
            lock_max_retries,
            tasks: Vec::new(),
        }
    }

    /// タスクを登録（タスクごとに専用のロック）
    pub fn register<F, Fut>(&mut self, name: impl Into<String>, interval: Duration, handler: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        tracing::info!("🗓️ Registered task '{}' every {:?}", name, interval);
        self.tasks.push(ScheduledTask {
            name,
            interval,
            lock: Arc::new(TaskLock::new(self.lock_max_retries)),
            handler: Arc::new(move || Box::pin(handler()) as TaskFuture),
        });
    }

    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.name.as_str()).collect()
    }

    /// `shutdown`が完了するまで全タスクを回す。実行中のタスクは最後まで待つ
    pub async fn run_until<S>(self, shutdown: S)
    where
        S: Future<Output = ()>,
    {
        let (stop_tx, stop_rx) = watch::channel(false);
        let loops: Vec<_> = self
            .tasks
            .into_iter()
            .map(|task| tokio::spawn(task.run_loop(stop_rx.clone())))
            .collect();

        shutdown.await;
        tracing::info!("🛑 Shutdown requested, stopping {} task loops", loops.len());
        let _ = stop_tx.send(true);

        for handle in loops {
            if let Err(e) = handle.await {
                tracing::error!("❌ Task loop ended abnormally: {}", e);
            }
        }
    }
}

/// ハートビート・発見・チャンネル統計を設定の間隔で登録したスケジューラー
pub fn tracker_scheduler(ctx: Arc<TaskContext>, config: &TrackerConfig) -> Scheduler {
    let mut scheduler = Scheduler::new(config.scheduler.lock_max_retries);
    let intervals = [
        (TaskKind::Heartbeat, config.intervals.heartbeat_secs),
        (TaskKind::Discovery, config.intervals.discovery_secs),
        (TaskKind::ChannelStats, config.intervals.channel_stats_secs),
    ];

    for (kind, secs) in intervals {
        let ctx = Arc::clone(&ctx);
        scheduler.register(kind.as_str(), Duration::from_secs(secs), move || {
            let ctx = Arc::clone(&ctx);
            async move {
                let summary = ctx.run(kind).await;
                tracing::info!("✅ {} cycle done: {}", kind, summary);
            }
        });
    }

    scheduler
}

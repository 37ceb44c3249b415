//! 定期タスクのハンドラー
//!
//! 取得 → アダプターで正規化 → エンジンで突き合わせ → レジストリへ反映、の流れは
//! 全プラットフォーム共通。DBのロックはawaitをまたいで保持しない

pub mod channel_stats;
pub mod commit;
pub mod discovery;
pub mod heartbeat;

pub use channel_stats::run_channel_stats;
pub use commit::{commit_heartbeat, CommitReport};
pub use discovery::run_discovery;
pub use heartbeat::run_heartbeat;

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::api::{staggered, FetchError};
use crate::config::TrackerConfig;
use crate::database::{ChannelRegistry, RecordFilter, TrackerDatabase};
use crate::engine::{LiveObservation, ObservedState, ReconcilePolicy};
use crate::error::TrackerResult;
use crate::models::{Channel, Platform, TrackedChannel};
use crate::platforms::PlatformHandle;

/// 定期タスクの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum TaskKind {
    Heartbeat,
    Discovery,
    ChannelStats,
}

impl TaskKind {
    pub const ALL: [TaskKind; 3] = [TaskKind::Heartbeat, TaskKind::Discovery, TaskKind::ChannelStats];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Heartbeat => "heartbeat",
            TaskKind::Discovery => "discovery",
            TaskKind::ChannelStats => "channel-stats",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s || k.as_str().replace('-', "_") == s)
            .ok_or_else(|| format!("unknown task: {}", s))
    }
}

/// 1プラットフォーム分の実行結果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskSummary {
    pub inserted: usize,
    pub updated: usize,
    pub ended: usize,
    /// 取得・マッピング・書き込みに失敗した単位
    pub failed: usize,
}

impl TaskSummary {
    pub fn merge(&mut self, other: TaskSummary) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.ended += other.ended;
        self.failed += other.failed;
    }
}

impl fmt::Display for TaskSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "inserted={} updated={} ended={} failed={}",
            self.inserted, self.updated, self.ended, self.failed
        )
    }
}

/// タスクハンドラーが共有する状態
pub struct TaskContext {
    pub db: Arc<Mutex<TrackerDatabase>>,
    pub platforms: Vec<PlatformHandle>,
    pub channels: Vec<TrackedChannel>,
    pub policy: ReconcilePolicy,
    /// ファンアウト時の開始間隔
    pub pacing: Duration,
}

impl TaskContext {
    pub fn new(
        db: Arc<Mutex<TrackerDatabase>>,
        platforms: Vec<PlatformHandle>,
        config: &TrackerConfig,
    ) -> Self {
        Self {
            db,
            platforms,
            channels: config.channels.clone(),
            policy: ReconcilePolicy::from(&config.reconcile),
            pacing: Duration::from_millis(config.scheduler.pacing_delay_ms),
        }
    }

    /// 監視対象を返す。引退フラグの立ったチャンネルは除外し、
    /// ルームIDが未設定ならチャンネル統計で得たものを補う
    pub fn tracked_channels(&self, platform: Platform) -> TrackerResult<Vec<TrackedChannel>> {
        let known: HashMap<String, Channel> = {
            let db = self.db.lock();
            db.find_channels(&RecordFilter::platform(platform))?
                .into_iter()
                .map(|c| (c.id.clone(), c))
                .collect()
        };

        Ok(self
            .channels
            .iter()
            .filter(|c| c.platform == platform)
            .filter(|c| {
                let retired = known.get(&c.id).is_some_and(|k| k.is_retired);
                if retired {
                    tracing::debug!("[{}] Skipping retired channel '{}'", platform, c.id);
                }
                !retired
            })
            .map(|c| {
                let mut channel = c.clone();
                if channel.user_id.is_none() {
                    channel.user_id = known.get(&channel.id).and_then(|k| k.user_id.clone());
                }
                channel
            })
            .collect())
    }

    /// 指定タスクを全プラットフォームで実行する。プラットフォーム単位の失敗は他に波及させない
    pub async fn run(&self, kind: TaskKind) -> TaskSummary {
        let mut total = TaskSummary::default();

        for handle in &self.platforms {
            let result = match kind {
                TaskKind::Heartbeat => run_heartbeat(self, handle).await,
                TaskKind::Discovery => run_discovery(self, handle).await,
                TaskKind::ChannelStats => run_channel_stats(self, handle).await,
            };

            match result {
                Ok(summary) => {
                    tracing::debug!("[{}] {} finished: {}", handle.platform(), kind, summary);
                    total.merge(summary);
                }
                Err(e) => {
                    tracing::error!("❌ [{}] {} failed: {}", handle.platform(), kind, e);
                    total.failed += 1;
                }
            }
        }

        total
    }
}

/// 取得失敗をログに残す。レート制限ならキーを強制ローテーション
pub(crate) fn report_fetch_failure(handle: &PlatformHandle, unit: &str, error: &FetchError) {
    let platform = handle.platform();
    if error.is_rate_limit() {
        let rotated = handle
            .client
            .key_rotator()
            .is_some_and(|rotator| rotator.force_rotate());
        tracing::warn!(
            "⚠️ [{}] Rate limited on '{}' (key rotated: {})",
            platform,
            unit,
            rotated
        );
    } else {
        tracing::error!("❌ [{}] Fetch failed for '{}': {}", platform, unit, error);
    }
}

/// メンバー限定が未判定のライブを調べて観測値に書き込む
pub(crate) async fn probe_memberships(
    handle: &PlatformHandle,
    observations: &mut [LiveObservation],
    already_known: impl Fn(&str) -> bool,
    pacing: Duration,
) {
    if !handle.adapter.capabilities().detects_membership {
        return;
    }

    let candidates: Vec<LiveObservation> = observations
        .iter()
        .filter(|o| {
            o.state == ObservedState::Live && o.is_member.is_none() && !already_known(&o.id)
        })
        .cloned()
        .collect();
    if candidates.is_empty() {
        return;
    }

    let client = handle.client.as_ref();
    let results = staggered(candidates, pacing, |observation| async move {
        let result = client.probe_membership(&observation).await;
        (observation.id, result)
    })
    .await;

    let mut resolved = HashMap::new();
    for (id, result) in results {
        match result {
            Ok(Some(is_member)) => {
                if is_member {
                    tracing::info!("🔒 [{}] '{}' is members-only", handle.platform(), id);
                }
                resolved.insert(id, is_member);
            }
            Ok(None) => {}
            Err(e) => report_fetch_failure(handle, &id, &e),
        }
    }

    for observation in observations.iter_mut() {
        if let Some(is_member) = resolved.get(&observation.id) {
            observation.is_member = Some(*is_member);
        }
    }
}

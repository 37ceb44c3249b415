//! 突き合わせ結果のレジストリへの反映

use crate::database::{StreamRegistry, ViewerSeriesStore};
use crate::engine::HeartbeatOutcome;
use crate::models::Platform;

/// 反映結果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub inserted: usize,
    pub updated: usize,
    pub ended: usize,
    pub failed: usize,
}

/// ハートビートの結果を書き込む。失敗はレコード単位でログに残して続行
pub fn commit_heartbeat<R>(registry: &mut R, platform: Platform, outcome: &HeartbeatOutcome) -> CommitReport
where
    R: StreamRegistry + ViewerSeriesStore,
{
    let mut report = CommitReport::default();

    let mut inserts_clean = true;
    if !outcome.inserts.is_empty() {
        let written = registry.insert_streams(&outcome.inserts);
        report.inserted = written.written;
        report.failed += written.failed;
        inserts_clean = written.failed == 0;
    }

    // 置き換え先が書けなかった予定枠は残す
    if !outcome.superseded.is_empty() {
        if inserts_clean {
            match registry.delete_streams(platform, &outcome.superseded) {
                Ok(deleted) => tracing::debug!("[{}] Removed {} replaced reservations", platform, deleted),
                Err(e) => {
                    tracing::error!("❌ [{}] Failed to remove replaced reservations: {}", platform, e);
                    report.failed += 1;
                }
            }
        } else {
            tracing::warn!(
                "⚠️ [{}] Keeping {} reservations after failed inserts",
                platform,
                outcome.superseded.len()
            );
        }
    }

    for stream in &outcome.updates {
        match registry.update_stream(stream) {
            Ok(()) => report.updated += 1,
            Err(e) => {
                tracing::error!("❌ [{}] Failed to update '{}': {}", platform, stream.id, e);
                report.failed += 1;
            }
        }
    }

    for stream in &outcome.to_past {
        match registry.update_stream(stream) {
            Ok(()) => report.ended += 1,
            Err(e) => {
                tracing::error!("❌ [{}] Failed to finalize '{}': {}", platform, stream.id, e);
                report.failed += 1;
            }
        }
    }

    for append in &outcome.series_appends {
        if let Err(e) =
            registry.append_viewer_sample(platform, &append.id, &append.group, append.sample.clone())
        {
            tracing::error!("❌ [{}] Failed to append viewers for '{}': {}", platform, append.id, e);
            report.failed += 1;
        }
    }

    if !outcome.series_deletes.is_empty() {
        match registry.delete_series(platform, &outcome.series_deletes) {
            Ok(deleted) => tracing::debug!("[{}] Deleted {} viewer series", platform, deleted),
            Err(e) => {
                tracing::error!("❌ [{}] Failed to delete viewer series: {}", platform, e);
                report.failed += 1;
            }
        }
    }

    report
}

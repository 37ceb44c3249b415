//! チャンネル統計の更新

use std::collections::HashMap;

use super::{report_fetch_failure, TaskContext, TaskSummary};
use crate::api::staggered;
use crate::database::{ChannelRegistry, RecordFilter};
use crate::engine::reconcile_channel;
use crate::error::TrackerResult;
use crate::models::{now_epoch, Channel};
use crate::platforms::PlatformHandle;

/// 1プラットフォーム分のチャンネル統計
pub async fn run_channel_stats(
    ctx: &TaskContext,
    handle: &PlatformHandle,
) -> TrackerResult<TaskSummary> {
    let platform = handle.platform();
    let channels = ctx.tracked_channels(platform)?;
    let mut summary = TaskSummary::default();

    if channels.is_empty() {
        return Ok(summary);
    }

    let existing: HashMap<String, Channel> = {
        let db = ctx.db.lock();
        db.find_channels(&RecordFilter::platform(platform))?
            .into_iter()
            .map(|c| (c.id.clone(), c))
            .collect()
    };

    let client = handle.client.as_ref();
    let results = staggered(channels, ctx.pacing, |channel| async move {
        let result = client.fetch_channel_meta(&channel).await;
        (channel, result)
    })
    .await;

    let now = now_epoch();
    for (tracked, result) in results {
        let body = match result {
            Ok(body) => body,
            Err(e) => {
                report_fetch_failure(handle, &tracked.id, &e);
                summary.failed += 1;
                continue;
            }
        };
        let snapshot = match handle.adapter.map_channel(&tracked, &body) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::error!("❌ [{}] Failed to map channel '{}': {}", platform, tracked.id, e);
                summary.failed += 1;
                continue;
            }
        };

        let update = reconcile_channel(existing.get(&tracked.id), &tracked, snapshot, now);

        let mut db = ctx.db.lock();
        match db.has_stats_history(platform, &tracked.id) {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!("📊 [{}] No previous history for '{}'", platform, tracked.id)
            }
            Err(e) => tracing::warn!(
                "⚠️ [{}] Failed to check history of '{}': {}",
                platform,
                tracked.id,
                e
            ),
        }

        let stored = if update.is_new {
            db.insert_channel(&update.channel)
        } else {
            db.update_channel(&update.channel)
        };
        let written = stored.and_then(|()| {
            db.append_stats_sample(platform, &update.channel.id, &update.channel.group, &update.sample)
        });

        match written {
            Ok(()) if update.is_new => summary.inserted += 1,
            Ok(()) => summary.updated += 1,
            Err(e) => {
                tracing::error!("❌ [{}] Failed to store channel '{}': {}", platform, tracked.id, e);
                summary.failed += 1;
            }
        }
    }

    tracing::info!("📊 [{}] Channel stats: {}", platform, summary);
    Ok(summary)
}

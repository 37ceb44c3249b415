//! 新規配信の発見
//!
//! フィード/スケジュールで見つけたIDのうち未登録のものだけ詳細を取得して登録する

use std::collections::HashMap;

use super::{probe_memberships, report_fetch_failure, TaskContext, TaskSummary};
use crate::api::staggered;
use crate::database::{StreamRegistry, ViewerSeriesStore};
use crate::engine::{build_discovered, filter_undiscovered, DiscoveredItem, LiveObservation};
use crate::error::TrackerResult;
use crate::models::{now_epoch, StreamStatus, ViewerSample};
use crate::platforms::PlatformHandle;

/// 1プラットフォーム分の発見
pub async fn run_discovery(ctx: &TaskContext, handle: &PlatformHandle) -> TrackerResult<TaskSummary> {
    let platform = handle.platform();
    let caps = handle.adapter.capabilities();
    let mut summary = TaskSummary::default();

    if !caps.has_discovery_feed {
        tracing::trace!("[{}] No discovery feed", platform);
        return Ok(summary);
    }

    let channels = ctx.tracked_channels(platform)?;
    let client = handle.client.as_ref();
    let feeds = staggered(channels.clone(), ctx.pacing, |channel| async move {
        let result = client.fetch_discovery_feed(&channel).await;
        (channel.id, result)
    })
    .await;

    let mut discovered: Vec<DiscoveredItem> = Vec::new();
    for (channel_id, result) in feeds {
        let payload = match result {
            Ok(payload) => payload,
            Err(e) => {
                report_fetch_failure(handle, &channel_id, &e);
                summary.failed += 1;
                continue;
            }
        };
        match handle.adapter.map_discovery(&payload) {
            Ok(items) => discovered.extend(items),
            Err(e) => {
                tracing::error!("❌ [{}] Failed to read feed of '{}': {}", platform, channel_id, e);
                summary.failed += 1;
            }
        }
    }

    let candidate_ids: Vec<String> = discovered.iter().map(|item| item.id.clone()).collect();
    let known_ids = {
        let db = ctx.db.lock();
        db.known_stream_ids(platform, &candidate_ids)?
    };
    let fresh = filter_undiscovered(&known_ids, discovered);
    if fresh.is_empty() {
        tracing::debug!("[{}] No new items in {} candidates", platform, candidate_ids.len());
        return Ok(summary);
    }

    let mut observations: Vec<LiveObservation> = Vec::new();
    let mut to_hydrate: Vec<String> = Vec::new();
    for item in fresh {
        match item.details {
            Some(details) => observations.push(details),
            None => to_hydrate.push(item.id),
        }
    }

    if !to_hydrate.is_empty() {
        tracing::info!(
            "🔍 [{}] Fetching details for {} new items (batches of {})",
            platform,
            to_hydrate.len(),
            handle.client.hydrate_batch_size()
        );
        let fetch = handle.client.hydrate(&to_hydrate).await;
        for (unit, error) in &fetch.failures {
            report_fetch_failure(handle, unit, error);
            summary.failed += 1;
        }
        for payload in &fetch.payloads {
            match handle.adapter.map_live(payload) {
                Ok(mapped) => observations.extend(mapped),
                Err(e) => {
                    tracing::error!("❌ [{}] Failed to map details: {}", platform, e);
                    summary.failed += 1;
                }
            }
        }
    }

    probe_memberships(handle, &mut observations, |_| false, ctx.pacing).await;

    let now = now_epoch();
    let groups: HashMap<String, String> = channels
        .iter()
        .map(|c| (c.id.clone(), c.group.clone()))
        .collect();
    let streams = build_discovered(platform, &caps, observations, &groups, &known_ids, now);

    {
        let mut db = ctx.db.lock();
        let report = db.insert_streams(&streams);
        summary.inserted += report.written;
        summary.failed += report.failed;

        for stream in streams.iter().filter(|s| s.status == StreamStatus::Live) {
            let Some(viewers) = stream.viewers else {
                continue;
            };
            let sample = ViewerSample {
                timestamp: now,
                viewers: Some(viewers),
            };
            if let Err(e) = db.append_viewer_sample(platform, &stream.id, &stream.group, sample) {
                tracing::error!("❌ [{}] Failed to start viewer series for '{}': {}", platform, stream.id, e);
            }
        }
    }

    for stream in &streams {
        tracing::info!(
            "🆕 [{}] Discovered {} '{}' ({})",
            platform,
            stream.status.as_str(),
            stream.id,
            stream.title
        );
    }

    Ok(summary)
}

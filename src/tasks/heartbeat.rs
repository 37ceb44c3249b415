//! ライブ状態のハートビート
//!
//! 追跡中の配信（とチャンネル）のライブ状態を取得して突き合わせる。
//! 取得に失敗した単位の配信は「見えなかった」扱いにしない

use std::collections::{HashMap, HashSet};

use super::{commit_heartbeat, probe_memberships, report_fetch_failure, TaskContext, TaskSummary};
use crate::database::{RecordFilter, StreamRegistry, ViewerSeriesStore};
use crate::engine::{
    expire_stale_upcoming, reconcile_heartbeat, HeartbeatInput, LiveObservation,
};
use crate::error::TrackerResult;
use crate::models::{now_epoch, Stream, StreamStatus};
use crate::platforms::{LiveStateRequest, PlatformHandle};

/// 取得・マッピングに失敗した単位
#[derive(Debug, Default)]
struct Unreachable {
    /// 配信ID、チャンネルID、またはチャンネルのライブ用ID
    keys: HashSet<String>,
    /// バッチ全体が読めなかった
    all: bool,
}

impl Unreachable {
    fn covers(&self, stream: &Stream, live_ids: &HashMap<String, String>) -> bool {
        self.all
            || self.keys.contains(&stream.id)
            || self.keys.contains(&stream.channel_id)
            || live_ids
                .get(&stream.channel_id)
                .is_some_and(|live_id| self.keys.contains(live_id))
    }
}

/// 1プラットフォーム分のハートビート
pub async fn run_heartbeat(ctx: &TaskContext, handle: &PlatformHandle) -> TrackerResult<TaskSummary> {
    let platform = handle.platform();
    let caps = handle.adapter.capabilities();
    let channels = ctx.tracked_channels(platform)?;

    let tracked = {
        let db = ctx.db.lock();
        db.find_streams(
            &RecordFilter::platform(platform)
                .with_statuses(&[StreamStatus::Live, StreamStatus::Upcoming]),
        )?
    };
    let stream_ids: Vec<String> = tracked.iter().map(|s| s.id.clone()).collect();

    if tracked.is_empty() && (!caps.discovers_in_live_fetch || channels.is_empty()) {
        tracing::debug!("[{}] Nothing to poll", platform);
        return Ok(TaskSummary::default());
    }

    let fetch = handle
        .client
        .fetch_live_state(LiveStateRequest {
            channels: &channels,
            stream_ids: &stream_ids,
        })
        .await;

    let mut summary = TaskSummary::default();
    let mut unreachable = Unreachable::default();
    for (unit, error) in &fetch.failures {
        report_fetch_failure(handle, unit, error);
        unreachable.keys.extend(unit.split(',').map(str::to_string));
        summary.failed += 1;
    }

    let mut observed: Vec<LiveObservation> = Vec::new();
    for payload in &fetch.payloads {
        match handle.adapter.map_live(payload) {
            Ok(observations) => observed.extend(observations),
            Err(e) => {
                tracing::error!("❌ [{}] Failed to map live payload: {}", platform, e);
                summary.failed += 1;
                match &payload.channel {
                    Some(channel) => {
                        unreachable.keys.insert(channel.live_id().to_string());
                    }
                    None => unreachable.all = true,
                }
            }
        }
    }

    let sticky_members: HashSet<&str> = tracked
        .iter()
        .filter(|s| s.is_member.is_some())
        .map(|s| s.id.as_str())
        .collect();
    probe_memberships(
        handle,
        &mut observed,
        |id| sticky_members.contains(id),
        ctx.pacing,
    )
    .await;

    let live_ids: HashMap<String, String> = channels
        .iter()
        .map(|c| (c.id.clone(), c.live_id().to_string()))
        .collect();
    let (reachable, skipped): (Vec<Stream>, Vec<Stream>) = tracked
        .into_iter()
        .partition(|stream| !unreachable.covers(stream, &live_ids));
    if !skipped.is_empty() {
        tracing::warn!(
            "⚠️ [{}] {} tracked streams left untouched after fetch failures",
            platform,
            skipped.len()
        );
    }

    let now = now_epoch();
    let groups: HashMap<String, String> = channels
        .iter()
        .map(|c| (c.id.clone(), c.group.clone()))
        .collect();

    let live = {
        let mut db = ctx.db.lock();
        let tracked_ids: HashSet<&str> = reachable.iter().map(|s| s.id.as_str()).collect();
        let new_ids: Vec<String> = observed
            .iter()
            .filter(|o| !tracked_ids.contains(o.id.as_str()))
            .map(|o| o.id.clone())
            .collect();
        let reachable_ids: Vec<String> = reachable.iter().map(|s| s.id.clone()).collect();

        let input = HeartbeatInput {
            platform,
            known_ids: db.known_stream_ids(platform, &new_ids)?,
            series: db.find_series(platform, &reachable_ids)?,
            tracked: reachable,
            observed,
            groups,
            now,
        };
        let mut outcome = reconcile_heartbeat(&caps, input, &ctx.policy);
        outcome
            .to_past
            .extend(expire_stale_upcoming(&caps, &skipped, &ctx.policy, now));

        let report = commit_heartbeat(&mut *db, platform, &outcome);
        summary.inserted += report.inserted;
        summary.updated += report.updated;
        summary.ended += report.ended;
        summary.failed += report.failed;

        outcome
            .inserts
            .iter()
            .chain(&outcome.updates)
            .filter(|s| s.status == StreamStatus::Live)
            .count()
    };

    tracing::info!("💓 [{}] Heartbeat: {} live, {}", platform, live, summary);

    Ok(summary)
}

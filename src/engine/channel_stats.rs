//! チャンネル統計の突き合わせ

use crate::models::{Channel, StatsSample, TrackedChannel};

/// アダプターが作るチャンネル情報のスナップショット
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelSnapshot {
    pub name: Option<String>,
    pub user_id: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub subscriber_count: Option<u64>,
    pub follower_count: Option<u64>,
    pub view_count: Option<u64>,
    pub video_count: Option<u64>,
    pub level: Option<u32>,
}

/// 突き合わせ結果
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelUpdate {
    pub channel: Channel,
    pub is_new: bool,
    pub sample: StatsSample,
}

/// 最新の数値をチャンネルに書き込み、履歴サンプルを作る。引退判定は行わない
pub fn reconcile_channel(
    existing: Option<&Channel>,
    tracked: &TrackedChannel,
    snapshot: ChannelSnapshot,
    now: i64,
) -> ChannelUpdate {
    let sample = StatsSample {
        timestamp: now,
        subscriber_count: snapshot.subscriber_count,
        follower_count: snapshot.follower_count,
        view_count: snapshot.view_count,
        video_count: snapshot.video_count,
        level: snapshot.level,
    };

    let is_new = existing.is_none();
    let mut channel = match existing {
        Some(channel) => channel.clone(),
        None => Channel {
            id: tracked.id.clone(),
            name: tracked.name.clone().unwrap_or_else(|| tracked.id.clone()),
            user_id: tracked.user_id.clone(),
            description: None,
            thumbnail: None,
            subscriber_count: None,
            follower_count: None,
            view_count: None,
            video_count: None,
            level: None,
            group: tracked.group.clone(),
            platform: tracked.platform,
            is_retired: false,
            updated_at: None,
        },
    };

    // 設定のグループが正
    channel.group = tracked.group.clone();
    if let Some(name) = snapshot.name {
        channel.name = name;
    }
    if channel.user_id.is_none() {
        channel.user_id = snapshot.user_id.or_else(|| tracked.user_id.clone());
    }
    if snapshot.description.is_some() {
        channel.description = snapshot.description;
    }
    if snapshot.thumbnail.is_some() {
        channel.thumbnail = snapshot.thumbnail;
    }
    if snapshot.subscriber_count.is_some() {
        channel.subscriber_count = snapshot.subscriber_count;
    }
    if snapshot.follower_count.is_some() {
        channel.follower_count = snapshot.follower_count;
    }
    if snapshot.view_count.is_some() {
        channel.view_count = snapshot.view_count;
    }
    if snapshot.video_count.is_some() {
        channel.video_count = snapshot.video_count;
    }
    if snapshot.level.is_some() {
        channel.level = snapshot.level;
    }
    channel.updated_at = Some(now);

    ChannelUpdate {
        channel,
        is_new,
        sample,
    }
}

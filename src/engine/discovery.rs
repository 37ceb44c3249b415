//! 新規配信の発見
//!
//! フィード/スケジュールから見つかったIDを登録済みIDと突き合わせ、
//! 詳細取得の前に既知のものを落とす

use std::collections::{HashMap, HashSet};

use super::heartbeat::stream_from_observation;
use super::{Capabilities, LiveObservation};
use crate::models::{Platform, Stream};

/// フィードで見つかった項目
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredItem {
    pub id: String,
    pub title: Option<String>,
    pub channel_id: String,
    /// 詳細がフィードに含まれる場合（Bilibili、Twitter）は詳細取得を省く
    pub details: Option<LiveObservation>,
}

impl DiscoveredItem {
    pub fn new(id: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            channel_id: channel_id.into(),
            details: None,
        }
    }

    /// 詳細つきの項目
    pub fn with_details(observation: LiveObservation) -> Self {
        Self {
            id: observation.id.clone(),
            title: observation.title.clone(),
            channel_id: observation.channel_id.clone(),
            details: Some(observation),
        }
    }
}

/// 登録済みIDとバッチ内の重複を除く（バッチ内は先勝ち）
pub fn filter_undiscovered(
    known_ids: &HashSet<String>,
    discovered: Vec<DiscoveredItem>,
) -> Vec<DiscoveredItem> {
    let mut seen = HashSet::new();
    discovered
        .into_iter()
        .filter(|item| !known_ids.contains(&item.id) && seen.insert(item.id.clone()))
        .collect()
}

/// 詳細取得済みの観測値から新規レコードを作り、持ち主チャンネルのグループを割り当てる
pub fn build_discovered(
    platform: Platform,
    caps: &Capabilities,
    observations: Vec<LiveObservation>,
    groups: &HashMap<String, String>,
    known_ids: &HashSet<String>,
    now: i64,
) -> Vec<Stream> {
    let mut seen = HashSet::new();
    let mut streams = Vec::new();

    for observation in observations {
        if known_ids.contains(&observation.id) || !seen.insert(observation.id.clone()) {
            continue;
        }
        let Some(group) = groups.get(&observation.channel_id) else {
            tracing::warn!(
                "⚠️ [{}] Discovered '{}' for untracked channel '{}'",
                platform,
                observation.id,
                observation.channel_id
            );
            continue;
        };
        streams.push(stream_from_observation(platform, caps, observation, group, now));
    }

    streams
}

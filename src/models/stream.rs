use serde::{Deserialize, Serialize};

use super::Platform;

/// 配信（動画）の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    Upcoming,
    Live,
    Past,
    Video,
}

impl StreamStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamStatus::Upcoming => "upcoming",
            StreamStatus::Live => "live",
            StreamStatus::Past => "past",
            StreamStatus::Video => "video",
        }
    }

    /// ハートビートで追跡される状態か
    pub fn is_active(&self) -> bool {
        matches!(self, StreamStatus::Upcoming | StreamStatus::Live)
    }
}

/// 時刻関連データ（`published_at`以外はUNIX秒）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_start_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub late_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    /// ISO-8601
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
}

/// 配信レコード
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stream {
    pub id: String,
    pub title: String,
    pub status: StreamStatus,
    #[serde(default)]
    pub timedata: TimeData,
    #[serde(default)]
    pub viewers: Option<u64>,
    #[serde(default)]
    pub peak_viewers: Option<u64>,
    #[serde(default)]
    pub average_viewers: Option<u64>,
    pub channel_id: String,
    pub group: String,
    pub platform: Platform,
    #[serde(default)]
    pub is_missing: bool,
    /// None = 不明
    #[serde(default)]
    pub is_premiere: Option<bool>,
    /// None = 不明（メンバー限定判定前）
    #[serde(default)]
    pub is_member: Option<bool>,
    /// 連続で取得結果に現れなかった回数
    #[serde(default)]
    pub missed_polls: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

impl Stream {
    pub fn new(
        id: impl Into<String>,
        platform: Platform,
        channel_id: impl Into<String>,
        group: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            status: StreamStatus::Upcoming,
            timedata: TimeData::default(),
            viewers: None,
            peak_viewers: None,
            average_viewers: None,
            channel_id: channel_id.into(),
            group: group.into(),
            platform,
            is_missing: false,
            is_premiere: None,
            is_member: None,
            missed_polls: 0,
            thumbnail: None,
        }
    }

    /// `past`は終端状態
    pub fn is_terminal(&self) -> bool {
        self.status == StreamStatus::Past
    }
}

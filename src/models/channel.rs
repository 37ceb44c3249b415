use serde::{Deserialize, Serialize};

use super::Platform;

/// チャンネルレコード
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    /// 外部の数値ユーザーID（BilibiliのルームIDなど）
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub subscriber_count: Option<u64>,
    #[serde(default)]
    pub follower_count: Option<u64>,
    #[serde(default)]
    pub view_count: Option<u64>,
    #[serde(default)]
    pub video_count: Option<u64>,
    #[serde(default)]
    pub level: Option<u32>,
    pub group: String,
    pub platform: Platform,
    #[serde(default)]
    pub is_retired: bool,
    #[serde(default)]
    pub updated_at: Option<i64>,
}

/// 統計履歴の1サンプル
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSample {
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscriber_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follower_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
}

/// `(チャンネルID, プラットフォーム)`ごとの統計履歴
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelStatsHistory {
    pub id: String,
    pub platform: Platform,
    pub group: String,
    pub history: Vec<StatsSample>,
}

/// 設定ファイルで登録された監視対象チャンネル
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedChannel {
    pub id: String,
    pub platform: Platform,
    pub group: String,
    #[serde(default)]
    pub name: Option<String>,
    /// BilibiliのルームIDなど、チャンネルIDとは別の数値ID
    #[serde(default)]
    pub user_id: Option<String>,
}

impl TrackedChannel {
    pub fn new(id: impl Into<String>, platform: Platform, group: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            platform,
            group: group.into(),
            name: None,
            user_id: None,
        }
    }

    /// ライブ状態の取得に使うID（ルームIDがあればそちら）
    pub fn live_id(&self) -> &str {
        self.user_id.as_deref().unwrap_or(&self.id)
    }
}

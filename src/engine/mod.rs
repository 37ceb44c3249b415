//! 配信状態の突き合わせエンジン
//!
//! 前回のスナップショットと今回の取得結果から、新規・更新・終了を決定する。
//! プラットフォーム差分は`PlatformAdapter`が吸収し、ここは純粋なロジックのみ

pub mod channel_stats;
pub mod discovery;
pub mod heartbeat;
pub mod timedata;

pub use channel_stats::{reconcile_channel, ChannelSnapshot, ChannelUpdate};
pub use discovery::{build_discovered, filter_undiscovered, DiscoveredItem};
pub use heartbeat::{
    expire_stale_upcoming, reconcile_heartbeat, HeartbeatInput, HeartbeatOutcome,
    ReconcilePolicy, SeriesAppend,
};

use crate::error::{TrackerError, TrackerResult};
use crate::models::{Platform, TrackedChannel};

/// プラットフォームごとの能力フラグ
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// 予定開始時刻があり遅延を計算する
    pub has_schedule: bool,
    pub detects_premiere: bool,
    pub detects_membership: bool,
    /// ライブ状態の取得で未登録の配信も見つかる
    pub discovers_in_live_fetch: bool,
    /// ライブ状態の取得で予定枠も返ってくる
    pub observes_upcoming: bool,
    /// フィード/スケジュールによる発見手段がある
    pub has_discovery_feed: bool,
}

/// 取得結果が示す状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservedState {
    Upcoming,
    Live,
    Ended,
    /// 通常の投稿動画
    Video,
}

/// アダプターが生レスポンスから作る正規化済みの観測値
#[derive(Debug, Clone, PartialEq)]
pub struct LiveObservation {
    pub id: String,
    pub channel_id: String,
    pub state: ObservedState,
    pub title: Option<String>,
    pub viewers: Option<u64>,
    pub scheduled_start_time: Option<i64>,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    pub duration: Option<i64>,
    pub published_at: Option<String>,
    pub thumbnail: Option<String>,
    pub is_premiere: Option<bool>,
    pub is_member: Option<bool>,
    /// メンバー限定判定に使うチャットID（保存しない）
    pub live_chat_id: Option<String>,
}

impl LiveObservation {
    pub fn new(id: impl Into<String>, channel_id: impl Into<String>, state: ObservedState) -> Self {
        Self {
            id: id.into(),
            channel_id: channel_id.into(),
            state,
            title: None,
            viewers: None,
            scheduled_start_time: None,
            start_time: None,
            end_time: None,
            duration: None,
            published_at: None,
            thumbnail: None,
            is_premiere: None,
            is_member: None,
            live_chat_id: None,
        }
    }
}

/// クライアントが返す生レスポンス
#[derive(Debug, Clone, PartialEq)]
pub struct RawPayload {
    /// 取得単位の持ち主（チャンネル単位の取得の場合）
    pub channel: Option<TrackedChannel>,
    pub body: serde_json::Value,
}

impl RawPayload {
    pub fn for_channel(channel: &TrackedChannel, body: serde_json::Value) -> Self {
        Self {
            channel: Some(channel.clone()),
            body,
        }
    }

    pub fn batch(body: serde_json::Value) -> Self {
        Self {
            channel: None,
            body,
        }
    }

    pub fn require_channel(&self) -> TrackerResult<&TrackedChannel> {
        self.channel
            .as_ref()
            .ok_or_else(|| TrackerError::data_shape("<batch>", "channel"))
    }
}

/// プラットフォーム固有のフィールド対応とID合成
pub trait PlatformAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    fn capabilities(&self) -> Capabilities;

    /// 1つの生レスポンスから0件以上の観測値を作る。形の合わない項目はスキップしてログ
    fn map_live(&self, payload: &RawPayload) -> TrackerResult<Vec<LiveObservation>>;

    fn map_channel(
        &self,
        channel: &TrackedChannel,
        body: &serde_json::Value,
    ) -> TrackerResult<ChannelSnapshot>;

    /// 発見フィードの生レスポンスを項目へ
    fn map_discovery(&self, _payload: &RawPayload) -> TrackerResult<Vec<DiscoveredItem>> {
        Ok(Vec::new())
    }
}

/// 項目単位のマッピング結果を集め、失敗はIDつきでログに残す
pub fn collect_mapped<I>(platform: Platform, results: I) -> Vec<LiveObservation>
where
    I: IntoIterator<Item = TrackerResult<LiveObservation>>,
{
    results
        .into_iter()
        .filter_map(|result| match result {
            Ok(observation) => Some(observation),
            Err(e) => {
                tracing::error!("❌ [{}] Skipping malformed item: {}", platform, e);
                None
            }
        })
        .collect()
}

/// JSONパスで文字列を取り出す
pub(crate) fn str_at<'a>(value: &'a serde_json::Value, pointer: &str) -> Option<&'a str> {
    value.pointer(pointer).and_then(|v| v.as_str())
}

/// JSONパスで整数を取り出す（数値文字列も許容）
pub(crate) fn i64_at(value: &serde_json::Value, pointer: &str) -> Option<i64> {
    value.pointer(pointer).and_then(|v| match v {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// JSONパスで件数を取り出す
pub(crate) fn count_at(value: &serde_json::Value, pointer: &str) -> Option<u64> {
    value
        .pointer(pointer)
        .and_then(crate::models::viewers::count_from_value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_helpers() {
        let value = serde_json::json!({
            "a": { "b": "text", "n": 12, "s": "34", "bad": "x" }
        });
        assert_eq!(str_at(&value, "/a/b"), Some("text"));
        assert_eq!(i64_at(&value, "/a/n"), Some(12));
        assert_eq!(i64_at(&value, "/a/s"), Some(34));
        assert_eq!(i64_at(&value, "/a/bad"), None);
        assert_eq!(count_at(&value, "/a/s"), Some(34));
        assert_eq!(count_at(&value, "/missing"), None);
    }

    #[test]
    fn test_collect_mapped_skips_errors() {
        let results = vec![
            Ok(LiveObservation::new("a", "c", ObservedState::Live)),
            Err(TrackerError::data_shape("b", "id")),
        ];
        let observations = collect_mapped(Platform::Twitch, results);
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].id, "a");
    }

    #[test]
    fn test_raw_payload_requires_channel() {
        let payload = RawPayload::batch(serde_json::json!({}));
        assert!(payload.require_channel().is_err());

        let channel = TrackedChannel::new("1", Platform::Bilibili, "g");
        let payload = RawPayload::for_channel(&channel, serde_json::json!({}));
        assert_eq!(payload.require_channel().unwrap().id, "1");
    }
}

//! プラットフォーム別のクライアントとアダプター
//!
//! クライアントは生レスポンス（JSON）を返すだけで、意味づけはアダプターが行う。
//! タスクは`PlatformHandle`を通して両方を同じ手順で扱う

pub mod bilibili;
pub mod mildom;
pub mod twitcasting;
pub mod twitch;
pub mod twitter;
pub mod youtube;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::api::{ApiKeyRotator, FetchError, HttpClient};
use crate::config::TrackerConfig;
use crate::engine::{LiveObservation, PlatformAdapter, RawPayload};
use crate::error::{TrackerError, TrackerResult};
use crate::models::{Platform, TrackedChannel};

/// ライブ状態取得の入力
#[derive(Debug, Clone, Copy)]
pub struct LiveStateRequest<'a> {
    /// 監視対象チャンネル（チャンネル単位で取得するプラットフォーム用）
    pub channels: &'a [TrackedChannel],
    /// 進行中の配信ID（ID単位で取得するプラットフォーム用）
    pub stream_ids: &'a [String],
}

/// ライブ状態取得の結果。失敗は単位ごとに分けて返す
#[derive(Debug, Default)]
pub struct LiveFetch {
    pub payloads: Vec<RawPayload>,
    /// (取得単位の説明, エラー)
    pub failures: Vec<(String, FetchError)>,
}

impl LiveFetch {
    /// 取得単位ごとの結果をまとめる
    pub fn collect<I>(results: I) -> Self
    where
        I: IntoIterator<Item = (String, Result<RawPayload, FetchError>)>,
    {
        let mut fetch = Self::default();
        for (unit, result) in results {
            match result {
                Ok(payload) => fetch.payloads.push(payload),
                Err(e) => fetch.failures.push((unit, e)),
            }
        }
        fetch
    }
}

/// 外部APIクライアント
#[async_trait]
pub trait PlatformClient: Send + Sync {
    fn platform(&self) -> Platform;

    /// チャンネル情報・統計の生レスポンス
    async fn fetch_channel_meta(
        &self,
        channel: &TrackedChannel,
    ) -> Result<serde_json::Value, FetchError>;

    /// 現在のライブ状態
    async fn fetch_live_state(&self, request: LiveStateRequest<'_>) -> LiveFetch;

    /// 発見用フィード/スケジュール
    async fn fetch_discovery_feed(
        &self,
        _channel: &TrackedChannel,
    ) -> Result<RawPayload, FetchError> {
        Err(FetchError::Unsupported)
    }

    /// 発見したIDの詳細取得で1リクエストに載せる最大件数
    fn hydrate_batch_size(&self) -> usize {
        40
    }

    /// 発見したIDの詳細を取得
    async fn hydrate(&self, _ids: &[String]) -> LiveFetch {
        LiveFetch::default()
    }

    /// メンバー限定かどうかを調べる。判定できなければ`None`
    async fn probe_membership(
        &self,
        _observation: &LiveObservation,
    ) -> Result<Option<bool>, FetchError> {
        Ok(None)
    }

    /// レート制限時に強制ローテーションするキー
    fn key_rotator(&self) -> Option<&ApiKeyRotator> {
        None
    }
}

/// クライアントとアダプターの組
#[derive(Clone)]
pub struct PlatformHandle {
    pub client: Arc<dyn PlatformClient>,
    pub adapter: Arc<dyn PlatformAdapter>,
}

impl PlatformHandle {
    pub fn new(client: Arc<dyn PlatformClient>, adapter: Arc<dyn PlatformAdapter>) -> Self {
        Self { client, adapter }
    }

    pub fn platform(&self) -> Platform {
        self.adapter.platform()
    }
}

impl std::fmt::Debug for PlatformHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformHandle")
            .field("platform", &self.platform())
            .finish()
    }
}

/// クライアント共通の設定
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub http: HttpClient,
    /// 段階的開始の間隔
    pub pacing: Duration,
}

/// 設定で監視対象のあるプラットフォームだけハンドルを作る
pub fn build_platforms(config: &TrackerConfig) -> TrackerResult<Vec<PlatformHandle>> {
    let http = HttpClient::new(Duration::from_secs(config.scheduler.request_timeout_secs))
        .map_err(TrackerError::Fetch)?;
    let options = ClientOptions {
        http,
        pacing: Duration::from_millis(config.scheduler.pacing_delay_ms),
    };

    let mut handles = Vec::new();
    for platform in Platform::ALL {
        if !config.channels.iter().any(|c| c.platform == platform) {
            continue;
        }

        let handle = match platform {
            Platform::Youtube => PlatformHandle::new(
                Arc::new(youtube::YouTubeClient::new(
                    options.clone(),
                    config.youtube.rotator()?,
                )),
                Arc::new(youtube::YouTubeAdapter),
            ),
            Platform::Twitch => PlatformHandle::new(
                Arc::new(twitch::TwitchClient::new(
                    options.clone(),
                    config.twitch.require_client_id()?,
                    config.twitch.rotator()?,
                )),
                Arc::new(twitch::TwitchAdapter),
            ),
            Platform::Bilibili => PlatformHandle::new(
                Arc::new(bilibili::BilibiliClient::new(options.clone())),
                Arc::new(bilibili::BilibiliAdapter),
            ),
            Platform::Twitcasting => PlatformHandle::new(
                Arc::new(twitcasting::TwitcastingClient::new(
                    options.clone(),
                    config.twitcasting.rotator()?,
                )),
                Arc::new(twitcasting::TwitcastingAdapter),
            ),
            Platform::Mildom => PlatformHandle::new(
                Arc::new(mildom::MildomClient::new(options.clone())),
                Arc::new(mildom::MildomAdapter),
            ),
            Platform::Twitter => PlatformHandle::new(
                Arc::new(twitter::TwitterClient::new(
                    options.clone(),
                    config.twitter.rotator()?,
                )),
                Arc::new(twitter::TwitterAdapter),
            ),
        };

        tracing::info!("🔌 Platform enabled: {}", platform);
        handles.push(handle);
    }

    Ok(handles)
}

/// ローテーターから現在のキーを取り出す
pub(crate) fn current_key(rotator: &ApiKeyRotator) -> Result<String, FetchError> {
    rotator
        .get()
        .map(|key| key.as_str().to_string())
        .ok_or_else(|| FetchError::Forbidden {
            reason: "no API key configured".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_fetch_collect_splits_failures() {
        let results = vec![
            ("a".to_string(), Ok(RawPayload::batch(serde_json::json!({})))),
            ("b".to_string(), Err(FetchError::NotFound)),
        ];
        let fetch = LiveFetch::collect(results);
        assert_eq!(fetch.payloads.len(), 1);
        assert_eq!(fetch.failures.len(), 1);
        assert_eq!(fetch.failures[0].0, "b");
    }

    #[test]
    fn test_build_platforms_only_for_tracked() {
        let mut config = TrackerConfig::default();
        config.channels = vec![
            TrackedChannel::new("123", Platform::Bilibili, "g"),
            TrackedChannel::new("456", Platform::Mildom, "g"),
        ];
        let handles = build_platforms(&config).unwrap();
        let platforms: Vec<_> = handles.iter().map(|h| h.platform()).collect();
        assert_eq!(platforms, vec![Platform::Bilibili, Platform::Mildom]);
    }

    #[test]
    fn test_build_platforms_requires_keys() {
        let mut config = TrackerConfig::default();
        config.channels = vec![TrackedChannel::new("UC1", Platform::Youtube, "g")];
        assert!(build_platforms(&config).is_err());
    }

    #[test]
    fn test_current_key_without_keys() {
        let rotator = ApiKeyRotator::new(
            Vec::new(),
            Duration::from_secs(60),
            Duration::from_secs(1),
        );
        assert!(matches!(
            current_key(&rotator),
            Err(FetchError::Forbidden { .. })
        ));
    }
}

//! Twitch Helix API
//!
//! `streams`エンドポイントはログイン名で最大100件まとめて問い合わせられ、
//! 返ってきた配信がそのまま新規発見になる

use async_trait::async_trait;

use super::{current_key, ClientOptions, LiveFetch, LiveStateRequest, PlatformClient};
use crate::api::{staggered, ApiKeyRotator, FetchError};
use crate::engine::timedata::parse_rfc3339_epoch;
use crate::engine::{
    collect_mapped, count_at, str_at, Capabilities, ChannelSnapshot, LiveObservation,
    ObservedState, PlatformAdapter, RawPayload,
};
use crate::error::{TrackerError, TrackerResult};
use crate::models::{Platform, TrackedChannel};

const HELIX_BASE: &str = "https://api.twitch.tv/helix";
const MAX_LOGINS_PER_REQUEST: usize = 100;

pub struct TwitchClient {
    options: ClientOptions,
    client_id: String,
    tokens: ApiKeyRotator,
}

impl TwitchClient {
    pub fn new(options: ClientOptions, client_id: String, tokens: ApiKeyRotator) -> Self {
        Self {
            options,
            client_id,
            tokens,
        }
    }

    fn headers(&self) -> Result<Vec<(&'static str, String)>, FetchError> {
        let token = current_key(&self.tokens)?;
        Ok(vec![
            ("Client-Id", self.client_id.clone()),
            ("Authorization", format!("Bearer {}", token)),
        ])
    }

    async fn fetch_streams(&self, logins: &[String]) -> Result<RawPayload, FetchError> {
        let headers = self.headers()?;
        let query: Vec<(&str, String)> = logins
            .iter()
            .map(|login| ("user_login", login.to_lowercase()))
            .chain(std::iter::once(("first", MAX_LOGINS_PER_REQUEST.to_string())))
            .collect();
        let body = self
            .options
            .http
            .get_json(&format!("{}/streams", HELIX_BASE), &query, &headers)
            .await?;
        Ok(RawPayload::batch(body))
    }
}

#[async_trait]
impl PlatformClient for TwitchClient {
    fn platform(&self) -> Platform {
        Platform::Twitch
    }

    async fn fetch_channel_meta(
        &self,
        channel: &TrackedChannel,
    ) -> Result<serde_json::Value, FetchError> {
        let headers = self.headers()?;
        let users = self
            .options
            .http
            .get_json(
                &format!("{}/users", HELIX_BASE),
                &[("login", channel.id.to_lowercase())],
                &headers,
            )
            .await?;
        let user = users
            .pointer("/data/0")
            .cloned()
            .ok_or(FetchError::NotFound)?;
        let user_id = str_at(&user, "/id")
            .ok_or_else(|| FetchError::missing_field("data[0].id"))?
            .to_string();

        let followers = self
            .options
            .http
            .get_json(
                &format!("{}/channels/followers", HELIX_BASE),
                &[("broadcaster_id", user_id)],
                &headers,
            )
            .await?;

        Ok(serde_json::json!({
            "user": user,
            "followers": followers.get("total").cloned().unwrap_or(serde_json::Value::Null),
        }))
    }

    async fn fetch_live_state(&self, request: LiveStateRequest<'_>) -> LiveFetch {
        let chunks: Vec<Vec<String>> = request
            .channels
            .chunks(MAX_LOGINS_PER_REQUEST)
            .map(|chunk| chunk.iter().map(|c| c.id.clone()).collect())
            .collect();

        let results = staggered(chunks, self.options.pacing, |logins| async move {
            let result = self.fetch_streams(&logins).await;
            (logins.join(","), result)
        })
        .await;

        LiveFetch::collect(results)
    }

    fn key_rotator(&self) -> Option<&ApiKeyRotator> {
        Some(&self.tokens)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TwitchAdapter;

impl TwitchAdapter {
    fn map_stream(&self, item: &serde_json::Value) -> TrackerResult<LiveObservation> {
        let id = str_at(item, "/id").ok_or_else(|| TrackerError::data_shape("<unknown>", "id"))?;
        // 設定のチャンネルIDはログイン名
        let login = str_at(item, "/user_login")
            .ok_or_else(|| TrackerError::data_shape(id, "user_login"))?;

        let mut observation = LiveObservation::new(id, login.to_lowercase(), ObservedState::Live);
        observation.title = str_at(item, "/title").map(str::to_string);
        observation.viewers = count_at(item, "/viewer_count");
        observation.start_time = str_at(item, "/started_at").and_then(parse_rfc3339_epoch);
        observation.thumbnail = str_at(item, "/thumbnail_url")
            .map(|url| url.replace("{width}", "1280").replace("{height}", "720"));
        Ok(observation)
    }
}

impl PlatformAdapter for TwitchAdapter {
    fn platform(&self) -> Platform {
        Platform::Twitch
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            discovers_in_live_fetch: true,
            ..Capabilities::default()
        }
    }

    fn map_live(&self, payload: &RawPayload) -> TrackerResult<Vec<LiveObservation>> {
        let items = payload
            .body
            .get("data")
            .and_then(|v| v.as_array())
            .ok_or_else(|| TrackerError::data_shape("<streams>", "data"))?;

        Ok(collect_mapped(
            Platform::Twitch,
            items
                .iter()
                .filter(|item| str_at(item, "/type").map_or(true, |t| t == "live"))
                .map(|item| self.map_stream(item)),
        ))
    }

    fn map_channel(
        &self,
        channel: &TrackedChannel,
        body: &serde_json::Value,
    ) -> TrackerResult<ChannelSnapshot> {
        let user = body
            .get("user")
            .ok_or_else(|| TrackerError::data_shape(&channel.id, "user"))?;

        Ok(ChannelSnapshot {
            name: str_at(user, "/display_name").map(str::to_string),
            user_id: str_at(user, "/id").map(str::to_string),
            description: str_at(user, "/description").map(str::to_string),
            thumbnail: str_at(user, "/profile_image_url").map(str::to_string),
            subscriber_count: None,
            follower_count: count_at(body, "/followers"),
            view_count: count_at(user, "/view_count"),
            video_count: None,
            level: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_map_live_streams() {
        let body = json!({ "data": [
            {
                "id": "4001",
                "user_id": "77",
                "user_login": "Streamer",
                "type": "live",
                "title": "Playing",
                "viewer_count": 420,
                "started_at": "2023-01-01T12:00:00Z",
                "thumbnail_url": "https://x/{width}x{height}.jpg"
            },
            { "id": "4002", "user_login": "other", "type": "" },
            { "user_login": "broken", "type": "live" }
        ]});

        let observations = TwitchAdapter.map_live(&RawPayload::batch(body)).unwrap();
        assert_eq!(observations.len(), 1);

        let live = &observations[0];
        assert_eq!(live.id, "4001");
        assert_eq!(live.channel_id, "streamer");
        assert_eq!(live.state, ObservedState::Live);
        assert_eq!(live.viewers, Some(420));
        assert_eq!(live.start_time, Some(1_672_574_400));
        assert_eq!(live.thumbnail.as_deref(), Some("https://x/1280x720.jpg"));
    }

    #[test]
    fn test_map_live_empty_means_offline() {
        let observations = TwitchAdapter
            .map_live(&RawPayload::batch(json!({ "data": [] })))
            .unwrap();
        assert!(observations.is_empty());
    }

    #[test]
    fn test_map_channel() {
        let tracked = TrackedChannel::new("streamer", Platform::Twitch, "g");
        let body = json!({
            "user": {
                "id": "77",
                "display_name": "Streamer",
                "description": "hi",
                "profile_image_url": "https://x/p.png",
                "view_count": 1000
            },
            "followers": 5000
        });
        let snapshot = TwitchAdapter.map_channel(&tracked, &body).unwrap();
        assert_eq!(snapshot.user_id.as_deref(), Some("77"));
        assert_eq!(snapshot.follower_count, Some(5000));
        assert_eq!(snapshot.view_count, Some(1000));
    }

    #[test]
    fn test_capabilities() {
        let caps = TwitchAdapter.capabilities();
        assert!(caps.discovers_in_live_fetch);
        assert!(!caps.observes_upcoming);
        assert!(!caps.has_discovery_feed);
    }
}

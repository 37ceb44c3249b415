//! TwitCasting API v2
//!
//! `current_live`は配信中でなければ404を返す。その場合は空の応答として扱う

use async_trait::async_trait;

use super::{current_key, ClientOptions, LiveFetch, LiveStateRequest, PlatformClient};
use crate::api::{staggered, ApiKeyRotator, FetchError};
use crate::engine::{
    count_at, i64_at, str_at, Capabilities, ChannelSnapshot, LiveObservation, ObservedState,
    PlatformAdapter, RawPayload,
};
use crate::error::{TrackerError, TrackerResult};
use crate::models::{Platform, TrackedChannel};

const API_BASE: &str = "https://apiv2.twitcasting.tv";

pub struct TwitcastingClient {
    options: ClientOptions,
    tokens: ApiKeyRotator,
}

impl TwitcastingClient {
    pub fn new(options: ClientOptions, tokens: ApiKeyRotator) -> Self {
        Self { options, tokens }
    }

    fn headers(&self) -> Result<Vec<(&'static str, String)>, FetchError> {
        let token = current_key(&self.tokens)?;
        Ok(vec![
            ("Accept", "application/json".to_string()),
            ("X-Api-Version", "2.0".to_string()),
            ("Authorization", format!("Bearer {}", token)),
        ])
    }

    async fn fetch_current_live(&self, channel: &TrackedChannel) -> Result<RawPayload, FetchError> {
        let headers = self.headers()?;
        let result = self
            .options
            .http
            .get_json(
                &format!("{}/users/{}/current_live", API_BASE, channel.live_id()),
                &[],
                &headers,
            )
            .await;

        match result {
            Ok(body) => Ok(RawPayload::for_channel(channel, body)),
            Err(FetchError::NotFound) => Ok(RawPayload::for_channel(channel, serde_json::Value::Null)),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl PlatformClient for TwitcastingClient {
    fn platform(&self) -> Platform {
        Platform::Twitcasting
    }

    async fn fetch_channel_meta(
        &self,
        channel: &TrackedChannel,
    ) -> Result<serde_json::Value, FetchError> {
        let headers = self.headers()?;
        self.options
            .http
            .get_json(&format!("{}/users/{}", API_BASE, channel.live_id()), &[], &headers)
            .await
    }

    async fn fetch_live_state(&self, request: LiveStateRequest<'_>) -> LiveFetch {
        let results = staggered(
            request.channels.to_vec(),
            self.options.pacing,
            |channel| async move {
                let result = self.fetch_current_live(&channel).await;
                (channel.live_id().to_string(), result)
            },
        )
        .await;

        LiveFetch::collect(results)
    }

    fn key_rotator(&self) -> Option<&ApiKeyRotator> {
        Some(&self.tokens)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TwitcastingAdapter;

impl PlatformAdapter for TwitcastingAdapter {
    fn platform(&self) -> Platform {
        Platform::Twitcasting
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            discovers_in_live_fetch: true,
            ..Capabilities::default()
        }
    }

    fn map_live(&self, payload: &RawPayload) -> TrackerResult<Vec<LiveObservation>> {
        let channel = payload.require_channel()?;
        let Some(movie) = payload.body.get("movie") else {
            return Ok(Vec::new());
        };

        let id = str_at(movie, "/id")
            .map(str::to_string)
            .or_else(|| i64_at(movie, "/id").map(|id| id.to_string()))
            .ok_or_else(|| TrackerError::data_shape(channel.live_id(), "movie.id"))?;
        let is_live = movie
            .get("is_live")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        let start = i64_at(movie, "/created");
        let state = if is_live {
            ObservedState::Live
        } else {
            ObservedState::Ended
        };

        let mut observation = LiveObservation::new(id, &channel.id, state);
        observation.title = str_at(movie, "/title").map(str::to_string);
        observation.viewers = count_at(movie, "/current_view_count");
        observation.start_time = start;
        observation.thumbnail = str_at(movie, "/large_thumbnail").map(str::to_string);
        if !is_live {
            observation.end_time = start
                .zip(i64_at(movie, "/duration"))
                .map(|(start, duration)| start + duration);
        }
        Ok(vec![observation])
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
            name: str_at(user, "/name").map(str::to_string),
            user_id: str_at(user, "/id").map(str::to_string),
            description: str_at(user, "/profile").map(str::to_string),
            thumbnail: str_at(user, "/image").map(str::to_string),
            subscriber_count: None,
            follower_count: count_at(user, "/supporter_count"),
            view_count: None,
            video_count: None,
            level: i64_at(user, "/level").and_then(|l| u32::try_from(l).ok()),
        })
    }
}

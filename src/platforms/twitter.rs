//! Twitter Spaces (API v2)
//!
//! 発見は`spaces/by/creator_ids`、ライブ状態は`spaces?ids=`で最大100件ずつ。
//! どちらも状態（scheduled/live/ended）を明示的に返す

use async_trait::async_trait;

use super::{current_key, ClientOptions, LiveFetch, LiveStateRequest, PlatformClient};
use crate::api::{staggered, ApiKeyRotator, FetchError};
use crate::engine::timedata::parse_rfc3339_epoch;
use crate::engine::{
    collect_mapped, count_at, str_at, Capabilities, ChannelSnapshot, DiscoveredItem,
    LiveObservation, ObservedState, PlatformAdapter, RawPayload,
};
use crate::error::{TrackerError, TrackerResult};
use crate::models::{Platform, TrackedChannel};

const API_BASE: &str = "https://api.twitter.com/2";
const SPACE_FIELDS: &str =
    "state,title,creator_id,participant_count,scheduled_start,started_at,ended_at,created_at";
const MAX_IDS_PER_REQUEST: usize = 100;

pub struct TwitterClient {
    options: ClientOptions,
    tokens: ApiKeyRotator,
}

impl TwitterClient {
    pub fn new(options: ClientOptions, tokens: ApiKeyRotator) -> Self {
        Self { options, tokens }
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<serde_json::Value, FetchError> {
        let token = current_key(&self.tokens)?;
        self.options
            .http
            .get_json(
                &format!("{}/{}", API_BASE, path),
                query,
                &[("Authorization", format!("Bearer {}", token))],
            )
            .await
    }

    async fn fetch_spaces(&self, ids: &[String]) -> Result<RawPayload, FetchError> {
        let body = self
            .get(
                "spaces",
                &[
                    ("ids", ids.join(",")),
                    ("space.fields", SPACE_FIELDS.to_string()),
                ],
            )
            .await?;
        Ok(RawPayload::batch(body))
    }
}

#[async_trait]
impl PlatformClient for TwitterClient {
    fn platform(&self) -> Platform {
        Platform::Twitter
    }

    async fn fetch_channel_meta(
        &self,
        channel: &TrackedChannel,
    ) -> Result<serde_json::Value, FetchError> {
        self.get(
            &format!("users/{}", channel.id),
            &[(
                "user.fields",
                "public_metrics,description,profile_image_url".to_string(),
            )],
        )
        .await
    }

    async fn fetch_live_state(&self, request: LiveStateRequest<'_>) -> LiveFetch {
        let chunks: Vec<Vec<String>> = request
            .stream_ids
            .chunks(MAX_IDS_PER_REQUEST)
            .map(|chunk| chunk.to_vec())
            .collect();

        let results = staggered(chunks, self.options.pacing, |ids| async move {
            let result = self.fetch_spaces(&ids).await;
            (ids.join(","), result)
        })
        .await;

        LiveFetch::collect(results)
    }

    async fn fetch_discovery_feed(
        &self,
        channel: &TrackedChannel,
    ) -> Result<RawPayload, FetchError> {
        let body = self
            .get(
                "spaces/by/creator_ids",
                &[
                    ("user_ids", channel.id.clone()),
                    ("space.fields", SPACE_FIELDS.to_string()),
                ],
            )
            .await?;
        Ok(RawPayload::for_channel(channel, body))
    }

    fn hydrate_batch_size(&self) -> usize {
        MAX_IDS_PER_REQUEST
    }

    fn key_rotator(&self) -> Option<&ApiKeyRotator> {
        Some(&self.tokens)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TwitterAdapter;

impl TwitterAdapter {
    fn map_space(
        &self,
        item: &serde_json::Value,
        fallback_creator: Option<&str>,
    ) -> TrackerResult<LiveObservation> {
        let id = str_at(item, "/id").ok_or_else(|| TrackerError::data_shape("<unknown>", "id"))?;
        let creator = str_at(item, "/creator_id")
            .or(fallback_creator)
            .ok_or_else(|| TrackerError::data_shape(id, "creator_id"))?;
        let state = match str_at(item, "/state") {
            Some("live") => ObservedState::Live,
            Some("scheduled") => ObservedState::Upcoming,
            Some("ended") | Some("canceled") => ObservedState::Ended,
            _ => return Err(TrackerError::data_shape(id, "state")),
        };
        let time_at = |pointer: &str| str_at(item, pointer).and_then(parse_rfc3339_epoch);

        let mut observation = LiveObservation::new(id, creator, state);
        observation.title = str_at(item, "/title").map(str::to_string);
        observation.viewers = count_at(item, "/participant_count");
        observation.scheduled_start_time = time_at("/scheduled_start");
        observation.start_time = time_at("/started_at");
        observation.end_time = time_at("/ended_at");
        observation.published_at = str_at(item, "/created_at").map(str::to_string);
        Ok(observation)
    }

    fn spaces(body: &serde_json::Value) -> &[serde_json::Value] {
        // 該当なしの場合`data`自体が無い
        body.get("data")
            .and_then(|v| v.as_array())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl PlatformAdapter for TwitterAdapter {
    fn platform(&self) -> Platform {
        Platform::Twitter
    }

    fn capabilities(&self) -> Capabilities {
        // 予定時刻は保存するが遅延は計算しない
        Capabilities {
            observes_upcoming: true,
            has_discovery_feed: true,
            ..Capabilities::default()
        }
    }

    fn map_live(&self, payload: &RawPayload) -> TrackerResult<Vec<LiveObservation>> {
        Ok(collect_mapped(
            Platform::Twitter,
            Self::spaces(&payload.body)
                .iter()
                .map(|item| self.map_space(item, None)),
        ))
    }

    fn map_channel(
        &self,
        channel: &TrackedChannel,
        body: &serde_json::Value,
    ) -> TrackerResult<ChannelSnapshot> {
        let user = body
            .get("data")
            .ok_or_else(|| TrackerError::data_shape(&channel.id, "data"))?;

        Ok(ChannelSnapshot {
            name: str_at(user, "/name").map(str::to_string),
            user_id: str_at(user, "/username").map(str::to_string),
            description: str_at(user, "/description").map(str::to_string),
            thumbnail: str_at(user, "/profile_image_url").map(str::to_string),
            subscriber_count: None,
            follower_count: count_at(user, "/public_metrics/followers_count"),
            view_count: None,
            video_count: count_at(user, "/public_metrics/tweet_count"),
            level: None,
        })
    }

    fn map_discovery(&self, payload: &RawPayload) -> TrackerResult<Vec<DiscoveredItem>> {
        let channel = payload.require_channel()?;
        let observations = collect_mapped(
            Platform::Twitter,
            Self::spaces(&payload.body)
                .iter()
                .map(|item| self.map_space(item, Some(&channel.id))),
        );

        Ok(observations
            .into_iter()
            .filter(|o| o.state != ObservedState::Ended)
            .map(DiscoveredItem::with_details)
            .collect())
    }
}

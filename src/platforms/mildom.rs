//! Mildom
//!
//! 配信IDが無いため`md<ユーザーID>_<開始UNIX秒>`を合成する

use async_trait::async_trait;

use super::{ClientOptions, LiveFetch, LiveStateRequest, PlatformClient};
use crate::api::{staggered, FetchError};
use crate::engine::{
    count_at, i64_at, str_at, Capabilities, ChannelSnapshot, LiveObservation, ObservedState,
    PlatformAdapter, RawPayload,
};
use crate::error::{TrackerError, TrackerResult};
use crate::models::{Platform, TrackedChannel};

const API_BASE: &str = "https://cloudac.mildom.com/nonolive/gappserv";

pub struct MildomClient {
    options: ClientOptions,
}

impl MildomClient {
    pub fn new(options: ClientOptions) -> Self {
        Self { options }
    }

    async fn get(&self, path: &str, user_id: &str) -> Result<serde_json::Value, FetchError> {
        self.options
            .http
            .get_json(
                &format!("{}/{}", API_BASE, path),
                &[
                    ("__platform", "web".to_string()),
                    ("user_id", user_id.to_string()),
                ],
                &[],
            )
            .await
    }
}

#[async_trait]
impl PlatformClient for MildomClient {
    fn platform(&self) -> Platform {
        Platform::Mildom
    }

    async fn fetch_channel_meta(
        &self,
        channel: &TrackedChannel,
    ) -> Result<serde_json::Value, FetchError> {
        self.get("user/profileV2", channel.live_id()).await
    }

    async fn fetch_live_state(&self, request: LiveStateRequest<'_>) -> LiveFetch {
        let results = staggered(
            request.channels.to_vec(),
            self.options.pacing,
            |channel| async move {
                let result = self
                    .get("live/enterstudio", channel.live_id())
                    .await
                    .map(|body| RawPayload::for_channel(&channel, body));
                (channel.live_id().to_string(), result)
            },
        )
        .await;

        LiveFetch::collect(results)
    }
}

fn response_body<'a>(body: &'a serde_json::Value, unit: &str) -> TrackerResult<&'a serde_json::Value> {
    match i64_at(body, "/code") {
        Some(0) => body
            .get("body")
            .ok_or_else(|| TrackerError::data_shape(unit, "body")),
        _ => Err(TrackerError::data_shape(unit, "code")),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MildomAdapter;

impl PlatformAdapter for MildomAdapter {
    fn platform(&self) -> Platform {
        Platform::Mildom
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            discovers_in_live_fetch: true,
            ..Capabilities::default()
        }
    }

    fn map_live(&self, payload: &RawPayload) -> TrackerResult<Vec<LiveObservation>> {
        let channel = payload.require_channel()?;
        let data = response_body(&payload.body, channel.live_id())?;

        // live_mode: 0 = オフライン
        if i64_at(data, "/live_mode").unwrap_or(0) == 0 {
            return Ok(Vec::new());
        }

        let start = i64_at(data, "/live_start_ms")
            .filter(|ms| *ms > 0)
            .map(|ms| ms / 1000)
            .ok_or_else(|| TrackerError::data_shape(channel.live_id(), "live_start_ms"))?;

        let id = Platform::Mildom.synthesize_stream_id(channel.live_id(), start);
        let mut observation = LiveObservation::new(id, &channel.id, ObservedState::Live);
        observation.title = str_at(data, "/anchor_intro")
            .or_else(|| str_at(data, "/live_intro"))
            .map(str::to_string);
        observation.viewers = count_at(data, "/viewers");
        observation.start_time = Some(start);
        observation.thumbnail = str_at(data, "/pic").map(str::to_string);
        Ok(vec![observation])
    }

    fn map_channel(
        &self,
        channel: &TrackedChannel,
        body: &serde_json::Value,
    ) -> TrackerResult<ChannelSnapshot> {
        let data = response_body(body, &channel.id)?;
        let info = data
            .get("user_info")
            .ok_or_else(|| TrackerError::data_shape(&channel.id, "user_info"))?;

        Ok(ChannelSnapshot {
            name: str_at(info, "/loginname").map(str::to_string),
            user_id: None,
            description: str_at(info, "/intro").map(str::to_string),
            thumbnail: str_at(info, "/avatar").map(str::to_string),
            subscriber_count: None,
            follower_count: count_at(info, "/fans"),
            view_count: None,
            video_count: None,
            level: i64_at(info, "/level").and_then(|l| u32::try_from(l).ok()),
        })
    }
}

//! Bilibili Live
//!
//! 配信IDが無いため`bl<ルームID>_<開始UNIX秒>`を合成する。
//! 予約（スケジュール）から予定枠を発見する

use async_trait::async_trait;
use chrono::{FixedOffset, NaiveDateTime, TimeZone};

use super::{ClientOptions, LiveFetch, LiveStateRequest, PlatformClient};
use crate::api::{staggered, FetchError};
use crate::engine::{
    count_at, i64_at, str_at, Capabilities, ChannelSnapshot, DiscoveredItem, LiveObservation,
    ObservedState, PlatformAdapter, RawPayload,
};
use crate::error::{TrackerError, TrackerResult};
use crate::models::{Platform, TrackedChannel};

const ROOM_INFO_URL: &str = "https://api.live.bilibili.com/room/v1/Room/get_info";
const ROOM_BY_USER_URL: &str = "https://api.live.bilibili.com/room/v1/Room/getRoomInfoOld";
const CARD_URL: &str = "https://api.bilibili.com/x/web-interface/card";
const RESERVATION_URL: &str = "https://api.bilibili.com/x/space/reservation";

/// `live_time`は北京時間
const CST_OFFSET_SECS: i32 = 8 * 3600;
const LIVE_STATUS_ON_AIR: i64 = 1;
const RESERVATION_TYPE_LIVE: i64 = 2;

pub struct BilibiliClient {
    options: ClientOptions,
}

impl BilibiliClient {
    pub fn new(options: ClientOptions) -> Self {
        Self { options }
    }

    async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<serde_json::Value, FetchError> {
        self.options
            .http
            .get_json(url, query, &[("Referer", "https://live.bilibili.com/".to_string())])
            .await
    }
}

#[async_trait]
impl PlatformClient for BilibiliClient {
    fn platform(&self) -> Platform {
        Platform::Bilibili
    }

    async fn fetch_channel_meta(
        &self,
        channel: &TrackedChannel,
    ) -> Result<serde_json::Value, FetchError> {
        let card = self.get(CARD_URL, &[("mid", channel.id.clone())]).await?;
        // ルームIDが未設定なら引いておく
        let room = match channel.user_id {
            Some(_) => serde_json::Value::Null,
            None => self.get(ROOM_BY_USER_URL, &[("mid", channel.id.clone())]).await?,
        };
        Ok(serde_json::json!({ "card": card, "room": room }))
    }

    async fn fetch_live_state(&self, request: LiveStateRequest<'_>) -> LiveFetch {
        let results = staggered(
            request.channels.to_vec(),
            self.options.pacing,
            |channel| async move {
                let result = self
                    .get(ROOM_INFO_URL, &[("room_id", channel.live_id().to_string())])
                    .await
                    .map(|body| RawPayload::for_channel(&channel, body));
                (channel.live_id().to_string(), result)
            },
        )
        .await;

        LiveFetch::collect(results)
    }

    async fn fetch_discovery_feed(
        &self,
        channel: &TrackedChannel,
    ) -> Result<RawPayload, FetchError> {
        let body = self
            .get(RESERVATION_URL, &[("vmid", channel.id.clone())])
            .await?;
        Ok(RawPayload::for_channel(channel, body))
    }
}

/// `code != 0`の応答をエラーにして`data`を返す
fn response_data<'a>(body: &'a serde_json::Value, unit: &str) -> TrackerResult<&'a serde_json::Value> {
    match i64_at(body, "/code") {
        Some(0) => body
            .get("data")
            .ok_or_else(|| TrackerError::data_shape(unit, "data")),
        _ => Err(TrackerError::data_shape(unit, "code")),
    }
}

/// `"2023-01-01 20:00:00"`（北京時間）をUNIX秒へ
pub fn parse_live_time(value: &str) -> Option<i64> {
    let naive = NaiveDateTime::parse_from_str(value.trim(), "%Y-%m-%d %H:%M:%S").ok()?;
    FixedOffset::east_opt(CST_OFFSET_SECS)?
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.timestamp())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BilibiliAdapter;

impl BilibiliAdapter {
    fn map_reservation(
        &self,
        channel: &TrackedChannel,
        item: &serde_json::Value,
    ) -> Option<LiveObservation> {
        if i64_at(item, "/stype").is_some_and(|t| t != RESERVATION_TYPE_LIVE) {
            return None;
        }
        let scheduled = i64_at(item, "/live_plan_start_time").filter(|t| *t > 0)?;

        let id = Platform::Bilibili.synthesize_stream_id(channel.live_id(), scheduled);
        let mut observation = LiveObservation::new(id, &channel.id, ObservedState::Upcoming);
        observation.title = str_at(item, "/name").map(str::to_string);
        observation.scheduled_start_time = Some(scheduled);
        Some(observation)
    }
}

impl PlatformAdapter for BilibiliAdapter {
    fn platform(&self) -> Platform {
        Platform::Bilibili
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            discovers_in_live_fetch: true,
            has_discovery_feed: true,
            ..Capabilities::default()
        }
    }

    fn map_live(&self, payload: &RawPayload) -> TrackerResult<Vec<LiveObservation>> {
        let channel = payload.require_channel()?;
        let data = response_data(&payload.body, channel.live_id())?;

        if i64_at(data, "/live_status") != Some(LIVE_STATUS_ON_AIR) {
            return Ok(Vec::new());
        }

        let room_id = i64_at(data, "/room_id")
            .map(|id| id.to_string())
            .unwrap_or_else(|| channel.live_id().to_string());
        let start = str_at(data, "/live_time")
            .and_then(parse_live_time)
            .ok_or_else(|| TrackerError::data_shape(&room_id, "live_time"))?;

        let id = Platform::Bilibili.synthesize_stream_id(&room_id, start);
        let mut observation = LiveObservation::new(id, &channel.id, ObservedState::Live);
        observation.title = str_at(data, "/title").map(str::to_string);
        observation.viewers = count_at(data, "/online");
        observation.start_time = Some(start);
        observation.thumbnail = str_at(data, "/user_cover").map(str::to_string);
        Ok(vec![observation])
    }

    fn map_channel(
        &self,
        channel: &TrackedChannel,
        body: &serde_json::Value,
    ) -> TrackerResult<ChannelSnapshot> {
        let card_body = body
            .get("card")
            .ok_or_else(|| TrackerError::data_shape(&channel.id, "card"))?;
        let data = response_data(card_body, &channel.id)?;

        let room_id = body
            .get("room")
            .and_then(|room| response_data(room, &channel.id).ok())
            .and_then(|room| i64_at(room, "/roomid"))
            .filter(|id| *id > 0)
            .map(|id| id.to_string());

        Ok(ChannelSnapshot {
            name: str_at(data, "/card/name").map(str::to_string),
            user_id: room_id,
            description: str_at(data, "/card/sign").map(str::to_string),
            thumbnail: str_at(data, "/card/face").map(str::to_string),
            subscriber_count: None,
            follower_count: count_at(data, "/follower").or_else(|| count_at(data, "/card/fans")),
            view_count: None,
            video_count: count_at(data, "/archive_count"),
            level: i64_at(data, "/card/level_info/current_level").and_then(|l| u32::try_from(l).ok()),
        })
    }

    fn map_discovery(&self, payload: &RawPayload) -> TrackerResult<Vec<DiscoveredItem>> {
        let channel = payload.require_channel()?;
        let data = response_data(&payload.body, &channel.id)?;
        let Some(items) = data.as_array() else {
            // 予約が無いと`data`がnullになる
            return Ok(Vec::new());
        };

        Ok(items
            .iter()
            .filter_map(|item| self.map_reservation(channel, item))
            .map(DiscoveredItem::with_details)
            .collect())
    }
}

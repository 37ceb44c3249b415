//! YouTube Data API v3
//!
//! 発見はチャンネルのRSSフィード、詳細とライブ状態は`videos`エンドポイント（最大40件/リクエスト）、
//! 統計は`channels`エンドポイント。メンバー限定判定はライブチャットの取得可否で行う

use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;

use super::{current_key, ClientOptions, LiveFetch, LiveStateRequest, PlatformClient};
use crate::api::{staggered, ApiKeyRotator, FetchError};
use crate::engine::timedata::{parse_iso8601_duration, parse_rfc3339_epoch, premiere_flag};
use crate::engine::{
    collect_mapped, count_at, str_at, Capabilities, ChannelSnapshot, DiscoveredItem,
    LiveObservation, ObservedState, PlatformAdapter, RawPayload,
};
use crate::error::{TrackerError, TrackerResult};
use crate::models::{Platform, TrackedChannel};

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";
const FEED_URL: &str = "https://www.youtube.com/feeds/videos.xml";
const VIDEO_PARTS: &str = "snippet,liveStreamingDetails,contentDetails";
const MAX_IDS_PER_REQUEST: usize = 40;

pub struct YouTubeClient {
    options: ClientOptions,
    keys: ApiKeyRotator,
}

impl YouTubeClient {
    pub fn new(options: ClientOptions, keys: ApiKeyRotator) -> Self {
        Self { options, keys }
    }

    async fn fetch_videos(&self, ids: &[String]) -> Result<RawPayload, FetchError> {
        let key = current_key(&self.keys)?;
        let body = self
            .options
            .http
            .get_json(
                &format!("{}/videos", API_BASE),
                &[
                    ("part", VIDEO_PARTS.to_string()),
                    ("id", ids.join(",")),
                    ("maxResults", MAX_IDS_PER_REQUEST.to_string()),
                    ("key", key),
                ],
                &[],
            )
            .await?;
        Ok(RawPayload::batch(body))
    }

    /// IDを40件ずつに分け、段階的に取得
    async fn fetch_videos_chunked(&self, ids: &[String]) -> LiveFetch {
        let chunks: Vec<Vec<String>> = ids
            .chunks(MAX_IDS_PER_REQUEST)
            .map(|chunk| chunk.to_vec())
            .collect();

        let results = staggered(chunks, self.options.pacing, |chunk| async move {
            let result = self.fetch_videos(&chunk).await;
            (chunk.join(","), result)
        })
        .await;

        LiveFetch::collect(results)
    }
}

#[async_trait]
impl PlatformClient for YouTubeClient {
    fn platform(&self) -> Platform {
        Platform::Youtube
    }

    async fn fetch_channel_meta(
        &self,
        channel: &TrackedChannel,
    ) -> Result<serde_json::Value, FetchError> {
        let key = current_key(&self.keys)?;
        self.options
            .http
            .get_json(
                &format!("{}/channels", API_BASE),
                &[
                    ("part", "snippet,statistics".to_string()),
                    ("id", channel.id.clone()),
                    ("key", key),
                ],
                &[],
            )
            .await
    }

    async fn fetch_live_state(&self, request: LiveStateRequest<'_>) -> LiveFetch {
        self.fetch_videos_chunked(request.stream_ids).await
    }

    async fn fetch_discovery_feed(
        &self,
        channel: &TrackedChannel,
    ) -> Result<RawPayload, FetchError> {
        let xml = self
            .options
            .http
            .get_text(FEED_URL, &[("channel_id", channel.id.clone())], &[])
            .await?;
        Ok(RawPayload::for_channel(
            channel,
            serde_json::Value::String(xml),
        ))
    }

    fn hydrate_batch_size(&self) -> usize {
        MAX_IDS_PER_REQUEST
    }

    async fn hydrate(&self, ids: &[String]) -> LiveFetch {
        self.fetch_videos_chunked(ids).await
    }

    async fn probe_membership(
        &self,
        observation: &LiveObservation,
    ) -> Result<Option<bool>, FetchError> {
        let Some(chat_id) = observation.live_chat_id.as_deref() else {
            return Ok(None);
        };

        let key = current_key(&self.keys)?;
        let result = self
            .options
            .http
            .get_json(
                &format!("{}/liveChat/messages", API_BASE),
                &[
                    ("liveChatId", chat_id.to_string()),
                    ("part", "id".to_string()),
                    ("key", key),
                ],
                &[],
            )
            .await;

        match result {
            Ok(_) => Ok(Some(false)),
            // チャットが読めない = メンバー限定
            Err(FetchError::Forbidden { .. }) => {
                tracing::debug!("🔒 '{}' live chat is restricted", observation.id);
                Ok(Some(true))
            }
            Err(e) => Err(e),
        }
    }

    fn key_rotator(&self) -> Option<&ApiKeyRotator> {
        Some(&self.keys)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct YouTubeAdapter;

impl YouTubeAdapter {
    fn map_video(&self, item: &serde_json::Value) -> TrackerResult<LiveObservation> {
        let id = str_at(item, "/id").ok_or_else(|| TrackerError::data_shape("<unknown>", "id"))?;
        let channel_id = str_at(item, "/snippet/channelId")
            .ok_or_else(|| TrackerError::data_shape(id, "snippet.channelId"))?;

        let details = item.get("liveStreamingDetails");
        let state = match details {
            None => ObservedState::Video,
            Some(d) if d.get("actualEndTime").is_some() => ObservedState::Ended,
            Some(d) if d.get("actualStartTime").is_some() => ObservedState::Live,
            Some(_) => ObservedState::Upcoming,
        };
        let raw_duration = str_at(item, "/contentDetails/duration");
        let time_at = |pointer: &str| str_at(item, pointer).and_then(parse_rfc3339_epoch);

        let mut observation = LiveObservation::new(id, channel_id, state);
        observation.title = str_at(item, "/snippet/title").map(str::to_string);
        observation.published_at = str_at(item, "/snippet/publishedAt").map(str::to_string);
        observation.thumbnail = str_at(item, "/snippet/thumbnails/high/url")
            .or_else(|| str_at(item, "/snippet/thumbnails/default/url"))
            .map(str::to_string);
        observation.scheduled_start_time = time_at("/liveStreamingDetails/scheduledStartTime");
        observation.start_time = time_at("/liveStreamingDetails/actualStartTime");
        observation.end_time = time_at("/liveStreamingDetails/actualEndTime");
        observation.viewers = count_at(item, "/liveStreamingDetails/concurrentViewers");
        observation.live_chat_id =
            str_at(item, "/liveStreamingDetails/activeLiveChatId").map(str::to_string);

        match state {
            ObservedState::Live | ObservedState::Upcoming => {
                observation.is_premiere = premiere_flag(raw_duration);
            }
            ObservedState::Video => {
                observation.duration = raw_duration.and_then(parse_iso8601_duration);
            }
            ObservedState::Ended => {}
        }

        Ok(observation)
    }
}

impl PlatformAdapter for YouTubeAdapter {
    fn platform(&self) -> Platform {
        Platform::Youtube
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            has_schedule: true,
            detects_premiere: true,
            detects_membership: true,
            discovers_in_live_fetch: false,
            observes_upcoming: true,
            has_discovery_feed: true,
        }
    }

    fn map_live(&self, payload: &RawPayload) -> TrackerResult<Vec<LiveObservation>> {
        let items = payload
            .body
            .get("items")
            .and_then(|v| v.as_array())
            .ok_or_else(|| TrackerError::data_shape("<videos>", "items"))?;

        Ok(collect_mapped(
            Platform::Youtube,
            items.iter().map(|item| self.map_video(item)),
        ))
    }

    fn map_channel(
        &self,
        channel: &TrackedChannel,
        body: &serde_json::Value,
    ) -> TrackerResult<ChannelSnapshot> {
        let item = body
            .pointer("/items/0")
            .ok_or_else(|| TrackerError::data_shape(&channel.id, "items"))?;

        Ok(ChannelSnapshot {
            name: str_at(item, "/snippet/title").map(str::to_string),
            user_id: None,
            description: str_at(item, "/snippet/description").map(str::to_string),
            thumbnail: str_at(item, "/snippet/thumbnails/high/url").map(str::to_string),
            subscriber_count: count_at(item, "/statistics/subscriberCount"),
            follower_count: None,
            view_count: count_at(item, "/statistics/viewCount"),
            video_count: count_at(item, "/statistics/videoCount"),
            level: None,
        })
    }

    fn map_discovery(&self, payload: &RawPayload) -> TrackerResult<Vec<DiscoveredItem>> {
        let channel = payload.require_channel()?;
        let xml = payload
            .body
            .as_str()
            .ok_or_else(|| TrackerError::data_shape(&channel.id, "feed"))?;
        Ok(parse_feed(xml, &channel.id))
    }
}

fn feed_regexes() -> &'static (Regex, Regex, Regex) {
    static RE: OnceLock<(Regex, Regex, Regex)> = OnceLock::new();
    RE.get_or_init(|| {
        (
            Regex::new(r"(?s)<entry>(.*?)</entry>").expect("valid entry regex"),
            Regex::new(r"<yt:videoId>([^<]+)</yt:videoId>").expect("valid videoId regex"),
            Regex::new(r"<title>([^<]*)</title>").expect("valid title regex"),
        )
    })
}

/// RSSフィードから動画IDとタイトルを取り出す
pub fn parse_feed(xml: &str, channel_id: &str) -> Vec<DiscoveredItem> {
    let (entry_re, id_re, title_re) = feed_regexes();

    entry_re
        .captures_iter(xml)
        .filter_map(|entry| {
            let body = entry.get(1)?.as_str();
            let id = id_re.captures(body)?.get(1)?.as_str().trim();
            let mut item = DiscoveredItem::new(id, channel_id);
            item.title = title_re
                .captures(body)
                .and_then(|cap| cap.get(1))
                .map(|m| unescape_xml(m.as_str()));
            Some(item)
        })
        .collect()
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn video(id: &str, details: Option<serde_json::Value>, duration: &str) -> serde_json::Value {
        let mut item = json!({
            "id": id,
            "snippet": {
                "channelId": "UC1",
                "title": format!("title {}", id),
                "publishedAt": "2023-01-01T00:00:00Z",
                "thumbnails": { "high": { "url": "https://i.ytimg.com/x.jpg" } }
            },
            "contentDetails": { "duration": duration }
        });
        if let Some(details) = details {
            item["liveStreamingDetails"] = details;
        }
        item
    }

    #[test]
    fn test_map_live_states() {
        let body = json!({ "items": [
            video("up", Some(json!({ "scheduledStartTime": "2023-01-01T12:00:00Z" })), "P0D"),
            video("live", Some(json!({
                "scheduledStartTime": "2023-01-01T12:00:00Z",
                "actualStartTime": "2023-01-01T12:05:00Z",
                "concurrentViewers": "1234",
                "activeLiveChatId": "chat-1"
            })), "PT0S"),
            video("ended", Some(json!({
                "actualStartTime": "2023-01-01T12:00:00Z",
                "actualEndTime": "2023-01-01T13:00:00Z"
            })), "PT1H"),
            video("vod", None, "PT1H2M3S"),
        ]});

        let observations = YouTubeAdapter
            .map_live(&RawPayload::batch(body))
            .unwrap();
        assert_eq!(observations.len(), 4);

        assert_eq!(observations[0].state, ObservedState::Upcoming);
        assert_eq!(observations[0].is_premiere, Some(false));
        assert_eq!(observations[0].scheduled_start_time, Some(1_672_574_400));

        let live = &observations[1];
        assert_eq!(live.state, ObservedState::Live);
        assert_eq!(live.viewers, Some(1234));
        assert_eq!(live.start_time, Some(1_672_574_700));
        assert_eq!(live.live_chat_id.as_deref(), Some("chat-1"));
        assert_eq!(live.is_premiere, Some(false));

        assert_eq!(observations[2].state, ObservedState::Ended);
        assert_eq!(observations[2].end_time, Some(1_672_578_000));
        assert_eq!(observations[2].is_premiere, None);

        assert_eq!(observations[3].state, ObservedState::Video);
        assert_eq!(observations[3].duration, Some(3723));
    }

    #[test]
    fn test_premiere_detected_from_duration() {
        let body = json!({ "items": [
            video("prem", Some(json!({ "scheduledStartTime": "2023-01-01T12:00:00Z" })), "PT3M20S"),
        ]});
        let observations = YouTubeAdapter
            .map_live(&RawPayload::batch(body))
            .unwrap();
        assert_eq!(observations[0].is_premiere, Some(true));
    }

    #[test]
    fn test_map_live_skips_malformed_items() {
        let body = json!({ "items": [
            { "id": "no-snippet" },
            video("ok", None, "PT1M"),
        ]});
        let observations = YouTubeAdapter
            .map_live(&RawPayload::batch(body))
            .unwrap();
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].id, "ok");
    }

    #[test]
    fn test_map_live_requires_items() {
        assert!(YouTubeAdapter
            .map_live(&RawPayload::batch(json!({ "error": {} })))
            .is_err());
    }

    #[test]
    fn test_map_channel() {
        let tracked = TrackedChannel::new("UC1", Platform::Youtube, "g");
        let body = json!({ "items": [{
            "snippet": { "title": "Name", "description": "desc" },
            "statistics": { "subscriberCount": "1500", "viewCount": "99999", "videoCount": "321" }
        }]});
        let snapshot = YouTubeAdapter.map_channel(&tracked, &body).unwrap();
        assert_eq!(snapshot.name.as_deref(), Some("Name"));
        assert_eq!(snapshot.subscriber_count, Some(1500));
        assert_eq!(snapshot.view_count, Some(99999));
        assert_eq!(snapshot.video_count, Some(321));

        assert!(YouTubeAdapter
            .map_channel(&tracked, &json!({ "items": [] }))
            .is_err());
    }

    #[test]
    fn test_parse_feed() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns:yt="http://www.youtube.com/xml/schemas/2015">
  <title>Channel</title>
  <entry>
    <id>yt:video:A</id>
    <yt:videoId>A</yt:videoId>
    <title>First &amp; best</title>
  </entry>
  <entry>
    <yt:videoId>B</yt:videoId>
    <title>Second</title>
  </entry>
</feed>"#;
        let items = parse_feed(xml, "UC1");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "A");
        assert_eq!(items[0].title.as_deref(), Some("First & best"));
        assert_eq!(items[1].channel_id, "UC1");
        assert!(items[1].details.is_none());
    }

    #[test]
    fn test_map_discovery_requires_channel() {
        let payload = RawPayload::batch(json!("<feed></feed>"));
        assert!(YouTubeAdapter.map_discovery(&payload).is_err());
    }
}

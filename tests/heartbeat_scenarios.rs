//! ハートビートの一連の流れ（取得 → 突き合わせ → 書き込み）

mod common;

use common::{context, ScriptedClient};
use serde_json::json;
use std::sync::Arc;

use vtrack::api::FetchError;
use vtrack::database::RecordFilter;
use vtrack::platforms::twitch::TwitchAdapter;
use vtrack::platforms::youtube::YouTubeAdapter;
use vtrack::platforms::LiveFetch;
use vtrack::{
    Platform, Stream, StreamRegistry, StreamStatus, TaskKind, TrackedChannel, ViewerSeriesStore,
};

fn youtube_live(id: &str, viewers: u64) -> serde_json::Value {
    json!({
        "id": id,
        "snippet": {
            "channelId": "UC1",
            "title": "morning stream",
            "publishedAt": "2024-01-01T00:00:00Z"
        },
        "contentDetails": { "duration": "P0D" },
        "liveStreamingDetails": {
            "scheduledStartTime": "2024-01-01T09:00:00Z",
            "actualStartTime": "2024-01-01T09:02:00Z",
            "concurrentViewers": viewers.to_string()
        }
    })
}

fn find(ctx: &vtrack::TaskContext, platform: Platform, id: &str) -> Stream {
    let db = ctx.db.lock();
    db.find_streams(&RecordFilter::platform(platform).include_ids([id]))
        .unwrap()
        .into_iter()
        .next()
        .expect("stream exists")
}

#[tokio::test]
async fn test_upcoming_goes_live_then_ends_with_average() {
    let client = Arc::new(ScriptedClient::new(Platform::Youtube));
    let channels = vec![TrackedChannel::new("UC1", Platform::Youtube, "hololive")];
    let (ctx, _) = context(client.clone(), Arc::new(YouTubeAdapter), channels);

    let mut upcoming = Stream::new("x1", Platform::Youtube, "UC1", "hololive");
    upcoming.timedata.scheduled_start_time = Some(1_704_099_600);
    ctx.db.lock().insert_streams(&[upcoming]);

    client.push_live_body(json!({ "items": [youtube_live("x1", 100)] }));
    client.push_live_body(json!({ "items": [youtube_live("x1", 80)] }));
    client.push_live_body(json!({ "items": [] }));

    // 1回目: ライブ開始
    let summary = ctx.run(TaskKind::Heartbeat).await;
    assert_eq!(summary.updated, 1);
    let stream = find(&ctx, Platform::Youtube, "x1");
    assert_eq!(stream.status, StreamStatus::Live);
    assert_eq!(stream.peak_viewers, Some(100));
    assert_eq!(stream.timedata.start_time, Some(1_704_099_720));
    assert_eq!(stream.timedata.late_time, Some(120));

    // 2回目: ピークは維持
    ctx.run(TaskKind::Heartbeat).await;
    let stream = find(&ctx, Platform::Youtube, "x1");
    assert_eq!(stream.viewers, Some(80));
    assert_eq!(stream.peak_viewers, Some(100));
    {
        let db = ctx.db.lock();
        let series = db.find_series(Platform::Youtube, &["x1".to_string()]).unwrap();
        assert_eq!(series["x1"].viewers_data.len(), 2);
    }

    // 3回目: 結果から消えたので終了
    let summary = ctx.run(TaskKind::Heartbeat).await;
    assert_eq!(summary.ended, 1);
    let stream = find(&ctx, Platform::Youtube, "x1");
    assert_eq!(stream.status, StreamStatus::Past);
    assert!(stream.is_missing);
    assert_eq!(stream.average_viewers, Some(90));
    assert!(stream.timedata.end_time.is_some());
    {
        let db = ctx.db.lock();
        let series = db.find_series(Platform::Youtube, &["x1".to_string()]).unwrap();
        assert!(series.is_empty());
    }

    // 4回目: 追跡対象が無いので取得しない
    let end_time = stream.timedata.end_time;
    let summary = ctx.run(TaskKind::Heartbeat).await;
    assert_eq!(summary, vtrack::TaskSummary::default());
    assert_eq!(client.live_calls(), 3);
    assert_eq!(find(&ctx, Platform::Youtube, "x1").timedata.end_time, end_time);
}

#[tokio::test]
async fn test_live_fetch_discovers_and_ends_streams() {
    let client = Arc::new(ScriptedClient::new(Platform::Twitch));
    let channels = vec![TrackedChannel::new("streamer", Platform::Twitch, "indie")];
    let (ctx, _) = context(client.clone(), Arc::new(TwitchAdapter), channels);

    let live = json!({ "data": [{
        "id": "4001",
        "user_login": "Streamer",
        "type": "live",
        "title": "speedrun",
        "viewer_count": 40,
        "started_at": "2024-01-01T12:00:00Z"
    }]});
    client.push_live_body(live.clone());
    client.push_live_body(live);
    client.push_live_body(json!({ "data": [] }));

    let summary = ctx.run(TaskKind::Heartbeat).await;
    assert_eq!(summary.inserted, 1);
    let stream = find(&ctx, Platform::Twitch, "4001");
    assert_eq!(stream.status, StreamStatus::Live);
    assert_eq!(stream.channel_id, "streamer");
    assert_eq!(stream.group, "indie");

    let summary = ctx.run(TaskKind::Heartbeat).await;
    assert_eq!(summary.inserted, 0);
    assert_eq!(summary.updated, 1);

    let summary = ctx.run(TaskKind::Heartbeat).await;
    assert_eq!(summary.ended, 1);
    let stream = find(&ctx, Platform::Twitch, "4001");
    assert_eq!(stream.status, StreamStatus::Past);
    assert_eq!(stream.average_viewers, Some(40));

    let db = ctx.db.lock();
    let all = db.find_streams(&RecordFilter::platform(Platform::Twitch)).unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn test_fetch_failure_keeps_stream_live() {
    let client = Arc::new(ScriptedClient::new(Platform::Youtube));
    let channels = vec![TrackedChannel::new("UC1", Platform::Youtube, "hololive")];
    let (ctx, _) = context(client.clone(), Arc::new(YouTubeAdapter), channels);

    let mut live = Stream::new("x1", Platform::Youtube, "UC1", "hololive");
    live.status = StreamStatus::Live;
    live.viewers = Some(10);
    ctx.db.lock().insert_streams(&[live]);

    client.push_live(LiveFetch {
        payloads: Vec::new(),
        failures: vec![(
            "x1".to_string(),
            FetchError::Status {
                status: 500,
                body: "backend error".to_string(),
            },
        )],
    });

    let summary = ctx.run(TaskKind::Heartbeat).await;
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.ended, 0);

    let stream = find(&ctx, Platform::Youtube, "x1");
    assert_eq!(stream.status, StreamStatus::Live);
    assert!(!stream.is_missing);
}

#[tokio::test]
async fn test_rate_limit_rotates_key() {
    let client = Arc::new(ScriptedClient::new(Platform::Youtube).with_keys(&["key-a", "key-b"]));
    let channels = vec![TrackedChannel::new("UC1", Platform::Youtube, "hololive")];
    let (ctx, _) = context(client.clone(), Arc::new(YouTubeAdapter), channels);

    ctx.db
        .lock()
        .insert_streams(&[Stream::new("x1", Platform::Youtube, "UC1", "hololive")]);

    use vtrack::PlatformClient;
    let rotator = client.key_rotator().unwrap();
    assert_eq!(rotator.get().unwrap().as_str(), "key-a");

    client.push_live(LiveFetch {
        payloads: Vec::new(),
        failures: vec![("x1".to_string(), FetchError::RateLimited)],
    });
    ctx.run(TaskKind::Heartbeat).await;

    assert_eq!(rotator.get().unwrap().as_str(), "key-b");
    assert_eq!(find(&ctx, Platform::Youtube, "x1").status, StreamStatus::Upcoming);
}

#[tokio::test]
async fn test_unreadable_batch_leaves_all_streams_untouched() {
    let client = Arc::new(ScriptedClient::new(Platform::Youtube));
    let channels = vec![TrackedChannel::new("UC1", Platform::Youtube, "hololive")];
    let (ctx, _) = context(client.clone(), Arc::new(YouTubeAdapter), channels);

    let mut live = Stream::new("x1", Platform::Youtube, "UC1", "hololive");
    live.status = StreamStatus::Live;
    ctx.db.lock().insert_streams(&[live]);

    client.push_live_body(json!({ "error": "unexpected" }));

    let summary = ctx.run(TaskKind::Heartbeat).await;
    assert_eq!(summary.failed, 1);
    assert_eq!(find(&ctx, Platform::Youtube, "x1").status, StreamStatus::Live);
}

#[tokio::test]
async fn test_failed_login_batch_keeps_stream_with_known_user_id() {
    let client = Arc::new(ScriptedClient::new(Platform::Twitch));
    let mut channel = TrackedChannel::new("streamer", Platform::Twitch, "indie");
    channel.user_id = Some("123456".to_string());
    let (ctx, _) = context(client.clone(), Arc::new(TwitchAdapter), vec![channel]);

    let mut live = Stream::new("4001", Platform::Twitch, "streamer", "indie");
    live.status = StreamStatus::Live;
    live.viewers = Some(40);
    ctx.db.lock().insert_streams(&[live]);

    client.push_live(LiveFetch {
        payloads: Vec::new(),
        failures: vec![(
            "streamer".to_string(),
            FetchError::Status {
                status: 503,
                body: "service unavailable".to_string(),
            },
        )],
    });

    let summary = ctx.run(TaskKind::Heartbeat).await;
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.ended, 0);

    let stream = find(&ctx, Platform::Twitch, "4001");
    assert_eq!(stream.status, StreamStatus::Live);
    assert!(!stream.is_missing);
}

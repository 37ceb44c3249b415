//! 統合テスト用の台本つきクライアント

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use vtrack::api::{ApiKey, ApiKeyRotator, FetchError};
use vtrack::database::TrackerDatabase;
use vtrack::engine::{PlatformAdapter, RawPayload};
use vtrack::platforms::{LiveFetch, LiveStateRequest, PlatformClient, PlatformHandle};
use vtrack::{LiveObservation, Platform, TaskContext, TrackedChannel};

/// 呼ばれるたびに用意した応答を順に返すクライアント
pub struct ScriptedClient {
    platform: Platform,
    live: Mutex<VecDeque<LiveFetch>>,
    feeds: Mutex<VecDeque<Result<RawPayload, FetchError>>>,
    hydrations: Mutex<VecDeque<LiveFetch>>,
    metas: Mutex<VecDeque<Result<serde_json::Value, FetchError>>>,
    pub live_calls: AtomicUsize,
    pub hydrated_ids: Mutex<Vec<Vec<String>>>,
    pub requested_streams: Mutex<Vec<Vec<String>>>,
    rotator: Option<ApiKeyRotator>,
}

impl ScriptedClient {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            live: Mutex::new(VecDeque::new()),
            feeds: Mutex::new(VecDeque::new()),
            hydrations: Mutex::new(VecDeque::new()),
            metas: Mutex::new(VecDeque::new()),
            live_calls: AtomicUsize::new(0),
            hydrated_ids: Mutex::new(Vec::new()),
            requested_streams: Mutex::new(Vec::new()),
            rotator: None,
        }
    }

    pub fn with_keys(mut self, keys: &[&str]) -> Self {
        self.rotator = Some(ApiKeyRotator::new(
            keys.iter().map(|k| ApiKey::new(*k)).collect(),
            Duration::from_secs(3600),
            Duration::from_secs(0),
        ));
        self
    }

    pub fn push_live(&self, fetch: LiveFetch) {
        self.live.lock().push_back(fetch);
    }

    pub fn push_live_body(&self, body: serde_json::Value) {
        self.push_live(LiveFetch {
            payloads: vec![RawPayload::batch(body)],
            failures: Vec::new(),
        });
    }

    pub fn push_feed(&self, result: Result<RawPayload, FetchError>) {
        self.feeds.lock().push_back(result);
    }

    pub fn push_hydration(&self, body: serde_json::Value) {
        self.hydrations.lock().push_back(LiveFetch {
            payloads: vec![RawPayload::batch(body)],
            failures: Vec::new(),
        });
    }

    pub fn push_meta(&self, result: Result<serde_json::Value, FetchError>) {
        self.metas.lock().push_back(result);
    }

    pub fn live_calls(&self) -> usize {
        self.live_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlatformClient for ScriptedClient {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn fetch_channel_meta(
        &self,
        _channel: &TrackedChannel,
    ) -> Result<serde_json::Value, FetchError> {
        self.metas
            .lock()
            .pop_front()
            .unwrap_or(Err(FetchError::NotFound))
    }

    async fn fetch_live_state(&self, request: LiveStateRequest<'_>) -> LiveFetch {
        self.live_calls.fetch_add(1, Ordering::SeqCst);
        self.requested_streams
            .lock()
            .push(request.stream_ids.to_vec());
        self.live.lock().pop_front().unwrap_or_default()
    }

    async fn fetch_discovery_feed(
        &self,
        _channel: &TrackedChannel,
    ) -> Result<RawPayload, FetchError> {
        self.feeds
            .lock()
            .pop_front()
            .unwrap_or(Err(FetchError::Unsupported))
    }

    async fn hydrate(&self, ids: &[String]) -> LiveFetch {
        self.hydrated_ids.lock().push(ids.to_vec());
        self.hydrations.lock().pop_front().unwrap_or_default()
    }

    async fn probe_membership(
        &self,
        _observation: &LiveObservation,
    ) -> Result<Option<bool>, FetchError> {
        Ok(None)
    }

    fn key_rotator(&self) -> Option<&ApiKeyRotator> {
        self.rotator.as_ref()
    }
}

/// インメモリDBと1プラットフォームのコンテキスト
pub fn context(
    client: Arc<ScriptedClient>,
    adapter: Arc<dyn PlatformAdapter>,
    channels: Vec<TrackedChannel>,
) -> (TaskContext, PlatformHandle) {
    let db = TrackerDatabase::new_in_memory().expect("in-memory database");
    let handle = PlatformHandle::new(client, adapter);
    let ctx = TaskContext {
        db: Arc::new(Mutex::new(db)),
        platforms: vec![handle.clone()],
        channels,
        policy: Default::default(),
        pacing: Duration::ZERO,
    };
    (ctx, handle)
}

//! APIキーのローテーション
//!
//! 時間経過による定期ローテーションと、レート制限時の強制ローテーション（デバウンス付き）

use parking_lot::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug)]
struct RotatorState {
    index: usize,
    last_rotated: Instant,
    last_forced: Option<Instant>,
}

/// APIキーローテーター
#[derive(Debug)]
pub struct ApiKeyRotator {
    keys: Vec<ApiKey>,
    rotate_every: Duration,
    debounce: Duration,
    state: Mutex<RotatorState>,
}

impl ApiKeyRotator {
    pub fn new(keys: Vec<ApiKey>, rotate_every: Duration, debounce: Duration) -> Self {
        Self {
            keys,
            rotate_every,
            debounce,
            state: Mutex::new(RotatorState {
                index: 0,
                last_rotated: Instant::now(),
                last_forced: None,
            }),
        }
    }

    /// 単一キー（ローテーションなし）
    pub fn single(key: impl Into<String>) -> Self {
        Self::new(
            vec![ApiKey::new(key)],
            Duration::from_secs(u64::MAX / 4),
            Duration::from_secs(0),
        )
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// 現在のキーを取得。一定時間経過していれば次のキーへ進める
    pub fn get(&self) -> Option<ApiKey> {
        self.get_at(Instant::now())
    }

    /// レート制限時の強制ローテーション。デバウンス期間内の再要求は無視して`false`
    pub fn force_rotate(&self) -> bool {
        self.force_rotate_at(Instant::now())
    }

    pub(crate) fn get_at(&self, now: Instant) -> Option<ApiKey> {
        if self.keys.is_empty() {
            return None;
        }

        let mut state = self.state.lock();
        if now.saturating_duration_since(state.last_rotated) >= self.rotate_every {
            state.index = (state.index + 1) % self.keys.len();
            state.last_rotated = now;
            tracing::debug!("🔑 API key rotated on schedule (index {})", state.index);
        }
        Some(self.keys[state.index].clone())
    }

    pub(crate) fn force_rotate_at(&self, now: Instant) -> bool {
        if self.keys.len() < 2 {
            return false;
        }

        let mut state = self.state.lock();
        if let Some(last) = state.last_forced {
            if now.saturating_duration_since(last) < self.debounce {
                tracing::debug!("🔑 Forced key rotation ignored (debounced)");
                return false;
            }
        }

        state.index = (state.index + 1) % self.keys.len();
        state.last_rotated = now;
        state.last_forced = Some(now);
        tracing::info!("🔑 API key force-rotated (index {})", state.index);
        true
    }
}

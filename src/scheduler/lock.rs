//! タスクごとの多重実行防止ロック
//!
//! 実行中に次のtickが来たらスキップ。一定回数スキップが続いた場合は
//! 前回の実行が固まったとみなして強制取得する

use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Default)]
struct LockState {
    held: bool,
    /// 保持中に取得を試みた連続回数
    retries: u32,
}

#[derive(Debug)]
pub struct TaskLock {
    max_retries: u32,
    state: Mutex<LockState>,
}

impl TaskLock {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            state: Mutex::new(LockState::default()),
        }
    }

    /// 取得できれば`true`。保持中は`max_retries`回まで`false`、その次は強制取得して`true`
    pub fn lock(&self) -> bool {
        let mut state = self.state.lock();
        if !state.held {
            state.held = true;
            state.retries = 0;
            return true;
        }

        if state.retries < self.max_retries {
            state.retries += 1;
            return false;
        }

        tracing::warn!(
            "🔓 Lock still held after {} retries, forcing acquisition",
            state.retries
        );
        state.retries = 0;
        true
    }

    pub fn unlock(&self) {
        let mut state = self.state.lock();
        state.held = false;
        state.retries = 0;
    }

    /// 取得できればDropで解放するガードを返す
    pub fn try_guard(self: &Arc<Self>) -> Option<TaskLockGuard> {
        self.lock().then(|| TaskLockGuard {
            lock: Arc::clone(self),
        })
    }
}

/// Dropで`unlock()`するガード
#[derive(Debug)]
pub struct TaskLockGuard {
    lock: Arc<TaskLock>,
}

impl Drop for TaskLockGuard {
    fn drop(&mut self) {
        self.lock.unlock();
    }
}

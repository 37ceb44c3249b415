//! 段階的に開始するファンアウト
//!
//! 全リクエストは並行に走るが、開始時刻を`delay × index`ずつずらす。
//! 同時実行数の制限ではない

use futures_util::future::join_all;
use std::future::Future;
use std::time::Duration;

/// 各要素に対して`f`を`delay × index`遅らせて開始し、全件を入力順で待つ
pub async fn staggered<T, F, Fut, R>(items: Vec<T>, delay: Duration, f: F) -> Vec<R>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = R>,
{
    let futures = items.into_iter().enumerate().map(|(index, item)| {
        let wait = delay.saturating_mul(index as u32);
        let fut = f(item);
        async move {
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }
            fut.await
        }
    });

    join_all(futures).await
}

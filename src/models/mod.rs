//! 永続化されるドキュメントモデル
//!
//! チャンネル、統計履歴、配信（動画）、視聴者数時系列の4コレクション分

pub mod channel;
pub mod platform;
pub mod stream;
pub mod viewers;

pub use channel::{Channel, ChannelStatsHistory, StatsSample, TrackedChannel};
pub use platform::Platform;
pub use stream::{Stream, StreamStatus, TimeData};
pub use viewers::{average_viewers, ViewerSample, ViewerSeries};

/// 現在時刻（UNIX秒）
pub fn now_epoch() -> i64 {
    chrono::Utc::now().timestamp()
}

//! HTTP周りの共通部品
//!
//! プラットフォームクライアントが共有するHTTPラッパー、APIキーのローテーション、
//! 段階的に開始するファンアウト

pub mod http;
pub mod key_rotator;
pub mod pacing;

pub use http::{FetchError, HttpClient};
pub use key_rotator::{ApiKey, ApiKeyRotator};
pub use pacing::staggered;

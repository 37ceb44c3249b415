use std::time::Duration;

use reqwest::StatusCode;

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Rate limited by upstream")]
    RateLimited,
    #[error("Access denied: {reason}")]
    Forbidden { reason: String },
    #[error("Not found")]
    NotFound,
    #[error("Failed to parse JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Missing field '{field}' in response")]
    MissingField { field: String },
    #[error("Operation not supported by this platform")]
    Unsupported,
}

impl FetchError {
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// キーのローテーションが必要なエラーか
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, FetchError::RateLimited)
    }
}

/// YouTube Data APIは403でクォータ超過を返すため本文も見る
const RATE_LIMIT_REASONS: [&str; 3] = ["quotaExceeded", "rateLimitExceeded", "userRateLimitExceeded"];

/// HTTPステータスと本文からエラーを分類
pub fn classify_status(status: StatusCode, body: &str) -> Result<(), FetchError> {
    if status.is_success() {
        return Ok(());
    }

    match status {
        StatusCode::TOO_MANY_REQUESTS => Err(FetchError::RateLimited),
        StatusCode::FORBIDDEN => {
            if RATE_LIMIT_REASONS.iter().any(|r| body.contains(r)) {
                Err(FetchError::RateLimited)
            } else {
                Err(FetchError::Forbidden {
                    reason: truncate(body, 200),
                })
            }
        }
        StatusCode::NOT_FOUND => Err(FetchError::NotFound),
        _ => Err(FetchError::Status {
            status: status.as_u16(),
            body: truncate(body, 200),
        }),
    }
}

fn truncate(body: &str, max_chars: usize) -> String {
    body.chars().take(max_chars).collect()
}

/// reqwest::Clientの薄いラッパー
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let inner = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (compatible; vtrack/0.1)")
            .timeout(timeout)
            .build()?;
        Ok(Self { inner })
    }

    /// GETしてJSONとして返す
    pub async fn get_json(
        &self,
        url: &str,
        query: &[(&str, String)],
        headers: &[(&str, String)],
    ) -> Result<serde_json::Value, FetchError> {
        let text = self.get_text(url, query, headers).await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// GETして本文を返す
    pub async fn get_text(
        &self,
        url: &str,
        query: &[(&str, String)],
        headers: &[(&str, String)],
    ) -> Result<String, FetchError> {
        let mut request = self.inner.get(url).query(query);
        for (name, value) in headers {
            request = request.header(*name, value.as_str());
        }

        let response = request.send().await.map_err(|e| {
            tracing::debug!("❌ Request to {} failed: {}", url, e);
            e
        })?;
        let status = response.status();
        let text = response.text().await?;

        tracing::trace!(url = %url, status = status.as_u16(), size = text.len(), "📨 API response received");
        classify_status(status, &text)?;
        Ok(text)
    }
}

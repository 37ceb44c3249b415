//! 視聴者数の時系列
//!
//! 配信中のみ保持し、終了時に平均値を配信レコードへ畳み込んでから削除する

use serde::{Deserialize, Deserializer, Serialize};

use super::Platform;

/// 視聴者数サンプル
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerSample {
    pub timestamp: i64,
    /// 数値でない値は`None`として読み込む
    #[serde(default, deserialize_with = "lenient_count")]
    pub viewers: Option<u64>,
}

/// 配信ごとの視聴者数系列
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerSeries {
    pub id: String,
    #[serde(default)]
    pub viewers_data: Vec<ViewerSample>,
    pub group: String,
    pub platform: Platform,
}

impl ViewerSeries {
    pub fn new(id: impl Into<String>, group: impl Into<String>, platform: Platform) -> Self {
        Self {
            id: id.into(),
            viewers_data: Vec::new(),
            group: group.into(),
            platform,
        }
    }

    pub fn push(&mut self, timestamp: i64, viewers: u64) {
        self.viewers_data.push(ViewerSample {
            timestamp,
            viewers: Some(viewers),
        });
    }

    pub fn average(&self) -> u64 {
        average_viewers(&self.viewers_data)
    }
}

/// 数値サンプルの平均（四捨五入）。空なら0
pub fn average_viewers(samples: &[ViewerSample]) -> u64 {
    let counts: Vec<u64> = samples.iter().filter_map(|s| s.viewers).collect();
    if counts.is_empty() {
        return 0;
    }
    let sum: f64 = counts.iter().map(|&v| v as f64).sum();
    let mean = sum / counts.len() as f64;
    if mean.is_finite() {
        mean.round() as u64
    } else {
        0
    }
}

fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(count_from_value(&value))
}

/// JSON値を視聴者数として解釈（数値文字列も許容）
pub(crate) fn count_from_value(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f.round() as u64)
        }),
        serde_json::Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

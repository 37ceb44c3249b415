//! 数値・時刻の導出

use regex::Regex;
use std::sync::OnceLock;

/// ピーク視聴者数。視聴者数が無ければ前回値を維持
pub fn next_peak(previous: Option<u64>, viewers: Option<u64>) -> Option<u64> {
    match viewers {
        Some(v) => Some(previous.unwrap_or(v).max(v)),
        None => previous,
    }
}

/// 配信時間（秒）。開始時刻が無ければ未定義
pub fn duration_between(start: Option<i64>, end: i64) -> Option<i64> {
    start.map(|s| (end - s).max(0))
}

/// 予定時刻からの遅延（秒）
pub fn late_time(scheduled: Option<i64>, start: Option<i64>) -> Option<i64> {
    match (scheduled, start) {
        (Some(scheduled), Some(start)) => Some(start - scheduled),
        _ => None,
    }
}

/// ISO-8601の時刻文字列をUNIX秒へ
pub fn parse_rfc3339_epoch(value: &str) -> Option<i64> {
    chrono::DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.timestamp())
}

fn duration_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^P(?:(\d+)W)?(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?)?$")
            .expect("valid duration regex")
    })
}

/// ISO-8601の期間（`PT1H2M3S`など）を秒へ。桁あふれは`None`
pub fn parse_iso8601_duration(value: &str) -> Option<i64> {
    const UNIT_SECS: [i64; 5] = [7 * 86_400, 86_400, 3_600, 60, 1];

    let caps = duration_regex().captures(value.trim())?;
    UNIT_SECS
        .iter()
        .enumerate()
        .try_fold(0i64, |total, (i, unit)| {
            let count = match caps.get(i + 1) {
                Some(m) => m.as_str().parse::<i64>().ok()?,
                None => 0,
            };
            total.checked_add(count.checked_mul(*unit)?)
        })
}

/// 長さゼロを表す値（未公開ライブ）
pub fn is_zero_duration_sentinel(value: &str) -> bool {
    matches!(value.trim(), "P0D" | "PT0S")
}

/// プレミア公開判定。長さ不明なら`None`
pub fn premiere_flag(duration: Option<&str>) -> Option<bool> {
    duration.map(|d| !is_zero_duration_sentinel(d))
}

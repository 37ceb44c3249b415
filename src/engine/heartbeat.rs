//! ライブ状態のハートビート突き合わせ
//!
//! 追跡中（live/upcoming）の配信と今回の取得結果を比較して
//! 更新・終了・新規と視聴者数系列への副作用を決める

use std::collections::{HashMap, HashSet};

use super::timedata::{duration_between, late_time, next_peak};
use super::{Capabilities, LiveObservation, ObservedState};
use crate::models::{Platform, Stream, StreamStatus, ViewerSample, ViewerSeries};

/// 突き合わせの方針
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilePolicy {
    /// 何回連続で取得結果に現れなければ終了扱いにするか（1 = 即時）
    pub missing_polls_before_past: u32,
    /// 予定枠を観測できないプラットフォームで、予定時刻からこの秒数を過ぎた枠を終了扱い
    pub upcoming_expiry_secs: i64,
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self {
            missing_polls_before_past: 1,
            upcoming_expiry_secs: 6 * 60 * 60,
        }
    }
}

/// ハートビートの入力
#[derive(Debug, Clone)]
pub struct HeartbeatInput {
    pub platform: Platform,
    /// 前回までに追跡している配信
    pub tracked: Vec<Stream>,
    /// 今回の取得結果（取得順）
    pub observed: Vec<LiveObservation>,
    /// 状態を問わず登録済みのID
    pub known_ids: HashSet<String>,
    /// 追跡中配信の既存の視聴者数系列
    pub series: HashMap<String, ViewerSeries>,
    /// チャンネルID → グループ
    pub groups: HashMap<String, String>,
    pub now: i64,
}

/// 視聴者数系列への追記
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesAppend {
    pub id: String,
    pub group: String,
    pub sample: ViewerSample,
}

/// ハートビートの結果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeartbeatOutcome {
    pub inserts: Vec<Stream>,
    pub updates: Vec<Stream>,
    pub to_past: Vec<Stream>,
    pub series_appends: Vec<SeriesAppend>,
    pub series_deletes: Vec<String>,
    /// 新しいライブ配信に置き換えられた予定枠のID
    pub superseded: Vec<String>,
}

impl HeartbeatOutcome {
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty()
            && self.updates.is_empty()
            && self.to_past.is_empty()
            && self.series_appends.is_empty()
            && self.series_deletes.is_empty()
            && self.superseded.is_empty()
    }
}

/// 同一IDが複数ある場合は後勝ち（位置は最初の出現）
fn dedupe_last_wins(observed: Vec<LiveObservation>) -> Vec<LiveObservation> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<LiveObservation> = Vec::with_capacity(observed.len());

    for observation in observed {
        match positions.get(&observation.id) {
            Some(&index) => {
                tracing::debug!("Duplicate observation for '{}', keeping the later one", observation.id);
                unique[index] = observation;
            }
            None => {
                positions.insert(observation.id.clone(), unique.len());
                unique.push(observation);
            }
        }
    }

    unique
}

/// 終了状態へ遷移させる
fn finalize_past(
    stream: &mut Stream,
    reported_end: Option<i64>,
    now: i64,
    series: Option<&ViewerSeries>,
) {
    let end = reported_end.unwrap_or(now);
    stream.status = StreamStatus::Past;
    stream.timedata.end_time = Some(end);
    stream.timedata.duration = duration_between(stream.timedata.start_time, end);
    if let Some(series) = series {
        stream.average_viewers = Some(series.average());
    }
    stream.missed_polls = 0;
}

/// 予定枠が期限切れか
fn is_stale_upcoming(stream: &Stream, policy: &ReconcilePolicy, now: i64) -> bool {
    stream.status == StreamStatus::Upcoming
        && stream
            .timedata
            .scheduled_start_time
            .is_some_and(|scheduled| scheduled + policy.upcoming_expiry_secs < now)
}

/// 予定枠を観測できないプラットフォームの期限切れ予定枠を終了扱いにする
pub fn expire_stale_upcoming(
    caps: &Capabilities,
    tracked: &[Stream],
    policy: &ReconcilePolicy,
    now: i64,
) -> Vec<Stream> {
    if caps.observes_upcoming {
        return Vec::new();
    }

    tracked
        .iter()
        .filter(|stream| is_stale_upcoming(stream, policy, now))
        .map(|stream| {
            let mut expired = stream.clone();
            finalize_past(&mut expired, None, now, None);
            expired.is_missing = true;
            expired
        })
        .collect()
}

/// 観測値で既存レコードを更新する。終了へ遷移した場合は`true`
fn apply_observation(
    stream: &mut Stream,
    observation: LiveObservation,
    caps: &Capabilities,
    now: i64,
    series: Option<&ViewerSeries>,
) -> bool {
    if let Some(title) = observation.title {
        stream.title = title;
    }
    if observation.thumbnail.is_some() {
        stream.thumbnail = observation.thumbnail;
    }
    if observation.published_at.is_some() {
        stream.timedata.published_at = observation.published_at;
    }
    if observation.scheduled_start_time.is_some() {
        stream.timedata.scheduled_start_time = observation.scheduled_start_time;
    }
    if observation.start_time.is_some() {
        stream.timedata.start_time = observation.start_time;
    }
    if observation.is_premiere.is_some() {
        stream.is_premiere = observation.is_premiere;
    }
    if stream.is_member.is_none() {
        stream.is_member = observation.is_member;
    }
    stream.missed_polls = 0;
    stream.is_missing = false;

    let was_live = stream.status == StreamStatus::Live;
    let ended = match observation.state {
        ObservedState::Upcoming if !was_live => {
            stream.status = StreamStatus::Upcoming;
            false
        }
        ObservedState::Upcoming | ObservedState::Live => {
            stream.status = StreamStatus::Live;
            if stream.timedata.start_time.is_none() {
                stream.timedata.start_time = Some(now);
            }
            stream.viewers = observation.viewers;
            stream.peak_viewers = next_peak(stream.peak_viewers, observation.viewers);
            false
        }
        ObservedState::Ended => {
            stream.peak_viewers = next_peak(stream.peak_viewers, observation.viewers);
            finalize_past(stream, observation.end_time, now, series);
            true
        }
        ObservedState::Video if was_live || stream.timedata.start_time.is_some() => {
            finalize_past(stream, observation.end_time, now, series);
            true
        }
        ObservedState::Video => {
            stream.status = StreamStatus::Video;
            if observation.duration.is_some() {
                stream.timedata.duration = observation.duration;
            }
            false
        }
    };

    if caps.has_schedule {
        stream.timedata.late_time =
            late_time(stream.timedata.scheduled_start_time, stream.timedata.start_time);
    }

    ended
}

/// 観測値から新しいレコードを作る
pub(crate) fn stream_from_observation(
    platform: Platform,
    caps: &Capabilities,
    observation: LiveObservation,
    group: &str,
    now: i64,
) -> Stream {
    let mut stream = Stream::new(&observation.id, platform, &observation.channel_id, group);
    stream.title = observation.title.unwrap_or_default();
    stream.thumbnail = observation.thumbnail;
    stream.is_member = observation.is_member;
    if caps.detects_premiere {
        stream.is_premiere = observation.is_premiere;
    }
    stream.timedata.published_at = observation.published_at;
    stream.timedata.scheduled_start_time = observation.scheduled_start_time;
    stream.timedata.start_time = observation.start_time;

    match observation.state {
        ObservedState::Upcoming => stream.status = StreamStatus::Upcoming,
        ObservedState::Live => {
            stream.status = StreamStatus::Live;
            if stream.timedata.start_time.is_none() {
                stream.timedata.start_time = Some(now);
            }
            stream.viewers = observation.viewers;
            stream.peak_viewers = observation.viewers;
        }
        ObservedState::Ended => {
            stream.viewers = observation.viewers;
            stream.peak_viewers = observation.viewers;
            finalize_past(&mut stream, observation.end_time, now, None);
        }
        ObservedState::Video => {
            stream.status = StreamStatus::Video;
            stream.timedata.duration = observation.duration;
        }
    }

    if caps.has_schedule {
        stream.timedata.late_time =
            late_time(stream.timedata.scheduled_start_time, stream.timedata.start_time);
    }

    stream
}

fn live_sample(stream: &Stream, now: i64) -> Option<SeriesAppend> {
    if stream.status != StreamStatus::Live {
        return None;
    }
    stream.viewers.map(|viewers| SeriesAppend {
        id: stream.id.clone(),
        group: stream.group.clone(),
        sample: ViewerSample {
            timestamp: now,
            viewers: Some(viewers),
        },
    })
}

/// ハートビートの突き合わせ本体
/// 同じチャンネルで予定時刻が開始時刻に最も近い予定枠を取り出す。
/// 期限（`upcoming_expiry_secs`）より離れていれば別物として扱う
fn claim_reservation(
    reservations: &mut Vec<Stream>,
    stream: &Stream,
    policy: &ReconcilePolicy,
) -> Option<Stream> {
    if stream.status != StreamStatus::Live {
        return None;
    }
    let start = stream.timedata.start_time?;

    let (index, _) = reservations
        .iter()
        .enumerate()
        .filter(|(_, r)| r.channel_id == stream.channel_id)
        .filter_map(|(i, r)| {
            let gap = (start - r.timedata.scheduled_start_time?).abs();
            (gap <= policy.upcoming_expiry_secs).then_some((i, gap))
        })
        .min_by_key(|(_, gap)| *gap)?;

    Some(reservations.swap_remove(index))
}

pub fn reconcile_heartbeat(
    caps: &Capabilities,
    input: HeartbeatInput,
    policy: &ReconcilePolicy,
) -> HeartbeatOutcome {
    let HeartbeatInput {
        platform,
        tracked,
        observed,
        known_ids,
        series,
        groups,
        now,
    } = input;

    let mut outcome = HeartbeatOutcome::default();
    // ライブ取得で見えない予定枠（新しいライブとの照合用）
    let mut reservations: Vec<Stream> = Vec::new();
    let missing_limit = policy.missing_polls_before_past.max(1);

    let mut remaining: Vec<Option<LiveObservation>> =
        dedupe_last_wins(observed).into_iter().map(Some).collect();
    let positions: HashMap<String, usize> = remaining
        .iter()
        .enumerate()
        .filter_map(|(i, o)| o.as_ref().map(|o| (o.id.clone(), i)))
        .collect();

    for mut stream in tracked {
        if stream.is_terminal() || !stream.status.is_active() {
            continue;
        }

        let observation = positions
            .get(&stream.id)
            .and_then(|&index| remaining[index].take());
        let existing_series = series.get(&stream.id);

        match observation {
            Some(observation) => {
                let ended = apply_observation(&mut stream, observation, caps, now, existing_series);
                if ended {
                    tracing::info!(
                        "🔴 [{}] '{}' reported ended (duration {:?}s)",
                        platform,
                        stream.id,
                        stream.timedata.duration
                    );
                    outcome.series_deletes.push(stream.id.clone());
                    outcome.to_past.push(stream);
                } else {
                    if let Some(append) = live_sample(&stream, now) {
                        outcome.series_appends.push(append);
                    }
                    outcome.updates.push(stream);
                }
            }
            None if stream.status == StreamStatus::Live || caps.observes_upcoming => {
                stream.missed_polls += 1;
                if stream.missed_polls >= missing_limit {
                    finalize_past(&mut stream, None, now, existing_series);
                    stream.is_missing = true;
                    tracing::info!(
                        "🔴 [{}] '{}' absent from live fetch, marking past (average {:?})",
                        platform,
                        stream.id,
                        stream.average_viewers
                    );
                    outcome.series_deletes.push(stream.id.clone());
                    outcome.to_past.push(stream);
                } else {
                    tracing::warn!(
                        "⚠️ [{}] '{}' missing from live fetch ({}/{})",
                        platform,
                        stream.id,
                        stream.missed_polls,
                        missing_limit
                    );
                    outcome.updates.push(stream);
                }
            }
            None => {
                if is_stale_upcoming(&stream, policy, now) {
                    finalize_past(&mut stream, None, now, None);
                    stream.is_missing = true;
                    tracing::info!("🗓️ [{}] Upcoming '{}' expired", platform, stream.id);
                    outcome.to_past.push(stream);
                } else {
                    reservations.push(stream);
                }
            }
        }
    }

    if caps.discovers_in_live_fetch {
        for observation in remaining.into_iter().flatten() {
            if known_ids.contains(&observation.id) {
                tracing::debug!(
                    "[{}] '{}' already registered, not re-inserting",
                    platform,
                    observation.id
                );
                continue;
            }
            let Some(group) = groups.get(&observation.channel_id) else {
                tracing::warn!(
                    "⚠️ [{}] '{}' belongs to untracked channel '{}'",
                    platform,
                    observation.id,
                    observation.channel_id
                );
                continue;
            };

            let mut stream = stream_from_observation(platform, caps, observation, group, now);
            if let Some(reservation) = claim_reservation(&mut reservations, &stream, policy) {
                tracing::info!(
                    "🔁 [{}] '{}' replaces reservation '{}'",
                    platform,
                    stream.id,
                    reservation.id
                );
                if stream.timedata.scheduled_start_time.is_none() {
                    stream.timedata.scheduled_start_time = reservation.timedata.scheduled_start_time;
                }
                if stream.title.is_empty() {
                    stream.title = reservation.title;
                }
                outcome.superseded.push(reservation.id);
            }
            tracing::info!(
                "🟢 [{}] New {} '{}' ({})",
                platform,
                stream.status.as_str(),
                stream.id,
                stream.title
            );
            if let Some(append) = live_sample(&stream, now) {
                outcome.series_appends.push(append);
            }
            outcome.inserts.push(stream);
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn caps() -> Capabilities {
        Capabilities {
            discovers_in_live_fetch: true,
            ..Default::default()
        }
    }

    fn live_stream(id: &str, viewers: u64) -> Stream {
        let mut stream = Stream::new(id, Platform::Twitch, "ch1", "holo");
        stream.status = StreamStatus::Live;
        stream.viewers = Some(viewers);
        stream.peak_viewers = Some(viewers);
        stream.timedata.start_time = Some(NOW - 3600);
        stream
    }

    fn observation(id: &str, viewers: Option<u64>) -> LiveObservation {
        let mut observation = LiveObservation::new(id, "ch1", ObservedState::Live);
        observation.viewers = viewers;
        observation
    }

    fn input(tracked: Vec<Stream>, observed: Vec<LiveObservation>) -> HeartbeatInput {
        HeartbeatInput {
            platform: Platform::Twitch,
            known_ids: tracked.iter().map(|s| s.id.clone()).collect(),
            tracked,
            observed,
            series: HashMap::new(),
            groups: HashMap::from([("ch1".to_string(), "holo".to_string())]),
            now: NOW,
        }
    }

    #[test]
    fn test_matched_stream_updates_viewers_and_peak() {
        let outcome = reconcile_heartbeat(
            &caps(),
            input(vec![live_stream("x1", 100)], vec![observation("x1", Some(80))]),
            &ReconcilePolicy::default(),
        );

        assert_eq!(outcome.updates.len(), 1);
        let updated = &outcome.updates[0];
        assert_eq!(updated.viewers, Some(80));
        assert_eq!(updated.peak_viewers, Some(100));
        assert_eq!(outcome.series_appends.len(), 1);
        assert_eq!(outcome.series_appends[0].sample.viewers, Some(80));
        assert!(outcome.to_past.is_empty());
    }

    #[test]
    fn test_peak_over_sequence_of_polls() {
        let mut stream = live_stream("x1", 10);
        for viewers in [10, 3, 50, 7] {
            let outcome = reconcile_heartbeat(
                &caps(),
                input(vec![stream.clone()], vec![observation("x1", Some(viewers))]),
                &ReconcilePolicy::default(),
            );
            stream = outcome.updates.into_iter().next().unwrap();
        }
        assert_eq!(stream.peak_viewers, Some(50));
        assert_eq!(stream.viewers, Some(7));
    }

    #[test]
    fn test_missing_viewers_keep_peak_and_skip_sample() {
        let outcome = reconcile_heartbeat(
            &caps(),
            input(vec![live_stream("x1", 100)], vec![observation("x1", None)]),
            &ReconcilePolicy::default(),
        );
        assert_eq!(outcome.updates[0].peak_viewers, Some(100));
        assert!(outcome.series_appends.is_empty());
    }

    #[test]
    fn test_absent_stream_goes_past_with_average() {
        let mut data = input(vec![live_stream("x1", 100)], vec![]);
        let mut series = ViewerSeries::new("x1", "holo", Platform::Twitch);
        series.push(NOW - 120, 80);
        series.push(NOW - 60, 100);
        data.series.insert("x1".to_string(), series);

        let outcome = reconcile_heartbeat(&caps(), data, &ReconcilePolicy::default());

        assert_eq!(outcome.to_past.len(), 1);
        let past = &outcome.to_past[0];
        assert_eq!(past.status, StreamStatus::Past);
        assert_eq!(past.timedata.end_time, Some(NOW));
        assert_eq!(past.timedata.duration, Some(3600));
        assert_eq!(past.average_viewers, Some(90));
        assert!(past.is_missing);
        assert_eq!(outcome.series_deletes, vec!["x1".to_string()]);
    }

    #[test]
    fn test_absent_stream_without_series_keeps_average_unset() {
        let outcome = reconcile_heartbeat(
            &caps(),
            input(vec![live_stream("x1", 100)], vec![]),
            &ReconcilePolicy::default(),
        );
        assert_eq!(outcome.to_past[0].average_viewers, None);
    }

    #[test]
    fn test_past_streams_are_never_touched() {
        let mut past = live_stream("x1", 100);
        past.status = StreamStatus::Past;
        past.timedata.end_time = Some(NOW - 10);

        let outcome = reconcile_heartbeat(
            &caps(),
            input(vec![past], vec![]),
            &ReconcilePolicy::default(),
        );
        assert!(outcome.is_empty());
    }

    #[test]
    fn test_grace_window_delays_past() {
        let policy = ReconcilePolicy {
            missing_polls_before_past: 2,
            ..Default::default()
        };

        let first = reconcile_heartbeat(&caps(), input(vec![live_stream("x1", 100)], vec![]), &policy);
        assert!(first.to_past.is_empty());
        assert_eq!(first.updates[0].missed_polls, 1);
        assert_eq!(first.updates[0].status, StreamStatus::Live);

        let second = reconcile_heartbeat(&caps(), input(first.updates, vec![]), &policy);
        assert_eq!(second.to_past.len(), 1);
        assert_eq!(second.to_past[0].missed_polls, 0);
    }

    #[test]
    fn test_reappearing_stream_resets_missed_polls() {
        let mut stream = live_stream("x1", 100);
        stream.missed_polls = 1;
        stream.is_missing = true;
        let policy = ReconcilePolicy {
            missing_polls_before_past: 3,
            ..Default::default()
        };

        let outcome = reconcile_heartbeat(
            &caps(),
            input(vec![stream], vec![observation("x1", Some(5))]),
            &policy,
        );
        assert_eq!(outcome.updates[0].missed_polls, 0);
        assert!(!outcome.updates[0].is_missing);
    }

    #[test]
    fn test_new_ids_are_inserted_when_live_fetch_discovers() {
        let outcome = reconcile_heartbeat(
            &caps(),
            input(vec![], vec![observation("n1", Some(12))]),
            &ReconcilePolicy::default(),
        );
        assert_eq!(outcome.inserts.len(), 1);
        assert_eq!(outcome.inserts[0].group, "holo");
        assert_eq!(outcome.inserts[0].timedata.start_time, Some(NOW));
        assert_eq!(outcome.series_appends.len(), 1);

        let no_discovery = reconcile_heartbeat(
            &Capabilities::default(),
            input(vec![], vec![observation("n1", Some(12))]),
            &ReconcilePolicy::default(),
        );
        assert!(no_discovery.inserts.is_empty());
    }

    #[test]
    fn test_known_ids_are_not_reinserted() {
        let mut data = input(vec![], vec![observation("old", Some(1))]);
        data.known_ids.insert("old".to_string());
        let outcome = reconcile_heartbeat(&caps(), data, &ReconcilePolicy::default());
        assert!(outcome.inserts.is_empty());
    }

    #[test]
    fn test_duplicate_observations_last_wins() {
        let outcome = reconcile_heartbeat(
            &caps(),
            input(
                vec![live_stream("x1", 10)],
                vec![observation("x1", Some(20)), observation("x1", Some(30))],
            ),
            &ReconcilePolicy::default(),
        );
        assert_eq!(outcome.updates.len(), 1);
        assert_eq!(outcome.updates[0].viewers, Some(30));
    }

    #[test]
    fn test_reported_end_uses_upstream_end_time() {
        let mut ended = observation("x1", None);
        ended.state = ObservedState::Ended;
        ended.end_time = Some(NOW - 100);

        let outcome = reconcile_heartbeat(
            &caps(),
            input(vec![live_stream("x1", 100)], vec![ended]),
            &ReconcilePolicy::default(),
        );
        let past = &outcome.to_past[0];
        assert_eq!(past.timedata.end_time, Some(NOW - 100));
        assert_eq!(past.timedata.duration, Some(3500));
        assert!(!past.is_missing);
    }

    #[test]
    fn test_upcoming_to_live_computes_late_time_with_schedule() {
        let caps = Capabilities {
            has_schedule: true,
            observes_upcoming: true,
            ..Default::default()
        };
        let mut upcoming = Stream::new("v1", Platform::Youtube, "ch1", "holo");
        upcoming.timedata.scheduled_start_time = Some(NOW - 300);

        let mut live = observation("v1", Some(500));
        live.start_time = Some(NOW - 240);

        let outcome = reconcile_heartbeat(
            &caps,
            input(vec![upcoming], vec![live]),
            &ReconcilePolicy::default(),
        );
        let updated = &outcome.updates[0];
        assert_eq!(updated.status, StreamStatus::Live);
        assert_eq!(updated.timedata.late_time, Some(60));

        let mut upcoming = Stream::new("v1", Platform::Twitch, "ch1", "holo");
        upcoming.timedata.scheduled_start_time = Some(NOW - 300);
        let mut live = observation("v1", Some(500));
        live.start_time = Some(NOW - 240);
        let outcome = reconcile_heartbeat(
            &Capabilities::default(),
            input(vec![upcoming], vec![live]),
            &ReconcilePolicy::default(),
        );
        assert_eq!(outcome.updates[0].timedata.late_time, None);
    }

    #[test]
    fn test_unobservable_upcoming_left_alone_until_stale() {
        let mut upcoming = Stream::new("u1", Platform::Bilibili, "ch1", "holo");
        upcoming.timedata.scheduled_start_time = Some(NOW - 60);

        let outcome = reconcile_heartbeat(
            &caps(),
            input(vec![upcoming.clone()], vec![]),
            &ReconcilePolicy::default(),
        );
        assert!(outcome.is_empty());

        upcoming.timedata.scheduled_start_time = Some(NOW - 7 * 3600);
        let outcome = reconcile_heartbeat(
            &caps(),
            input(vec![upcoming.clone()], vec![]),
            &ReconcilePolicy::default(),
        );
        assert_eq!(outcome.to_past.len(), 1);
        assert_eq!(outcome.to_past[0].timedata.end_time, Some(NOW));
        assert_eq!(outcome.to_past[0].timedata.duration, None);

        let expired = expire_stale_upcoming(&caps(), &[upcoming], &ReconcilePolicy::default(), NOW);
        assert_eq!(expired.len(), 1);
    }

    #[test]
    fn test_membership_flag_is_sticky() {
        let mut stream = live_stream("x1", 100);
        stream.is_member = Some(true);
        let mut obs = observation("x1", Some(1));
        obs.is_member = Some(false);

        let outcome = reconcile_heartbeat(
            &caps(),
            input(vec![stream], vec![obs]),
            &ReconcilePolicy::default(),
        );
        assert_eq!(outcome.updates[0].is_member, Some(true));
    }

    fn reservation(id: &str, channel_id: &str, scheduled: i64) -> Stream {
        let mut stream = Stream::new(id, Platform::Twitch, channel_id, "holo");
        stream.title = format!("reserved {}", id);
        stream.timedata.scheduled_start_time = Some(scheduled);
        stream
    }

    #[test]
    fn test_new_live_replaces_pending_reservation() {
        let mut live = observation("room_live", Some(300));
        live.start_time = Some(NOW - 600);

        let outcome = reconcile_heartbeat(
            &caps(),
            input(
                vec![
                    reservation("r1", "ch1", NOW - 1000),
                    reservation("r2", "ch1", NOW + 30_000),
                    reservation("r3", "other", NOW - 1000),
                ],
                vec![live],
            ),
            &ReconcilePolicy::default(),
        );

        assert_eq!(outcome.superseded, vec!["r1".to_string()]);
        assert_eq!(outcome.inserts.len(), 1);
        let inserted = &outcome.inserts[0];
        assert_eq!(inserted.status, StreamStatus::Live);
        assert_eq!(inserted.timedata.scheduled_start_time, Some(NOW - 1000));
        assert_eq!(inserted.title, "reserved r1");
        assert_eq!(inserted.timedata.late_time, None);
        assert!(outcome.to_past.is_empty());
    }

    #[test]
    fn test_live_far_from_reservation_keeps_it() {
        let mut live = observation("room_live", Some(300));
        live.start_time = Some(NOW);

        let outcome = reconcile_heartbeat(
            &caps(),
            input(
                vec![reservation("r4", "ch1", NOW + 90_000)],
                vec![live],
            ),
            &ReconcilePolicy::default(),
        );

        assert!(outcome.superseded.is_empty());
        assert_eq!(outcome.inserts.len(), 1);
    }
}

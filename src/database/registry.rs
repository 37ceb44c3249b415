//! 永続化コレクションの契約
//!
//! 書き込み失敗はレコード単位でログに残し、バッチ全体は継続する

use std::collections::{HashMap, HashSet};

use super::RecordFilter;
use crate::error::TrackerResult;
use crate::models::{
    Channel, ChannelStatsHistory, Platform, StatsSample, Stream, ViewerSample, ViewerSeries,
};

/// バッチ書き込みの結果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteReport {
    pub written: usize,
    pub failed: usize,
}

/// 配信レコードのコレクション
pub trait StreamRegistry {
    fn find_streams(&self, filter: &RecordFilter) -> TrackerResult<Vec<Stream>>;

    /// 指定IDのうち既に存在するもの（状態を問わない）
    fn known_stream_ids(&self, platform: Platform, ids: &[String]) -> TrackerResult<HashSet<String>>;

    fn insert_streams(&mut self, streams: &[Stream]) -> WriteReport;

    fn update_stream(&mut self, stream: &Stream) -> TrackerResult<()>;

    fn delete_streams(&mut self, platform: Platform, ids: &[String]) -> TrackerResult<usize>;
}

/// チャンネルと統計履歴のコレクション
pub trait ChannelRegistry {
    fn find_channels(&self, filter: &RecordFilter) -> TrackerResult<Vec<Channel>>;

    fn insert_channel(&mut self, channel: &Channel) -> TrackerResult<()>;

    fn update_channel(&mut self, channel: &Channel) -> TrackerResult<()>;

    fn append_stats_sample(
        &mut self,
        platform: Platform,
        channel_id: &str,
        group: &str,
        sample: &StatsSample,
    ) -> TrackerResult<()>;

    fn find_stats_history(
        &self,
        platform: Platform,
        channel_id: &str,
    ) -> TrackerResult<Option<ChannelStatsHistory>>;

    /// 履歴が1件でもあるか（履歴本体は読まない）
    fn has_stats_history(&self, platform: Platform, channel_id: &str) -> TrackerResult<bool>;
}

/// 視聴者数系列のコレクション
pub trait ViewerSeriesStore {
    fn find_series(
        &self,
        platform: Platform,
        ids: &[String],
    ) -> TrackerResult<HashMap<String, ViewerSeries>>;

    /// 系列が無ければ作成してから追記
    fn append_viewer_sample(
        &mut self,
        platform: Platform,
        id: &str,
        group: &str,
        sample: ViewerSample,
    ) -> TrackerResult<()>;

    /// 系列が存在しなければ`None`
    fn series_average(&self, platform: Platform, id: &str) -> TrackerResult<Option<u64>>;

    fn delete_series(&mut self, platform: Platform, ids: &[String]) -> TrackerResult<usize>;
}

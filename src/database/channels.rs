use rusqlite::{params, params_from_iter, OptionalExtension};

use super::{ChannelRegistry, RecordFilter, TrackerDatabase};
use crate::error::TrackerResult;
use crate::models::{Channel, ChannelStatsHistory, Platform, StatsSample};

impl ChannelRegistry for TrackerDatabase {
    fn find_channels(&self, filter: &RecordFilter) -> TrackerResult<Vec<Channel>> {
        let (where_clause, values) = filter.to_sql(false);
        let sql = format!(
            "SELECT id, doc FROM channels WHERE {} ORDER BY rowid",
            where_clause
        );

        let mut stmt = self.connection.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut channels = Vec::new();
        for row in rows {
            let (id, doc) = row?;
            match serde_json::from_str::<Channel>(&doc) {
                Ok(channel) => channels.push(channel),
                Err(e) => tracing::error!("❌ Malformed channel document '{}': {}", id, e),
            }
        }

        Ok(channels)
    }

    fn insert_channel(&mut self, channel: &Channel) -> TrackerResult<()> {
        let doc = serde_json::to_string(channel)?;
        self.connection.execute(
            "INSERT INTO channels (platform, id, grp, doc) VALUES (?1, ?2, ?3, ?4)",
            params![channel.platform.as_str(), channel.id, channel.group, doc],
        )?;

        tracing::info!(
            "📺 Registered new channel '{}' ({}, {})",
            channel.id,
            channel.platform,
            channel.group
        );
        Ok(())
    }

    fn update_channel(&mut self, channel: &Channel) -> TrackerResult<()> {
        let doc = serde_json::to_string(channel)?;
        let changed = self.connection.execute(
            "UPDATE channels SET grp = ?1, doc = ?2 WHERE platform = ?3 AND id = ?4",
            params![channel.group, doc, channel.platform.as_str(), channel.id],
        )?;

        if changed == 0 {
            tracing::warn!(
                "⚠️ Update matched no channel '{}' ({})",
                channel.id,
                channel.platform
            );
        }
        Ok(())
    }

    fn append_stats_sample(
        &mut self,
        platform: Platform,
        channel_id: &str,
        group: &str,
        sample: &StatsSample,
    ) -> TrackerResult<()> {
        let doc = serde_json::to_string(sample)?;
        self.connection.execute(
            "INSERT INTO channel_stats_history (platform, id, grp, timestamp, doc)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![platform.as_str(), channel_id, group, sample.timestamp, doc],
        )?;
        Ok(())
    }

    fn find_stats_history(
        &self,
        platform: Platform,
        channel_id: &str,
    ) -> TrackerResult<Option<ChannelStatsHistory>> {
        let mut stmt = self.connection.prepare(
            "SELECT grp, doc FROM channel_stats_history
             WHERE platform = ?1 AND id = ?2
             ORDER BY timestamp, seq",
        )?;
        let rows = stmt.query_map(params![platform.as_str(), channel_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut group = None;
        let mut history = Vec::new();
        for row in rows {
            let (grp, doc) = row?;
            match serde_json::from_str::<StatsSample>(&doc) {
                Ok(sample) => history.push(sample),
                Err(e) => tracing::error!(
                    "❌ Malformed stats sample for channel '{}': {}",
                    channel_id,
                    e
                ),
            }
            group = Some(grp);
        }

        Ok(group.map(|group| ChannelStatsHistory {
            id: channel_id.to_string(),
            platform,
            group,
            history,
        }))
    }

    fn has_stats_history(&self, platform: Platform, channel_id: &str) -> TrackerResult<bool> {
        let found = self
            .connection
            .query_row(
                "SELECT 1 FROM channel_stats_history WHERE platform = ?1 AND id = ?2 LIMIT 1",
                params![platform.as_str(), channel_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(id: &str, group: &str) -> Channel {
        Channel {
            id: id.to_string(),
            name: format!("name {}", id),
            user_id: None,
            description: None,
            thumbnail: None,
            subscriber_count: Some(100),
            follower_count: None,
            view_count: None,
            video_count: None,
            level: None,
            group: group.to_string(),
            platform: Platform::Youtube,
            is_retired: false,
            updated_at: None,
        }
    }

    #[test]
    fn test_channel_insert_update_find() -> anyhow::Result<()> {
        let mut db = TrackerDatabase::new_in_memory()?;
        db.insert_channel(&channel("UC1", "holo"))?;
        db.insert_channel(&channel("UC2", "niji"))?;

        let mut updated = channel("UC1", "holo");
        updated.subscriber_count = Some(200);
        db.update_channel(&updated)?;

        let holo = db.find_channels(&RecordFilter::platform(Platform::Youtube).include_groups(["holo"]))?;
        assert_eq!(holo.len(), 1);
        assert_eq!(holo[0].subscriber_count, Some(200));

        assert!(db.insert_channel(&channel("UC1", "holo")).is_err());
        Ok(())
    }

    #[test]
    fn test_stats_history_appends_in_order() -> anyhow::Result<()> {
        let mut db = TrackerDatabase::new_in_memory()?;
        assert!(db.find_stats_history(Platform::Youtube, "UC1")?.is_none());
        assert!(!db.has_stats_history(Platform::Youtube, "UC1")?);

        for (timestamp, subs) in [(20, 110), (10, 100)] {
            let sample = StatsSample {
                timestamp,
                subscriber_count: Some(subs),
                ..Default::default()
            };
            db.append_stats_sample(Platform::Youtube, "UC1", "holo", &sample)?;
        }

        let history = db.find_stats_history(Platform::Youtube, "UC1")?.unwrap();
        assert_eq!(history.group, "holo");
        assert_eq!(history.history.len(), 2);
        assert_eq!(history.history[0].timestamp, 10);
        assert_eq!(history.history[1].subscriber_count, Some(110));
        assert!(db.has_stats_history(Platform::Youtube, "UC1")?);
        assert!(!db.has_stats_history(Platform::Twitch, "UC1")?);
        Ok(())
    }
}

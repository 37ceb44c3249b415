use rusqlite::{params, params_from_iter};
use std::collections::HashSet;

use super::{RecordFilter, StreamRegistry, TrackerDatabase, WriteReport};
use crate::error::TrackerResult;
use crate::models::{Platform, Stream};

impl StreamRegistry for TrackerDatabase {
    fn find_streams(&self, filter: &RecordFilter) -> TrackerResult<Vec<Stream>> {
        let (where_clause, values) = filter.to_sql(true);
        let sql = format!(
            "SELECT id, doc FROM streams WHERE {} ORDER BY rowid",
            where_clause
        );

        let mut stmt = self.connection.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut streams = Vec::new();
        for row in rows {
            let (id, doc) = row?;
            match serde_json::from_str::<Stream>(&doc) {
                Ok(stream) => streams.push(stream),
                Err(e) => tracing::error!("❌ Malformed stream document '{}': {}", id, e),
            }
        }

        Ok(streams)
    }

    fn known_stream_ids(&self, platform: Platform, ids: &[String]) -> TrackerResult<HashSet<String>> {
        let mut known = HashSet::new();
        for chunk in ids.chunks(500) {
            let filter = RecordFilter::platform(platform).include_ids(chunk.iter().cloned());
            let (where_clause, values) = filter.to_sql(true);
            let sql = format!("SELECT id FROM streams WHERE {}", where_clause);

            let mut stmt = self.connection.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values.iter()), |row| row.get::<_, String>(0))?;
            for id in rows {
                known.insert(id?);
            }
        }
        Ok(known)
    }

    fn insert_streams(&mut self, streams: &[Stream]) -> WriteReport {
        let mut report = WriteReport::default();

        for stream in streams {
            let result = serde_json::to_string(stream)
                .map_err(crate::error::TrackerError::from)
                .and_then(|doc| {
                    self.connection
                        .execute(
                            "INSERT INTO streams (platform, id, grp, status, channel_id, doc)
                             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                            params![
                                stream.platform.as_str(),
                                stream.id,
                                stream.group,
                                stream.status.as_str(),
                                stream.channel_id,
                                doc,
                            ],
                        )
                        .map_err(Into::into)
                });

            match result {
                Ok(_) => report.written += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(
                        "❌ Failed to insert stream '{}' ({}): {}",
                        stream.id,
                        stream.platform,
                        e
                    );
                }
            }
        }

        report
    }

    fn update_stream(&mut self, stream: &Stream) -> TrackerResult<()> {
        let doc = serde_json::to_string(stream)?;
        let changed = self.connection.execute(
            "UPDATE streams SET grp = ?1, status = ?2, channel_id = ?3, doc = ?4
             WHERE platform = ?5 AND id = ?6",
            params![
                stream.group,
                stream.status.as_str(),
                stream.channel_id,
                doc,
                stream.platform.as_str(),
                stream.id,
            ],
        )?;

        if changed == 0 {
            tracing::warn!(
                "⚠️ Update matched no stream '{}' ({})",
                stream.id,
                stream.platform
            );
        }
        Ok(())
    }

    fn delete_streams(&mut self, platform: Platform, ids: &[String]) -> TrackerResult<usize> {
        let mut deleted = 0;
        for id in ids {
            deleted += self.connection.execute(
                "DELETE FROM streams WHERE platform = ?1 AND id = ?2",
                params![platform.as_str(), id],
            )?;
        }
        Ok(deleted)
    }
}

use rusqlite::{params, OptionalExtension};
use std::collections::HashMap;

use super::{TrackerDatabase, ViewerSeriesStore};
use crate::error::TrackerResult;
use crate::models::{Platform, ViewerSample, ViewerSeries};

impl TrackerDatabase {
    fn load_series(&self, platform: Platform, id: &str) -> TrackerResult<Option<ViewerSeries>> {
        let doc: Option<String> = self
            .connection
            .query_row(
                "SELECT doc FROM viewer_series WHERE platform = ?1 AND id = ?2",
                params![platform.as_str(), id],
                |row| row.get(0),
            )
            .optional()?;

        match doc {
            Some(doc) => Ok(Some(serde_json::from_str(&doc)?)),
            None => Ok(None),
        }
    }
}

impl ViewerSeriesStore for TrackerDatabase {
    fn find_series(
        &self,
        platform: Platform,
        ids: &[String],
    ) -> TrackerResult<HashMap<String, ViewerSeries>> {
        let mut found = HashMap::new();
        for id in ids {
            match self.load_series(platform, id) {
                Ok(Some(series)) => {
                    found.insert(id.clone(), series);
                }
                Ok(None) => {}
                Err(e) => tracing::error!("❌ Failed to load viewer series '{}': {}", id, e),
            }
        }
        Ok(found)
    }

    fn append_viewer_sample(
        &mut self,
        platform: Platform,
        id: &str,
        group: &str,
        sample: ViewerSample,
    ) -> TrackerResult<()> {
        let mut series = self
            .load_series(platform, id)?
            .unwrap_or_else(|| ViewerSeries::new(id, group, platform));
        series.viewers_data.push(sample);

        let doc = serde_json::to_string(&series)?;
        self.connection.execute(
            "INSERT INTO viewer_series (platform, id, grp, doc) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (platform, id) DO UPDATE SET doc = excluded.doc",
            params![platform.as_str(), id, group, doc],
        )?;
        Ok(())
    }

    fn series_average(&self, platform: Platform, id: &str) -> TrackerResult<Option<u64>> {
        Ok(self.load_series(platform, id)?.map(|series| series.average()))
    }

    fn delete_series(&mut self, platform: Platform, ids: &[String]) -> TrackerResult<usize> {
        let mut deleted = 0;
        for id in ids {
            deleted += self.connection.execute(
                "DELETE FROM viewer_series WHERE platform = ?1 AND id = ?2",
                params![platform.as_str(), id],
            )?;
        }
        Ok(deleted)
    }
}

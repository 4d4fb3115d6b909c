use chrono::{Duration, Local, NaiveDateTime};
use rusqlite::{params, OptionalExtension};

use super::Store;
use crate::errors::{MetricsError, Result};
use crate::models::format_datetime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheId {
    SprintReport,
}

impl CacheId {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheId::SprintReport => "sprint_report",
        }
    }
}

impl Store {
    pub fn is_stale(&self, id: CacheId) -> Result<bool> {
        self.is_stale_at(id, Local::now().naive_local())
    }

    /// A cache entry is stale when it is missing or was last refreshed before
    /// the start of the day preceding `now`.
    pub fn is_stale_at(&self, id: CacheId, now: NaiveDateTime) -> Result<bool> {
        let last_update = self.last_update(id)?;
        let cutoff = (now.date() - Duration::days(1))
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| MetricsError::Other("invalid cache cutoff".to_string()))?;

        Ok(match last_update {
            Some(last_update) => last_update <= cutoff,
            None => true,
        })
    }

    pub fn last_update(&self, id: CacheId) -> Result<Option<NaiveDateTime>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT last_update FROM cache WHERE id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(raw) => NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S")
                .map(Some)
                .map_err(|e| MetricsError::Store(format!("bad cache timestamp {}: {}", raw, e))),
            None => Ok(None),
        }
    }

    pub fn mark_refreshed(&mut self, id: CacheId) -> Result<()> {
        self.mark_refreshed_at(id, Local::now().naive_local())
    }

    pub fn mark_refreshed_at(&mut self, id: CacheId, at: NaiveDateTime) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO cache (id, last_update) VALUES (?1, ?2)",
            params![id.as_str(), format_datetime(&at)],
        )?;
        Ok(())
    }
}

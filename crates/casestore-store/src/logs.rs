// ABOUTME: Log table access: append, filtered newest-first reads, and age-based deletion.
// ABOUTME: Rows are immutable once written; only the retention sweep removes them.

use casestore_core::clock::format_timestamp;
use casestore_core::{Clock, LogEntry, LogFilter, LogLevel, LogOptions};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params, params_from_iter};

use crate::error::StoreError;
use crate::rows::{self, FilteredQuery};
use crate::store::LocalStore;

const SELECT: &str = "SELECT id, level, message, context, user_id, user_role, route_path,
    metadata, created_at FROM logs";

fn from_row(row: &Row<'_>) -> rusqlite::Result<LogEntry> {
    Ok(LogEntry {
        id: row.get(0)?,
        level: rows::parsed(row, 1)?,
        message: row.get(2)?,
        context: row.get(3)?,
        user_id: row.get(4)?,
        user_role: row.get(5)?,
        route_path: row.get(6)?,
        metadata: rows::metadata(row, 7)?,
        created_at: rows::timestamp(row, 8)?,
    })
}

fn select_filtered(conn: &Connection, filter: &LogFilter) -> rusqlite::Result<Vec<LogEntry>> {
    let mut query = FilteredQuery::new(SELECT);
    query
        .eq("level", filter.level.map(|l| l.as_str()))
        .eq("route_path", filter.route_path.clone())
        .eq("user_id", filter.user_id.clone())
        .order_by("created_at DESC, id DESC")
        .page(filter.limit, filter.offset);

    let mut stmt = conn.prepare(query.sql())?;
    let rows = stmt.query_map(params_from_iter(query.params()), from_row)?;

    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}

/// Every log row, oldest first. Used by snapshot capture.
pub(crate) fn select_all(conn: &Connection) -> rusqlite::Result<Vec<LogEntry>> {
    let mut stmt = conn.prepare(&format!("{SELECT} ORDER BY id"))?;
    let rows = stmt.query_map([], from_row)?;
    rows.collect()
}

pub(crate) fn insert_exact(conn: &Connection, e: &LogEntry) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO logs (id, level, message, context, user_id, user_role, route_path, metadata, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            e.id,
            e.level.as_str(),
            e.message,
            e.context,
            e.user_id,
            e.user_role,
            e.route_path,
            rows::metadata_text(e.metadata.as_ref()),
            format_timestamp(&e.created_at),
        ],
    )?;
    Ok(())
}

impl LocalStore {
    /// Append a log row stamped with the store clock. Returns the new row id.
    pub async fn insert_log(
        &self,
        level: LogLevel,
        message: &str,
        options: &LogOptions,
    ) -> Result<i64, StoreError> {
        let now = format_timestamp(&self.clock().now());
        self.write(|conn| {
            conn.execute(
                "INSERT INTO logs (level, message, context, user_id, user_role, route_path, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    level.as_str(),
                    message,
                    options.context,
                    options.user_id,
                    options.user_role,
                    options.route_path,
                    rows::metadata_text(options.metadata.as_ref()),
                    now,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// Filtered read, newest first.
    pub async fn query_logs(&self, filter: &LogFilter) -> Result<Vec<LogEntry>, StoreError> {
        self.read(|conn| Ok(select_filtered(conn, filter)?)).await
    }

    /// Delete every log created strictly before `cutoff`. Returns the number
    /// of rows removed.
    pub async fn delete_logs_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let cutoff = format_timestamp(&cutoff);
        self.write(|conn| Ok(conn.execute("DELETE FROM logs WHERE created_at < ?1", params![cutoff])?))
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use casestore_core::{Clock, ManualClock};
    use serde_json::json;

    use crate::slot::MemorySlot;

    use super::*;

    fn store_with(clock: Arc<ManualClock>) -> LocalStore {
        LocalStore::new(Arc::new(MemorySlot::new("test")), clock)
    }

    #[tokio::test]
    async fn logs_come_back_newest_first_with_metadata() {
        let clock = Arc::new(ManualClock::default());
        let store = store_with(clock.clone());

        store
            .insert_log(LogLevel::Info, "first", &LogOptions::default())
            .await
            .unwrap();
        clock.advance(Duration::from_secs(1));
        store
            .insert_log(
                LogLevel::Error,
                "second",
                &LogOptions::default()
                    .with_context("payments")
                    .with_user("u-7", "agent")
                    .with_route("/crm/contracts")
                    .with_metadata(json!({"amount": 120})),
            )
            .await
            .unwrap();

        let logs = store.query_logs(&LogFilter::default()).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].message, "second");
        assert_eq!(logs[0].level, LogLevel::Error);
        assert_eq!(logs[0].context.as_deref(), Some("payments"));
        assert_eq!(logs[0].user_role.as_deref(), Some("agent"));
        assert_eq!(logs[0].metadata, Some(json!({"amount": 120})));
        assert_eq!(logs[1].message, "first");
        assert!(logs[1].metadata.is_none());
    }

    #[tokio::test]
    async fn filters_and_paging_apply() {
        let clock = Arc::new(ManualClock::default());
        let store = store_with(clock.clone());

        for i in 0..5 {
            let level = if i % 2 == 0 { LogLevel::Warn } else { LogLevel::Debug };
            let options = LogOptions::default().with_user(format!("u-{}", i % 2), "lawyer");
            store.insert_log(level, &format!("m{i}"), &options).await.unwrap();
            clock.advance(Duration::from_millis(10));
        }

        let warns = store
            .query_logs(&LogFilter {
                level: Some(LogLevel::Warn),
                ..Default::default()
            })
            .await
            .unwrap();
        let messages: Vec<_> = warns.iter().map(|l| l.message.as_str()).collect();
        assert_eq!(messages, vec!["m4", "m2", "m0"]);

        let by_user = store
            .query_logs(&LogFilter {
                user_id: Some("u-1".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_user.len(), 2);

        let page = store
            .query_logs(&LogFilter {
                limit: Some(2),
                offset: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();
        let messages: Vec<_> = page.iter().map(|l| l.message.as_str()).collect();
        assert_eq!(messages, vec!["m3", "m2"]);

        let offset_only = store
            .query_logs(&LogFilter {
                offset: Some(3),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(offset_only.len(), 2);

        let zero_limit = store
            .query_logs(&LogFilter {
                limit: Some(0),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(zero_limit.len(), 5);
    }

    #[tokio::test]
    async fn delete_before_cutoff_is_strict() {
        let clock = Arc::new(ManualClock::default());
        let store = store_with(clock.clone());

        store
            .insert_log(LogLevel::Info, "old", &LogOptions::default())
            .await
            .unwrap();
        clock.advance(Duration::from_secs(60));
        let cutoff = clock.now();
        store
            .insert_log(LogLevel::Info, "at cutoff", &LogOptions::default())
            .await
            .unwrap();

        let removed = store.delete_logs_before(cutoff).await.unwrap();
        assert_eq!(removed, 1);

        let left = store.query_logs(&LogFilter::default()).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].message, "at cutoff");
    }
}

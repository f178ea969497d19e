// ABOUTME: Trace table access for completed spans: append, filtered reads, and age-based deletion.
// ABOUTME: In-flight spans never reach this table; the trace recorder keeps them in memory.

use casestore_core::clock::format_timestamp;
use casestore_core::{Clock, TraceEntry, TraceFilter, TraceOptions, TraceStatus};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params, params_from_iter};

use crate::error::StoreError;
use crate::rows::{self, FilteredQuery};
use crate::store::LocalStore;

const SELECT: &str = "SELECT id, trace_id, span_id, operation, duration_ms, status, user_id,
    route_path, metadata, created_at FROM traces";

/// A finished span ready to be written.
#[derive(Debug, Clone)]
pub struct NewTrace<'a> {
    pub trace_id: &'a str,
    pub span_id: &'a str,
    pub operation: &'a str,
    pub duration_ms: f64,
    pub status: TraceStatus,
    pub options: &'a TraceOptions,
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<TraceEntry> {
    Ok(TraceEntry {
        id: row.get(0)?,
        trace_id: row.get(1)?,
        span_id: row.get(2)?,
        operation: row.get(3)?,
        duration_ms: row.get(4)?,
        status: rows::parsed(row, 5)?,
        user_id: row.get(6)?,
        route_path: row.get(7)?,
        metadata: rows::metadata(row, 8)?,
        created_at: rows::timestamp(row, 9)?,
    })
}

fn select_filtered(conn: &Connection, filter: &TraceFilter) -> rusqlite::Result<Vec<TraceEntry>> {
    let mut query = FilteredQuery::new(SELECT);
    query
        .eq("trace_id", filter.trace_id.clone())
        .eq("route_path", filter.route_path.clone())
        .eq("user_id", filter.user_id.clone())
        .eq("status", filter.status.map(|s| s.as_str()))
        .order_by("created_at DESC, id DESC")
        .page(filter.limit, filter.offset);

    let mut stmt = conn.prepare(query.sql())?;
    let rows = stmt.query_map(params_from_iter(query.params()), from_row)?;
    rows.collect()
}

/// Every trace row, oldest first. Used by snapshot capture.
pub(crate) fn select_all(conn: &Connection) -> rusqlite::Result<Vec<TraceEntry>> {
    let mut stmt = conn.prepare(&format!("{SELECT} ORDER BY id"))?;
    let rows = stmt.query_map([], from_row)?;
    rows.collect()
}

pub(crate) fn insert_exact(conn: &Connection, t: &TraceEntry) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO traces (id, trace_id, span_id, operation, duration_ms, status, user_id, route_path, metadata, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            t.id,
            t.trace_id,
            t.span_id,
            t.operation,
            t.duration_ms,
            t.status.as_str(),
            t.user_id,
            t.route_path,
            rows::metadata_text(t.metadata.as_ref()),
            format_timestamp(&t.created_at),
        ],
    )?;
    Ok(())
}

impl LocalStore {
    /// Append a completed span stamped with the store clock. Returns the new row id.
    pub async fn insert_trace(&self, span: &NewTrace<'_>) -> Result<i64, StoreError> {
        let now = format_timestamp(&self.clock().now());
        self.write(|conn| {
            conn.execute(
                "INSERT INTO traces (trace_id, span_id, operation, duration_ms, status, user_id, route_path, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    span.trace_id,
                    span.span_id,
                    span.operation,
                    span.duration_ms.max(0.0),
                    span.status.as_str(),
                    span.options.user_id,
                    span.options.route_path,
                    rows::metadata_text(span.options.metadata.as_ref()),
                    now,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// Filtered read, newest first.
    pub async fn query_traces(&self, filter: &TraceFilter) -> Result<Vec<TraceEntry>, StoreError> {
        self.read(|conn| Ok(select_filtered(conn, filter)?)).await
    }

    /// Delete every span created strictly before `cutoff`. Returns the number
    /// of rows removed.
    pub async fn delete_traces_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let cutoff = format_timestamp(&cutoff);
        self.write(|conn| Ok(conn.execute("DELETE FROM traces WHERE created_at < ?1", params![cutoff])?))
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use casestore_core::ManualClock;
    use serde_json::json;

    use crate::slot::MemorySlot;

    use super::*;

    fn span<'a>(trace_id: &'a str, status: TraceStatus, options: &'a TraceOptions) -> NewTrace<'a> {
        NewTrace {
            trace_id,
            span_id: "span-1",
            operation: "load contacts",
            duration_ms: 12.5,
            status,
            options,
        }
    }

    #[tokio::test]
    async fn traces_filter_by_status_and_trace_id() {
        let clock = Arc::new(ManualClock::default());
        let store = LocalStore::new(Arc::new(MemorySlot::new("test")), clock.clone());
        let opts = TraceOptions {
            user_id: Some("u-1".to_string()),
            route_path: Some("/crm/contacts".to_string()),
            metadata: Some(json!({"rows": 40})),
        };

        store.insert_trace(&span("t-1", TraceStatus::Success, &opts)).await.unwrap();
        clock.advance(Duration::from_millis(5));
        store.insert_trace(&span("t-2", TraceStatus::Error, &opts)).await.unwrap();

        let errors = store
            .query_traces(&TraceFilter {
                status: Some(TraceStatus::Error),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].trace_id, "t-2");
        assert_eq!(errors[0].metadata, Some(json!({"rows": 40})));
        assert_eq!(errors[0].duration_ms, 12.5);

        let one = store
            .query_traces(&TraceFilter {
                trace_id: Some("t-1".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].status, TraceStatus::Success);

        let all = store.query_traces(&TraceFilter::default()).await.unwrap();
        assert_eq!(all[0].trace_id, "t-2");

        let newest = store
            .query_traces(&TraceFilter {
                limit: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(newest.len(), 1);
        assert_eq!(newest[0].trace_id, "t-2");

        let unbounded = store
            .query_traces(&TraceFilter {
                limit: Some(0),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(unbounded.len(), 2);
    }

    #[tokio::test]
    async fn negative_durations_are_clamped() {
        let store = LocalStore::new(
            Arc::new(MemorySlot::new("test")),
            Arc::new(ManualClock::default()),
        );
        let opts = TraceOptions::default();
        let mut s = span("t-neg", TraceStatus::Warning, &opts);
        s.duration_ms = -3.0;

        store.insert_trace(&s).await.unwrap();

        let all = store.query_traces(&TraceFilter::default()).await.unwrap();
        assert_eq!(all[0].duration_ms, 0.0);
    }
}

// ABOUTME: Column decoding helpers and a small filtered-query builder shared by the table modules.
// ABOUTME: Converts stored text into timestamps, enums, and JSON metadata with rusqlite conversion errors.

use std::str::FromStr;

use casestore_core::clock::parse_timestamp;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Row, ToSql};

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

pub(crate) fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn parsed<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>().map_err(|e| conversion_error(idx, e))
}

pub(crate) fn metadata(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<serde_json::Value>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| serde_json::from_str(&s).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

pub(crate) fn metadata_text(value: Option<&serde_json::Value>) -> Option<String> {
    value.map(|v| v.to_string())
}

/// Builds `SELECT ... WHERE 1=1 AND col = ? ... ORDER BY ... LIMIT ? OFFSET ?`
/// with positional parameters.
pub(crate) struct FilteredQuery {
    sql: String,
    params: Vec<Box<dyn ToSql>>,
}

impl FilteredQuery {
    pub(crate) fn new(select: &str) -> Self {
        Self {
            sql: format!("{select} WHERE 1=1"),
            params: Vec::new(),
        }
    }

    pub(crate) fn eq<V: ToSql + 'static>(&mut self, column: &str, value: Option<V>) -> &mut Self {
        if let Some(v) = value {
            self.sql.push_str(&format!(" AND {column} = ?"));
            self.params.push(Box::new(v));
        }
        self
    }

    pub(crate) fn order_by(&mut self, clause: &str) -> &mut Self {
        self.sql.push_str(" ORDER BY ");
        self.sql.push_str(clause);
        self
    }

    /// A limit of 0 means no limit.
    pub(crate) fn page(&mut self, limit: Option<u32>, offset: Option<u32>) -> &mut Self {
        let limit = limit.filter(|&n| n > 0);
        // SQLite needs a LIMIT before OFFSET; -1 means unbounded.
        if limit.is_some() || offset.is_some() {
            self.sql.push_str(" LIMIT ?");
            self.params.push(Box::new(limit.map(i64::from).unwrap_or(-1)));
        }
        if let Some(off) = offset {
            self.sql.push_str(" OFFSET ?");
            self.params.push(Box::new(i64::from(off)));
        }
        self
    }

    pub(crate) fn sql(&self) -> &str {
        &self.sql
    }

    pub(crate) fn params(&self) -> impl Iterator<Item = &dyn ToSql> {
        self.params.iter().map(|p| p.as_ref())
    }
}

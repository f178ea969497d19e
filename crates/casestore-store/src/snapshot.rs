// ABOUTME: Whole-store snapshot used for write-through persistence, export, and import.
// ABOUTME: Captures all three tables into one serde_json document and restores them transactionally.

use casestore_core::{LogEntry, RoutePermission, TraceEntry};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{logs, permissions, traces};

/// Version tag written into every snapshot.
pub const SNAPSHOT_FORMAT: u32 = 1;

/// Errors that can occur while encoding or decoding a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported snapshot format {0}")]
    UnsupportedFormat(u32),
}

/// Every row of every table at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub format: u32,
    pub saved_at: DateTime<Utc>,
    pub route_permissions: Vec<RoutePermission>,
    pub logs: Vec<LogEntry>,
    pub traces: Vec<TraceEntry>,
}

impl StoreSnapshot {
    /// Read the full contents of the store.
    pub(crate) fn capture(conn: &Connection, saved_at: DateTime<Utc>) -> rusqlite::Result<Self> {
        Ok(Self {
            format: SNAPSHOT_FORMAT,
            saved_at,
            route_permissions: permissions::select_all(conn)?,
            logs: logs::select_all(conn)?,
            traces: traces::select_all(conn)?,
        })
    }

    /// Replace the contents of the store with this snapshot. Runs in one
    /// transaction, so a failure leaves the previous contents in place.
    pub(crate) fn restore(&self, conn: &mut Connection) -> rusqlite::Result<()> {
        let tx = conn.transaction()?;
        tx.execute_batch(
            "DELETE FROM route_permissions;
             DELETE FROM logs;
             DELETE FROM traces;",
        )?;
        for p in &self.route_permissions {
            permissions::insert_exact(&tx, p)?;
        }
        for e in &self.logs {
            logs::insert_exact(&tx, e)?;
        }
        for t in &self.traces {
            traces::insert_exact(&tx, t)?;
        }
        tx.commit()
    }

    pub fn encode(&self) -> Result<Vec<u8>, SnapshotError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let snapshot: Self = serde_json::from_slice(bytes)?;
        if snapshot.format != SNAPSHOT_FORMAT {
            return Err(SnapshotError::UnsupportedFormat(snapshot.format));
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_rejects_garbage_and_unknown_formats() {
        assert!(matches!(
            StoreSnapshot::decode(b"not json"),
            Err(SnapshotError::Json(_))
        ));

        let future = StoreSnapshot {
            format: SNAPSHOT_FORMAT + 1,
            saved_at: Utc::now(),
            route_permissions: Vec::new(),
            logs: Vec::new(),
            traces: Vec::new(),
        };
        let bytes = serde_json::to_vec(&future).unwrap();
        assert!(matches!(
            StoreSnapshot::decode(&bytes),
            Err(SnapshotError::UnsupportedFormat(2))
        ));
    }
}

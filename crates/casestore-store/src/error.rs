// ABOUTME: Error taxonomy for the persistence layer.
// ABOUTME: Separates fatal initialization failures from per-operation storage and persist failures.

use thiserror::Error;

use crate::slot::SlotError;
use crate::snapshot::SnapshotError;

/// Errors that can occur while initializing, querying, or persisting the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The embedded engine could not be created. The store stays
    /// uninitialized and the next call retries.
    #[error("failed to initialize the embedded store: {0}")]
    Initialization(#[source] rusqlite::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The in-memory mutation succeeded but the snapshot could not be written
    /// to the slot.
    #[error("failed to persist snapshot: {0}")]
    Persist(#[source] SlotError),

    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("store is closed")]
    Closed,
}

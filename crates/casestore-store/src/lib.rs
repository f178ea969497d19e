// ABOUTME: Persistence layer for casestore, owning the embedded SQLite tables and their snapshots.
// ABOUTME: Provides single-flight initialization, seeding, write-through persistence, export and import.

pub mod error;
pub mod logs;
pub mod permissions;
mod rows;
pub mod schema;
pub mod slot;
pub mod snapshot;
pub mod store;
pub mod traces;

pub use error::StoreError;
pub use schema::DEFAULT_ROUTES;
pub use slot::{FileSlot, MemorySlot, SlotError, SnapshotSlot};
pub use snapshot::{SnapshotError, StoreSnapshot};
pub use store::{LocalStore, TableCounts};
pub use traces::NewTrace;

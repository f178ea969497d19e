// ABOUTME: LocalStore owns the embedded SQLite engine and its write-through snapshot slot.
// ABOUTME: Initialization is single-flight; every successful write re-serializes the whole store.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use casestore_core::Clock;
use rusqlite::Connection;
use tokio::sync::{Mutex, OnceCell};

use crate::error::StoreError;
use crate::schema;
use crate::slot::SnapshotSlot;
use crate::snapshot::StoreSnapshot;

/// Row counts per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableCounts {
    pub route_permissions: usize,
    pub logs: usize,
    pub traces: usize,
}

/// The single durable store for one session. Construct it once at startup
/// and share it behind an `Arc`; every consumer goes through it.
///
/// All reads and writes lazily initialize the engine, so callers never see
/// an unseeded table. Writes are persisted to the slot before they return,
/// but the persist is not atomic with the in-memory change: if it fails the
/// row stays in memory and the error is returned.
pub struct LocalStore {
    slot: Arc<dyn SnapshotSlot>,
    clock: Arc<dyn Clock>,
    engine: OnceCell<Mutex<Connection>>,
    init_passes: AtomicUsize,
    closed: AtomicBool,
}

impl LocalStore {
    pub fn new(slot: Arc<dyn SnapshotSlot>, clock: Arc<dyn Clock>) -> Self {
        Self {
            slot,
            clock,
            engine: OnceCell::new(),
            init_passes: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn slot_key(&self) -> &str {
        self.slot.key()
    }

    pub fn is_initialized(&self) -> bool {
        self.engine.initialized()
    }

    /// How many times schema creation and seeding have actually run.
    pub fn initialization_passes(&self) -> usize {
        self.init_passes.load(Ordering::SeqCst)
    }

    /// Open the engine, restore the last snapshot, create the schema, and
    /// seed defaults. Idempotent; concurrent callers share one in-flight
    /// initialization. On failure the store stays uninitialized.
    pub async fn initialize(&self) -> Result<(), StoreError> {
        self.engine().await.map(|_| ())
    }

    async fn engine(&self) -> Result<&Mutex<Connection>, StoreError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }
        self.engine
            .get_or_try_init(|| async { self.open_engine() })
            .await
    }

    fn open_engine(&self) -> Result<Mutex<Connection>, StoreError> {
        self.init_passes.fetch_add(1, Ordering::SeqCst);

        let mut conn = Connection::open_in_memory().map_err(StoreError::Initialization)?;
        schema::create_schema(&conn).map_err(StoreError::Initialization)?;

        match self.slot.load() {
            Ok(Some(bytes)) => match StoreSnapshot::decode(&bytes) {
                Ok(snapshot) => match snapshot.restore(&mut conn) {
                    Ok(()) => tracing::info!(
                        key = self.slot.key(),
                        permissions = snapshot.route_permissions.len(),
                        logs = snapshot.logs.len(),
                        traces = snapshot.traces.len(),
                        "restored store from snapshot"
                    ),
                    Err(e) => tracing::warn!(
                        key = self.slot.key(),
                        "snapshot rows rejected, starting from an empty store: {}",
                        e
                    ),
                },
                Err(e) => tracing::warn!(
                    key = self.slot.key(),
                    "discarding unreadable snapshot, starting from an empty store: {}",
                    e
                ),
            },
            Ok(None) => tracing::info!(key = self.slot.key(), "no snapshot found, starting empty"),
            Err(e) => tracing::warn!(
                key = self.slot.key(),
                "could not read snapshot slot, starting from an empty store: {}",
                e
            ),
        }

        let seeded = schema::seed_default_routes(&conn, &self.clock.now())
            .map_err(StoreError::Initialization)?;
        if seeded > 0 {
            tracing::info!("seeded {} default route permissions", seeded);
        }

        if let Err(e) = self.persist(&conn) {
            tracing::warn!("initial snapshot was not persisted: {}", e);
        }

        Ok(Mutex::new(conn))
    }

    /// Serialize the whole store into the slot.
    fn persist(&self, conn: &Connection) -> Result<(), StoreError> {
        let bytes = StoreSnapshot::capture(conn, self.clock.now())?.encode()?;
        self.slot.store(&bytes).map_err(StoreError::Persist)
    }

    /// Run a read-only closure against the engine.
    pub async fn read<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let conn = self.engine().await?.lock().await;
        f(&conn)
    }

    /// Run a mutating closure, then persist the full store. Nothing is
    /// persisted when the closure fails.
    pub async fn write<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError>,
    {
        let mut conn = self.engine().await?.lock().await;
        let out = f(&mut conn)?;
        self.persist(&conn)?;
        Ok(out)
    }

    /// Full snapshot of all three tables as bytes, for backup or migration.
    pub async fn export(&self) -> Result<Vec<u8>, StoreError> {
        let now = self.clock.now();
        self.read(|conn| Ok(StoreSnapshot::capture(conn, now)?.encode()?))
            .await
    }

    /// Replace every row with the contents of an exported snapshot. An
    /// undecodable snapshot is rejected and the current rows stay as they are.
    pub async fn import(&self, bytes: &[u8]) -> Result<(), StoreError> {
        let snapshot = StoreSnapshot::decode(bytes)?;
        self.write(|conn| Ok(snapshot.restore(conn)?)).await?;
        tracing::info!(
            permissions = snapshot.route_permissions.len(),
            logs = snapshot.logs.len(),
            traces = snapshot.traces.len(),
            "imported snapshot"
        );
        Ok(())
    }

    pub async fn counts(&self) -> Result<TableCounts, StoreError> {
        self.read(|conn| {
            let count = |table: &str| -> rusqlite::Result<usize> {
                let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                    row.get(0)
                })?;
                Ok(n as usize)
            };
            Ok(TableCounts {
                route_permissions: count("route_permissions")?,
                logs: count("logs")?,
                traces: count("traces")?,
            })
        })
        .await
    }

    /// Persist one final time and refuse further operations.
    pub async fn close(&self) -> Result<(), StoreError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(engine) = self.engine.get() {
            let conn = engine.lock().await;
            self.persist(&conn)?;
        }
        tracing::debug!(key = self.slot.key(), "store closed");
        Ok(())
    }
}

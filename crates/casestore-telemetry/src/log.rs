// ABOUTME: Append-only structured application log persisted in the local store.
// ABOUTME: Optionally mirrors each entry to `tracing` at the matching severity for developers.

use std::sync::Arc;

use casestore_core::clock::retention_cutoff;
use casestore_core::{Clock, LogEntry, LogFilter, LogLevel, LogOptions};
use casestore_store::{LocalStore, StoreError};

/// Writes and reads application log entries.
#[derive(Clone)]
pub struct LogRecorder {
    store: Arc<LocalStore>,
    mirror_to_console: bool,
}

impl LogRecorder {
    /// Mirroring to the console is on in debug builds and off in release builds.
    pub fn new(store: Arc<LocalStore>) -> Self {
        Self {
            store,
            mirror_to_console: cfg!(debug_assertions),
        }
    }

    pub fn with_console_mirror(mut self, enabled: bool) -> Self {
        self.mirror_to_console = enabled;
        self
    }

    /// Persist one entry. A storage failure is reported as a warning and
    /// never returned; logging must not break the caller.
    pub async fn log(&self, level: LogLevel, message: &str, options: LogOptions) {
        if let Err(e) = self.store.insert_log(level, message, &options).await {
            tracing::warn!(%level, "failed to store log entry: {}", e);
        }
        if self.mirror_to_console {
            mirror(level, message, &options);
        }
    }

    pub async fn info(&self, message: &str, options: LogOptions) {
        self.log(LogLevel::Info, message, options).await;
    }

    pub async fn warn(&self, message: &str, options: LogOptions) {
        self.log(LogLevel::Warn, message, options).await;
    }

    pub async fn error(&self, message: &str, options: LogOptions) {
        self.log(LogLevel::Error, message, options).await;
    }

    pub async fn debug(&self, message: &str, options: LogOptions) {
        self.log(LogLevel::Debug, message, options).await;
    }

    /// Filtered read, newest first.
    pub async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<LogEntry>, StoreError> {
        self.store.query_logs(filter).await
    }

    /// Delete entries older than `days_to_keep` days. Nothing calls this on
    /// a timer; the host schedules it.
    pub async fn clear_old_logs(&self, days_to_keep: u32) -> Result<usize, StoreError> {
        let cutoff = retention_cutoff(self.store.clock().now(), days_to_keep);
        let removed = self.store.delete_logs_before(cutoff).await?;
        tracing::info!(days_to_keep, removed, "cleared old log entries");
        Ok(removed)
    }
}

fn mirror(level: LogLevel, message: &str, options: &LogOptions) {
    let context = options.context.as_deref();
    let route = options.route_path.as_deref();
    let user = options.user_id.as_deref();
    match level {
        LogLevel::Error => {
            tracing::error!(target: "casestore::app", context, route, user, metadata = ?options.metadata, "{}", message)
        }
        LogLevel::Warn => {
            tracing::warn!(target: "casestore::app", context, route, user, metadata = ?options.metadata, "{}", message)
        }
        LogLevel::Info => {
            tracing::info!(target: "casestore::app", context, route, user, metadata = ?options.metadata, "{}", message)
        }
        LogLevel::Debug => {
            tracing::debug!(target: "casestore::app", context, route, user, metadata = ?options.metadata, "{}", message)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use casestore_core::ManualClock;
    use casestore_store::{MemorySlot, SlotError, SnapshotSlot};

    use super::*;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    struct BrokenSlot;

    impl SnapshotSlot for BrokenSlot {
        fn key(&self) -> &str {
            "broken"
        }

        fn load(&self) -> Result<Option<Vec<u8>>, SlotError> {
            Ok(None)
        }

        fn store(&self, _bytes: &[u8]) -> Result<(), SlotError> {
            Err(SlotError::Unavailable("read-only".to_string()))
        }
    }

    fn recorder(clock: Arc<ManualClock>) -> LogRecorder {
        let store = Arc::new(LocalStore::new(Arc::new(MemorySlot::new("test")), clock));
        LogRecorder::new(store).with_console_mirror(false)
    }

    #[tokio::test]
    async fn convenience_methods_set_the_level() {
        let logs = recorder(Arc::new(ManualClock::default()));

        logs.info("i", LogOptions::default()).await;
        logs.warn("w", LogOptions::default()).await;
        logs.error("e", LogOptions::default().with_route("/crm/call")).await;
        logs.debug("d", LogOptions::default()).await;

        let errors = logs
            .get_logs(&LogFilter {
                level: Some(LogLevel::Error),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "e");
        assert_eq!(errors[0].route_path.as_deref(), Some("/crm/call"));

        let by_route = logs
            .get_logs(&LogFilter {
                route_path: Some("/crm/call".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_route.len(), 1);
        assert_eq!(logs.get_logs(&LogFilter::default()).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn storage_failure_does_not_reach_the_caller() {
        let store = Arc::new(LocalStore::new(
            Arc::new(BrokenSlot),
            Arc::new(ManualClock::default()),
        ));
        let logs = LogRecorder::new(store).with_console_mirror(true);

        // returns unit; nothing to unwrap, nothing panics
        logs.error("payment gateway timeout", LogOptions::default()).await;
    }

    #[tokio::test]
    async fn retention_keeps_the_window_and_drops_the_rest() {
        let clock = Arc::new(ManualClock::default());
        let logs = recorder(clock.clone());

        logs.info("31 days old", LogOptions::default()).await;
        clock.advance(2 * DAY);
        logs.info("29 days old", LogOptions::default()).await;
        clock.advance(29 * DAY);
        logs.info("fresh", LogOptions::default()).await;

        let removed = logs.clear_old_logs(30).await.unwrap();
        assert_eq!(removed, 1);

        let left: Vec<_> = logs
            .get_logs(&LogFilter::default())
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.message)
            .collect();
        assert_eq!(left, vec!["fresh".to_string(), "29 days old".to_string()]);
    }

    #[tokio::test]
    async fn huge_retention_window_removes_nothing() {
        let logs = recorder(Arc::new(ManualClock::default()));
        logs.info("kept", LogOptions::default()).await;

        assert_eq!(logs.clear_old_logs(100_000_000).await.unwrap(), 0);
        assert_eq!(logs.clear_old_logs(u32::MAX).await.unwrap(), 0);
        assert_eq!(logs.get_logs(&LogFilter::default()).await.unwrap().len(), 1);
    }
}

// ABOUTME: LocalServices bundles one store with the permission resolver and telemetry recorders.
// ABOUTME: Explicit init/close lifecycle; retention sweeps run only when the host calls them.

use std::sync::Arc;

use casestore_access::RoutePermissionResolver;
use casestore_core::{Clock, LogOptions, Role, SystemClock};
use casestore_store::{FileSlot, LocalStore, SnapshotSlot, StoreError};
use casestore_telemetry::{LogRecorder, TraceRecorder};
use serde_json::json;

use crate::config::ServicesConfig;

/// Rows removed by one retention sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionReport {
    pub logs_removed: usize,
    pub traces_removed: usize,
}

/// Everything the CRM's route guards and business code need, built around
/// a single [`LocalStore`]. Construct once at startup and pass by reference.
pub struct LocalServices {
    store: Arc<LocalStore>,
    permissions: RoutePermissionResolver,
    logs: LogRecorder,
    traces: TraceRecorder,
}

impl LocalServices {
    pub fn new(slot: Arc<dyn SnapshotSlot>, clock: Arc<dyn Clock>, config: &ServicesConfig) -> Self {
        let store = Arc::new(LocalStore::new(slot, clock));
        let permissions = RoutePermissionResolver::with_ttl(Arc::clone(&store), config.cache_ttl);
        let logs = LogRecorder::new(Arc::clone(&store)).with_console_mirror(config.console_mirror);
        let traces = TraceRecorder::new(Arc::clone(&store), logs.clone());

        Self {
            store,
            permissions,
            logs,
            traces,
        }
    }

    /// Build on a [`FileSlot`] under `config.home` with the system clock.
    pub fn from_config(config: &ServicesConfig) -> Self {
        let slot = Arc::new(FileSlot::new(config.home.clone(), config.slot_key.clone()));
        Self::new(slot, Arc::new(SystemClock), config)
    }

    /// Initialize the store. Must succeed before the subsystem is usable;
    /// a failure here is fatal for the session and may be retried.
    pub async fn init(&self) -> Result<(), StoreError> {
        self.store.initialize().await?;
        tracing::info!(key = self.store.slot_key(), "local services ready");
        Ok(())
    }

    /// Persist a final snapshot and shut the store.
    pub async fn close(&self) -> Result<(), StoreError> {
        self.store.close().await
    }

    pub fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }

    pub fn permissions(&self) -> &RoutePermissionResolver {
        &self.permissions
    }

    pub fn logs(&self) -> &LogRecorder {
        &self.logs
    }

    pub fn traces(&self) -> &TraceRecorder {
        &self.traces
    }

    /// Route guard entry point: decide whether `user_id` acting as `role` may
    /// enter `route_path` and record the decision in the log, granted at
    /// info and denied at warn. Admins and superusers pass without an entry.
    /// Never fails; storage problems resolve to allow.
    pub async fn check_route_access(&self, route_path: &str, user_id: &str, role: &Role) -> bool {
        if role.bypasses_route_checks() {
            return true;
        }

        let allowed = self.permissions.check_permission(route_path, role).await;
        let options = LogOptions::default()
            .with_context("route_permission")
            .with_user(user_id, role.as_str())
            .with_route(route_path)
            .with_metadata(json!({ "has_access": allowed }));
        if allowed {
            self.logs.info("route access granted", options).await;
        } else {
            self.logs.warn("route access denied", options).await;
        }
        allowed
    }

    /// Drop logs and traces older than `days_to_keep` days.
    pub async fn sweep_retention(&self, days_to_keep: u32) -> Result<RetentionReport, StoreError> {
        let logs_removed = self.logs.clear_old_logs(days_to_keep).await?;
        let traces_removed = self.traces.clear_old_traces(days_to_keep).await?;
        Ok(RetentionReport {
            logs_removed,
            traces_removed,
        })
    }

    pub async fn export(&self) -> Result<Vec<u8>, StoreError> {
        self.store.export().await
    }

    /// Replace the store contents with an exported snapshot and drop the
    /// permission cache so the new rows are used immediately.
    pub async fn import(&self, bytes: &[u8]) -> Result<(), StoreError> {
        self.store.import(bytes).await?;
        self.permissions.clear_cache().await;
        Ok(())
    }
}

// ABOUTME: Span lifecycle for operation tracing: start, end, and wrap an async operation.
// ABOUTME: In-flight spans live only in memory; completed spans are written through the store.

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use casestore_core::clock::retention_cutoff;
use casestore_core::{Clock, LogOptions, TraceEntry, TraceFilter, TraceOptions, TraceStatus};
use casestore_store::{LocalStore, NewTrace, StoreError};
use serde_json::{Map, Value, json};
use ulid::Ulid;

use crate::log::LogRecorder;

static NEXT_TRACE: AtomicU64 = AtomicU64::new(1);

/// A span between `start_trace` and `end_trace`.
#[derive(Debug, Clone)]
struct ActiveSpan {
    span_id: String,
    started: Instant,
}

/// Tracks in-flight spans and records completed ones.
pub struct TraceRecorder {
    store: Arc<LocalStore>,
    logs: LogRecorder,
    active: Mutex<HashMap<String, ActiveSpan>>,
}

impl TraceRecorder {
    pub fn new(store: Arc<LocalStore>, logs: LogRecorder) -> Self {
        Self {
            store,
            logs,
            active: Mutex::new(HashMap::new()),
        }
    }

    fn next_trace_id(&self) -> String {
        let n = NEXT_TRACE.fetch_add(1, Ordering::Relaxed);
        format!("trace-{}-{}", self.store.clock().now().timestamp_millis(), n)
    }

    fn active(&self) -> MutexGuard<'_, HashMap<String, ActiveSpan>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn new_span_id() -> String {
        format!("span-{}", Ulid::new().to_string().to_lowercase())
    }

    /// Open a span and return its trace id. Leaves a debug log entry so an
    /// abandoned span still shows up in the log.
    pub async fn start_trace(&self, operation: &str, options: &TraceOptions) -> String {
        let trace_id = self.next_trace_id();
        let span_id = Self::new_span_id();

        self.active().insert(
            trace_id.clone(),
            ActiveSpan {
                span_id: span_id.clone(),
                started: self.store.clock().instant(),
            },
        );

        let mut extra = Map::new();
        extra.insert("trace_id".into(), json!(trace_id));
        extra.insert("span_id".into(), json!(span_id));
        extra.insert("operation".into(), json!(operation));
        self.logs
            .debug(
                &format!("trace started: {operation}"),
                breadcrumb(options, merge_metadata(options.metadata.as_ref(), extra)),
            )
            .await;

        trace_id
    }

    /// Close a span and persist it. Ending an unknown or already-ended
    /// trace is a warning and a no-op.
    pub async fn end_trace(
        &self,
        trace_id: &str,
        operation: &str,
        status: TraceStatus,
        options: &TraceOptions,
    ) {
        let removed = self.active().remove(trace_id);
        let Some(span) = removed else {
            tracing::warn!(trace_id, operation, "trace not found; already ended or never started");
            return;
        };

        let elapsed = self
            .store
            .clock()
            .instant()
            .saturating_duration_since(span.started);
        let duration_ms = elapsed.as_secs_f64() * 1000.0;

        let record = NewTrace {
            trace_id,
            span_id: &span.span_id,
            operation,
            duration_ms,
            status,
            options,
        };
        if let Err(e) = self.store.insert_trace(&record).await {
            tracing::warn!(trace_id, operation, "failed to store trace: {}", e);
        }

        let mut extra = Map::new();
        extra.insert("trace_id".into(), json!(trace_id));
        extra.insert("span_id".into(), json!(span.span_id));
        extra.insert("duration_ms".into(), json!(duration_ms));
        extra.insert("status".into(), json!(status.as_str()));
        self.logs
            .debug(
                &format!("trace ended: {operation} ({duration_ms:.2}ms)"),
                breadcrumb(options, merge_metadata(options.metadata.as_ref(), extra)),
            )
            .await;
    }

    /// Run `f` inside a span. The span ends as `success` or `error`; the
    /// operation's own result or error is returned untouched.
    pub async fn trace_operation<T, E, F, Fut>(
        &self,
        operation: &str,
        options: &TraceOptions,
        f: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let trace_id = self.start_trace(operation, options).await;
        let guard = AbandonGuard {
            active: &self.active,
            trace_id: &trace_id,
            operation,
        };
        let outcome = f().await;
        std::mem::forget(guard);

        match outcome {
            Ok(value) => {
                self.end_trace(&trace_id, operation, TraceStatus::Success, options)
                    .await;
                Ok(value)
            }
            Err(err) => {
                let mut extra = Map::new();
                extra.insert("error".into(), json!(err.to_string()));
                let failed = TraceOptions {
                    metadata: Some(merge_metadata(options.metadata.as_ref(), extra)),
                    ..options.clone()
                };
                self.end_trace(&trace_id, operation, TraceStatus::Error, &failed)
                    .await;
                Err(err)
            }
        }
    }

    /// Filtered read, newest first.
    pub async fn get_traces(&self, filter: &TraceFilter) -> Result<Vec<TraceEntry>, StoreError> {
        self.store.query_traces(filter).await
    }

    /// Delete spans older than `days_to_keep` days. Never self-scheduled.
    pub async fn clear_old_traces(&self, days_to_keep: u32) -> Result<usize, StoreError> {
        let cutoff = retention_cutoff(self.store.clock().now(), days_to_keep);
        let removed = self.store.delete_traces_before(cutoff).await?;
        tracing::info!(days_to_keep, removed, "cleared old traces");
        Ok(removed)
    }

    /// Number of spans started but not yet ended.
    pub async fn active_spans(&self) -> usize {
        self.active().len()
    }
}

/// Drops the in-flight span when a traced operation panics or its future is
/// dropped before completion. Nothing is persisted for an abandoned span.
struct AbandonGuard<'a> {
    active: &'a Mutex<HashMap<String, ActiveSpan>>,
    trace_id: &'a str,
    operation: &'a str,
}

impl Drop for AbandonGuard<'_> {
    fn drop(&mut self) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if active.remove(self.trace_id).is_some() {
            tracing::warn!(
                trace_id = self.trace_id,
                operation = self.operation,
                "traced operation abandoned before completion"
            );
        }
    }
}

fn breadcrumb(options: &TraceOptions, metadata: Value) -> LogOptions {
    LogOptions {
        context: Some("tracing".to_string()),
        user_id: options.user_id.clone(),
        user_role: None,
        route_path: options.route_path.clone(),
        metadata: Some(metadata),
    }
}

/// Caller metadata plus span fields. A non-object caller value is kept
/// under `data`.
fn merge_metadata(base: Option<&Value>, extra: Map<String, Value>) -> Value {
    let mut merged = match base {
        Some(Value::Object(obj)) => obj.clone(),
        Some(other) => {
            let mut m = Map::new();
            m.insert("data".into(), other.clone());
            m
        }
        None => Map::new(),
    };
    merged.extend(extra);
    Value::Object(merged)
}

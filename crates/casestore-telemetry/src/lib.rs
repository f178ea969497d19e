// ABOUTME: Application logging and lightweight operation tracing backed by the local store.
// ABOUTME: Telemetry writes never fail the caller; problems are reported through `tracing` only.

pub mod log;
pub mod trace;

pub use log::LogRecorder;
pub use trace::TraceRecorder;

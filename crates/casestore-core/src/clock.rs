// ABOUTME: Clock abstraction supplying wall-clock timestamps and monotonic instants.
// ABOUTME: SystemClock is used in production; ManualClock makes TTL and retention tests deterministic.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};

/// Source of time for every component that stamps rows, measures spans,
/// or expires caches.
pub trait Clock: Send + Sync {
    /// Current wall-clock time, used for `created_at` / `updated_at`.
    fn now(&self) -> DateTime<Utc>;

    /// Current monotonic instant, used for span durations and cache TTLs.
    fn instant(&self) -> Instant;
}

/// The real clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn instant(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to. Wall-clock and monotonic readings
/// advance together.
#[derive(Debug)]
pub struct ManualClock {
    inner: Mutex<(DateTime<Utc>, Instant)>,
}

impl ManualClock {
    /// Start the clock at the given wall-clock time.
    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            inner: Mutex::new((now, Instant::now())),
        }
    }

    /// Move both readings forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let step = chrono::Duration::from_std(by).unwrap_or(chrono::Duration::MAX);
        guard.0 += step;
        guard.1 += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::starting_at(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).0
    }

    fn instant(&self) -> Instant {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).1
    }
}

/// Render a timestamp in the fixed-width form stored in every table.
/// Fixed width keeps lexical order equal to chronological order, which the
/// retention sweeps rely on.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// The instant `days` days before `now`. A window reaching past the
/// earliest representable time clamps to it, so nothing is older.
pub fn retention_cutoff(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    TimeDelta::try_days(i64::from(days))
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Parse a stored timestamp.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

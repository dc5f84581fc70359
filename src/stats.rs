//! Process-local request counters shared by every pool slot.
//!
//! Slots record outcomes concurrently; the polling loop takes a windowed
//! snapshot once per persistence tick. The lock is held only for the
//! increment or the snapshot bookkeeping, never across I/O.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::store::StatsRecord;

/// Successful status codes; everything else counts as a failure.
const SUCCESS_RANGE: std::ops::Range<u16> = 200..300;

#[derive(Debug)]
struct StatsInner {
    total_requests: u64,
    total_non_200: u64,
    prev_total: u64,
    last_update: Instant,
    delta_duration: Duration,
}

/// Mutex-guarded counters; the only mutable state shared between the slots
/// and the polling loop.
#[derive(Debug)]
pub struct LoadStats {
    inner: Mutex<StatsInner>,
}

impl LoadStats {
    #[must_use]
    pub const fn new(start: Instant) -> Self {
        Self {
            inner: Mutex::new(StatsInner {
                total_requests: 0,
                total_non_200: 0,
                prev_total: 0,
                last_update: start,
                delta_duration: Duration::ZERO,
            }),
        }
    }

    /// Records one completed unit of work. Transport errors and timeouts are
    /// reported with a synthetic status of 0 and therefore count as failures.
    pub fn record(&self, status: u16, duration: Duration) {
        let mut inner = self.lock();
        inner.total_requests = inner.total_requests.saturating_add(1);
        if !SUCCESS_RANGE.contains(&status) {
            inner.total_non_200 = inner.total_non_200.saturating_add(1);
        }
        inner.delta_duration = inner.delta_duration.saturating_add(duration);
    }

    /// Snapshot for the persistence tick: cumulative totals plus the rate and
    /// mean latency of the window since the previous snapshot. Advances the
    /// window (resets `delta_duration`, moves `prev_total` and `last_update`).
    #[must_use]
    pub fn snapshot(&self, now: Instant) -> StatsRecord {
        let mut inner = self.lock();

        let delta = inner.total_requests.saturating_sub(inner.prev_total);
        let elapsed_ms = u64::try_from(
            now.saturating_duration_since(inner.last_update)
                .as_millis(),
        )
        .unwrap_or(u64::MAX);
        let rate_per_second = delta
            .saturating_mul(1000)
            .checked_div(elapsed_ms)
            .unwrap_or(0);
        let delta_duration_ms =
            u64::try_from(inner.delta_duration.as_millis()).unwrap_or(u64::MAX);
        let mean_duration_ms = delta_duration_ms.checked_div(delta).unwrap_or(0);

        let record = StatsRecord {
            total_requests: inner.total_requests,
            total_failures: inner.total_non_200,
            rate_per_second,
            mean_duration_ms,
        };

        inner.prev_total = inner.total_requests;
        inner.last_update = now;
        inner.delta_duration = Duration::ZERO;

        record
    }

    /// Current cumulative totals without advancing the window.
    #[must_use]
    pub fn totals(&self) -> (u64, u64) {
        let inner = self.lock();
        (inner.total_requests, inner.total_non_200)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StatsInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

//! The shared config store: the sole rendezvous point between the controller
//! and the loader instances. The controller owns the `concurrency`, template,
//! and `reset` fields; each instance owns its own stats row and its own row's
//! existence. Nothing here relies on transactions spanning both actors.

mod sqlite;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::args::HttpMethod;
use crate::error::AppResult;

pub use sqlite::SqliteStore;

/// Opaque store-assigned instance identifier (SQLite rowid).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(i64);

impl InstanceId {
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// The request an instance should replay, as stored per instance row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTemplate {
    pub method: HttpMethod,
    pub body: String,
    pub href: String,
}

/// One logical per-tick read: the instance's assignment plus the fleet-wide
/// reset flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceConfig {
    pub concurrency: u64,
    pub template: RequestTemplate,
    pub reset: bool,
}

/// Registration listing entry as seen by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceRow {
    pub id: InstanceId,
    pub concurrency: u64,
}

/// Windowed statistics persisted by an instance, overwriting the previous
/// record (the instance computes deltas and rates itself).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsRecord {
    pub total_requests: u64,
    pub total_failures: u64,
    pub rate_per_second: u64,
    pub mean_duration_ms: u64,
}

/// Point-in-time fleet aggregate produced by one summary query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FleetSummary {
    pub instance_count: u64,
    pub total_requests: u64,
    pub total_failures: u64,
    pub rate_per_second: u64,
    pub mean_duration_ms: u64,
}

/// Store operations shared by the controller, the instances, and the
/// aggregator. Implementations must keep `register` atomic and `deregister`
/// idempotent.
#[async_trait]
pub trait Store: Send + Sync {
    /// Inserts a new instance row with zero concurrency and returns its id.
    ///
    /// # Errors
    ///
    /// Returns an error when the insert fails; registration failure is fatal
    /// for the calling instance.
    async fn register(&self, template: &RequestTemplate) -> AppResult<InstanceId>;

    /// Reads `(concurrency, method, body, href, reset)` for one instance in a
    /// single logical read. `None` means the row no longer exists.
    ///
    /// # Errors
    ///
    /// Returns an error when the read fails.
    async fn instance_config(&self, id: InstanceId) -> AppResult<Option<InstanceConfig>>;

    /// Lists registered instances in store order.
    ///
    /// # Errors
    ///
    /// Returns an error when the read fails.
    async fn instances(&self) -> AppResult<Vec<InstanceRow>>;

    /// Sets the assigned concurrency for one instance. Writing to a row that
    /// has disappeared is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error when the write fails.
    async fn set_concurrency(&self, id: InstanceId, concurrency: u64) -> AppResult<()>;

    /// Sets the fleet-wide reset flag.
    ///
    /// # Errors
    ///
    /// Returns an error when the write fails.
    async fn set_reset(&self, reset: bool) -> AppResult<()>;

    /// Deletes all persisted stats rows.
    ///
    /// # Errors
    ///
    /// Returns an error when the delete fails.
    async fn clear_stats(&self) -> AppResult<()>;

    /// Overwrites the stats record for one instance.
    ///
    /// # Errors
    ///
    /// Returns an error when the upsert fails.
    async fn upsert_stats(&self, id: InstanceId, stats: &StatsRecord) -> AppResult<()>;

    /// Deletes the row for one instance. A missing row is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error when the delete fails.
    async fn deregister(&self, id: InstanceId) -> AppResult<()>;

    /// Returns the fleet aggregate as one query.
    ///
    /// # Errors
    ///
    /// Returns an error when the read fails.
    async fn fleet_summary(&self) -> AppResult<FleetSummary>;
}

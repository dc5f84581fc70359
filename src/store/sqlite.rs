use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;

use crate::args::HttpMethod;
use crate::error::{AppError, AppResult, StoreError};

use super::{
    FleetSummary, InstanceConfig, InstanceId, InstanceRow, RequestTemplate, StatsRecord, Store,
};

/// SQLite-backed config store. One connection per process; all access goes
/// through `Connection::call` so the blocking driver never touches the
/// runtime's worker threads.
pub struct SqliteStore {
    conn: Connection,
}

struct RawInstanceConfig {
    concurrency: i64,
    method: String,
    body: String,
    href: String,
    reset: bool,
}

impl SqliteStore {
    /// Opens (and creates if needed) the store at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error when the database cannot be opened or the schema
    /// cannot be created.
    pub async fn open(path: &str) -> AppResult<Self> {
        let conn = Connection::open(path)
            .await
            .map_err(|err| AppError::store(StoreError::Open { source: err }))?;
        Self::init_schema(conn).await
    }

    /// Opens an in-memory store, used by tests.
    ///
    /// # Errors
    ///
    /// Returns an error when the database cannot be opened or the schema
    /// cannot be created.
    pub async fn open_in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|err| AppError::store(StoreError::Open { source: err }))?;
        Self::init_schema(conn).await
    }

    async fn init_schema(conn: Connection) -> AppResult<Self> {
        conn.call(|conn| {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS instances (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    concurrency INTEGER NOT NULL DEFAULT 0,
                    method TEXT NOT NULL,
                    body TEXT NOT NULL,
                    href TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS fleet (
                    id INTEGER PRIMARY KEY CHECK (id = 1),
                    reset INTEGER NOT NULL DEFAULT 0
                );
                INSERT OR IGNORE INTO fleet (id, reset) VALUES (1, 0);
                CREATE TABLE IF NOT EXISTS instance_stats (
                    instance_id INTEGER PRIMARY KEY,
                    total_requests INTEGER NOT NULL,
                    total_failures INTEGER NOT NULL,
                    rate_per_second INTEGER NOT NULL,
                    mean_duration_ms INTEGER NOT NULL,
                    updated_at TEXT NOT NULL
                );",
            )?;
            Ok(())
        })
        .await
        .map_err(|err| AppError::store(StoreError::Schema { source: err }))?;

        Ok(Self { conn })
    }
}

#[async_trait::async_trait]
impl Store for SqliteStore {
    async fn register(&self, template: &RequestTemplate) -> AppResult<InstanceId> {
        let method = template.method.as_str().to_owned();
        let body = template.body.clone();
        let href = template.href.clone();
        let raw_id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO instances (concurrency, method, body, href)
                     VALUES (0, ?1, ?2, ?3)",
                    rusqlite::params![method, body, href],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(|err| {
                AppError::store(StoreError::Query {
                    context: "register instance",
                    source: err,
                })
            })?;
        Ok(InstanceId::new(raw_id))
    }

    async fn instance_config(&self, id: InstanceId) -> AppResult<Option<InstanceConfig>> {
        let raw_id = id.get();
        let raw = self
            .conn
            .call(move |conn| {
                let row = conn
                    .query_row(
                        "SELECT concurrency, method, body, href,
                                (SELECT COALESCE(reset, 0) FROM fleet WHERE id = 1)
                         FROM instances WHERE id = ?1",
                        rusqlite::params![raw_id],
                        |row| {
                            Ok(RawInstanceConfig {
                                concurrency: row.get(0)?,
                                method: row.get(1)?,
                                body: row.get(2)?,
                                href: row.get(3)?,
                                reset: row.get::<_, i64>(4)? != 0,
                            })
                        },
                    )
                    .optional()?;
                Ok(row)
            })
            .await
            .map_err(|err| {
                AppError::store(StoreError::Query {
                    context: "read instance config",
                    source: err,
                })
            })?;

        let Some(raw) = raw else {
            return Ok(None);
        };
        let method: HttpMethod = raw.method.parse()?;
        Ok(Some(InstanceConfig {
            concurrency: clamp_u64(raw.concurrency),
            template: RequestTemplate {
                method,
                body: raw.body,
                href: raw.href,
            },
            reset: raw.reset,
        }))
    }

    async fn instances(&self) -> AppResult<Vec<InstanceRow>> {
        let rows = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare("SELECT id, concurrency FROM instances")?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(|err| {
                AppError::store(StoreError::Query {
                    context: "list instances",
                    source: err,
                })
            })?;

        Ok(rows
            .into_iter()
            .map(|(id, concurrency)| InstanceRow {
                id: InstanceId::new(id),
                concurrency: clamp_u64(concurrency),
            })
            .collect())
    }

    async fn set_concurrency(&self, id: InstanceId, concurrency: u64) -> AppResult<()> {
        let raw_id = id.get();
        let value = clamp_i64(concurrency);
        self.conn
            .call(move |conn| {
                // Zero rows changed means the instance deregistered mid-ramp;
                // the ramp tolerates that.
                conn.execute(
                    "UPDATE instances SET concurrency = ?2 WHERE id = ?1",
                    rusqlite::params![raw_id, value],
                )?;
                Ok(())
            })
            .await
            .map_err(|err| {
                AppError::store(StoreError::Query {
                    context: "set concurrency",
                    source: err,
                })
            })
    }

    async fn set_reset(&self, reset: bool) -> AppResult<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE fleet SET reset = ?1 WHERE id = 1",
                    rusqlite::params![i64::from(reset)],
                )?;
                Ok(())
            })
            .await
            .map_err(|err| {
                AppError::store(StoreError::Query {
                    context: "set reset flag",
                    source: err,
                })
            })
    }

    async fn clear_stats(&self) -> AppResult<()> {
        self.conn
            .call(|conn| {
                conn.execute("DELETE FROM instance_stats", [])?;
                Ok(())
            })
            .await
            .map_err(|err| {
                AppError::store(StoreError::Query {
                    context: "clear stats",
                    source: err,
                })
            })
    }

    async fn upsert_stats(&self, id: InstanceId, stats: &StatsRecord) -> AppResult<()> {
        let raw_id = id.get();
        let record = *stats;
        let updated_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO instance_stats
                        (instance_id, total_requests, total_failures,
                         rate_per_second, mean_duration_ms, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT(instance_id) DO UPDATE SET
                        total_requests = excluded.total_requests,
                        total_failures = excluded.total_failures,
                        rate_per_second = excluded.rate_per_second,
                        mean_duration_ms = excluded.mean_duration_ms,
                        updated_at = excluded.updated_at",
                    rusqlite::params![
                        raw_id,
                        clamp_i64(record.total_requests),
                        clamp_i64(record.total_failures),
                        clamp_i64(record.rate_per_second),
                        clamp_i64(record.mean_duration_ms),
                        updated_at
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(|err| {
                AppError::store(StoreError::Query {
                    context: "upsert stats",
                    source: err,
                })
            })
    }

    async fn deregister(&self, id: InstanceId) -> AppResult<()> {
        let raw_id = id.get();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "DELETE FROM instances WHERE id = ?1",
                    rusqlite::params![raw_id],
                )?;
                Ok(())
            })
            .await
            .map_err(|err| {
                AppError::store(StoreError::Query {
                    context: "deregister instance",
                    source: err,
                })
            })
    }

    async fn fleet_summary(&self) -> AppResult<FleetSummary> {
        let raw = self
            .conn
            .call(|conn| {
                let row = conn.query_row(
                    "SELECT
                        (SELECT COUNT(*) FROM instances),
                        (SELECT COALESCE(SUM(total_requests), 0) FROM instance_stats),
                        (SELECT COALESCE(SUM(total_failures), 0) FROM instance_stats),
                        (SELECT COALESCE(SUM(rate_per_second), 0) FROM instance_stats),
                        (SELECT CAST(COALESCE(AVG(mean_duration_ms), 0) AS INTEGER)
                         FROM instance_stats)",
                    [],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, i64>(1)?,
                            row.get::<_, i64>(2)?,
                            row.get::<_, i64>(3)?,
                            row.get::<_, i64>(4)?,
                        ))
                    },
                )?;
                Ok(row)
            })
            .await
            .map_err(|err| {
                AppError::store(StoreError::Query {
                    context: "read fleet summary",
                    source: err,
                })
            })?;

        let (instances, requests, failures, rate, mean) = raw;
        Ok(FleetSummary {
            instance_count: clamp_u64(instances),
            total_requests: clamp_u64(requests),
            total_failures: clamp_u64(failures),
            rate_per_second: clamp_u64(rate),
            mean_duration_ms: clamp_u64(mean),
        })
    }
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn clamp_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

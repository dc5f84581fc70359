use super::{RequestTemplate, SqliteStore, StatsRecord, Store};
use crate::args::HttpMethod;
use crate::error::{AppError, AppResult, StoreError};

fn template() -> RequestTemplate {
    RequestTemplate {
        method: HttpMethod::Get,
        body: String::new(),
        href: "http://localhost:8080/work".to_owned(),
    }
}

fn expectation(message: &'static str) -> AppError {
    AppError::store(StoreError::TestExpectation { message })
}

#[tokio::test]
async fn registration_assigns_unique_increasing_ids() -> AppResult<()> {
    let store = SqliteStore::open_in_memory().await?;
    let first = store.register(&template()).await?;
    let second = store.register(&template()).await?;
    let third = store.register(&template()).await?;

    assert!(first.get() < second.get());
    assert!(second.get() < third.get());
    Ok(())
}

#[tokio::test]
async fn registered_instance_starts_at_zero_concurrency() -> AppResult<()> {
    let store = SqliteStore::open_in_memory().await?;
    let id = store.register(&template()).await?;

    let config = store
        .instance_config(id)
        .await?
        .ok_or_else(|| expectation("config should exist after registration"))?;
    assert_eq!(config.concurrency, 0);
    assert!(!config.reset);
    assert_eq!(config.template, template());
    Ok(())
}

#[tokio::test]
async fn set_concurrency_is_read_back() -> AppResult<()> {
    let store = SqliteStore::open_in_memory().await?;
    let id = store.register(&template()).await?;
    store.set_concurrency(id, 40).await?;

    let config = store
        .instance_config(id)
        .await?
        .ok_or_else(|| expectation("config should exist"))?;
    assert_eq!(config.concurrency, 40);
    Ok(())
}

#[tokio::test]
async fn set_concurrency_tolerates_missing_row() -> AppResult<()> {
    let store = SqliteStore::open_in_memory().await?;
    let id = store.register(&template()).await?;
    store.deregister(id).await?;

    store.set_concurrency(id, 10).await?;
    Ok(())
}

#[tokio::test]
async fn reset_flag_round_trips_to_every_instance() -> AppResult<()> {
    let store = SqliteStore::open_in_memory().await?;
    let first = store.register(&template()).await?;
    let second = store.register(&template()).await?;

    store.set_reset(true).await?;
    for id in [first, second] {
        let config = store
            .instance_config(id)
            .await?
            .ok_or_else(|| expectation("config should exist"))?;
        assert!(config.reset);
    }

    store.set_reset(false).await?;
    let config = store
        .instance_config(first)
        .await?
        .ok_or_else(|| expectation("config should exist"))?;
    assert!(!config.reset);
    Ok(())
}

#[tokio::test]
async fn deregister_is_idempotent_and_removes_config() -> AppResult<()> {
    let store = SqliteStore::open_in_memory().await?;
    let id = store.register(&template()).await?;

    store.deregister(id).await?;
    store.deregister(id).await?;

    assert!(store.instance_config(id).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn upsert_stats_overwrites_instead_of_accumulating() -> AppResult<()> {
    let store = SqliteStore::open_in_memory().await?;
    let id = store.register(&template()).await?;

    store
        .upsert_stats(
            id,
            &StatsRecord {
                total_requests: 10,
                total_failures: 1,
                rate_per_second: 5,
                mean_duration_ms: 20,
            },
        )
        .await?;
    store
        .upsert_stats(
            id,
            &StatsRecord {
                total_requests: 25,
                total_failures: 2,
                rate_per_second: 7,
                mean_duration_ms: 30,
            },
        )
        .await?;

    let summary = store.fleet_summary().await?;
    assert_eq!(summary.total_requests, 25);
    assert_eq!(summary.total_failures, 2);
    assert_eq!(summary.rate_per_second, 7);
    assert_eq!(summary.mean_duration_ms, 30);
    Ok(())
}

#[tokio::test]
async fn fleet_summary_aggregates_across_instances() -> AppResult<()> {
    let store = SqliteStore::open_in_memory().await?;
    let first = store.register(&template()).await?;
    let second = store.register(&template()).await?;

    store
        .upsert_stats(
            first,
            &StatsRecord {
                total_requests: 100,
                total_failures: 3,
                rate_per_second: 50,
                mean_duration_ms: 10,
            },
        )
        .await?;
    store
        .upsert_stats(
            second,
            &StatsRecord {
                total_requests: 200,
                total_failures: 7,
                rate_per_second: 70,
                mean_duration_ms: 30,
            },
        )
        .await?;

    let summary = store.fleet_summary().await?;
    assert_eq!(summary.instance_count, 2);
    assert_eq!(summary.total_requests, 300);
    assert_eq!(summary.total_failures, 10);
    assert_eq!(summary.rate_per_second, 120);
    assert_eq!(summary.mean_duration_ms, 20);
    Ok(())
}

#[tokio::test]
async fn clear_stats_empties_the_aggregate() -> AppResult<()> {
    let store = SqliteStore::open_in_memory().await?;
    let id = store.register(&template()).await?;
    store
        .upsert_stats(
            id,
            &StatsRecord {
                total_requests: 10,
                total_failures: 0,
                rate_per_second: 1,
                mean_duration_ms: 2,
            },
        )
        .await?;

    store.clear_stats().await?;

    let summary = store.fleet_summary().await?;
    assert_eq!(summary.instance_count, 1);
    assert_eq!(summary.total_requests, 0);
    assert_eq!(summary.mean_duration_ms, 0);
    Ok(())
}

#[tokio::test]
async fn instances_are_listed_in_store_order() -> AppResult<()> {
    let store = SqliteStore::open_in_memory().await?;
    let first = store.register(&template()).await?;
    let second = store.register(&template()).await?;
    let third = store.register(&template()).await?;
    store.set_concurrency(second, 15).await?;

    let rows = store.instances().await?;
    let ids: Vec<_> = rows.iter().map(|row| row.id).collect();
    assert_eq!(ids, vec![first, second, third]);
    let concurrencies: Vec<_> = rows.iter().map(|row| row.concurrency).collect();
    assert_eq!(concurrencies, vec![0, 15, 0]);
    Ok(())
}

#[tokio::test]
async fn on_disk_store_persists_between_opens() -> AppResult<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("fleet.db");
    let path = path.to_string_lossy().into_owned();

    let id = {
        let store = SqliteStore::open(&path).await?;
        store.register(&template()).await?
    };

    let store = SqliteStore::open(&path).await?;
    let config = store
        .instance_config(id)
        .await?
        .ok_or_else(|| expectation("row should survive reopen"))?;
    assert_eq!(config.template.href, "http://localhost:8080/work");
    Ok(())
}

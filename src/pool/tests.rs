use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::FutureExt as _;

use super::WorkerPool;
use crate::shutdown::shutdown_channel;

fn counting_pool(counter: &Arc<AtomicU64>) -> WorkerPool {
    let (hard_tx, _hard_rx) = shutdown_channel();
    let counter = Arc::clone(counter);
    WorkerPool::new(
        Arc::new(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::Relaxed);
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            .boxed()
        }),
        hard_tx,
    )
}

#[tokio::test(start_paused = true)]
async fn resize_reaches_the_requested_target() {
    let counter = Arc::new(AtomicU64::new(0));
    let pool = counting_pool(&counter);

    pool.resize(5);
    assert_eq!(pool.len(), 5);

    pool.resize(2);
    assert_eq!(pool.len(), 2);

    pool.resize(0);
    assert_eq!(pool.len(), 0);
    assert!(pool.is_empty());
}

#[tokio::test(start_paused = true)]
async fn resize_to_current_size_is_a_no_op() {
    let counter = Arc::new(AtomicU64::new(0));
    let pool = counting_pool(&counter);

    pool.resize(3);
    let before = pool.slot_ids();
    pool.resize(3);
    assert_eq!(pool.slot_ids(), before);
}

#[tokio::test(start_paused = true)]
async fn removal_is_last_added_first_removed() {
    let counter = Arc::new(AtomicU64::new(0));
    let pool = counting_pool(&counter);

    pool.resize(4);
    let initial = pool.slot_ids();
    assert_eq!(initial, vec![0, 1, 2, 3]);

    pool.resize(2);
    assert_eq!(pool.slot_ids(), vec![0, 1]);

    // Regrown slots are fresh, never resurrected.
    pool.resize(3);
    assert_eq!(pool.slot_ids(), vec![0, 1, 4]);
}

#[tokio::test(start_paused = true)]
async fn slots_repeat_work_until_stopped() {
    let counter = Arc::new(AtomicU64::new(0));
    let pool = counting_pool(&counter);

    pool.resize(2);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(counter.load(Ordering::Relaxed) >= 2);

    pool.resize(0);
    // Cooperative stop: each removed slot may finish the unit it already
    // started, but must not begin another one.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let settled = counter.load(Ordering::Relaxed);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(counter.load(Ordering::Relaxed), settled);
}

#[tokio::test(start_paused = true)]
async fn hard_stop_interrupts_in_flight_units() {
    struct InflightGuard(Arc<AtomicU64>);
    impl Drop for InflightGuard {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::Relaxed);
        }
    }

    let inflight = Arc::new(AtomicU64::new(0));
    let (hard_tx, _hard_rx) = shutdown_channel();
    let work_inflight = Arc::clone(&inflight);
    let pool = WorkerPool::new(
        Arc::new(move || {
            let guard_inflight = Arc::clone(&work_inflight);
            async move {
                guard_inflight.fetch_add(1, Ordering::Relaxed);
                let _guard = InflightGuard(guard_inflight);
                std::future::pending::<()>().await;
            }
            .boxed()
        }),
        hard_tx.clone(),
    );

    pool.resize(3);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(inflight.load(Ordering::Relaxed), 3);

    drop(hard_tx.send(()));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(inflight.load(Ordering::Relaxed), 0);
    // Hard stop kills the tasks, not the bookkeeping; drain resizes first.
    assert_eq!(pool.len(), 3);
}

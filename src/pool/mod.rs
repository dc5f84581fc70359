//! Resizable pool of concurrently-running work slots.
//!
//! Each slot repeats a supplied unit of work until it is stopped. Shrinking
//! is cooperative: a removed slot finishes its in-flight unit and exits. The
//! shared hard-stop broadcast interrupts slots mid-unit and is reserved for
//! instance drain.

#[cfg(test)]
mod tests;

use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::BoxFuture;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::shutdown::ShutdownSender;

/// One unit of work; failures are the work function's own responsibility and
/// must never escape it.
pub type WorkFn = dyn Fn() -> BoxFuture<'static, ()> + Send + Sync;

struct Slot {
    id: u64,
    stop_tx: ShutdownSender,
    _handle: JoinHandle<()>,
}

struct PoolState {
    slots: Vec<Slot>,
    next_id: u64,
}

pub struct WorkerPool {
    state: Mutex<PoolState>,
    hard_stop: ShutdownSender,
    work: Arc<WorkFn>,
}

impl WorkerPool {
    #[must_use]
    pub const fn new(work: Arc<WorkFn>, hard_stop: ShutdownSender) -> Self {
        Self {
            state: Mutex::new(PoolState {
                slots: Vec::new(),
                next_id: 0,
            }),
            hard_stop,
            work,
        }
    }

    /// Brings the pool to exactly `target` slots. Serialized under the pool
    /// lock; bookkeeping is synchronous even though removed slots exit
    /// asynchronously. Removal is last-added-first-removed.
    pub fn resize(&self, target: usize) {
        let mut state = self.lock();
        let current = state.slots.len();
        if current == target {
            return;
        }
        debug!("Resizing worker pool from {} to {} slots.", current, target);

        while state.slots.len() > target {
            if let Some(slot) = state.slots.pop() {
                // The slot finishes its in-flight unit, then exits.
                debug!("Stopping slot {}.", slot.id);
                drop(slot.stop_tx.send(()));
            }
        }

        while state.slots.len() < target {
            let id = state.next_id;
            state.next_id = state.next_id.saturating_add(1);
            state.slots.push(self.spawn_slot(id));
        }
    }

    /// Number of active slots (the most recently requested target).
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().slots.is_empty()
    }

    fn spawn_slot(&self, id: u64) -> Slot {
        let (stop_tx, mut stop_rx) = crate::shutdown::shutdown_channel();
        let mut hard_rx = self.hard_stop.subscribe();
        let work = Arc::clone(&self.work);

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = hard_rx.recv() => break,
                    () = work() => {}
                }
                match stop_rx.try_recv() {
                    Ok(()) | Err(broadcast::error::TryRecvError::Closed) => break,
                    Err(broadcast::error::TryRecvError::Lagged(_)) => break,
                    Err(broadcast::error::TryRecvError::Empty) => {}
                }
            }
        });

        Slot {
            id,
            stop_tx,
            _handle: handle,
        }
    }

    #[cfg(test)]
    fn slot_ids(&self) -> Vec<u64> {
        self.lock().slots.iter().map(|slot| slot.id).collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

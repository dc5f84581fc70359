//! Read-side fleet aggregation: periodically folds every persisted stats row
//! into one summary and streams it to a consumer. Pure reader; never writes
//! to the store.


use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::shutdown::ShutdownSender;
use crate::store::{FleetSummary, Store};

/// Spawns the summary loop: one aggregate read per `interval`, pushed into
/// `summaries`. The loop ends on shutdown or when the receiver is dropped;
/// failed reads are logged and skipped.
pub fn spawn_summary_stream(
    store: Arc<dyn Store>,
    interval: Duration,
    summaries: mpsc::Sender<FleetSummary>,
    shutdown_tx: &ShutdownSender,
) -> JoinHandle<()> {
    let mut shutdown_rx = shutdown_tx.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                () = tokio::time::sleep(interval) => {}
            }

            let summary = match store.fleet_summary().await {
                Ok(summary) => summary,
                Err(err) => {
                    warn!("Fleet summary read failed: {}", err);
                    continue;
                }
            };

            if summaries.send(summary).await.is_err() {
                debug!("Summary receiver dropped; stopping the stream.");
                break;
            }
        }
    })
}

//! Process entry: parse the CLI, initialize logging, build the runtime, and
//! dispatch to the selected subcommand.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser as _;
use tokio::sync::mpsc;

use crate::aggregator::spawn_summary_stream;
use crate::args::{Command, FleetArgs};
use crate::controller::{reset_fleet, set_global_concurrency};
use crate::error::AppResult;
use crate::instance::{resolve_settings, run_instance};
use crate::shutdown::{setup_signal_shutdown_handler, shutdown_channel};
use crate::store::{SqliteStore, Store};

/// Buffered summaries between the aggregator and the printing loop.
const SUMMARY_CHANNEL_CAPACITY: usize = 16;

/// Parses the CLI, sets up logging and the runtime, and runs the subcommand.
///
/// # Errors
///
/// Returns an error when argument parsing, runtime construction, or the
/// subcommand itself fails.
pub fn run() -> AppResult<()> {
    let args = FleetArgs::parse();
    crate::logger::init_logging(args.verbose);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run_async(args))
}

async fn run_async(args: FleetArgs) -> AppResult<()> {
    let store: Arc<dyn Store> = Arc::new(SqliteStore::open(&args.store).await?);

    match args.command {
        Command::Instance(instance_args) => {
            let settings = resolve_settings(instance_args)?;
            let (shutdown_tx, _shutdown_rx) = shutdown_channel();
            let signal_handle = setup_signal_shutdown_handler(&shutdown_tx);

            let outcome = run_instance(store, settings, &shutdown_tx).await;

            // Release the signal task when the instance exited on its own.
            drop(shutdown_tx.send(()));
            signal_handle.await?;
            outcome
        }
        Command::Ramp(ramp_args) => set_global_concurrency(store.as_ref(), ramp_args.total).await,
        Command::Reset(reset_args) => reset_fleet(store.as_ref(), reset_args.clear_stats).await,
        Command::Watch(watch_args) => watch(store, watch_args.interval).await,
        Command::Status => status(store.as_ref()).await,
    }
}

/// Streams fleet summaries as JSON lines until interrupted.
async fn watch(store: Arc<dyn Store>, interval: Duration) -> AppResult<()> {
    let (shutdown_tx, mut shutdown_rx) = shutdown_channel();
    let signal_handle = setup_signal_shutdown_handler(&shutdown_tx);
    let (summary_tx, mut summary_rx) = mpsc::channel(SUMMARY_CHANNEL_CAPACITY);
    let stream_handle = spawn_summary_stream(store, interval, summary_tx, &shutdown_tx);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            summary = summary_rx.recv() => match summary {
                Some(summary) => println!("{}", serde_json::to_string(&summary)?),
                None => break,
            },
        }
    }

    drop(shutdown_tx.send(()));
    stream_handle.await?;
    signal_handle.await?;
    Ok(())
}

/// Prints one fleet summary and exits.
async fn status(store: &dyn Store) -> AppResult<()> {
    let summary = store.fleet_summary().await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

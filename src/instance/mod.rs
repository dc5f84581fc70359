//! One loader instance: registers itself in the config store, then polls its
//! own row, resizing the worker pool and persisting stats each tick until a
//! reset flag or a shutdown signal drains it to zero.


use std::sync::Arc;
use std::time::Duration;

use arcshift::ArcShift;
use rand::Rng as _;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::args::{HttpMethod, InstanceArgs};
use crate::config::{apply_config, load_config};
use crate::error::{AppError, AppResult, ValidationError};
use crate::http::{build_client, make_work_fn, validate_href};
use crate::pool::WorkerPool;
use crate::shutdown::{ShutdownSender, shutdown_channel};
use crate::stats::LoadStats;
use crate::store::{RequestTemplate, Store};

/// Upper bound of the random jitter added to every poll pause, so a fleet
/// started in lockstep does not hammer the store in lockstep.
const POLL_JITTER_MAX_MS: u64 = 250;

/// Runtime settings for one instance after CLI flags and the optional config
/// file have been merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceSettings {
    pub template: RequestTemplate,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

/// Why the polling loop ended and the drain began.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DrainReason {
    Reset,
    Shutdown,
}

/// Merges CLI flags with the optional config file into runtime settings.
/// CLI flags win; unset method and body fall back to GET and empty.
///
/// # Errors
///
/// Returns an error when the config file fails to load or no target URL is
/// given anywhere.
pub fn resolve_settings(mut args: InstanceArgs) -> AppResult<InstanceSettings> {
    if let Some(config) = load_config(args.config.as_deref())? {
        apply_config(&mut args, &config);
    }

    let target = args
        .target
        .ok_or_else(|| AppError::validation(ValidationError::MissingTarget))?;

    Ok(InstanceSettings {
        template: RequestTemplate {
            method: args.method.unwrap_or(HttpMethod::Get),
            body: args.data.unwrap_or_default(),
            href: target,
        },
        poll_interval: args.poll_interval,
        request_timeout: args.request_timeout,
        connect_timeout: args.connect_timeout,
    })
}

/// Runs one loader instance to completion.
///
/// Registration is fatal on failure; once registered, poll-loop errors are
/// logged and retried on the next tick. The drain runs in a fixed order:
/// cooperative resize to zero, hard stop for in-flight requests, then
/// deregistration as the last store write.
///
/// # Errors
///
/// Returns an error when the target URL is invalid, registration fails, or
/// the HTTP client cannot be built.
pub async fn run_instance(
    store: Arc<dyn Store>,
    settings: InstanceSettings,
    shutdown_tx: &ShutdownSender,
) -> AppResult<()> {
    validate_href(&settings.template.href)?;
    let client = build_client(settings.request_timeout, settings.connect_timeout)?;

    let id = store.register(&settings.template).await?;
    info!(
        "Registered as instance {} targeting {}.",
        id, settings.template.href
    );

    let stats = Arc::new(LoadStats::new(Instant::now()));
    let mut template = ArcShift::new(settings.template.clone());
    let (hard_tx, _hard_rx) = shutdown_channel();
    let pool = WorkerPool::new(
        make_work_fn(client, template.clone(), Arc::clone(&stats)),
        hard_tx.clone(),
    );

    let mut shutdown_rx = shutdown_tx.subscribe();
    let mut current_template = settings.template;

    let reason = loop {
        let pause = jittered(settings.poll_interval);
        tokio::select! {
            _ = shutdown_rx.recv() => break DrainReason::Shutdown,
            () = tokio::time::sleep(pause) => {}
        }

        match store.instance_config(id).await {
            Ok(Some(config)) => {
                if config.reset {
                    break DrainReason::Reset;
                }

                pool.resize(usize::try_from(config.concurrency).unwrap_or(usize::MAX));

                if config.template != current_template {
                    debug!("Request template changed; slots pick it up next unit.");
                    template.rcu(|_current| config.template.clone());
                    current_template = config.template;
                }

                let record = stats.snapshot(Instant::now());
                if let Err(err) = store.upsert_stats(id, &record).await {
                    warn!("Failed to persist stats for instance {}: {}", id, err);
                }
            }
            Ok(None) => {
                warn!(
                    "Row for instance {} is gone; keeping the current assignment.",
                    id
                );
            }
            Err(err) => {
                warn!("Config poll failed for instance {}: {}", id, err);
            }
        }
    };

    match reason {
        DrainReason::Reset => info!("Reset flag observed; draining instance {}.", id),
        DrainReason::Shutdown => info!("Shutdown signal received; draining instance {}.", id),
    }

    pool.resize(0);
    drop(hard_tx.send(()));
    if let Err(err) = store.deregister(id).await {
        warn!("Failed to deregister instance {}: {}", id, err);
    }

    Ok(())
}

fn jittered(base: Duration) -> Duration {
    let jitter_ms = rand::thread_rng().gen_range(0..=POLL_JITTER_MAX_MS);
    base.saturating_add(Duration::from_millis(jitter_ms))
}

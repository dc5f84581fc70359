//! The ramp driver: converts "set total fleet concurrency to N" into a
//! bounded-step, time-spread sequence of per-instance assignments written to
//! the config store. Instances pick the assignments up on their next poll;
//! there is no direct channel to them.


use std::time::Duration;

use tracing::info;

use crate::error::AppResult;
use crate::store::Store;

/// Pacing between per-instance ramp steps, so downstream autoscalers observe
/// a gradual ramp rather than a step function.
const RAMP_PACE: Duration = Duration::from_secs(1);
/// Step bounds; the nominal step is one tenth of the target.
const MIN_STEP: u64 = 10;
const MAX_STEP: u64 = 1000;

/// Ramps the fleet's total concurrency toward `total` in one pass over the
/// registered instances.
///
/// `total == 0` is the emergency-shutdown fast path: every instance is
/// assigned zero immediately, with no pacing. Otherwise each instance in
/// store order receives `min(step, remaining)` with one pacing interval
/// before each write; once `remaining` is exhausted, trailing instances keep
/// whatever concurrency they already had. Exactly one pass is made per call.
///
/// # Errors
///
/// Returns the first failed store write. The ramp aborts in place: earlier
/// assignments stand, nothing is rolled back.
pub async fn set_global_concurrency(store: &dyn Store, total: u64) -> AppResult<()> {
    let instances = store.instances().await?;
    if instances.is_empty() {
        info!("No registered instances; nothing to ramp.");
        return Ok(());
    }

    if total == 0 {
        for instance in &instances {
            store.set_concurrency(instance.id, 0).await?;
        }
        info!(
            "Assigned zero concurrency to {} instances.",
            instances.len()
        );
        return Ok(());
    }

    let step = total.checked_div(10).unwrap_or(0).clamp(MIN_STEP, MAX_STEP);
    let mut remaining = total;
    for instance in &instances {
        if remaining == 0 {
            break;
        }
        let assignment = step.min(remaining);
        remaining = remaining.saturating_sub(assignment);
        tokio::time::sleep(RAMP_PACE).await;
        store.set_concurrency(instance.id, assignment).await?;
        info!(
            "Assigned concurrency {} to instance {} ({} remaining).",
            assignment, instance.id, remaining
        );
    }

    Ok(())
}

/// Sets the fleet-wide reset flag so every instance drains to zero and
/// terminates; optionally clears all persisted stats rows.
///
/// # Errors
///
/// Returns an error when either store write fails.
pub async fn reset_fleet(store: &dyn Store, clear_stats: bool) -> AppResult<()> {
    store.set_reset(true).await?;
    info!("Fleet reset flag set; instances will drain and exit.");
    if clear_stats {
        store.clear_stats().await?;
        info!("Cleared persisted instance stats.");
    }
    Ok(())
}

//! The unit of work supplied to the worker pool: one request against the
//! instance's current template, outcome folded into the local statistics.


use std::sync::Arc;
use std::time::Duration;

use arcshift::ArcShift;
use futures_util::FutureExt as _;
use reqwest::Client;
use tokio::time::Instant;
use tracing::debug;
use url::Url;

use crate::error::{AppError, AppResult, HttpError};
use crate::pool::WorkFn;
use crate::stats::LoadStats;
use crate::store::RequestTemplate;

const DEFAULT_USER_AGENT: &str = concat!("loadfleet/", env!("CARGO_PKG_VERSION"));

/// Synthetic status recorded for transport errors and timeouts.
pub const TRANSPORT_ERROR_STATUS: u16 = 0;

/// Builds the shared HTTP client used by every slot of one instance.
///
/// # Errors
///
/// Returns an error when the client cannot be constructed.
pub fn build_client(request_timeout: Duration, connect_timeout: Duration) -> AppResult<Client> {
    Client::builder()
        .timeout(request_timeout)
        .connect_timeout(connect_timeout)
        .user_agent(DEFAULT_USER_AGENT)
        .build()
        .map_err(|err| AppError::http(HttpError::BuildClientFailed { source: err }))
}

/// Validates the target URL of a request template before registration.
///
/// # Errors
///
/// Returns an error when the URL does not parse or has no host.
pub fn validate_href(href: &str) -> AppResult<Url> {
    let url = Url::parse(href).map_err(|err| {
        AppError::http(HttpError::InvalidHref {
            value: href.to_owned(),
            source: err,
        })
    })?;
    if url.host_str().is_none() {
        return Err(AppError::http(HttpError::HrefMissingHost {
            value: href.to_owned(),
        }));
    }
    Ok(url)
}

/// Executes one request and records `(status, duration)` into `stats`.
/// Failures never propagate; they surface only as failure counts.
pub async fn execute_once(client: &Client, template: &RequestTemplate, stats: &LoadStats) {
    let start = Instant::now();
    let request = client
        .request(template.method.into(), template.href.as_str())
        .body(template.body.clone());

    let status = match request.send().await {
        Ok(response) => {
            let status = response.status().as_u16();
            // Drain the body so the duration covers the full exchange.
            if let Err(err) = response.bytes().await {
                debug!("Failed to read response body: {}", err);
            }
            status
        }
        Err(err) => {
            debug!("Request failed: {}", err);
            TRANSPORT_ERROR_STATUS
        }
    };

    stats.record(status, start.elapsed());
}

/// Wraps the client, the live template, and the stats into the no-argument
/// work function the pool expects. The template is read through a shared
/// `ArcShift` handle, so slots pick up swaps on their next unit of work.
#[must_use]
pub fn make_work_fn(
    client: Client,
    template: ArcShift<RequestTemplate>,
    stats: Arc<LoadStats>,
) -> Arc<WorkFn> {
    Arc::new(move || {
        let client = client.clone();
        let stats = Arc::clone(&stats);
        let current = template.shared_get().clone();
        async move {
            execute_once(&client, &current, &stats).await;
        }
        .boxed()
    })
}

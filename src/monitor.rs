/**
Wiring for a bridge monitor

Builds the HTTP client, fetcher, and sync engine for one bridge and starts
polling. Each call produces an independent engine; the caller owns it and is
responsible for stopping it.
*/
use crate::bridge::client;
use crate::bridge::payload::PayloadKind;
use crate::bridge::sync::errors::invalid_config_error;
use crate::bridge::sync::{EndpointSpec, HttpFetcher, PublicSnapshot, SyncConfig, SyncEngine};
use crate::error::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct MonitorOptions {
    pub base_url: String,
    pub config: SyncConfig,
    pub user_agent: Option<String>,
    /// Raw-JSON endpoints monitored in addition to `/health` and `/status`
    pub extra_endpoints: Vec<EndpointSpec>,
}

impl MonitorOptions {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            config: SyncConfig::default(),
            user_agent: None,
            extra_endpoints: Vec::new(),
        }
    }

    #[must_use]
    pub fn endpoints(&self) -> Vec<EndpointSpec> {
        let mut endpoints = default_endpoints();
        endpoints.extend(self.extra_endpoints.iter().cloned());
        endpoints
    }
}

/// The two endpoints every bridge serves
#[must_use]
pub fn default_endpoints() -> Vec<EndpointSpec> {
    vec![EndpointSpec::health(), EndpointSpec::status()]
}

/// Parse a `NAME=PATH` command-line endpoint into a raw-JSON endpoint spec
///
/// # Errors
///
/// Returns an error if either side of the `=` is missing.
pub fn parse_endpoint_arg(arg: &str) -> Result<EndpointSpec> {
    match arg.split_once('=') {
        Some((name, path)) if !name.trim().is_empty() && !path.trim().is_empty() => Ok(
            EndpointSpec::new(name.trim(), path.trim(), PayloadKind::Json),
        ),
        _ => Err(invalid_config_error(&format!(
            "endpoint {arg:?} must look like NAME=PATH"
        ))),
    }
}

/// Build an engine for the bridge described by `options` and start polling
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built or the endpoint list
/// or configuration is rejected.
pub fn initialize(options: &MonitorOptions) -> Result<SyncEngine> {
    let http = client::new(options.user_agent.as_deref(), options.config.request_timeout)?;
    let fetcher = HttpFetcher::new(http, options.base_url.clone());
    let engine = SyncEngine::new(options.endpoints(), Arc::new(fetcher), options.config.clone())?;
    engine.start()?;

    info!(
        "Monitoring {} ({} endpoints, fast {}ms, backoff {}ms)",
        options.base_url,
        engine.endpoints().len(),
        options.config.fast_interval.as_millis(),
        options.config.backoff_interval.as_millis()
    );
    Ok(engine)
}

/// Wait until the engine has finished its first cycle, or `limit` elapses
pub async fn wait_until_loaded(engine: &SyncEngine, limit: Duration) -> Arc<PublicSnapshot> {
    let mut subscription = engine.subscribe("*");
    let waited = timeout(limit, async {
        loop {
            let latest = subscription.latest();
            if !latest.loading {
                return latest;
            }
            match subscription.changed().await {
                Some(snapshot) if !snapshot.loading => return snapshot,
                Some(_) => {}
                None => return subscription.latest(),
            }
        }
    })
    .await;
    drop(subscription);

    waited.unwrap_or_else(|_| {
        warn!("First cycle did not finish within {}ms", limit.as_millis());
        engine.snapshot()
    })
}

/// Stop the engine's scheduler and any outstanding requests
///
/// This should be called on application exit
pub async fn shutdown(engine: &SyncEngine) {
    engine.stop().await;
    let metrics = engine.metrics();
    let stats = engine.cache_stats().await;
    info!(
        "Monitor shut down after {} cycles ({:.0}% successful), {}/{} endpoints cached",
        metrics.total_cycles,
        metrics.success_rate() * 100.0,
        stats.populated_entries,
        stats.total_entries
    );
}

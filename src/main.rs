use anyhow::Context;
use bridgewatch::bridge::sync::{PublicSnapshot, SyncConfig};
use bridgewatch::monitor::{self, MonitorOptions};
use clap::Parser;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base URL of the bridge, e.g. http://localhost:3001
    #[arg(short, long)]
    url: String,

    /// Polling interval while the bridge answers
    #[arg(long, default_value_t = bridgewatch::bridge::sync::config::DEFAULT_FAST_INTERVAL_MS)]
    fast_ms: u64,

    /// Polling interval after the bridge stops answering
    #[arg(long, default_value_t = bridgewatch::bridge::sync::config::DEFAULT_BACKOFF_INTERVAL_MS)]
    backoff_ms: u64,

    /// Timeout for each request
    #[arg(long, default_value_t = bridgewatch::bridge::sync::config::DEFAULT_REQUEST_TIMEOUT_MS)]
    timeout_ms: u64,

    /// Failed cycles in a row before slowing down
    #[arg(long, default_value_t = bridgewatch::bridge::sync::config::DEFAULT_BACKOFF_THRESHOLD)]
    backoff_threshold: u32,

    /// Extra raw-JSON endpoint to monitor, as NAME=PATH (repeatable)
    #[arg(short, long = "endpoint")]
    endpoints: Vec<String>,

    /// Run a single refresh, print the snapshot as JSON, and exit
    #[arg(long)]
    once: bool,
}

fn summarize(snapshot: &PublicSnapshot) {
    if let Some(health) = snapshot.health() {
        let down = health.disconnected_subsystems();
        if down.is_empty() {
            info!("Bridge {:?}, all subsystems connected", health.status);
        } else {
            warn!("Bridge {:?}, disconnected: {}", health.status, down.join(", "));
        }
        if let Some((buffer, percent)) = health.max_utilization() {
            info!("Fullest buffer: {} at {:.1}%", buffer, percent);
        }
    }
    if let Some(status) = snapshot.status() {
        info!(
            "Uptime {:.0}s, {} received / {} published / {} failed, {} dead letters{}",
            status.uptime,
            status.messages.received,
            status.messages.published,
            status.messages.failed,
            status.dead_letter_count,
            if status.circuit_breaker_open { ", circuit breaker OPEN" } else { "" }
        );
    }
    if let Some(error) = &snapshot.error {
        error!("Last refresh failed: {}", error);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bridgewatch=info")),
        )
        .init();

    let args = Args::parse();

    let mut options = MonitorOptions::new(args.url);
    options.config = SyncConfig::default()
        .with_fast_interval(Duration::from_millis(args.fast_ms))
        .with_backoff_interval(Duration::from_millis(args.backoff_ms))
        .with_request_timeout(Duration::from_millis(args.timeout_ms))
        .with_backoff_threshold(args.backoff_threshold);
    for endpoint in &args.endpoints {
        options
            .extra_endpoints
            .push(monitor::parse_endpoint_arg(endpoint)?);
    }

    let engine = monitor::initialize(&options).context("start monitor")?;

    if args.once {
        let outcome = engine.refresh_now().await;
        let snapshot = engine.snapshot();
        monitor::shutdown(&engine).await;
        println!(
            "{}",
            serde_json::to_string_pretty(&*snapshot).context("render snapshot")?
        );
        outcome?;
        return Ok(());
    }

    let loaded = monitor::wait_until_loaded(&engine, options.config.request_timeout * 2).await;
    if loaded.loading {
        warn!("Bridge has not answered yet, waiting for the next cycle");
    }
    let mut subscription = engine.subscribe("*");
    summarize(&subscription.latest());
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
            changed = subscription.changed() => match changed {
                Some(snapshot) => summarize(&snapshot),
                None => break,
            }
        }
    }

    monitor::shutdown(&engine).await;
    Ok(())
}

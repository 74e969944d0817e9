//! pricebook-scanner - headless replay driver
//!
//! Feeds chunk snapshots from stdin through the scan pipeline and delivers
//! detected shop changes to the pricebook service.
//!
//! # Usage
//!
//! ```bash
//! # Replay a capture against a local service
//! ./pricebook-scanner < capture.ndjson
//!
//! # Custom config, faster ticks, no known-chunk bootstrap
//! ./pricebook-scanner --config ./pricebook.toml --tick-ms 10 --no-bootstrap < capture.ndjson
//! ```
//!
//! # Environment Variables
//!
//! - `PRICEBOOK_CONFIG`: Path to a config file (used when `--config` is absent)
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use pricebook_scanner::acquisition::{parse_replay_line, ReplayEvent, SnapshotRegionSource};
use pricebook_scanner::config::defaults::{BOOTSTRAP_WAIT_SECS, DEFAULT_TICK_MS};
use pricebook_scanner::{ScanPipeline, ScannerConfig};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "pricebook-scanner")]
#[command(about = "Replay chunk snapshots from stdin and report shop changes")]
#[command(version)]
struct CliArgs {
    /// Config file (created with defaults if missing)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Milliseconds per host tick
    #[arg(long, default_value_t = DEFAULT_TICK_MS)]
    tick_ms: u64,

    /// Seed the known-chunk cache from the service before scanning
    #[arg(long, overrides_with = "no_bootstrap", default_value_t = true)]
    bootstrap: bool,

    /// Skip the known-chunk bootstrap
    #[arg(long)]
    no_bootstrap: bool,
}

impl CliArgs {
    fn bootstrap_enabled(&self) -> bool {
        self.bootstrap && !self.no_bootstrap
    }
}

// ============================================================================
// Replay Loop
// ============================================================================

/// Read stdin until EOF or cancellation, ticking the pipeline meanwhile.
async fn run_replay(
    pipeline: Arc<ScanPipeline>,
    tick: Duration,
    cancel_token: CancellationToken,
) -> Result<()> {
    let source = SnapshotRegionSource::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut line_no = 0u64;

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                info!(lines = line_no, "Replay interrupted");
                return Ok(());
            }
            _ = interval.tick() => {
                pipeline.tick();
            }
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    info!(lines = line_no, "Replay input exhausted");
                    return Ok(());
                };
                line_no += 1;

                match parse_replay_line(&line) {
                    Ok(Some(ReplayEvent::Snapshot { region, markers })) => {
                        source.load(region.clone(), markers);
                        if let Err(e) = pipeline.scan_region(&source, &region) {
                            warn!(line = line_no, error = %e, "Chunk scan failed");
                        }
                    }
                    Ok(Some(ReplayEvent::Unload { unload })) => {
                        source.unload(&unload);
                        pipeline.forget_region(&unload);
                    }
                    Ok(None) => {}
                    Err(e) => warn!(line = line_no, error = %e, "Skipping malformed replay line"),
                }
            }
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    let config = match &args.config {
        Some(path) => ScannerConfig::load_or_create(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ScannerConfig::load(),
    };
    if !config.scanner.enabled {
        warn!("Shop scanning is disabled in the config, input will be ignored");
    }

    let pipeline = Arc::new(
        ScanPipeline::from_config(config, tokio::runtime::Handle::current())
            .context("Failed to set up pricebook client")?,
    );

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    if args.bootstrap_enabled() {
        // Replay starts once the inventory is in, or after the wait runs out
        // with the walk still going in the background.
        let walk = tokio::time::timeout(Duration::from_secs(BOOTSTRAP_WAIT_SECS), pipeline.connect());
        tokio::select! {
            _ = cancel_token.cancelled() => {}
            waited = walk => match waited {
                Ok(Ok(report)) => info!(
                    pages = report.pages,
                    seeded = report.regions_seeded,
                    failed = report.failed,
                    "Known-chunk bootstrap finished"
                ),
                Ok(Err(e)) => warn!(error = %e, "Known-chunk bootstrap task ended abnormally"),
                Err(_) => warn!(
                    wait_secs = BOOTSTRAP_WAIT_SECS,
                    "Known-chunk bootstrap still running, starting replay anyway"
                ),
            },
        }
    } else {
        info!("Known-chunk bootstrap disabled");
    }

    let tick = Duration::from_millis(args.tick_ms.max(1));
    let result = run_replay(Arc::clone(&pipeline), tick, cancel_token).await;

    pipeline.disconnect().await;
    let stats = pipeline.stats();
    info!(
        observed = stats.observed,
        emitted = stats.emitted,
        suppressed_empty = stats.suppressed_empty,
        evicted = stats.evicted,
        delivered = stats.delivery.delivered,
        retried = stats.delivery.retried,
        dropped = stats.delivery.dropped,
        "Shutdown complete"
    );
    result
}

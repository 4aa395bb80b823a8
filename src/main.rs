//! Occupancy counter - door-line crossing counts from a tracked detection feed
//!
//! Reads one JSON frame of tracked detections per line, infers the door line
//! from the first frames, then counts entries and exits and periodically
//! appends occupancy snapshots to the venue record store.
//!
//! Module structure:
//! - `domain/` - Core types (TrackId, DoorLine, CountState, OccupancyLogEntry)
//! - `io/` - External interfaces (detection feed, venue store, crossing journal)
//! - `services/` - Counting logic (Calibrator, CrossingEngine, OccupancyLogger, Counter)
//! - `infra/` - Infrastructure (Config, Metrics)

use clap::Parser;
use occupancy_counter::infra::{Config, Metrics};
use occupancy_counter::io::{open_source, run_feed_reader};
use occupancy_counter::services::Counter;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Occupancy counter - counts people crossing a self-calibrated door line
#[derive(Parser, Debug)]
#[command(name = "occupancy-counter", version, about)]
struct Args {
    /// Path to TOML configuration file [default: $CONFIG_FILE, then config/dev.toml]
    #[arg(short, long)]
    config: Option<String>,

    /// Detection feed (JSON Lines); `-` reads stdin
    #[arg(short, long, default_value = "detections.jsonl")]
    source: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured logging with configurable level via RUST_LOG env var
    // Default: INFO, use RUST_LOG=debug for per-track side changes
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!(git_hash = %env!("GIT_HASH"), "occupancy-counter starting");

    let args = Args::parse();
    let config = Config::load(args.config.as_deref());

    info!(
        config_file = %config.config_file(),
        venue = %config.venue_name(),
        store_path = %config.store_path(),
        calibration_frames = %config.calibration_frame_threshold(),
        log_interval_secs = %config.log_interval_secs(),
        initial_occupancy = %config.initial_occupancy(),
        stale_after_frames = %config.stale_after_frames(),
        crossings_file = ?config.crossings_file(),
        source = %args.source,
        "config_loaded"
    );

    let reader = match open_source(&args.source).await {
        Ok(reader) => reader,
        Err(e) => {
            error!(source = %args.source, error = %e, "detection_source_open_failed");
            return Err(e.into());
        }
    };

    // Capacity is resolved once; the store is not re-read for it later
    let max_capacity = Counter::startup_capacity(&config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let metrics = Arc::new(Metrics::new());

    // Bounded for backpressure: the reader waits when the counter falls behind
    let (frame_tx, frame_rx) = mpsc::channel(256);

    let feed_metrics = metrics.clone();
    let feed_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        run_feed_reader(reader, frame_tx, feed_metrics, feed_shutdown).await;
    });

    // Start metrics reporter (lock-free reads with full summary)
    let metrics_clone = metrics.clone();
    let metrics_interval = config.metrics_interval_secs().max(1);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(metrics_interval));
        // First tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            metrics_clone.report().log();
        }
    });

    // Handle shutdown on Ctrl+C
    let shutdown_signal = shutdown_tx;
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_signal.send(true);
    });

    let mut counter = Counter::new(&config, max_capacity, metrics.clone(), Instant::now());
    info!("counter_started");

    // Run counter - consumes frames until the feed ends or Ctrl+C
    let counts = counter.run(frame_rx, shutdown_rx).await;

    metrics.report().log();
    info!(
        frames = %counter.frame_index(),
        door_line = ?counter.door_line().map(|l| l.to_string()),
        count_in = %counts.count_in,
        count_out = %counts.count_out,
        current_count = %counts.current_count,
        "occupancy-counter shutdown complete"
    );
    Ok(())
}

//! Metrics Flusher
//!
//! Aggregates per-minute accumulator records from Redis and forwards them
//! to the monitoring backend.
//!
//! Usage:
//!   metrics-flusher [--config <path>] [--once]
//!
//! With `--once` a single flush of the previous minute runs and the process
//! exits (for cron). Otherwise the flush runs every minute until Ctrl-C.

use std::path::PathBuf;
use std::process::ExitCode;

use minute_metrics::clock::SystemClock;
use minute_metrics::config::ShimConfig;
use minute_metrics::observability::init_tracing;
use minute_metrics::{FlushScheduler, Flusher, HttpBackend, RedisStore};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

struct Args {
    config: Option<PathBuf>,
    once: bool,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        config: None,
        once: false,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let path = iter.next().ok_or("--config requires a path")?;
                args.config = Some(PathBuf::from(path));
            }
            "--once" => args.once = true,
            other => return Err(format!("unknown argument: {}", other)),
        }
    }
    Ok(args)
}

async fn run(args: Args) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
    let config = ShimConfig::load(args.config.as_deref())?;
    init_tracing(&config.log)?;

    let store = RedisStore::connect(&config.store.redis_url).await?;
    let backend = HttpBackend::new(&config.backend)?;
    info!(
        prefix = %config.accumulator.key_prefix,
        backend = %backend.url(),
        "Metrics flusher configured"
    );
    let flusher = Flusher::new(store, backend, &config);

    if args.once {
        return Ok(flusher.flush().await?);
    }

    let scheduler = FlushScheduler::new(flusher, SystemClock::new(), config.scheduler.offset_secs);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(scheduler.run(shutdown_rx));

    signal::ctrl_c().await?;
    info!("Shutdown signal received");
    let _ = shutdown_tx.send(true);
    task.await?;
    Ok(true)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(2);
        }
    };

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{}", e);
            eprintln!("metrics-flusher: {}", e);
            ExitCode::FAILURE
        }
    }
}

//! Once-per-minute flush driver
//!
//! Fires a flush shortly after every minute boundary. One scheduler owns
//! the only flusher of a keyspace; ticks missed while a flush is running
//! are skipped rather than replayed.

use crate::accumulator::{minute_bucket, previous_bucket, Flusher, BUCKET_SECS};
use crate::backend::MetricBackend;
use crate::clock::Clock;
use crate::store::KvStore;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use tokio::sync::watch;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

/// Seconds from `now` until the next flush instant
pub fn secs_until_next_flush(now: u64, offset_secs: u64) -> u64 {
    let fire_this_minute = minute_bucket(now) + offset_secs;
    if now < fire_this_minute {
        fire_this_minute - now
    } else {
        fire_this_minute + BUCKET_SECS - now
    }
}

pub struct FlushScheduler<S: KvStore, B: MetricBackend, C: Clock> {
    flusher: Flusher<S, B, C>,
    clock: C,
    offset_secs: u64,
    /// Buckets whose flush failed and whose records have not expired yet
    failed: Mutex<BTreeSet<u64>>,
}

impl<S: KvStore, B: MetricBackend, C: Clock> FlushScheduler<S, B, C> {
    pub fn new(flusher: Flusher<S, B, C>, clock: C, offset_secs: u64) -> Self {
        FlushScheduler {
            flusher,
            clock,
            offset_secs: offset_secs % BUCKET_SECS,
            failed: Mutex::new(BTreeSet::new()),
        }
    }

    /// Failed buckets whose records were still present at the last tick
    pub fn failed_buckets(&self) -> Vec<u64> {
        self.failed.lock().iter().copied().collect()
    }

    /// Run one flush for the current time and log its outcome
    pub async fn tick(&self) -> bool {
        let now = self.clock.now_secs();
        let bucket = previous_bucket(now);
        let accepted = match self.flusher.flush_at(now).await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("Flush failed: {}", e);
                false
            }
        };
        if !accepted {
            self.failed.lock().insert(bucket);
        }

        self.prune_failed().await;
        let failed = self.failed_buckets();
        if !failed.is_empty() {
            warn!(buckets = ?failed, "{} failed accumulator bucket(s) still pending", failed.len());
        }

        if let Err(e) = self.flusher.stale_buckets(now).await {
            warn!("Stale bucket scan failed: {}", e);
        }
        accepted
    }

    /// Forget failed buckets the TTL has already retired
    async fn prune_failed(&self) {
        let candidates = self.failed_buckets();
        for bucket in candidates {
            match self.flusher.bucket_pending(bucket).await {
                Ok(true) => {}
                Ok(false) => {
                    self.failed.lock().remove(&bucket);
                }
                Err(e) => warn!(bucket, "Pending bucket check failed: {}", e),
            }
        }
    }

    /// Flush once per minute until `shutdown` flips to true
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!("Flush scheduler started, offset {}s", self.offset_secs);

        loop {
            let wait = secs_until_next_flush(self.clock.now_secs(), self.offset_secs);
            tokio::select! {
                _ = sleep(Duration::from_secs(wait)) => {
                    self.tick().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Flush scheduler stopped");
    }
}

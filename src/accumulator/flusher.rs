//! Flusher: aggregates the previous minute and forwards it to the backend

use super::key_encoder::{previous_bucket, AccumulatorKeyEncoder, BUCKET_SECS};
use super::record::{AccumulatorRecord, AggregateError};
use super::types::AggregatedPoint;
use crate::backend::{BackendError, MetricBackend, TimeSeriesPoint};
use crate::clock::{Clock, SystemClock};
use crate::config::ShimConfig;
use crate::store::{KvStore, StoreError};
use futures::future::try_join_all;
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, error, info, warn};

/// Error that aborts a flush before or outside the backend submission
#[derive(Debug)]
pub enum FlushError {
    Store(StoreError),
    /// A record that does not decode, or an AVG record without values
    CorruptRecord { key: String, reason: String },
    /// Integer sum of a bucket left the i64 range
    Overflow { metric: String },
    /// Backend failure other than a batch rejection
    Backend(BackendError),
}

impl fmt::Display for FlushError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlushError::Store(e) => write!(f, "{}", e),
            FlushError::CorruptRecord { key, reason } => {
                write!(f, "corrupt accumulator record {}: {}", key, reason)
            }
            FlushError::Overflow { metric } => write!(f, "integer overflow aggregating {}", metric),
            FlushError::Backend(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for FlushError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FlushError::Store(e) => Some(e),
            FlushError::Backend(e) => Some(e),
            FlushError::CorruptRecord { .. } | FlushError::Overflow { .. } => None,
        }
    }
}

impl From<StoreError> for FlushError {
    fn from(e: StoreError) -> Self {
        FlushError::Store(e)
    }
}

/// Aggregates closed minute buckets and submits them in one batch
///
/// Records are never deleted here; the store TTL retires them. Running two
/// flushers over the same bucket submits it twice, so exactly one flusher
/// must be scheduled per keyspace.
#[derive(Debug, Clone)]
pub struct Flusher<S: KvStore, B: MetricBackend, C: Clock = SystemClock> {
    store: S,
    backend: B,
    encoder: AccumulatorKeyEncoder,
    namespace: String,
    clock: C,
}

impl<S: KvStore, B: MetricBackend> Flusher<S, B, SystemClock> {
    pub fn new(store: S, backend: B, config: &ShimConfig) -> Self {
        Self::with_clock(store, backend, config, SystemClock::new())
    }
}

impl<S: KvStore, B: MetricBackend, C: Clock> Flusher<S, B, C> {
    pub fn with_clock(store: S, backend: B, config: &ShimConfig, clock: C) -> Self {
        Flusher {
            store,
            backend,
            encoder: AccumulatorKeyEncoder::new(config.accumulator.key_prefix.clone()),
            namespace: config.backend.metric_namespace.clone(),
            clock,
        }
    }

    /// Flush the minute before the current one
    pub async fn flush(&self) -> Result<bool, FlushError> {
        self.flush_at(self.clock.now_secs()).await
    }

    /// Flush the minute before the one containing `now`
    ///
    /// Returns `Ok(true)` when the backend accepted the batch and
    /// `Ok(false)` when it rejected the batch as invalid. Rejections are
    /// logged and not retried.
    pub async fn flush_at(&self, now: u64) -> Result<bool, FlushError> {
        let bucket = previous_bucket(now);
        let points = self.aggregate_bucket(bucket).await?;
        let batch: Vec<TimeSeriesPoint> = points
            .iter()
            .map(|p| TimeSeriesPoint::from_aggregated(p, &self.namespace))
            .collect();

        match self.backend.submit_batch(&batch).await {
            Ok(()) => {
                info!(bucket, points = batch.len(), "Flushed accumulator bucket");
                Ok(true)
            }
            Err(BackendError::InvalidBatch(reason)) => {
                error!(bucket, points = batch.len(), %reason, "Backend rejected metrics batch");
                Ok(false)
            }
            Err(e) => Err(FlushError::Backend(e)),
        }
    }

    /// Decode and aggregate every record of `bucket`
    ///
    /// Points are ordered by key; AVG companions follow their mean.
    pub async fn aggregate_bucket(&self, bucket: u64) -> Result<Vec<AggregatedPoint>, FlushError> {
        let mut keys = self.store.keys(&self.encoder.bucket_pattern(bucket)).await?;
        keys.sort();

        let values = try_join_all(keys.iter().map(|key| self.store.get(key))).await?;

        let mut points = Vec::with_capacity(keys.len());
        for (key, raw) in keys.iter().zip(values) {
            // Expired between KEYS and GET
            let Some(raw) = raw else {
                debug!(key = %key, "Record vanished before read");
                continue;
            };

            let record = AccumulatorRecord::decode(&raw).map_err(|e| FlushError::CorruptRecord {
                key: key.clone(),
                reason: e.to_string(),
            })?;

            let aggregated = record.aggregate(bucket).map_err(|e| match e {
                AggregateError::Overflow => FlushError::Overflow {
                    metric: record.metric.clone(),
                },
                AggregateError::EmptyValues => FlushError::CorruptRecord {
                    key: key.clone(),
                    reason: e.to_string(),
                },
            })?;

            debug!(key = %key, samples = record.values.len(), op = %record.op, "Aggregated record");
            points.extend(aggregated);
        }
        Ok(points)
    }

    /// Whether any record of `bucket` is still in the store
    pub async fn bucket_pending(&self, bucket: u64) -> Result<bool, FlushError> {
        let keys = self.store.keys(&self.encoder.bucket_pattern(bucket)).await?;
        Ok(!keys.is_empty())
    }

    /// Buckets that still hold records although two flush cycles have passed
    ///
    /// A successfully flushed bucket keeps its records for one more cycle
    /// until the TTL retires them, so only buckets older than the one the
    /// previous flush targeted are reported. Such buckets were never
    /// flushed or outlived their TTL.
    pub async fn stale_buckets(&self, now: u64) -> Result<Vec<u64>, FlushError> {
        let threshold = previous_bucket(now).saturating_sub(BUCKET_SECS);
        let keys = self.store.keys(&self.encoder.prefix_pattern()).await?;

        let stale: BTreeSet<u64> = keys
            .iter()
            .filter_map(|key| self.encoder.decode(key))
            .map(|(bucket, _)| bucket)
            .filter(|bucket| *bucket < threshold)
            .collect();

        if !stale.is_empty() {
            warn!(buckets = ?stale, "Found unflushed accumulator buckets");
        }
        Ok(stale.into_iter().collect())
    }
}

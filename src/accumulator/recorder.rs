//! Recorder: writes observations into per-minute accumulator records

use super::key_encoder::AccumulatorKeyEncoder;
use super::record::{encode_header, encode_value, SEPARATOR};
use super::types::{AggregationOp, MetricValue};
use crate::clock::{Clock, SystemClock};
use crate::config::AccumulatorConfig;
use crate::store::{KvStore, StoreError};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// Error returned by [`Recorder::record`]
#[derive(Debug)]
pub enum RecordError {
    /// Empty, or contains the record separator
    InvalidMetricName(String),
    Store(StoreError),
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordError::InvalidMetricName(name) => write!(f, "invalid metric name: {:?}", name),
            RecordError::Store(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for RecordError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RecordError::Store(e) => Some(e),
            RecordError::InvalidMetricName(_) => None,
        }
    }
}

impl From<StoreError> for RecordError {
    fn from(e: StoreError) -> Self {
        RecordError::Store(e)
    }
}

/// Records metric observations into the shared store
///
/// Each call is two store operations: a conditional create of the bucket
/// header (with TTL) followed by an unconditional append of the value.
/// The pair is not atomic; a concurrent recorder may win the create, in
/// which case its header (op and kind) is the one that sticks. If the key
/// expires between the two operations, the append recreates it without a
/// header; the TTL is then restored so the orphan still expires, and the
/// flush reports the record as corrupt.
#[derive(Debug, Clone)]
pub struct Recorder<S: KvStore, C: Clock = SystemClock> {
    store: S,
    encoder: AccumulatorKeyEncoder,
    ttl: Duration,
    clock: C,
}

impl<S: KvStore> Recorder<S, SystemClock> {
    pub fn new(store: S, config: &AccumulatorConfig) -> Self {
        Self::with_clock(store, config, SystemClock::new())
    }
}

impl<S: KvStore, C: Clock> Recorder<S, C> {
    pub fn with_clock(store: S, config: &AccumulatorConfig, clock: C) -> Self {
        Recorder {
            store,
            encoder: AccumulatorKeyEncoder::new(config.key_prefix.clone()),
            ttl: config.ttl(),
            clock,
        }
    }

    /// Record an observation in the current minute
    pub async fn record(
        &self,
        metric: &str,
        value: impl Into<MetricValue>,
        op: AggregationOp,
    ) -> Result<(), RecordError> {
        self.record_at(metric, value, op, self.clock.now_secs()).await
    }

    /// Record an observation in the minute containing `timestamp`
    pub async fn record_at(
        &self,
        metric: &str,
        value: impl Into<MetricValue>,
        op: AggregationOp,
        timestamp: u64,
    ) -> Result<(), RecordError> {
        if metric.is_empty() || metric.contains(SEPARATOR) {
            return Err(RecordError::InvalidMetricName(metric.to_string()));
        }

        let value = value.into();
        let key = self.encoder.encode(timestamp, metric);
        let header = encode_header(metric, op, value.kind());

        let created = self.store.set_if_absent(&key, &header, self.ttl).await?;
        let segment = encode_value(value);
        let len = self.store.append(&key, &segment).await?;
        if len == segment.len() {
            warn!(key = %key, "Accumulator key vanished before append, restoring TTL");
            self.store.expire(&key, self.ttl).await?;
        }

        debug!(key = %key, created, value = %value, "Recorded observation");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SimulatedClock;
    use crate::store::{InMemoryStore, StoreFuture};

    type TestStore = InMemoryStore<SimulatedClock>;

    fn recorder(clock: &SimulatedClock) -> (TestStore, Recorder<TestStore, SimulatedClock>) {
        let store = InMemoryStore::with_clock(clock.clone());
        let config = AccumulatorConfig::default();
        let recorder = Recorder::with_clock(store.clone(), &config, clock.clone());
        (store, recorder)
    }

    #[tokio::test]
    async fn test_first_record_writes_header_and_value() {
        let clock = SimulatedClock::new(1704067215);
        let (store, recorder) = recorder(&clock);

        recorder.record("latency", 100, AggregationOp::Avg).await.unwrap();

        let raw = store.get("accumulator_1704067200_latency").await.unwrap();
        assert_eq!(raw, Some("latency|AVG|INT|100".to_string()));
        assert_eq!(store.ttl_secs("accumulator_1704067200_latency"), Some(120));
    }

    #[tokio::test]
    async fn test_header_is_first_writer_wins() {
        let clock = SimulatedClock::new(1704067200);
        let (store, recorder) = recorder(&clock);

        recorder.record("load", 1.5, AggregationOp::Sum).await.unwrap();
        recorder.record("load", 2.5, AggregationOp::Avg).await.unwrap();

        let raw = store.get("accumulator_1704067200_load").await.unwrap();
        assert_eq!(raw, Some("load|SUM|FLOAT|1.5|2.5".to_string()));
    }

    #[tokio::test]
    async fn test_explicit_timestamp_overrides_clock() {
        let clock = SimulatedClock::new(1704067200);
        let (store, recorder) = recorder(&clock);

        recorder
            .record_at("latency", 7, AggregationOp::Sum, 1704000059)
            .await
            .unwrap();

        assert!(store.get("accumulator_1704000000_latency").await.unwrap().is_some());
        assert!(store.get("accumulator_1704067200_latency").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_minute_boundary_splits_buckets() {
        let clock = SimulatedClock::new(1704067259);
        let (store, recorder) = recorder(&clock);

        recorder.record("hits", 1, AggregationOp::Sum).await.unwrap();
        clock.advance_secs(1);
        recorder.record("hits", 1, AggregationOp::Sum).await.unwrap();

        assert_eq!(store.keys("accumulator_*").await.unwrap().len(), 2);
    }

    /// Store whose conditional create always loses, as when the key expired
    /// right after another recorder's create
    struct LostHeaderStore(TestStore);

    impl KvStore for LostHeaderStore {
        fn set_if_absent<'a>(
            &'a self,
            _key: &'a str,
            _value: &'a str,
            _ttl: Duration,
        ) -> StoreFuture<'a, bool> {
            Box::pin(async { Ok(false) })
        }

        fn append<'a>(&'a self, key: &'a str, value: &'a str) -> StoreFuture<'a, usize> {
            self.0.append(key, value)
        }

        fn expire<'a>(&'a self, key: &'a str, ttl: Duration) -> StoreFuture<'a, bool> {
            self.0.expire(key, ttl)
        }

        fn keys<'a>(&'a self, pattern: &'a str) -> StoreFuture<'a, Vec<String>> {
            self.0.keys(pattern)
        }

        fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
            self.0.get(key)
        }
    }

    #[tokio::test]
    async fn test_headerless_append_still_expires() {
        let clock = SimulatedClock::new(1704067200);
        let store = InMemoryStore::with_clock(clock.clone());
        let recorder = Recorder::with_clock(
            LostHeaderStore(store.clone()),
            &AccumulatorConfig::default(),
            clock.clone(),
        );

        recorder.record("hits", 3, AggregationOp::Sum).await.unwrap();

        let key = "accumulator_1704067200_hits";
        assert_eq!(store.get(key).await.unwrap(), Some("|3".to_string()));
        assert_eq!(store.ttl_secs(key), Some(120));

        clock.advance_secs(120);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_rejects_bad_metric_names() {
        let clock = SimulatedClock::new(0);
        let (store, recorder) = recorder(&clock);

        assert!(matches!(
            recorder.record("", 1, AggregationOp::Sum).await,
            Err(RecordError::InvalidMetricName(_))
        ));
        assert!(matches!(
            recorder.record("a|b", 1, AggregationOp::Sum).await,
            Err(RecordError::InvalidMetricName(_))
        ));
        assert!(store.is_empty());
    }
}

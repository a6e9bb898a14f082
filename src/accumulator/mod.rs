//! Minute-Bucket Metric Accumulation
//!
//! Monitoring backends that accept at most one point per metric per minute
//! need observations pre-aggregated. This module buffers them in a shared
//! store and reduces each minute to a single point:
//!
//! - **Recorder** appends every observation to a per-(metric, minute) record
//! - **Flusher** runs once per minute, aggregates the previous minute
//!   (SUM or AVG) and submits the result to the backend in one batch
//! - **TTL expiry** is the only cleanup; flushed records are left to expire

mod types;
mod key_encoder;
mod record;
mod recorder;
mod flusher;

pub use types::{AggregatedPoint, AggregationOp, MetricValue, PointValue, ValueKind};
pub use key_encoder::{minute_bucket, previous_bucket, AccumulatorKeyEncoder, BUCKET_SECS};
pub use record::{
    encode_header, encode_value, AccumulatorRecord, AggregateError, RecordParseError,
    COUNT_SUFFIX, SEPARATOR,
};
pub use recorder::{RecordError, Recorder};
pub use flusher::{FlushError, Flusher};

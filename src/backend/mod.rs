//! Monitoring Backend Abstraction
//!
//! The flusher hands one batch of time-series points per minute to a
//! [`MetricBackend`]. A backend either accepts the whole batch or rejects
//! it; there is no partial acceptance.
//!
//! Implementations:
//! - `InMemoryBackend`: Records batches, for tests
//! - `HttpBackend`: Cloud-Monitoring-style `timeSeries` endpoint over HTTP

mod http;
mod in_memory;

pub use http::HttpBackend;
pub use in_memory::InMemoryBackend;

use crate::accumulator::{AggregatedPoint, PointValue};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by backend operations
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, BackendError>> + Send + 'a>>;

/// Error type for backend submissions
#[derive(Debug, Clone, PartialEq)]
pub enum BackendError {
    /// The backend refused the batch as malformed ("invalid argument")
    InvalidBatch(String),
    /// The request never completed (connect failure, timeout, ...)
    Transport(String),
    /// Any other non-success response
    Unexpected { status: u16, body: String },
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::InvalidBatch(msg) => write!(f, "invalid batch: {}", msg),
            BackendError::Transport(msg) => write!(f, "transport error: {}", msg),
            BackendError::Unexpected { status, body } => {
                write!(f, "unexpected response {}: {}", status, body)
            }
        }
    }
}

impl std::error::Error for BackendError {}

/// One point as submitted to the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    /// Fully qualified metric type, `custom.<namespace>/<metric>`
    pub metric_type: String,
    /// Unix seconds
    pub timestamp: u64,
    pub value: PointValue,
}

impl TimeSeriesPoint {
    /// Qualify an aggregated point under `namespace`
    pub fn from_aggregated(point: &AggregatedPoint, namespace: &str) -> Self {
        TimeSeriesPoint {
            metric_type: metric_type(namespace, &point.metric),
            timestamp: point.timestamp,
            value: point.value,
        }
    }
}

/// Format a custom metric type string
pub fn metric_type(namespace: &str, metric: &str) -> String {
    format!("custom.{}/{}", namespace, metric)
}

/// Monitoring backend trait
pub trait MetricBackend: Send + Sync + 'static {
    /// Submit a batch of points in one call
    fn submit_batch<'a>(&'a self, points: &'a [TimeSeriesPoint]) -> BackendFuture<'a, ()>;
}

impl<B: MetricBackend + ?Sized> MetricBackend for std::sync::Arc<B> {
    fn submit_batch<'a>(&'a self, points: &'a [TimeSeriesPoint]) -> BackendFuture<'a, ()> {
        (**self).submit_batch(points)
    }
}

//! Recording backend for tests

use super::{BackendError, BackendFuture, MetricBackend, TimeSeriesPoint};
use crate::accumulator::PointValue;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Default)]
struct Inner {
    batches: Vec<Vec<TimeSeriesPoint>>,
    reject_with: Option<String>,
    submissions: usize,
}

/// Backend that keeps every accepted batch in memory
///
/// Like the real service it refuses batches containing non-finite doubles,
/// and it can be told to refuse everything via `reject_all()`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every subsequent batch with `reason`
    pub fn reject_all(&self, reason: impl Into<String>) {
        self.inner.lock().reject_with = Some(reason.into());
    }

    /// Stop rejecting batches
    pub fn accept_all(&self) {
        self.inner.lock().reject_with = None;
    }

    /// Accepted batches, in submission order
    pub fn batches(&self) -> Vec<Vec<TimeSeriesPoint>> {
        self.inner.lock().batches.clone()
    }

    /// All accepted points, flattened
    pub fn points(&self) -> Vec<TimeSeriesPoint> {
        self.inner.lock().batches.iter().flatten().cloned().collect()
    }

    /// Number of submit calls, accepted or not
    pub fn submissions(&self) -> usize {
        self.inner.lock().submissions
    }
}

fn validate(points: &[TimeSeriesPoint]) -> Result<(), BackendError> {
    for point in points {
        if let PointValue::Double(v) = point.value {
            if !v.is_finite() {
                return Err(BackendError::InvalidBatch(format!(
                    "{}: value {} is not finite",
                    point.metric_type, v
                )));
            }
        }
    }
    Ok(())
}

impl MetricBackend for InMemoryBackend {
    fn submit_batch<'a>(&'a self, points: &'a [TimeSeriesPoint]) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            let mut inner = self.inner.lock();
            inner.submissions += 1;
            if let Some(reason) = &inner.reject_with {
                return Err(BackendError::InvalidBatch(reason.clone()));
            }
            validate(points)?;
            inner.batches.push(points.to_vec());
            Ok(())
        })
    }
}

//! Core types for per-minute metric accumulation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the values collected in one minute bucket are reduced to a single point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AggregationOp {
    /// Sum of all observations
    #[default]
    Sum,
    /// Mean of all observations, plus a `<name>_COUNT` companion point
    Avg,
}

impl AggregationOp {
    /// Wire code stored in the record header
    pub fn code(&self) -> &'static str {
        match self {
            AggregationOp::Sum => "SUM",
            AggregationOp::Avg => "AVG",
        }
    }

    /// Parse a header code back to an op
    pub fn from_code(code: &str) -> Option<AggregationOp> {
        match code {
            "SUM" => Some(AggregationOp::Sum),
            "AVG" => Some(AggregationOp::Avg),
            _ => None,
        }
    }
}

impl fmt::Display for AggregationOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for AggregationOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(&s.to_uppercase()).ok_or_else(|| format!("unknown aggregation op: {}", s))
    }
}

/// Numeric kind of a bucket, fixed by the first observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValueKind {
    Int,
    Float,
}

impl ValueKind {
    /// Wire code stored in the record header
    pub fn code(&self) -> &'static str {
        match self {
            ValueKind::Int => "INT",
            ValueKind::Float => "FLOAT",
        }
    }

    /// Parse a header code back to a kind
    pub fn from_code(code: &str) -> Option<ValueKind> {
        match code {
            "INT" => Some(ValueKind::Int),
            "FLOAT" => Some(ValueKind::Float),
            _ => None,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A single observation as handed to the recorder
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MetricValue {
    Int(i64),
    Float(f64),
}

impl MetricValue {
    /// The bucket kind this value creates when it is the first write
    pub fn kind(&self) -> ValueKind {
        match self {
            MetricValue::Int(_) => ValueKind::Int,
            MetricValue::Float(_) => ValueKind::Float,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Debug for f64 round-trips and always keeps a '.' or exponent,
        // so an integral float never reads back as an INT segment.
        match self {
            MetricValue::Int(v) => write!(f, "{}", v),
            MetricValue::Float(v) => write!(f, "{:?}", v),
        }
    }
}

impl From<i64> for MetricValue {
    fn from(v: i64) -> Self {
        MetricValue::Int(v)
    }
}

impl From<i32> for MetricValue {
    fn from(v: i32) -> Self {
        MetricValue::Int(v as i64)
    }
}

impl From<u32> for MetricValue {
    fn from(v: u32) -> Self {
        MetricValue::Int(v as i64)
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::Float(v)
    }
}

impl From<f32> for MetricValue {
    fn from(v: f32) -> Self {
        MetricValue::Float(v as f64)
    }
}

/// Numeric payload of an aggregated point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PointValue {
    Int64(i64),
    Double(f64),
}

impl PointValue {
    /// Get as f64, converting if necessary
    pub fn as_f64(&self) -> f64 {
        match self {
            PointValue::Int64(v) => *v as f64,
            PointValue::Double(v) => *v,
        }
    }
}

impl fmt::Display for PointValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointValue::Int64(v) => write!(f, "{}", v),
            PointValue::Double(v) => write!(f, "{}", v),
        }
    }
}

/// One aggregation result for one metric and one minute bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedPoint {
    /// Metric name as recorded (or `<name>_COUNT` for AVG companions)
    pub metric: String,
    /// Minute boundary the point belongs to (Unix seconds)
    pub timestamp: u64,
    pub value: PointValue,
}

impl AggregatedPoint {
    pub fn new(metric: impl Into<String>, timestamp: u64, value: PointValue) -> Self {
        AggregatedPoint {
            metric: metric.into(),
            timestamp,
            value,
        }
    }
}

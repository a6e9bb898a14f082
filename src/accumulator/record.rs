//! Accumulator record wire format
//!
//! The string value stored under an accumulator key:
//!
//! ```text
//! <metric_name>|<SUM|AVG>|<INT|FLOAT>|<v1>|<v2>|...|<vn>
//! ```
//!
//! The header is written once by a conditional create; every observation
//! is appended as `|<value>` afterwards.

use super::types::{AggregatedPoint, AggregationOp, MetricValue, PointValue, ValueKind};
use std::fmt;

/// Field separator inside a record value
pub const SEPARATOR: char = '|';

/// Suffix of the companion point emitted for AVG buckets
pub const COUNT_SUFFIX: &str = "_COUNT";

/// Error decoding a record value
#[derive(Debug, Clone, PartialEq)]
pub enum RecordParseError {
    /// Fewer than three header fields
    MissingHeader,
    UnknownOp(String),
    UnknownKind(String),
    /// A value segment does not parse as the header's kind
    InvalidValue { kind: ValueKind, segment: String },
}

impl fmt::Display for RecordParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordParseError::MissingHeader => write!(f, "record header is incomplete"),
            RecordParseError::UnknownOp(op) => write!(f, "unknown aggregation op: {}", op),
            RecordParseError::UnknownKind(kind) => write!(f, "unknown value kind: {}", kind),
            RecordParseError::InvalidValue { kind, segment } => {
                write!(f, "value {:?} is not a valid {}", segment, kind)
            }
        }
    }
}

impl std::error::Error for RecordParseError {}

/// Error reducing a decoded record to points
#[derive(Debug, Clone, PartialEq)]
pub enum AggregateError {
    /// AVG over a record that never received an append
    EmptyValues,
    /// Integer sum left the i64 range
    Overflow,
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateError::EmptyValues => write!(f, "cannot average an empty value list"),
            AggregateError::Overflow => write!(f, "integer sum overflowed"),
        }
    }
}

impl std::error::Error for AggregateError {}

/// Header written by the first observation of a bucket
pub fn encode_header(metric: &str, op: AggregationOp, kind: ValueKind) -> String {
    format!("{}{sep}{}{sep}{}", metric, op.code(), kind.code(), sep = SEPARATOR)
}

/// Segment appended for one observation
pub fn encode_value(value: MetricValue) -> String {
    format!("{}{}", SEPARATOR, value)
}

/// A decoded accumulator record
#[derive(Debug, Clone, PartialEq)]
pub struct AccumulatorRecord {
    pub metric: String,
    pub op: AggregationOp,
    pub kind: ValueKind,
    /// Observations in append order, all of `kind`
    pub values: Vec<MetricValue>,
}

impl AccumulatorRecord {
    /// Encode back to the stored string form
    pub fn encode(&self) -> String {
        let mut out = encode_header(&self.metric, self.op, self.kind);
        for value in &self.values {
            out.push_str(&encode_value(*value));
        }
        out
    }

    /// Decode a stored record value
    pub fn decode(raw: &str) -> Result<AccumulatorRecord, RecordParseError> {
        let mut segments = raw.split(SEPARATOR);

        let metric = segments.next().ok_or(RecordParseError::MissingHeader)?;
        let op = segments.next().ok_or(RecordParseError::MissingHeader)?;
        let kind = segments.next().ok_or(RecordParseError::MissingHeader)?;

        let op = AggregationOp::from_code(op)
            .ok_or_else(|| RecordParseError::UnknownOp(op.to_string()))?;
        let kind = ValueKind::from_code(kind)
            .ok_or_else(|| RecordParseError::UnknownKind(kind.to_string()))?;

        let values = segments
            .map(|segment| parse_value(kind, segment))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(AccumulatorRecord {
            metric: metric.to_string(),
            op,
            kind,
            values,
        })
    }

    /// Reduce the record to its aggregated point(s) at `timestamp`
    ///
    /// SUM yields one point. AVG yields the mean (floored for INT buckets)
    /// followed by `<metric>_COUNT` carrying the number of samples.
    pub fn aggregate(&self, timestamp: u64) -> Result<Vec<AggregatedPoint>, AggregateError> {
        let count = self.values.len();
        if self.op == AggregationOp::Avg && count == 0 {
            return Err(AggregateError::EmptyValues);
        }

        let result = match self.kind {
            ValueKind::Int => {
                let sum = self
                    .values
                    .iter()
                    .try_fold(0i64, |acc, v| match v {
                        MetricValue::Int(i) => acc.checked_add(*i),
                        MetricValue::Float(f) => acc.checked_add(*f as i64),
                    })
                    .ok_or(AggregateError::Overflow)?;
                match self.op {
                    AggregationOp::Sum => PointValue::Int64(sum),
                    AggregationOp::Avg => PointValue::Int64(sum.div_euclid(count as i64)),
                }
            }
            ValueKind::Float => {
                let sum: f64 = self
                    .values
                    .iter()
                    .map(|v| match v {
                        MetricValue::Int(i) => *i as f64,
                        MetricValue::Float(f) => *f,
                    })
                    .sum();
                match self.op {
                    AggregationOp::Sum => PointValue::Double(sum),
                    AggregationOp::Avg => PointValue::Double(sum / count as f64),
                }
            }
        };

        let mut points = vec![AggregatedPoint::new(self.metric.clone(), timestamp, result)];
        if self.op == AggregationOp::Avg {
            points.push(AggregatedPoint::new(
                format!("{}{}", self.metric, COUNT_SUFFIX),
                timestamp,
                PointValue::Int64(count as i64),
            ));
        }
        Ok(points)
    }
}

fn parse_value(kind: ValueKind, segment: &str) -> Result<MetricValue, RecordParseError> {
    let parsed = match kind {
        ValueKind::Int => segment.parse::<i64>().ok().map(MetricValue::Int),
        ValueKind::Float => segment.parse::<f64>().ok().map(MetricValue::Float),
    };
    parsed.ok_or_else(|| RecordParseError::InvalidValue {
        kind,
        segment: segment.to_string(),
    })
}

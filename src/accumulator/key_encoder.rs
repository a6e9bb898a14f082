//! Key encoding for accumulator records
//!
//! Key format: `<prefix>_<minute_bucket>_<metric_name>`
//!
//! Examples:
//! - `accumulator_1704067200_latency`
//! - `accumulator_1704067260_http.requests`

/// Width of one accumulation bucket in seconds
pub const BUCKET_SECS: u64 = 60;

/// Floor a Unix timestamp to the start of its minute
pub fn minute_bucket(timestamp: u64) -> u64 {
    timestamp - (timestamp % BUCKET_SECS)
}

/// The last fully closed minute as seen at `now`
pub fn previous_bucket(now: u64) -> u64 {
    minute_bucket(now).saturating_sub(BUCKET_SECS)
}

/// Encodes and decodes accumulator keys under one namespace prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccumulatorKeyEncoder {
    prefix: String,
}

impl AccumulatorKeyEncoder {
    pub fn new(prefix: impl Into<String>) -> Self {
        AccumulatorKeyEncoder {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Encode the key for `metric` in the bucket containing `timestamp`
    pub fn encode(&self, timestamp: u64, metric: &str) -> String {
        format!("{}_{}_{}", self.prefix, minute_bucket(timestamp), metric)
    }

    /// Pattern matching every record of one bucket
    ///
    /// Returns: `<prefix>_<bucket>_*`
    pub fn bucket_pattern(&self, bucket: u64) -> String {
        format!("{}_{}_*", escape_glob(&self.prefix), minute_bucket(bucket))
    }

    /// Pattern matching every record under the prefix, whatever the bucket
    ///
    /// Returns: `<prefix>_*`
    pub fn prefix_pattern(&self) -> String {
        format!("{}_*", escape_glob(&self.prefix))
    }

    /// Decode a key back to components
    ///
    /// Returns: (bucket, metric_name)
    pub fn decode(&self, key: &str) -> Option<(u64, String)> {
        let rest = key.strip_prefix(self.prefix.as_str())?.strip_prefix('_')?;
        let (bucket, metric) = rest.split_once('_')?;
        if bucket.is_empty() || !bucket.bytes().all(|b| b.is_ascii_digit()) || metric.is_empty() {
            return None;
        }
        Some((bucket.parse().ok()?, metric.to_string()))
    }
}

/// Escape the glob metacharacters understood by `KEYS`
fn escape_glob(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    for c in literal.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

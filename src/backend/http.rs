//! HTTP backend speaking the Cloud Monitoring `timeSeries.create` JSON API

use super::{BackendError, BackendFuture, MetricBackend, TimeSeriesPoint};
use crate::accumulator::PointValue;
use crate::config::BackendConfig;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Request body of `POST /v3/projects/{project}/timeSeries`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateTimeSeriesRequest<'a> {
    time_series: Vec<TimeSeries<'a>>,
}

#[derive(Debug, Serialize)]
struct TimeSeries<'a> {
    metric: MetricDescriptorRef<'a>,
    resource: MonitoredResource,
    points: [Point; 1],
}

#[derive(Debug, Serialize)]
struct MetricDescriptorRef<'a> {
    #[serde(rename = "type")]
    metric_type: &'a str,
}

#[derive(Debug, Serialize)]
struct MonitoredResource {
    #[serde(rename = "type")]
    resource_type: &'static str,
}

#[derive(Debug, Serialize)]
struct Point {
    interval: Interval,
    value: TypedValue,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Interval {
    end_time: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum TypedValue {
    // int64 travels as a JSON string in the proto3 mapping
    Int64Value(String),
    DoubleValue(f64),
}

fn rfc3339(timestamp: u64) -> String {
    DateTime::<Utc>::from_timestamp(timestamp as i64, 0)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}

fn build_request(points: &[TimeSeriesPoint]) -> CreateTimeSeriesRequest<'_> {
    let time_series = points
        .iter()
        .map(|p| TimeSeries {
            metric: MetricDescriptorRef {
                metric_type: &p.metric_type,
            },
            resource: MonitoredResource {
                resource_type: "global",
            },
            points: [Point {
                interval: Interval {
                    end_time: rfc3339(p.timestamp),
                },
                value: match p.value {
                    PointValue::Int64(v) => TypedValue::Int64Value(v.to_string()),
                    PointValue::Double(v) => TypedValue::DoubleValue(v),
                },
            }],
        })
        .collect();
    CreateTimeSeriesRequest { time_series }
}

/// Map a non-success HTTP status to a backend error
fn classify(status: u16, body: String) -> BackendError {
    match status {
        400 => BackendError::InvalidBatch(body),
        _ => BackendError::Unexpected { status, body },
    }
}

/// Backend posting batches to a monitoring HTTP endpoint
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    url: String,
    bearer_token: Option<String>,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        let url = format!(
            "{}/v3/projects/{}/timeSeries",
            config.endpoint.trim_end_matches('/'),
            config.project_id
        );
        Ok(HttpBackend {
            client,
            url,
            bearer_token: config.bearer_token.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl MetricBackend for HttpBackend {
    fn submit_batch<'a>(&'a self, points: &'a [TimeSeriesPoint]) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            // The service refuses a request without series; nothing to send.
            if points.is_empty() {
                debug!("Empty batch, skipping request");
                return Ok(());
            }

            let mut request = self.client.post(&self.url).json(&build_request(points));
            if let Some(token) = &self.bearer_token {
                request = request.bearer_auth(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| BackendError::Transport(e.to_string()))?;
            let status = response.status();
            if status.is_success() {
                return Ok(());
            }
            let body = response.text().await.unwrap_or_default();
            Err(classify(status.as_u16(), body))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc3339() {
        assert_eq!(rfc3339(0), "1970-01-01T00:00:00Z");
        assert_eq!(rfc3339(1704067200), "2024-01-01T00:00:00Z");
    }

    #[test]
    fn test_request_body_shape() {
        let points = vec![
            TimeSeriesPoint {
                metric_type: "custom.googleapis.com/latency".to_string(),
                timestamp: 1704067200,
                value: PointValue::Int64(200),
            },
            TimeSeriesPoint {
                metric_type: "custom.googleapis.com/load".to_string(),
                timestamp: 1704067200,
                value: PointValue::Double(2.5),
            },
        ];

        let body = serde_json::to_value(build_request(&points)).unwrap();
        let series = body["timeSeries"].as_array().unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0]["metric"]["type"], "custom.googleapis.com/latency");
        assert_eq!(series[0]["resource"]["type"], "global");
        assert_eq!(
            series[0]["points"][0]["interval"]["endTime"],
            "2024-01-01T00:00:00Z"
        );
        assert_eq!(series[0]["points"][0]["value"]["int64Value"], "200");
        assert_eq!(series[1]["points"][0]["value"]["doubleValue"], 2.5);
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            classify(400, "bad point".to_string()),
            BackendError::InvalidBatch("bad point".to_string())
        );
        assert_eq!(
            classify(503, String::new()),
            BackendError::Unexpected {
                status: 503,
                body: String::new()
            }
        );
    }

    #[test]
    fn test_url() {
        let config = BackendConfig {
            endpoint: "https://monitoring.example.com/".to_string(),
            project_id: "proj".to_string(),
            ..BackendConfig::default()
        };
        let backend = HttpBackend::new(&config).unwrap();
        assert_eq!(
            backend.url(),
            "https://monitoring.example.com/v3/projects/proj/timeSeries"
        );
    }
}

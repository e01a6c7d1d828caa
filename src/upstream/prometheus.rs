//! Prometheus HTTP API client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

use super::{base_url, build_http_client, send_json, UpstreamError};
use crate::config::PrometheusConfig;

const SERVICE: &str = "Prometheus";

/// Standard `{status, data, errorType, error}` envelope of the v1 API.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: String,
    data: Option<T>,
    #[serde(rename = "errorType")]
    error_type: Option<String>,
    error: Option<String>,
}

impl<T> Envelope<T> {
    fn into_data(self) -> Result<T, UpstreamError> {
        if self.status != "success" {
            return Err(UpstreamError::Api(format!(
                "{}: {}",
                self.error_type.unwrap_or_else(|| "error".to_string()),
                self.error.unwrap_or_default()
            )));
        }
        self.data
            .ok_or_else(|| UpstreamError::Decode("missing data".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct QueryData {
    #[serde(default)]
    result: Value,
}

#[derive(Debug, Deserialize)]
struct AlertsData {
    #[serde(default)]
    alerts: Vec<Value>,
}

/// Result of an instant or range query.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub status: String,
    pub data: Vec<Value>,
}

impl QueryResult {
    fn success(result: Value) -> Self {
        let data = match result {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => vec![other],
        };
        Self {
            status: "success".to_string(),
            data,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertsResponse {
    pub alerts: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricMetadata {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub help: String,
    #[serde(default)]
    pub unit: String,
}

pub struct PrometheusClient {
    http: reqwest::Client,
    config: PrometheusConfig,
    timeout: Duration,
}

impl PrometheusClient {
    pub fn new(config: PrometheusConfig, timeout: Duration) -> Result<Self, UpstreamError> {
        Ok(Self {
            http: build_http_client(timeout, false)?,
            config,
            timeout,
        })
    }

    pub fn is_enabled(&self) -> bool {
        !self.config.url.trim().is_empty()
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, UpstreamError> {
        let url = format!("{}/api/v1/{}", base_url(&self.config.url, SERVICE)?, path);
        let mut request = self.http.get(url).query(query);
        if !self.config.username.is_empty() {
            request = request.basic_auth(&self.config.username, Some(&self.config.password));
        }
        let envelope: Envelope<T> = send_json(request, self.timeout).await?;
        envelope.into_data()
    }

    /// Instant query, optionally evaluated at `time`.
    pub async fn query(
        &self,
        query: &str,
        time: Option<DateTime<Utc>>,
    ) -> Result<QueryResult, UpstreamError> {
        let mut params = vec![("query", query.to_string())];
        if let Some(time) = time {
            params.push(("time", time.to_rfc3339()));
        }
        let data: QueryData = self.get("query", &params).await?;
        Ok(QueryResult::success(data.result))
    }

    pub async fn query_range(
        &self,
        query: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: &str,
    ) -> Result<QueryResult, UpstreamError> {
        let params = [
            ("query", query.to_string()),
            ("start", start.to_rfc3339()),
            ("end", end.to_rfc3339()),
            ("step", step.to_string()),
        ];
        let data: QueryData = self.get("query_range", &params).await?;
        Ok(QueryResult::success(data.result))
    }

    pub async fn alerts(&self) -> Result<AlertsResponse, UpstreamError> {
        let data: AlertsData = self.get("alerts", &[]).await?;
        Ok(AlertsResponse {
            alerts: data.alerts,
        })
    }

    /// Metric names, optionally restricted by a series selector.
    pub async fn metrics(&self, selector: Option<&str>) -> Result<Vec<String>, UpstreamError> {
        let params: Vec<(&str, String)> = selector
            .map(|s| vec![("match[]", s.to_string())])
            .unwrap_or_default();
        self.get("label/__name__/values", &params).await
    }

    /// Metadata per metric name; the first entry wins when a metric has several.
    pub async fn metadata(
        &self,
        metric: Option<&str>,
    ) -> Result<BTreeMap<String, MetricMetadata>, UpstreamError> {
        let params: Vec<(&str, String)> = metric
            .map(|m| vec![("metric", m.to_string())])
            .unwrap_or_default();
        let data: BTreeMap<String, Vec<MetricMetadata>> = self.get("metadata", &params).await?;
        Ok(first_metadata(data))
    }

    pub async fn check_health(&self) -> Result<(), UpstreamError> {
        self.query("up", None).await.map(|_| ())
    }
}

fn first_metadata(
    data: BTreeMap<String, Vec<MetricMetadata>>,
) -> BTreeMap<String, MetricMetadata> {
    data.into_iter()
        .filter_map(|(name, entries)| entries.into_iter().next().map(|m| (name, m)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_error() {
        let envelope: Envelope<QueryData> = serde_json::from_value(json!({
            "status": "error",
            "errorType": "bad_data",
            "error": "parse error at char 3"
        }))
        .unwrap();
        match envelope.into_data() {
            Err(UpstreamError::Api(msg)) => assert_eq!(msg, "bad_data: parse error at char 3"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_query_result_shapes() {
        let vector = QueryResult::success(json!([{"metric": {"job": "node"}, "value": [1, "1"]}]));
        assert_eq!(vector.data.len(), 1);
        let scalar = QueryResult::success(json!([1714557600, "4"]));
        assert_eq!(scalar.data, vec![json!(1714557600), json!("4")]);
        assert!(QueryResult::success(Value::Null).data.is_empty());
    }

    #[test]
    fn test_first_metadata() {
        let data: BTreeMap<String, Vec<MetricMetadata>> = serde_json::from_value(json!({
            "up": [{"type": "gauge", "help": "target up", "unit": ""}],
            "empty": []
        }))
        .unwrap();
        let out = first_metadata(data);
        assert_eq!(out.len(), 1);
        assert_eq!(out["up"].kind, "gauge");
    }

    #[tokio::test]
    async fn test_disabled_client() {
        let client = PrometheusClient::new(PrometheusConfig::default(), Duration::from_secs(1)).unwrap();
        assert!(!client.is_enabled());
        assert!(matches!(
            client.alerts().await,
            Err(UpstreamError::NotConfigured("Prometheus"))
        ));
    }
}

//! Clients for the upstream infrastructure services.
//!
//! Each client is a thin async wrapper around the vendor's HTTP API that
//! reshapes responses into local types.

pub mod grafana;
pub mod prometheus;
pub mod proxmox;
pub mod uptime_kuma;

pub use grafana::GrafanaClient;
pub use prometheus::PrometheusClient;
pub use proxmox::ProxmoxClient;
pub use uptime_kuma::{KumaBridgeClient, MonitorBackend, UptimeKumaService};

use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

/// Upstream error types.
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("upstream error: {0}")]
    Api(String),
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl UpstreamError {
    /// Whether the upstream reported the requested object as absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, UpstreamError::Status { status: 404, .. })
    }

    fn from_reqwest(e: reqwest::Error, timeout: Duration) -> Self {
        if e.is_timeout() {
            UpstreamError::Timeout(timeout)
        } else if e.is_decode() {
            UpstreamError::Decode(e.to_string())
        } else {
            UpstreamError::Network(e.to_string())
        }
    }
}

/// Build the HTTP client shared by a single upstream.
pub fn build_http_client(
    timeout: Duration,
    accept_invalid_certs: bool,
) -> Result<reqwest::Client, UpstreamError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .danger_accept_invalid_certs(accept_invalid_certs)
        .build()
        .map_err(|e| UpstreamError::Network(e.to_string()))
}

/// Base URL without a trailing slash, or `NotConfigured` when empty.
fn base_url(url: &str, service: &'static str) -> Result<String, UpstreamError> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(UpstreamError::NotConfigured(service));
    }
    Ok(trimmed.to_string())
}

/// Send a request and decode a successful JSON response body.
async fn send_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
    timeout: Duration,
) -> Result<T, UpstreamError> {
    let response = send(request, timeout).await?;
    response
        .json::<T>()
        .await
        .map_err(|e| UpstreamError::from_reqwest(e, timeout))
}

/// Send a request, turning non-2xx responses into `UpstreamError::Status`.
async fn send(
    request: reqwest::RequestBuilder,
    timeout: Duration,
) -> Result<reqwest::Response, UpstreamError> {
    let response = request
        .send()
        .await
        .map_err(|e| UpstreamError::from_reqwest(e, timeout))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(UpstreamError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url() {
        assert_eq!(base_url("http://prom:9090/", "Prometheus").unwrap(), "http://prom:9090");
        assert!(matches!(
            base_url("  ", "Grafana"),
            Err(UpstreamError::NotConfigured("Grafana"))
        ));
    }

    #[test]
    fn test_not_found() {
        let err = UpstreamError::Status {
            status: 404,
            body: String::new(),
        };
        assert!(err.is_not_found());
        assert!(!UpstreamError::Api("boom".into()).is_not_found());
    }

    #[tokio::test]
    async fn test_unreachable_upstream() {
        let timeout = Duration::from_millis(200);
        let client = build_http_client(timeout, false).unwrap();
        let result: Result<serde_json::Value, _> =
            send_json(client.get("http://256.256.256.256/api"), timeout).await;
        assert!(result.is_err());
    }
}

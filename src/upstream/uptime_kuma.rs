//! Uptime Kuma monitors, status pages and statistics.
//!
//! Uptime Kuma only speaks Socket.IO, so the shipped backend talks to a REST
//! bridge in front of it. The [`MonitorBackend`] trait is the seam between
//! the HTTP plumbing and [`UptimeKumaService`], which normalizes payloads and
//! feeds the statistics transformer.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::{base_url, build_http_client, send, send_json, UpstreamError};
use crate::cache::TtlCache;
use crate::config::UptimeKumaConfig;
use crate::stats::{
    normalize_monitor, normalize_object, transform_info, CertificateInfo, FleetInput,
    FleetStatistics, MonitorBundle, MonitorStatistics, RawCertInfo,
};

const SERVICE: &str = "Uptime Kuma";

/// Raw access to an Uptime Kuma instance.
///
/// The per-monitor calls (`avg_pings` through `important_heartbeats`) return
/// objects keyed by monitor id.
#[async_trait]
pub trait MonitorBackend: Send + Sync {
    async fn monitors(&self) -> Result<Vec<Value>, UpstreamError>;
    async fn monitor(&self, id: i64) -> Result<Option<Value>, UpstreamError>;
    async fn add_monitor(&self, monitor: &Value) -> Result<Value, UpstreamError>;
    async fn edit_monitor(&self, id: i64, changes: &Value) -> Result<Value, UpstreamError>;
    async fn delete_monitor(&self, id: i64) -> Result<(), UpstreamError>;
    async fn status_pages(&self) -> Result<Vec<Value>, UpstreamError>;
    async fn status_page(&self, slug: &str) -> Result<Option<Value>, UpstreamError>;
    async fn info(&self) -> Result<Map<String, Value>, UpstreamError>;
    async fn database_size(&self) -> Result<Value, UpstreamError>;
    async fn avg_pings(&self) -> Result<Map<String, Value>, UpstreamError>;
    async fn uptimes(&self) -> Result<Map<String, Value>, UpstreamError>;
    async fn cert_infos(&self) -> Result<Map<String, Value>, UpstreamError>;
    async fn heartbeats(&self) -> Result<Map<String, Value>, UpstreamError>;
    async fn important_heartbeats(&self) -> Result<Map<String, Value>, UpstreamError>;
    async fn uptime(&self, id: i64, days: u32) -> Result<Option<f64>, UpstreamError>;
}

// ============================================================================
// Request bodies
// ============================================================================

fn default_interval() -> i64 {
    60
}

fn default_active() -> Option<bool> {
    Some(true)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorCreate {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    #[serde(default = "default_interval")]
    pub interval: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "retryInterval", alias = "retry_interval", default, skip_serializing_if = "Option::is_none")]
    pub retry_interval: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxretries: Option<i64>,
    #[serde(default = "default_active", skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    #[serde(rename = "expectStatus", alias = "expect_status", default, skip_serializing_if = "Option::is_none")]
    pub expect_status: Option<i64>,
}

/// Partial update; only the fields that are set are sent upstream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "retryInterval", alias = "retry_interval", default, skip_serializing_if = "Option::is_none")]
    pub retry_interval: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxretries: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    #[serde(rename = "expectStatus", alias = "expect_status", default, skip_serializing_if = "Option::is_none")]
    pub expect_status: Option<i64>,
}

// ============================================================================
// REST bridge backend
// ============================================================================

#[derive(Debug, Deserialize)]
struct AccessToken {
    access_token: String,
}

/// [`MonitorBackend`] over the Uptime Kuma REST bridge.
pub struct KumaBridgeClient {
    http: reqwest::Client,
    config: UptimeKumaConfig,
    timeout: Duration,
    token: Mutex<Option<String>>,
}

impl KumaBridgeClient {
    pub fn new(config: UptimeKumaConfig, timeout: Duration) -> Result<Self, UpstreamError> {
        Ok(Self {
            http: build_http_client(timeout, false)?,
            config,
            timeout,
            token: Mutex::new(None),
        })
    }

    pub fn is_enabled(&self) -> bool {
        !self.config.url.trim().is_empty()
    }

    fn url(&self, path: &str) -> Result<String, UpstreamError> {
        Ok(format!("{}/{}", base_url(&self.config.url, SERVICE)?, path))
    }

    async fn access_token(&self) -> Result<String, UpstreamError> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref() {
            return Ok(token.clone());
        }

        let request = self.http.post(self.url("login/access-token")?).form(&[
            ("username", self.config.username.as_str()),
            ("password", self.config.password.as_str()),
        ]);
        let token: AccessToken = send_json(request, self.timeout).await.map_err(|e| match e {
            UpstreamError::Status { status: 400 | 401, .. } => {
                UpstreamError::Auth("Uptime Kuma rejected the configured credentials".to_string())
            }
            other => other,
        })?;
        tracing::info!("Connected to Uptime Kuma");
        *guard = Some(token.access_token.clone());
        Ok(token.access_token)
    }

    /// Send an authenticated request, logging in again once if the token was rejected.
    async fn call(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Response, UpstreamError> {
        let url = self.url(path)?;
        let mut retried = false;
        loop {
            let token = self.access_token().await?;
            let mut request = self.http.request(method.clone(), &url).bearer_auth(token);
            if let Some(body) = body {
                request = request.json(body);
            }
            match send(request, self.timeout).await {
                Err(UpstreamError::Status { status: 401, .. }) if !retried => {
                    tracing::warn!("Uptime Kuma token rejected, logging in again");
                    *self.token.lock().await = None;
                    retried = true;
                }
                other => return other,
            }
        }
    }

    async fn get_json(&self, path: &str) -> Result<Value, UpstreamError> {
        let response = self.call(reqwest::Method::GET, path, None).await?;
        response
            .json()
            .await
            .map_err(|e| UpstreamError::Decode(e.to_string()))
    }

    async fn get_optional(&self, path: &str) -> Result<Option<Value>, UpstreamError> {
        match self.get_json(path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn get_list(&self, path: &str) -> Result<Vec<Value>, UpstreamError> {
        match self.get_json(path).await? {
            Value::Array(items) => Ok(items),
            other => Err(UpstreamError::Decode(format!("expected a list from {}, got {}", path, other))),
        }
    }

    async fn get_object(&self, path: &str) -> Result<Map<String, Value>, UpstreamError> {
        match self.get_json(path).await? {
            Value::Object(map) => Ok(map),
            // An instance without monitors may answer null.
            Value::Null => Ok(Map::new()),
            other => Err(UpstreamError::Decode(format!("expected an object from {}, got {}", path, other))),
        }
    }

    async fn send_body(&self, method: reqwest::Method, path: &str, body: &Value) -> Result<Value, UpstreamError> {
        let response = self.call(method, path, Some(body)).await?;
        response
            .json()
            .await
            .map_err(|e| UpstreamError::Decode(e.to_string()))
    }
}

#[async_trait]
impl MonitorBackend for KumaBridgeClient {
    async fn monitors(&self) -> Result<Vec<Value>, UpstreamError> {
        self.get_list("monitors").await
    }

    async fn monitor(&self, id: i64) -> Result<Option<Value>, UpstreamError> {
        self.get_optional(&format!("monitors/{}", id)).await
    }

    async fn add_monitor(&self, monitor: &Value) -> Result<Value, UpstreamError> {
        self.send_body(reqwest::Method::POST, "monitors", monitor).await
    }

    async fn edit_monitor(&self, id: i64, changes: &Value) -> Result<Value, UpstreamError> {
        self.send_body(reqwest::Method::PATCH, &format!("monitors/{}", id), changes)
            .await
    }

    async fn delete_monitor(&self, id: i64) -> Result<(), UpstreamError> {
        self.call(reqwest::Method::DELETE, &format!("monitors/{}", id), None)
            .await
            .map(|_| ())
    }

    async fn status_pages(&self) -> Result<Vec<Value>, UpstreamError> {
        self.get_list("statuspages").await
    }

    async fn status_page(&self, slug: &str) -> Result<Option<Value>, UpstreamError> {
        self.get_optional(&format!("statuspages/{}", slug)).await
    }

    async fn info(&self) -> Result<Map<String, Value>, UpstreamError> {
        self.get_object("info").await
    }

    async fn database_size(&self) -> Result<Value, UpstreamError> {
        self.get_json("settings/database-size").await
    }

    async fn avg_pings(&self) -> Result<Map<String, Value>, UpstreamError> {
        self.get_object("monitors/avg-ping").await
    }

    async fn uptimes(&self) -> Result<Map<String, Value>, UpstreamError> {
        self.get_object("monitors/uptime").await
    }

    async fn cert_infos(&self) -> Result<Map<String, Value>, UpstreamError> {
        self.get_object("monitors/cert-info").await
    }

    async fn heartbeats(&self) -> Result<Map<String, Value>, UpstreamError> {
        self.get_object("monitors/heartbeats").await
    }

    async fn important_heartbeats(&self) -> Result<Map<String, Value>, UpstreamError> {
        self.get_object("monitors/important-heartbeats").await
    }

    async fn uptime(&self, id: i64, days: u32) -> Result<Option<f64>, UpstreamError> {
        let value = self
            .get_optional(&format!("monitors/{}/uptime?days={}", id, days))
            .await?;
        Ok(value.as_ref().and_then(uptime_value))
    }
}

/// The bridge answers either a bare number or `{"uptime": n}`.
fn uptime_value(value: &Value) -> Option<f64> {
    match value {
        Value::Object(map) => map.get("uptime").and_then(Value::as_f64),
        other => other.as_f64(),
    }
}

// ============================================================================
// Service
// ============================================================================

/// Monitor operations and statistics on top of a [`MonitorBackend`].
pub struct UptimeKumaService {
    backend: Arc<dyn MonitorBackend>,
    enabled: bool,
    cache: TtlCache<Value>,
}

impl UptimeKumaService {
    pub fn new(backend: Arc<dyn MonitorBackend>, enabled: bool, cache_ttl: Duration) -> Self {
        Self {
            backend,
            enabled,
            cache: TtlCache::new(cache_ttl),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub async fn check_health(&self) -> Result<(), UpstreamError> {
        self.backend.info().await.map(|_| ())
    }

    pub async fn monitors(&self) -> Result<Vec<Map<String, Value>>, UpstreamError> {
        let monitors = self.backend.monitors().await?;
        tracing::info!("Retrieved {} monitors from Uptime Kuma", monitors.len());
        Ok(monitors.iter().filter_map(normalized).collect())
    }

    pub async fn monitor(&self, id: i64) -> Result<Option<Map<String, Value>>, UpstreamError> {
        let monitor = self.backend.monitor(id).await?;
        if monitor.is_none() {
            tracing::warn!("Monitor {} not found", id);
        }
        Ok(monitor.as_ref().and_then(normalized))
    }

    pub async fn create_monitor(&self, monitor: &MonitorCreate) -> Result<Map<String, Value>, UpstreamError> {
        let payload = serde_json::to_value(monitor).map_err(|e| UpstreamError::Decode(e.to_string()))?;
        let created = self.backend.add_monitor(&payload).await?;
        tracing::info!("Created monitor {}", monitor.name);
        normalized(&created).ok_or_else(|| UpstreamError::Decode("monitor is not an object".to_string()))
    }

    /// Apply `changes` to an existing monitor. `None` when it does not exist.
    pub async fn update_monitor(
        &self,
        id: i64,
        changes: &MonitorUpdate,
    ) -> Result<Option<Map<String, Value>>, UpstreamError> {
        if self.backend.monitor(id).await?.is_none() {
            tracing::warn!("Monitor {} not found for update", id);
            return Ok(None);
        }
        let payload = serde_json::to_value(changes).map_err(|e| UpstreamError::Decode(e.to_string()))?;
        let updated = self.backend.edit_monitor(id, &payload).await?;
        tracing::info!("Updated monitor {}", id);
        Ok(normalized(&updated))
    }

    /// Delete a monitor. Returns `false` when it does not exist.
    pub async fn delete_monitor(&self, id: i64) -> Result<bool, UpstreamError> {
        if self.backend.monitor(id).await?.is_none() {
            tracing::warn!("Monitor {} not found for deletion", id);
            return Ok(false);
        }
        self.backend.delete_monitor(id).await?;
        tracing::info!("Deleted monitor {}", id);
        Ok(true)
    }

    pub async fn status_pages(&self) -> Result<Vec<Map<String, Value>>, UpstreamError> {
        let pages = self.backend.status_pages().await?;
        Ok(pages
            .iter()
            .filter_map(Value::as_object)
            .map(normalize_object)
            .collect())
    }

    pub async fn status_page(&self, slug: &str) -> Result<Option<Map<String, Value>>, UpstreamError> {
        let page = self.backend.status_page(slug).await?;
        Ok(page.as_ref().and_then(Value::as_object).map(normalize_object))
    }

    pub async fn info(&self) -> Result<Map<String, Value>, UpstreamError> {
        let info = self.backend.info().await?;
        Ok(transform_info(&normalize_object(&info)))
    }

    /// Average ping reported by Uptime Kuma for one monitor.
    pub async fn avg_ping(&self, id: i64) -> Result<Option<f64>, UpstreamError> {
        let pings = self.backend.avg_pings().await?;
        Ok(pings.get(&id.to_string()).and_then(Value::as_f64))
    }

    /// Transformed certificate details for one monitor, `None` without an entry.
    pub async fn cert_info(&self, id: i64) -> Result<Option<CertificateInfo>, UpstreamError> {
        let certs = self.backend.cert_infos().await?;
        let Some(raw) = certs.get(&id.to_string()).filter(|v| !v.is_null()) else {
            return Ok(None);
        };
        let raw: RawCertInfo = serde_json::from_value(raw.clone())
            .map_err(|e| UpstreamError::Decode(e.to_string()))?;
        Ok(Some(CertificateInfo::from_raw(Some(&raw))))
    }

    pub async fn uptime(&self, id: i64, days: u32) -> Result<Option<f64>, UpstreamError> {
        self.backend.uptime(id, days).await
    }

    /// Statistics for one monitor, fetched fresh. `None` when it does not exist.
    pub async fn monitor_statistics(&self, id: i64) -> Result<Option<MonitorStatistics>, UpstreamError> {
        let Some(monitor) = self.backend.monitor(id).await? else {
            tracing::warn!("Monitor {} not found for statistics", id);
            return Ok(None);
        };

        let key = id.to_string();
        let (avg_pings, uptimes, cert_infos, heartbeats, important) = tokio::try_join!(
            self.backend.avg_pings(),
            self.backend.uptimes(),
            self.backend.cert_infos(),
            self.backend.heartbeats(),
            self.backend.important_heartbeats(),
        )?;

        let bundle = bundle_for(
            monitor,
            &key,
            &avg_pings,
            &uptimes,
            &cert_infos,
            &heartbeats,
            &important,
        )?;
        tracing::info!("Retrieved statistics for monitor {}", id);
        Ok(Some(MonitorStatistics::from_bundle(&bundle)))
    }

    /// Statistics for every monitor. Upstream payloads are served from the cache.
    pub async fn fleet_statistics(&self) -> Result<FleetStatistics, UpstreamError> {
        let backend = &self.backend;
        let monitors = self
            .cache
            .get_or_fetch("monitors", || async { backend.monitors().await.map(Value::Array) })
            .await?;
        let info = self
            .cache
            .get_or_fetch("info", || async { backend.info().await.map(Value::Object) })
            .await?;
        let database_size = self
            .cache
            .get_or_fetch("database_size", || backend.database_size())
            .await?;
        let avg_pings = self.cached_map("avg_pings", || backend.avg_pings()).await?;
        let uptimes = self.cached_map("uptimes", || backend.uptimes()).await?;
        let cert_infos = self.cached_map("cert_infos", || backend.cert_infos()).await?;
        let heartbeats = self.cached_map("heartbeats", || backend.heartbeats()).await?;
        let important = self
            .cached_map("important_heartbeats", || backend.important_heartbeats())
            .await?;

        let mut bundles = BTreeMap::new();
        for monitor in monitors.as_array().into_iter().flatten() {
            let Some(id) = monitor_id(monitor) else {
                tracing::warn!("Skipping monitor without an id: {}", monitor);
                continue;
            };
            let bundle = bundle_for(
                monitor.clone(),
                &id.to_string(),
                &avg_pings,
                &uptimes,
                &cert_infos,
                &heartbeats,
                &important,
            )?;
            bundles.insert(id, bundle);
        }

        let input = FleetInput {
            info: info.as_object().cloned().unwrap_or_default(),
            database_size,
            monitors: bundles,
        };
        let stats = FleetStatistics::build(&input, Utc::now());
        tracing::info!("Retrieved statistics for all monitors ({} total)", input.monitors.len());
        Ok(stats)
    }

    async fn cached_map<F, Fut>(&self, key: &str, fetch: F) -> Result<Map<String, Value>, UpstreamError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Map<String, Value>, UpstreamError>>,
    {
        let value = self
            .cache
            .get_or_fetch(key, || async { fetch().await.map(Value::Object) })
            .await?;
        match value {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }
}

fn normalized(value: &Value) -> Option<Map<String, Value>> {
    value.as_object().map(normalize_monitor)
}

fn monitor_id(monitor: &Value) -> Option<i64> {
    match monitor.get("id")? {
        Value::String(s) => s.trim().parse().ok(),
        other => other.as_i64(),
    }
}

fn bundle_for(
    monitor: Value,
    key: &str,
    avg_pings: &Map<String, Value>,
    uptimes: &Map<String, Value>,
    cert_infos: &Map<String, Value>,
    heartbeats: &Map<String, Value>,
    important: &Map<String, Value>,
) -> Result<MonitorBundle, UpstreamError> {
    let bundle = json!({
        "monitor": monitor,
        "avg_ping": avg_pings.get(key),
        "uptime": uptimes.get(key),
        "cert_info": cert_infos.get(key),
        "heartbeats": heartbeats.get(key),
        "important_heartbeats": important.get(key),
    });
    serde_json::from_value(bundle).map_err(|e| UpstreamError::Decode(format!("monitor {}: {}", key, e)))
}

/// In-memory backend for tests.
#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    pub struct FakeBackend {
        pub monitors: StdMutex<Vec<Value>>,
        pub per_monitor: Map<String, Value>,
        pub monitor_calls: AtomicUsize,
    }

    impl FakeBackend {
        pub fn new() -> Self {
            let per_monitor = json!({
                "avg_pings": {"1": 120.5, "2": 80.0},
                "uptimes": {"1": {"24": 0.999, "720": 0.98}, "2": {"24": 0.5}},
                "cert_infos": {"1": {"valid": true, "daysRemaining": 12, "validTo": "2026-11-01"}},
                "heartbeats": {
                    "1": [
                        {"status": 1, "time": "2026-10-19 10:00:00", "ping": 100, "msg": "OK"},
                        {"status": 0, "time": "2026-10-19 09:59:00", "ping": null, "msg": "timeout"}
                    ],
                    "2": [{"status": 0, "time": "2026-10-19 10:00:00", "msg": "connection refused"}]
                },
                "important_heartbeats": {"1": [], "2": []}
            });
            Self {
                monitors: StdMutex::new(vec![
                    json!({"id": 1, "name": "Website", "url": "https://example.com", "type": "http", "active": 1, "maintenance": false}),
                    json!({"id": 2, "name": "api", "url": "https://api.example.com", "type": "http", "active": 0, "maintenance": false}),
                ]),
                per_monitor: per_monitor.as_object().cloned().unwrap_or_default(),
                monitor_calls: AtomicUsize::new(0),
            }
        }

        fn table(&self, name: &str) -> Map<String, Value> {
            self.per_monitor
                .get(name)
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default()
        }

        fn find(&self, id: i64) -> Option<Value> {
            self.monitors
                .lock()
                .unwrap()
                .iter()
                .find(|m| m["id"].as_i64() == Some(id))
                .cloned()
        }
    }

    #[async_trait]
    impl MonitorBackend for FakeBackend {
        async fn monitors(&self) -> Result<Vec<Value>, UpstreamError> {
            self.monitor_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.monitors.lock().unwrap().clone())
        }

        async fn monitor(&self, id: i64) -> Result<Option<Value>, UpstreamError> {
            Ok(self.find(id))
        }

        async fn add_monitor(&self, monitor: &Value) -> Result<Value, UpstreamError> {
            let mut monitors = self.monitors.lock().unwrap();
            let mut created = monitor.clone();
            created["id"] = json!(monitors.len() as i64 + 1);
            monitors.push(created.clone());
            Ok(created)
        }

        async fn edit_monitor(&self, id: i64, changes: &Value) -> Result<Value, UpstreamError> {
            let mut monitors = self.monitors.lock().unwrap();
            let monitor = monitors
                .iter_mut()
                .find(|m| m["id"].as_i64() == Some(id))
                .ok_or(UpstreamError::Status { status: 404, body: String::new() })?;
            if let (Some(target), Some(changes)) = (monitor.as_object_mut(), changes.as_object()) {
                for (k, v) in changes {
                    target.insert(k.clone(), v.clone());
                }
            }
            Ok(monitor.clone())
        }

        async fn delete_monitor(&self, id: i64) -> Result<(), UpstreamError> {
            self.monitors.lock().unwrap().retain(|m| m["id"].as_i64() != Some(id));
            Ok(())
        }

        async fn status_pages(&self) -> Result<Vec<Value>, UpstreamError> {
            Ok(vec![json!({"id": 1, "slug": "main", "title": "Main", "showTags": true, "published": 1})])
        }

        async fn status_page(&self, slug: &str) -> Result<Option<Value>, UpstreamError> {
            Ok(self
                .status_pages()
                .await?
                .into_iter()
                .find(|p| p["slug"] == slug))
        }

        async fn info(&self) -> Result<Map<String, Value>, UpstreamError> {
            Ok(json!({"version": "1.23.11", "latestVersion": "1.23.16", "primaryBaseURL": null})
                .as_object()
                .cloned()
                .unwrap_or_default())
        }

        async fn database_size(&self) -> Result<Value, UpstreamError> {
            Ok(json!({"size": 536870912}))
        }

        async fn avg_pings(&self) -> Result<Map<String, Value>, UpstreamError> {
            Ok(self.table("avg_pings"))
        }

        async fn uptimes(&self) -> Result<Map<String, Value>, UpstreamError> {
            Ok(self.table("uptimes"))
        }

        async fn cert_infos(&self) -> Result<Map<String, Value>, UpstreamError> {
            Ok(self.table("cert_infos"))
        }

        async fn heartbeats(&self) -> Result<Map<String, Value>, UpstreamError> {
            Ok(self.table("heartbeats"))
        }

        async fn important_heartbeats(&self) -> Result<Map<String, Value>, UpstreamError> {
            Ok(self.table("important_heartbeats"))
        }

        async fn uptime(&self, id: i64, _days: u32) -> Result<Option<f64>, UpstreamError> {
            Ok(self.find(id).map(|_| 99.5))
        }
    }
}

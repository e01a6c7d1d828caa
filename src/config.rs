//! Configuration module for ServiceMesh.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;
use std::time::Duration;

/// Connection settings for Uptime Kuma (reached through its REST bridge).
#[derive(Debug, Clone, Default)]
pub struct UptimeKumaConfig {
    pub url: String,
    pub username: String,
    pub password: String,
}

/// Connection settings for Prometheus.
#[derive(Debug, Clone, Default)]
pub struct PrometheusConfig {
    pub url: String,
    pub username: String,
    pub password: String,
}

/// Connection settings for Grafana. An API key wins over basic auth.
#[derive(Debug, Clone, Default)]
pub struct GrafanaConfig {
    pub url: String,
    pub api_key: String,
    pub username: String,
    pub password: String,
}

/// Connection settings for Proxmox VE.
#[derive(Debug, Clone)]
pub struct ProxmoxConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    pub verify_ssl: bool,
}

impl Default for ProxmoxConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            username: String::new(),
            password: String::new(),
            verify_ssl: true,
        }
    }
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the web server (default: 6000)
    pub http_port: u16,
    /// Path to the SQLite database file (default: "servicemesh.db")
    pub db_path: String,
    /// Prefix every API route is nested under (default: "/api/v1")
    pub api_prefix: String,
    /// HS256 signing key for bearer tokens
    pub secret_key: String,
    pub access_token_expire_minutes: i64,
    pub cors_origins: Vec<String>,
    /// Password for the seeded `admin` user; no seeding when unset
    pub admin_default_password: Option<String>,
    pub log_level: String,
    /// Timeout applied to every upstream request
    pub default_timeout: Duration,
    pub cache_ttl: Duration,
    pub uptime_kuma: UptimeKumaConfig,
    pub prometheus: PrometheusConfig,
    pub grafana: GrafanaConfig,
    pub proxmox: ProxmoxConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 6000,
            db_path: "servicemesh.db".to_string(),
            api_prefix: "/api/v1".to_string(),
            secret_key: random_secret(),
            access_token_expire_minutes: 30,
            cors_origins: vec!["http://localhost:6000".to_string()],
            admin_default_password: None,
            log_level: "info".to_string(),
            default_timeout: Duration::from_secs(10),
            cache_ttl: Duration::from_secs(300),
            uptime_kuma: UptimeKumaConfig::default(),
            prometheus: PrometheusConfig::default(),
            grafana: GrafanaConfig::default(),
            proxmox: ProxmoxConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `SERVICEMESH_HTTP_PORT`: HTTP port (default: 6000)
    /// - `SERVICEMESH_DB_PATH`: Database file path (default: "servicemesh.db")
    /// - `API_V1_STR`, `SECRET_KEY`, `ACCESS_TOKEN_EXPIRE_MINUTES`, `CORS_ORIGINS`
    /// - `ADMIN_DEFAULT_PASSWORD`, `LOG_LEVEL`, `DEFAULT_TIMEOUT`, `CACHE_TTL_SECONDS`
    /// - `UPTIME_KUMA_*`, `PROMETHEUS_*`, `GRAFANA_*`, `PROXMOX_*` upstream settings
    pub fn load() -> Self {
        Self::load_from(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn load_from<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(port) = lookup("SERVICEMESH_HTTP_PORT").and_then(|s| s.parse().ok()) {
            cfg.http_port = port;
        }
        if let Some(db_path) = lookup("SERVICEMESH_DB_PATH") {
            cfg.db_path = db_path;
        }
        if let Some(prefix) = lookup("API_V1_STR") {
            cfg.api_prefix = normalize_prefix(&prefix);
        }
        if let Some(key) = lookup("SECRET_KEY").filter(|k| !k.is_empty()) {
            cfg.secret_key = key;
        }
        if let Some(minutes) = lookup("ACCESS_TOKEN_EXPIRE_MINUTES").and_then(|s| s.parse().ok()) {
            cfg.access_token_expire_minutes = minutes;
        }
        if let Some(origins) = lookup("CORS_ORIGINS") {
            cfg.cors_origins = parse_origins(&origins);
        }
        cfg.admin_default_password = lookup("ADMIN_DEFAULT_PASSWORD").filter(|p| !p.is_empty());
        if let Some(level) = lookup("LOG_LEVEL") {
            cfg.log_level = level.to_lowercase();
        }
        if let Some(secs) = lookup("DEFAULT_TIMEOUT").and_then(|s| s.parse().ok()) {
            cfg.default_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = lookup("CACHE_TTL_SECONDS").and_then(|s| s.parse().ok()) {
            cfg.cache_ttl = Duration::from_secs(secs);
        }

        let get = |key: &str| lookup(key).unwrap_or_default();

        cfg.uptime_kuma = UptimeKumaConfig {
            url: get("UPTIME_KUMA_URL"),
            username: get("UPTIME_KUMA_USERNAME"),
            password: get("UPTIME_KUMA_PASSWORD"),
        };
        cfg.prometheus = PrometheusConfig {
            url: get("PROMETHEUS_URL"),
            username: get("PROMETHEUS_USERNAME"),
            password: get("PROMETHEUS_PASSWORD"),
        };
        cfg.grafana = GrafanaConfig {
            url: get("GRAFANA_URL"),
            api_key: get("GRAFANA_API_KEY"),
            username: get("GRAFANA_USERNAME"),
            password: get("GRAFANA_PASSWORD"),
        };
        cfg.proxmox = ProxmoxConfig {
            url: get("PROXMOX_URL"),
            username: get("PROXMOX_USERNAME"),
            password: get("PROXMOX_PASSWORD"),
            verify_ssl: lookup("PROXMOX_VERIFY_SSL")
                .map(|v| parse_bool(&v))
                .unwrap_or(true),
        };

        cfg
    }
}

/// Parse `CORS_ORIGINS`, accepting either a JSON array or a comma separated list.
pub fn parse_origins(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') {
        if let Ok(list) = serde_json::from_str::<Vec<String>>(trimmed) {
            return list;
        }
    }
    trimmed
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

fn parse_bool(raw: &str) -> bool {
    matches!(raw.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn random_secret() -> String {
    hex::encode(rand::random::<[u8; 32]>())
}

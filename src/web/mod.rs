//! Web server module.

mod auth;
mod error;
mod handlers;

pub use error::ApiError;
pub use handlers::*;

use crate::auth::{CredentialsService, TokenIssuer};
use crate::config::ServerConfig;
use crate::db::Store;
use crate::upstream::{
    GrafanaClient, KumaBridgeClient, PrometheusClient, ProxmoxClient, UpstreamError,
    UptimeKumaService,
};

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub credentials: Arc<CredentialsService>,
    pub uptime_kuma: Arc<UptimeKumaService>,
    pub prometheus: Arc<PrometheusClient>,
    pub grafana: Arc<GrafanaClient>,
    pub proxmox: Arc<ProxmoxClient>,
}

impl AppState {
    /// Wire up the credentials service and every upstream client from `config`.
    pub fn from_config(config: ServerConfig, store: Arc<Store>) -> Result<Self, UpstreamError> {
        let timeout = config.default_timeout;
        let tokens = TokenIssuer::new(&config.secret_key, config.access_token_expire_minutes);

        let kuma = KumaBridgeClient::new(config.uptime_kuma.clone(), timeout)?;
        let kuma_enabled = kuma.is_enabled();

        Ok(Self {
            credentials: Arc::new(CredentialsService::new(store, tokens)),
            uptime_kuma: Arc::new(UptimeKumaService::new(
                Arc::new(kuma),
                kuma_enabled,
                config.cache_ttl,
            )),
            prometheus: Arc::new(PrometheusClient::new(config.prometheus.clone(), timeout)?),
            grafana: Arc::new(GrafanaClient::new(config.grafana.clone(), timeout)?),
            proxmox: Arc::new(ProxmoxClient::new(
                config.proxmox.clone(),
                timeout,
                config.cache_ttl,
            )?),
            config: Arc::new(config),
        })
    }
}

/// Build the API router with all routes nested under the configured prefix.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(handlers::handle_health))
        .route("/health/ping", get(handlers::handle_ping))
        .route("/credentials/register", post(handlers::handle_register))
        .route("/credentials/login", post(handlers::handle_login))
        .route("/credentials/token", post(handlers::handle_service_token));

    let protected = Router::new()
        .route(
            "/credentials/service-credentials/{id}",
            delete(handlers::handle_delete_service_credential),
        )
        .nest("/uptime-kuma", uptime_kuma_routes())
        .nest("/prometheus", prometheus_routes())
        .nest("/grafana", grafana_routes())
        .nest("/proxmox", proxmox_routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer,
        ));

    let api = public.merge(protected);
    let prefix = state.config.api_prefix.clone();
    let app = if prefix == "/" {
        Router::new().merge(api)
    } else {
        Router::new().nest(&prefix, api)
    };

    app.layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.cors_origins))
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1MB
        .with_state(state)
}

fn uptime_kuma_routes() -> Router<AppState> {
    Router::new()
        .route("/info", get(handlers::handle_kuma_info))
        .route(
            "/monitors",
            get(handlers::handle_get_monitors).post(handlers::handle_create_monitor),
        )
        .route("/monitors/statistics", get(handlers::handle_fleet_statistics))
        .route(
            "/monitors/{id}",
            get(handlers::handle_get_monitor)
                .patch(handlers::handle_update_monitor)
                .delete(handlers::handle_delete_monitor),
        )
        .route("/monitors/{id}/avg-ping", get(handlers::handle_monitor_avg_ping))
        .route("/monitors/{id}/cert-info", get(handlers::handle_monitor_cert_info))
        .route("/monitors/{id}/uptime", get(handlers::handle_monitor_uptime))
        .route("/monitors/{id}/statistics", get(handlers::handle_monitor_statistics))
        .route("/status-pages", get(handlers::handle_get_status_pages))
        .route("/status-pages/{slug}", get(handlers::handle_get_status_page))
}

fn prometheus_routes() -> Router<AppState> {
    Router::new()
        .route("/query", get(handlers::handle_prometheus_query))
        .route("/query_range", get(handlers::handle_prometheus_query_range))
        .route("/alerts", get(handlers::handle_prometheus_alerts))
        .route("/metrics", get(handlers::handle_prometheus_metrics))
        .route("/metadata", get(handlers::handle_prometheus_metadata))
}

fn grafana_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/dashboards",
            get(handlers::handle_get_dashboards).post(handlers::handle_create_dashboard),
        )
        .route(
            "/dashboards/{uid}",
            get(handlers::handle_get_dashboard).delete(handlers::handle_delete_dashboard),
        )
        .route(
            "/folders",
            get(handlers::handle_get_folders).post(handlers::handle_create_folder),
        )
        .route(
            "/datasources",
            get(handlers::handle_get_datasources).post(handlers::handle_create_datasource),
        )
}

fn proxmox_routes() -> Router<AppState> {
    Router::new()
        .route("/nodes", get(handlers::handle_get_nodes))
        .route("/nodes/{node}", get(handlers::handle_get_node))
        .route("/cluster", get(handlers::handle_get_cluster))
        .route("/vms", get(handlers::handle_get_vms))
        .route("/vms/{node}", post(handlers::handle_create_vm))
        .route(
            "/vms/{node}/{vmid}",
            get(handlers::handle_get_vm).delete(handlers::handle_delete_vm),
        )
        .route("/vms/{node}/{vmid}/start", post(handlers::handle_start_vm))
        .route("/vms/{node}/{vmid}/stop", post(handlers::handle_stop_vm))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|o| o == "*") {
        return cors.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {}", o);
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(origins))
}

/// Web server for ServiceMesh.
pub struct Server {
    state: AppState,
}

impl Server {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Start the server on the configured port.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.state.config.http_port));
        let router = router(self.state.clone());

        tracing::info!("Web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::uptime_kuma::fake::FakeBackend;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tempfile::NamedTempFile;
    use tower::ServiceExt;

    fn test_app() -> (Router, NamedTempFile) {
        let tmp = NamedTempFile::new().unwrap();
        let store = Arc::new(Store::new(tmp.path()).unwrap());
        let config = ServerConfig {
            secret_key: "test-secret".to_string(),
            ..ServerConfig::default()
        };
        let mut state = AppState::from_config(config, store).unwrap();
        state.uptime_kuma = Arc::new(UptimeKumaService::new(
            Arc::new(FakeBackend::new()),
            true,
            Duration::from_secs(300),
        ));
        (router(state), tmp)
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn register(app: &Router, username: &str) -> String {
        let (status, body) = send(
            app,
            "POST",
            "/api/v1/credentials/register",
            None,
            Some(json!({
                "username": username,
                "email": format!("{}@example.com", username),
                "password": "hunter2"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["access_token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_ping_and_health() {
        let (app, _tmp) = test_app();
        let (status, body) = send(&app, "GET", "/api/v1/health/ping", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok", "message": "pong"}));

        let (status, body) = send(&app, "GET", "/api/v1/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["services"]["uptime_kuma"]["status"], "healthy");
        assert_eq!(body["services"]["proxmox"]["enabled"], false);
    }

    #[tokio::test]
    async fn test_protected_routes_require_token() {
        let (app, _tmp) = test_app();
        let request = Request::builder()
            .uri("/api/v1/uptime-kuma/monitors")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");

        let (status, body) = send(&app, "GET", "/api/v1/uptime-kuma/monitors", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn test_register_login_and_duplicates() {
        let (app, _tmp) = test_app();
        register(&app, "alice").await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/credentials/register",
            None,
            Some(json!({"username": "alice", "email": "x@example.com", "password": "pw"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Username already registered");

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/credentials/login",
            None,
            Some(json!({"username": "alice", "password": "hunter2"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["username"], "alice");
        assert_eq!(body["token_type"], "bearer");
        assert_eq!(body["service_credentials"], json!([]));

        let (status, _) = send(
            &app,
            "POST",
            "/api/v1/credentials/login",
            None,
            Some(json!({"username": "alice", "password": "wrong"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_uptime_kuma_routes() {
        let (app, _tmp) = test_app();
        let token = register(&app, "alice").await;
        let token = Some(token.as_str());

        let (status, body) = send(&app, "GET", "/api/v1/uptime-kuma/monitors", token, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);

        let (status, body) = send(&app, "GET", "/api/v1/uptime-kuma/monitors/statistics", token, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["monitors_count"], 2);
        assert_eq!(body["down_monitors"][0]["last_error"], "-");

        let (status, body) = send(&app, "GET", "/api/v1/uptime-kuma/monitors/99", token, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "Monitor with ID 99 not found");

        let (status, body) = send(&app, "GET", "/api/v1/uptime-kuma/monitors/1/uptime?days=30", token, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"monitor_id": 1, "days": 30, "uptime": 99.5}));

        let (status, body) = send(&app, "GET", "/api/v1/uptime-kuma/monitors/1/statistics", token, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Website");

        let (status, _) = send(&app, "DELETE", "/api/v1/uptime-kuma/monitors/2", token, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "DELETE", "/api/v1/uptime-kuma/monitors/2", token, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(&app, "GET", "/api/v1/uptime-kuma/status-pages/main", token, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["show_tags"], true);
    }

    #[tokio::test]
    async fn test_unconfigured_upstream() {
        let (app, _tmp) = test_app();
        let token = register(&app, "alice").await;

        let (status, body) = send(&app, "GET", "/api/v1/prometheus/alerts", Some(&token), None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Failed to get alerts");
        assert_eq!(body["detail"], "Prometheus is not configured");
    }

    #[tokio::test]
    async fn test_service_token_lifecycle() {
        let (app, _tmp) = test_app();
        let login_token = register(&app, "alice").await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/credentials/token",
            None,
            Some(json!({"username": "alice", "password": "hunter2", "service_name": "grafana"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service_name"], "grafana");
        let service_token = body["access_token"].as_str().unwrap().to_string();

        let (status, _) = send(&app, "GET", "/api/v1/uptime-kuma/monitors", Some(&service_token), None).await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(
            &app,
            "POST",
            "/api/v1/credentials/login",
            None,
            Some(json!({"username": "alice", "password": "hunter2"})),
        )
        .await;
        let credential_id = body["service_credentials"][0]["id"].as_i64().unwrap();
        let login_token = body["access_token"].as_str().unwrap_or(&login_token).to_string();

        let uri = format!("/api/v1/credentials/service-credentials/{}", credential_id);
        let (status, _) = send(&app, "DELETE", &uri, Some(&login_token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "DELETE", &uri, Some(&login_token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, "GET", "/api/v1/uptime-kuma/monitors", Some(&service_token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}

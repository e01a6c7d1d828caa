//! HTTP request handlers.

use super::{ApiError, AppState};
use crate::auth::{IssuedToken, Principal, UserProfile};
use crate::db::ServiceCredential;
use crate::upstream::grafana::{DashboardCreate, DataSourceCreate, FolderCreate};
use crate::upstream::proxmox::VmCreate;
use crate::upstream::uptime_kuma::{MonitorCreate, MonitorUpdate};
use crate::upstream::UpstreamError;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::Future;

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ServiceHealth {
    pub enabled: bool,
    pub status: &'static str,
    pub message: String,
}

async fn probe<F>(enabled: bool, check: F) -> ServiceHealth
where
    F: Future<Output = Result<(), UpstreamError>>,
{
    if !enabled {
        return ServiceHealth {
            enabled,
            status: "disabled",
            message: "Service is disabled".to_string(),
        };
    }
    match check.await {
        Ok(()) => ServiceHealth {
            enabled,
            status: "healthy",
            message: "Service is healthy".to_string(),
        },
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            ServiceHealth {
                enabled,
                status: "unhealthy",
                message: e.to_string(),
            }
        }
    }
}

pub async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    let (uptime_kuma, prometheus, grafana, proxmox) = tokio::join!(
        probe(state.uptime_kuma.is_enabled(), state.uptime_kuma.check_health()),
        probe(state.prometheus.is_enabled(), state.prometheus.check_health()),
        probe(state.grafana.is_enabled(), state.grafana.check_health()),
        probe(state.proxmox.is_enabled(), state.proxmox.check_health()),
    );

    let healthy = [&uptime_kuma, &prometheus, &grafana, &proxmox]
        .iter()
        .all(|s| !s.enabled || s.status == "healthy");
    let status = if healthy { "healthy" } else { "degraded" };

    Json(json!({
        "status": status,
        "timestamp": Utc::now(),
        "services": {
            "uptime_kuma": uptime_kuma,
            "prometheus": prometheus,
            "grafana": grafana,
            "proxmox": proxmox,
        }
    }))
}

pub async fn handle_ping() -> impl IntoResponse {
    Json(json!({"status": "ok", "message": "pong"}))
}

// ============================================================================
// Credentials
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ServiceTokenRequest {
    pub username: String,
    pub password: String,
    pub service_name: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: UserProfile,
    #[serde(flatten)]
    pub token: IssuedToken,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_credentials: Option<Vec<ServiceCredential>>,
}

#[derive(Debug, Serialize)]
pub struct ServiceTokenResponse {
    pub service_name: String,
    #[serde(flatten)]
    pub token: IssuedToken,
}

pub async fn handle_register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.username.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "Invalid request",
            "Username and password are required",
        ));
    }

    let (user, token) = state
        .credentials
        .register(req.username.trim(), req.email.trim(), &req.password)?;
    let body = SessionResponse {
        user: UserProfile::from(&user),
        token,
        service_credentials: None,
    };
    Ok((StatusCode::CREATED, Json(body)))
}

pub async fn handle_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let outcome = state.credentials.login(&req.username, &req.password)?;
    Ok(Json(SessionResponse {
        user: UserProfile::from(&outcome.user),
        token: outcome.token,
        service_credentials: Some(outcome.service_credentials),
    }))
}

pub async fn handle_service_token(
    State(state): State<AppState>,
    Json(req): Json<ServiceTokenRequest>,
) -> Result<Json<ServiceTokenResponse>, ApiError> {
    let (credential, token) =
        state
            .credentials
            .issue_service_token(&req.username, &req.password, &req.service_name)?;
    Ok(Json(ServiceTokenResponse {
        service_name: credential.service_name,
        token,
    }))
}

pub async fn handle_delete_service_credential(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state
        .credentials
        .delete_service_credential(&principal.user, id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Uptime Kuma
// ============================================================================

fn monitor_not_found(id: i64) -> ApiError {
    ApiError::not_found(format!("Monitor with ID {} not found", id))
}

pub async fn handle_kuma_info(State(state): State<AppState>) -> impl IntoResponse {
    match state.uptime_kuma.info().await {
        Ok(info) => Json(info).into_response(),
        Err(e) => ApiError::upstream("Failed to get Uptime Kuma info", e).into_response(),
    }
}

pub async fn handle_get_monitors(State(state): State<AppState>) -> impl IntoResponse {
    match state.uptime_kuma.monitors().await {
        Ok(monitors) => Json(monitors).into_response(),
        Err(e) => ApiError::upstream("Failed to get monitors", e).into_response(),
    }
}

pub async fn handle_get_monitor(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let monitor = state
        .uptime_kuma
        .monitor(id)
        .await
        .map_err(|e| ApiError::upstream("Failed to get monitor", e))?;
    monitor.map(Json).ok_or_else(|| monitor_not_found(id))
}

pub async fn handle_create_monitor(
    State(state): State<AppState>,
    Json(req): Json<MonitorCreate>,
) -> Result<impl IntoResponse, ApiError> {
    let monitor = state
        .uptime_kuma
        .create_monitor(&req)
        .await
        .map_err(|e| ApiError::upstream("Failed to create monitor", e))?;
    Ok((StatusCode::CREATED, Json(monitor)))
}

pub async fn handle_update_monitor(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<MonitorUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    let monitor = state
        .uptime_kuma
        .update_monitor(id, &req)
        .await
        .map_err(|e| ApiError::upstream("Failed to update monitor", e))?;
    monitor.map(Json).ok_or_else(|| monitor_not_found(id))
}

pub async fn handle_delete_monitor(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let deleted = state
        .uptime_kuma
        .delete_monitor(id)
        .await
        .map_err(|e| ApiError::upstream("Failed to delete monitor", e))?;
    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(monitor_not_found(id))
    }
}

pub async fn handle_monitor_avg_ping(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let avg_ping = state
        .uptime_kuma
        .avg_ping(id)
        .await
        .map_err(|e| ApiError::upstream("Failed to get average ping", e))?
        .ok_or_else(|| ApiError::not_found(format!("Average ping not available for monitor {}", id)))?;
    Ok(Json(json!({"monitor_id": id, "avg_ping": avg_ping})))
}

pub async fn handle_monitor_cert_info(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let cert = state
        .uptime_kuma
        .cert_info(id)
        .await
        .map_err(|e| ApiError::upstream("Failed to get certificate info", e))?;
    cert.map(Json).ok_or_else(|| {
        ApiError::not_found(format!("Certificate info not available for monitor {}", id))
    })
}

#[derive(Debug, Deserialize)]
pub struct UptimeQuery {
    #[serde(default = "default_uptime_days")]
    pub days: u32,
}

fn default_uptime_days() -> u32 {
    7
}

pub async fn handle_monitor_uptime(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<UptimeQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let uptime = state
        .uptime_kuma
        .uptime(id, query.days)
        .await
        .map_err(|e| ApiError::upstream("Failed to get uptime", e))?
        .ok_or_else(|| ApiError::not_found(format!("Uptime not available for monitor {}", id)))?;
    Ok(Json(json!({"monitor_id": id, "days": query.days, "uptime": uptime})))
}

pub async fn handle_monitor_statistics(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let stats = state
        .uptime_kuma
        .monitor_statistics(id)
        .await
        .map_err(|e| ApiError::upstream("Failed to get monitor statistics", e))?;
    stats.map(Json).ok_or_else(|| monitor_not_found(id))
}

pub async fn handle_fleet_statistics(State(state): State<AppState>) -> impl IntoResponse {
    match state.uptime_kuma.fleet_statistics().await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => ApiError::upstream("Failed to get statistics for all monitors", e).into_response(),
    }
}

pub async fn handle_get_status_pages(State(state): State<AppState>) -> impl IntoResponse {
    match state.uptime_kuma.status_pages().await {
        Ok(pages) => Json(pages).into_response(),
        Err(e) => ApiError::upstream("Failed to get status pages", e).into_response(),
    }
}

pub async fn handle_get_status_page(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .uptime_kuma
        .status_page(&slug)
        .await
        .map_err(|e| ApiError::upstream("Failed to get status page", e))?;
    page.map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Status page {} not found", slug)))
}

// ============================================================================
// Prometheus
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct InstantQuery {
    pub query: String,
    pub time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub query: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default = "default_step")]
    pub step: String,
}

fn default_step() -> String {
    "15s".to_string()
}

#[derive(Debug, Deserialize)]
pub struct MetricsQuery {
    #[serde(rename = "match")]
    pub selector: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MetadataQuery {
    pub metric: Option<String>,
}

pub async fn handle_prometheus_query(
    State(state): State<AppState>,
    Query(q): Query<InstantQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .prometheus
        .query(&q.query, q.time)
        .await
        .map_err(|e| ApiError::upstream("Failed to execute query", e))?;
    Ok(Json(result))
}

pub async fn handle_prometheus_query_range(
    State(state): State<AppState>,
    Query(q): Query<RangeQuery>,
) -> Result<impl IntoResponse, ApiError> {
    if q.end < q.start {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "Invalid request",
            "end must not be before start",
        ));
    }
    let result = state
        .prometheus
        .query_range(&q.query, q.start, q.end, &q.step)
        .await
        .map_err(|e| ApiError::upstream("Failed to execute range query", e))?;
    Ok(Json(result))
}

pub async fn handle_prometheus_alerts(State(state): State<AppState>) -> impl IntoResponse {
    match state.prometheus.alerts().await {
        Ok(alerts) => Json(alerts).into_response(),
        Err(e) => ApiError::upstream("Failed to get alerts", e).into_response(),
    }
}

pub async fn handle_prometheus_metrics(
    State(state): State<AppState>,
    Query(q): Query<MetricsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let metrics = state
        .prometheus
        .metrics(q.selector.as_deref())
        .await
        .map_err(|e| ApiError::upstream("Failed to get metrics", e))?;
    Ok(Json(metrics))
}

pub async fn handle_prometheus_metadata(
    State(state): State<AppState>,
    Query(q): Query<MetadataQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let metadata = state
        .prometheus
        .metadata(q.metric.as_deref())
        .await
        .map_err(|e| ApiError::upstream("Failed to get metadata", e))?;
    Ok(Json(metadata))
}

// ============================================================================
// Grafana
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct DashboardsQuery {
    pub folder_id: Option<i64>,
}

pub async fn handle_get_dashboards(
    State(state): State<AppState>,
    Query(q): Query<DashboardsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let dashboards = state
        .grafana
        .dashboards(q.folder_id)
        .await
        .map_err(|e| ApiError::upstream("Failed to get dashboards", e))?;
    Ok(Json(dashboards))
}

pub async fn handle_get_dashboard(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let dashboard = state
        .grafana
        .dashboard(&uid)
        .await
        .map_err(|e| ApiError::upstream("Failed to get dashboard", e))?;
    dashboard
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Dashboard with UID {} not found", uid)))
}

pub async fn handle_create_dashboard(
    State(state): State<AppState>,
    Json(req): Json<DashboardCreate>,
) -> Result<impl IntoResponse, ApiError> {
    let dashboard = state
        .grafana
        .create_dashboard(&req)
        .await
        .map_err(|e| ApiError::upstream("Failed to create dashboard", e))?;
    Ok((StatusCode::CREATED, Json(dashboard)))
}

pub async fn handle_delete_dashboard(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> Result<StatusCode, ApiError> {
    let deleted = state
        .grafana
        .delete_dashboard(&uid)
        .await
        .map_err(|e| ApiError::upstream("Failed to delete dashboard", e))?;
    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("Dashboard with UID {} not found", uid)))
    }
}

pub async fn handle_get_folders(State(state): State<AppState>) -> impl IntoResponse {
    match state.grafana.folders().await {
        Ok(folders) => Json(folders).into_response(),
        Err(e) => ApiError::upstream("Failed to get folders", e).into_response(),
    }
}

pub async fn handle_create_folder(
    State(state): State<AppState>,
    Json(req): Json<FolderCreate>,
) -> Result<impl IntoResponse, ApiError> {
    let folder = state
        .grafana
        .create_folder(&req)
        .await
        .map_err(|e| ApiError::upstream("Failed to create folder", e))?;
    Ok((StatusCode::CREATED, Json(folder)))
}

pub async fn handle_get_datasources(State(state): State<AppState>) -> impl IntoResponse {
    match state.grafana.datasources().await {
        Ok(datasources) => Json(datasources).into_response(),
        Err(e) => ApiError::upstream("Failed to get data sources", e).into_response(),
    }
}

pub async fn handle_create_datasource(
    State(state): State<AppState>,
    Json(req): Json<DataSourceCreate>,
) -> Result<impl IntoResponse, ApiError> {
    let datasource = state
        .grafana
        .create_datasource(&req)
        .await
        .map_err(|e| ApiError::upstream("Failed to create data source", e))?;
    Ok((StatusCode::CREATED, Json(datasource)))
}

// ============================================================================
// Proxmox
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct VmsQuery {
    pub node: Option<String>,
}

fn vm_not_found(node: &str, vmid: u64) -> ApiError {
    ApiError::not_found(format!("VM {} not found on node {}", vmid, node))
}

pub async fn handle_get_nodes(State(state): State<AppState>) -> impl IntoResponse {
    match state.proxmox.nodes().await {
        Ok(nodes) => Json(nodes).into_response(),
        Err(e) => ApiError::upstream("Failed to get nodes", e).into_response(),
    }
}

pub async fn handle_get_node(
    State(state): State<AppState>,
    Path(node): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let found = state
        .proxmox
        .node(&node)
        .await
        .map_err(|e| ApiError::upstream("Failed to get node", e))?;
    found
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Node {} not found", node)))
}

pub async fn handle_get_cluster(State(state): State<AppState>) -> impl IntoResponse {
    match state.proxmox.cluster_overview().await {
        Ok(overview) => Json(overview).into_response(),
        Err(e) => ApiError::upstream("Failed to get cluster overview", e).into_response(),
    }
}

pub async fn handle_get_vms(
    State(state): State<AppState>,
    Query(q): Query<VmsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let vms = state
        .proxmox
        .vms(q.node.as_deref())
        .await
        .map_err(|e| ApiError::upstream("Failed to get VMs", e))?;
    Ok(Json(vms))
}

pub async fn handle_get_vm(
    State(state): State<AppState>,
    Path((node, vmid)): Path<(String, u64)>,
) -> Result<impl IntoResponse, ApiError> {
    let vm = state
        .proxmox
        .vm(&node, vmid)
        .await
        .map_err(|e| ApiError::upstream("Failed to get VM", e))?;
    vm.map(Json).ok_or_else(|| vm_not_found(&node, vmid))
}

pub async fn handle_create_vm(
    State(state): State<AppState>,
    Path(node): Path<String>,
    Json(req): Json<VmCreate>,
) -> Result<impl IntoResponse, ApiError> {
    let vm = state
        .proxmox
        .create_vm(&node, &req)
        .await
        .map_err(|e| ApiError::upstream("Failed to create VM", e))?;
    Ok((StatusCode::CREATED, Json(vm)))
}

pub async fn handle_start_vm(
    State(state): State<AppState>,
    Path((node, vmid)): Path<(String, u64)>,
) -> Result<impl IntoResponse, ApiError> {
    let message = state
        .proxmox
        .start_vm(&node, vmid)
        .await
        .map_err(|e| ApiError::upstream("Failed to start VM", e))?
        .ok_or_else(|| vm_not_found(&node, vmid))?;
    Ok(Json(json!({"status": "success", "message": message})))
}

pub async fn handle_stop_vm(
    State(state): State<AppState>,
    Path((node, vmid)): Path<(String, u64)>,
) -> Result<impl IntoResponse, ApiError> {
    let message = state
        .proxmox
        .stop_vm(&node, vmid)
        .await
        .map_err(|e| ApiError::upstream("Failed to stop VM", e))?
        .ok_or_else(|| vm_not_found(&node, vmid))?;
    Ok(Json(json!({"status": "success", "message": message})))
}

pub async fn handle_delete_vm(
    State(state): State<AppState>,
    Path((node, vmid)): Path<(String, u64)>,
) -> Result<StatusCode, ApiError> {
    let deleted = state
        .proxmox
        .delete_vm(&node, vmid)
        .await
        .map_err(|e| ApiError::upstream("Failed to delete VM", e))?;
    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(vm_not_found(&node, vmid))
    }
}

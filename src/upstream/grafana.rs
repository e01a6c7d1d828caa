//! Grafana HTTP API client.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;

use super::{base_url, build_http_client, send, send_json, UpstreamError};
use crate::config::GrafanaConfig;

const SERVICE: &str = "Grafana";

// ============================================================================
// Local schema
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardRead {
    pub id: Option<i64>,
    pub uid: String,
    pub title: String,
    pub url: String,
    pub folder_id: Option<i64>,
    pub folder_title: Option<String>,
    pub is_starred: bool,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardCreate {
    pub dashboard_json: Map<String, Value>,
    #[serde(default)]
    pub folder_id: i64,
    #[serde(default)]
    pub overwrite: bool,
    #[serde(default = "default_commit_message")]
    pub message: String,
}

fn default_commit_message() -> String {
    "Dashboard created via API".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderRead {
    pub id: i64,
    pub uid: String,
    pub title: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FolderCreate {
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataSourceRead {
    pub id: i64,
    pub uid: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    pub access: String,
    pub is_default: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataSourceCreate {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    #[serde(default = "default_access")]
    pub access: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub basic_auth: bool,
    pub basic_auth_user: Option<String>,
    pub basic_auth_password: Option<String>,
    #[serde(default)]
    pub with_credentials: bool,
    pub json_data: Option<Map<String, Value>>,
    pub secure_json_data: Option<Map<String, Value>>,
}

fn default_access() -> String {
    "proxy".to_string()
}

impl DataSourceCreate {
    /// Grafana's camelCase request body.
    fn to_payload(&self) -> Value {
        let mut secure = self.secure_json_data.clone().unwrap_or_default();
        if let Some(password) = &self.basic_auth_password {
            secure.insert("basicAuthPassword".to_string(), Value::from(password.clone()));
        }

        let mut payload = json!({
            "name": self.name,
            "type": self.kind,
            "url": self.url,
            "access": self.access,
            "isDefault": self.is_default,
            "basicAuth": self.basic_auth,
            "withCredentials": self.with_credentials,
        });
        if let Some(user) = &self.basic_auth_user {
            payload["basicAuthUser"] = Value::from(user.clone());
        }
        if let Some(data) = &self.json_data {
            payload["jsonData"] = Value::Object(data.clone());
        }
        if !secure.is_empty() {
            payload["secureJsonData"] = Value::Object(secure);
        }
        payload
    }
}

// ============================================================================
// Vendor shapes
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchHit {
    id: Option<i64>,
    #[serde(default)]
    uid: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    folder_id: Option<i64>,
    folder_title: Option<String>,
    #[serde(default)]
    is_starred: bool,
    #[serde(default)]
    tags: Vec<String>,
}

impl From<SearchHit> for DashboardRead {
    fn from(hit: SearchHit) -> Self {
        Self {
            id: hit.id,
            uid: hit.uid,
            title: hit.title,
            url: hit.url,
            folder_id: hit.folder_id,
            folder_title: hit.folder_title,
            is_starred: hit.is_starred,
            tags: hit.tags,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DashboardMeta {
    id: Option<i64>,
    folder_id: Option<i64>,
    folder_title: Option<String>,
    #[serde(default)]
    is_starred: bool,
}

#[derive(Debug, Default, Deserialize)]
struct DashboardBody {
    #[serde(default)]
    title: String,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DashboardEnvelope {
    #[serde(default)]
    meta: DashboardMeta,
    #[serde(default)]
    dashboard: DashboardBody,
}

impl DashboardEnvelope {
    fn into_read(self, uid: &str) -> DashboardRead {
        DashboardRead {
            id: self.meta.id,
            uid: uid.to_string(),
            title: self.dashboard.title,
            url: format!("/d/{}", uid),
            folder_id: self.meta.folder_id,
            folder_title: self.meta.folder_title,
            is_starred: self.meta.is_starred,
            tags: self.dashboard.tags,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SavedDashboard {
    uid: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDataSource {
    id: i64,
    uid: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    access: String,
    #[serde(default)]
    is_default: bool,
}

impl From<RawDataSource> for DataSourceRead {
    fn from(ds: RawDataSource) -> Self {
        Self {
            id: ds.id,
            uid: ds.uid,
            name: ds.name,
            kind: ds.kind,
            url: ds.url,
            access: ds.access,
            is_default: ds.is_default,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreatedDataSource {
    datasource: CreatedDataSourceRef,
}

#[derive(Debug, Deserialize)]
struct CreatedDataSourceRef {
    id: i64,
    uid: Option<String>,
}

// ============================================================================
// Client
// ============================================================================

pub struct GrafanaClient {
    http: reqwest::Client,
    config: GrafanaConfig,
    timeout: Duration,
}

impl GrafanaClient {
    pub fn new(config: GrafanaConfig, timeout: Duration) -> Result<Self, UpstreamError> {
        Ok(Self {
            http: build_http_client(timeout, false)?,
            config,
            timeout,
        })
    }

    pub fn is_enabled(&self) -> bool {
        !self.config.url.trim().is_empty()
    }

    fn request(&self, method: reqwest::Method, path: &str) -> Result<reqwest::RequestBuilder, UpstreamError> {
        let url = format!("{}/api/{}", base_url(&self.config.url, SERVICE)?, path);
        let request = self.http.request(method, url);
        Ok(if !self.config.api_key.is_empty() {
            request.bearer_auth(&self.config.api_key)
        } else if !self.config.username.is_empty() {
            request.basic_auth(&self.config.username, Some(&self.config.password))
        } else {
            request
        })
    }

    pub async fn check_health(&self) -> Result<(), UpstreamError> {
        let request = self.request(reqwest::Method::GET, "health")?;
        send(request, self.timeout).await.map(|_| ())
    }

    pub async fn dashboards(&self, folder_id: Option<i64>) -> Result<Vec<DashboardRead>, UpstreamError> {
        let mut request = self
            .request(reqwest::Method::GET, "search")?
            .query(&[("type", "dash-db")]);
        if let Some(folder_id) = folder_id {
            request = request.query(&[("folderIds", folder_id)]);
        }
        let hits: Vec<SearchHit> = send_json(request, self.timeout).await?;
        tracing::debug!("Retrieved {} dashboards", hits.len());
        Ok(hits.into_iter().map(DashboardRead::from).collect())
    }

    pub async fn dashboard(&self, uid: &str) -> Result<Option<DashboardRead>, UpstreamError> {
        let request = self.request(reqwest::Method::GET, &format!("dashboards/uid/{}", uid))?;
        match send_json::<DashboardEnvelope>(request, self.timeout).await {
            Ok(envelope) => Ok(Some(envelope.into_read(uid))),
            Err(e) if e.is_not_found() => {
                tracing::warn!("Dashboard {} not found", uid);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn create_dashboard(&self, dashboard: &DashboardCreate) -> Result<DashboardRead, UpstreamError> {
        let payload = json!({
            "dashboard": dashboard.dashboard_json,
            "folderId": dashboard.folder_id,
            "overwrite": dashboard.overwrite,
            "message": dashboard.message,
        });
        let request = self
            .request(reqwest::Method::POST, "dashboards/db")?
            .json(&payload);
        let saved: SavedDashboard = send_json(request, self.timeout).await?;
        tracing::info!("Created dashboard {}", saved.uid);

        self.dashboard(&saved.uid)
            .await?
            .ok_or_else(|| UpstreamError::Decode(format!("dashboard {} missing after save", saved.uid)))
    }

    /// Delete a dashboard. Returns `false` when it does not exist.
    pub async fn delete_dashboard(&self, uid: &str) -> Result<bool, UpstreamError> {
        let request = self.request(reqwest::Method::DELETE, &format!("dashboards/uid/{}", uid))?;
        match send(request, self.timeout).await {
            Ok(_) => {
                tracing::info!("Deleted dashboard {}", uid);
                Ok(true)
            }
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn folders(&self) -> Result<Vec<FolderRead>, UpstreamError> {
        let request = self.request(reqwest::Method::GET, "folders")?;
        send_json(request, self.timeout).await
    }

    pub async fn create_folder(&self, folder: &FolderCreate) -> Result<FolderRead, UpstreamError> {
        let request = self
            .request(reqwest::Method::POST, "folders")?
            .json(&json!({"title": folder.title}));
        let created: FolderRead = send_json(request, self.timeout).await?;
        tracing::info!("Created folder {}", created.uid);
        Ok(created)
    }

    pub async fn datasources(&self) -> Result<Vec<DataSourceRead>, UpstreamError> {
        let request = self.request(reqwest::Method::GET, "datasources")?;
        let raw: Vec<RawDataSource> = send_json(request, self.timeout).await?;
        Ok(raw.into_iter().map(DataSourceRead::from).collect())
    }

    pub async fn create_datasource(&self, datasource: &DataSourceCreate) -> Result<DataSourceRead, UpstreamError> {
        let request = self
            .request(reqwest::Method::POST, "datasources")?
            .json(&datasource.to_payload());
        let created: CreatedDataSource = send_json(request, self.timeout).await?;
        tracing::info!("Created data source {}", created.datasource.id);

        Ok(DataSourceRead {
            id: created.datasource.id,
            uid: created.datasource.uid,
            name: datasource.name.clone(),
            kind: datasource.kind.clone(),
            url: datasource.url.clone(),
            access: datasource.access.clone(),
            is_default: datasource.is_default,
        })
    }
}

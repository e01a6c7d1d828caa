//! Proxmox VE API client.
//!
//! Authenticates with a ticket (`PVEAuthCookie`) and sends the CSRF token on
//! every write. Node listings and the cluster overview go through the TTL
//! cache.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use super::{base_url, build_http_client, send_json, UpstreamError};
use crate::cache::TtlCache;
use crate::config::ProxmoxConfig;

const SERVICE: &str = "Proxmox";
/// Tickets are valid for two hours; renew well before that.
const TICKET_LIFETIME: Duration = Duration::from_secs(90 * 60);

// ============================================================================
// Local schema
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterNode {
    pub id: String,
    pub node: String,
    pub status: String,
    pub cpu: Option<f64>,
    pub memory: Option<u64>,
    pub uptime: Option<u64>,
    pub ip: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClusterOverview {
    pub nodes: usize,
    pub vms: usize,
    pub storage: usize,
    pub total_cpu: f64,
    pub total_memory: u64,
    pub total_disk: u64,
}

impl ClusterOverview {
    /// Count and total the entries of `/cluster/resources`.
    pub fn from_resources(resources: &[ClusterResource]) -> Self {
        let mut overview = Self::default();
        for resource in resources {
            match resource.kind.as_str() {
                "node" => {
                    overview.nodes += 1;
                    overview.total_cpu += resource.maxcpu.unwrap_or(0.0);
                    overview.total_memory += resource.maxmem.unwrap_or(0);
                }
                "storage" => {
                    overview.storage += 1;
                    overview.total_disk += resource.maxdisk.unwrap_or(0);
                }
                "qemu" | "lxc" => overview.vms += 1,
                _ => {}
            }
        }
        overview
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VmRead {
    pub vmid: u64,
    pub name: String,
    pub status: String,
    pub node: String,
    pub cpu: Option<f64>,
    pub memory: Option<u64>,
    pub disk: Option<u64>,
    pub uptime: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VmCreate {
    pub name: String,
    pub vmid: Option<u64>,
    pub cores: u32,
    /// Memory in MB.
    pub memory: u64,
    /// Disk size in GB, allocated on `storage`.
    pub disk: Option<String>,
    pub net0: Option<String>,
    #[serde(default = "default_ostype")]
    pub ostype: String,
    pub storage: String,
    /// ISO volume attached as CD-ROM.
    pub iso: Option<String>,
}

fn default_ostype() -> String {
    "other".to_string()
}

impl VmCreate {
    fn to_form(&self, vmid: u64) -> Vec<(&'static str, String)> {
        let mut form = vec![
            ("vmid", vmid.to_string()),
            ("name", self.name.clone()),
            ("cores", self.cores.to_string()),
            ("memory", self.memory.to_string()),
            ("ostype", self.ostype.clone()),
        ];
        if let Some(disk) = &self.disk {
            form.push(("scsi0", format!("{}:{}", self.storage, disk)));
        }
        if let Some(net0) = &self.net0 {
            form.push(("net0", net0.clone()));
        }
        if let Some(iso) = &self.iso {
            form.push(("ide2", format!("{},media=cdrom", iso)));
        }
        form
    }
}

// ============================================================================
// Vendor shapes
// ============================================================================

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct TicketData {
    ticket: String,
    #[serde(rename = "CSRFPreventionToken")]
    csrf_token: String,
}

#[derive(Debug, Clone)]
struct Ticket {
    ticket: String,
    csrf_token: String,
    issued_at: Instant,
}

#[derive(Debug, Deserialize)]
struct RawNode {
    #[serde(default)]
    id: String,
    node: String,
    #[serde(default)]
    status: String,
    cpu: Option<f64>,
    mem: Option<u64>,
    uptime: Option<u64>,
    #[serde(default)]
    ip: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawMemory {
    used: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawNodeStatus {
    #[serde(default)]
    status: Option<String>,
    cpu: Option<f64>,
    #[serde(default)]
    memory: RawMemory,
    uptime: Option<u64>,
    #[serde(default)]
    ip: String,
}

/// One entry of `/cluster/resources`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterResource {
    #[serde(rename = "type")]
    pub kind: String,
    pub maxcpu: Option<f64>,
    pub maxmem: Option<u64>,
    pub maxdisk: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawVm {
    vmid: u64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    status: String,
    cpu: Option<f64>,
    maxmem: Option<u64>,
    maxdisk: Option<u64>,
    uptime: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawVmConfig {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawVmStatus {
    #[serde(default)]
    status: String,
    cpus: Option<f64>,
    maxmem: Option<u64>,
    uptime: Option<u64>,
}

// ============================================================================
// Client
// ============================================================================

pub struct ProxmoxClient {
    http: reqwest::Client,
    config: ProxmoxConfig,
    timeout: Duration,
    ticket: Mutex<Option<Ticket>>,
    nodes_cache: TtlCache<Vec<ClusterNode>>,
    overview_cache: TtlCache<ClusterOverview>,
}

impl ProxmoxClient {
    pub fn new(config: ProxmoxConfig, timeout: Duration, cache_ttl: Duration) -> Result<Self, UpstreamError> {
        Ok(Self {
            http: build_http_client(timeout, !config.verify_ssl)?,
            config,
            timeout,
            ticket: Mutex::new(None),
            nodes_cache: TtlCache::new(cache_ttl),
            overview_cache: TtlCache::new(cache_ttl),
        })
    }

    pub fn is_enabled(&self) -> bool {
        !self.config.url.trim().is_empty()
    }

    fn api_url(&self, path: &str) -> Result<String, UpstreamError> {
        Ok(format!("{}/api2/json/{}", base_url(&self.config.url, SERVICE)?, path))
    }

    async fn login(&self) -> Result<Ticket, UpstreamError> {
        let mut guard = self.ticket.lock().await;
        if let Some(ticket) = guard.as_ref() {
            if ticket.issued_at.elapsed() < TICKET_LIFETIME {
                return Ok(ticket.clone());
            }
        }

        let request = self.http.post(self.api_url("access/ticket")?).form(&[
            ("username", self.config.username.as_str()),
            ("password", self.config.password.as_str()),
        ]);
        let envelope: Envelope<TicketData> = send_json(request, self.timeout)
            .await
            .map_err(|e| match e {
                UpstreamError::Status { status: 401, .. } => {
                    UpstreamError::Auth("Proxmox rejected the configured credentials".to_string())
                }
                other => other,
            })?;

        let ticket = Ticket {
            ticket: envelope.data.ticket,
            csrf_token: envelope.data.csrf_token,
            issued_at: Instant::now(),
        };
        tracing::info!("Authenticated with Proxmox API");
        *guard = Some(ticket.clone());
        Ok(ticket)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        form: Option<&[(&'static str, String)]>,
    ) -> Result<T, UpstreamError> {
        let ticket = self.login().await?;
        let is_write = method != reqwest::Method::GET;
        let mut request = self
            .http
            .request(method, self.api_url(path)?)
            .header(reqwest::header::COOKIE, format!("PVEAuthCookie={}", ticket.ticket));
        if is_write {
            request = request.header("CSRFPreventionToken", ticket.csrf_token);
        }
        if let Some(form) = form {
            request = request.form(form);
        }
        let envelope: Envelope<T> = send_json(request, self.timeout).await?;
        Ok(envelope.data)
    }

    pub async fn check_health(&self) -> Result<(), UpstreamError> {
        self.call::<Value>(reqwest::Method::GET, "version", None)
            .await
            .map(|_| ())
    }

    async fn raw_nodes(&self) -> Result<Vec<RawNode>, UpstreamError> {
        self.call(reqwest::Method::GET, "nodes", None).await
    }

    pub async fn nodes(&self) -> Result<Vec<ClusterNode>, UpstreamError> {
        self.nodes_cache
            .get_or_fetch("nodes", || async {
                let nodes = self.raw_nodes().await?;
                tracing::debug!("Retrieved {} nodes from Proxmox", nodes.len());
                Ok(nodes
                    .into_iter()
                    .map(|n| ClusterNode {
                        id: n.id,
                        node: n.node,
                        status: n.status,
                        cpu: n.cpu,
                        memory: n.mem,
                        uptime: n.uptime,
                        ip: n.ip,
                    })
                    .collect())
            })
            .await
    }

    pub async fn node(&self, name: &str) -> Result<Option<ClusterNode>, UpstreamError> {
        let known = self.raw_nodes().await?;
        if !known.iter().any(|n| n.node == name) {
            tracing::warn!("Node {} not found", name);
            return Ok(None);
        }

        let status: RawNodeStatus = self
            .call(reqwest::Method::GET, &format!("nodes/{}/status", name), None)
            .await?;
        Ok(Some(ClusterNode {
            id: name.to_string(),
            node: name.to_string(),
            status: status.status.unwrap_or_else(|| "online".to_string()),
            cpu: status.cpu,
            memory: status.memory.used,
            uptime: status.uptime,
            ip: status.ip,
        }))
    }

    pub async fn cluster_overview(&self) -> Result<ClusterOverview, UpstreamError> {
        self.overview_cache
            .get_or_fetch("cluster_overview", || async {
                let resources: Vec<ClusterResource> = self
                    .call(reqwest::Method::GET, "cluster/resources", None)
                    .await?;
                Ok(ClusterOverview::from_resources(&resources))
            })
            .await
    }

    /// QEMU VMs on one node, or on every node when `node` is `None`.
    pub async fn vms(&self, node: Option<&str>) -> Result<Vec<VmRead>, UpstreamError> {
        let node_names: Vec<String> = match node {
            Some(node) => vec![node.to_string()],
            None => self.raw_nodes().await?.into_iter().map(|n| n.node).collect(),
        };

        let mut result = Vec::new();
        for node_name in node_names {
            let vms: Vec<RawVm> = self
                .call(reqwest::Method::GET, &format!("nodes/{}/qemu", node_name), None)
                .await?;
            result.extend(vms.into_iter().map(|vm| VmRead {
                vmid: vm.vmid,
                name: vm.name,
                status: vm.status,
                node: node_name.clone(),
                cpu: vm.cpu,
                memory: vm.maxmem,
                disk: vm.maxdisk,
                uptime: vm.uptime,
            }));
        }
        Ok(result)
    }

    pub async fn vm(&self, node: &str, vmid: u64) -> Result<Option<VmRead>, UpstreamError> {
        let base = format!("nodes/{}/qemu/{}", node, vmid);
        let config: RawVmConfig = match self
            .call(reqwest::Method::GET, &format!("{}/config", base), None)
            .await
        {
            Ok(config) => config,
            // Proxmox answers 500 for a VM id it does not know.
            Err(UpstreamError::Status { status: 404 | 500, .. }) => {
                tracing::warn!("VM {} not found on node {}", vmid, node);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        let status: RawVmStatus = self
            .call(reqwest::Method::GET, &format!("{}/status/current", base), None)
            .await?;

        Ok(Some(VmRead {
            vmid,
            name: config.name,
            status: status.status,
            node: node.to_string(),
            cpu: status.cpus,
            memory: status.maxmem,
            disk: None,
            uptime: status.uptime,
        }))
    }

    pub async fn create_vm(&self, node: &str, vm: &VmCreate) -> Result<VmRead, UpstreamError> {
        let vmid = match vm.vmid {
            Some(vmid) => vmid,
            None => {
                let next: Value = self.call(reqwest::Method::GET, "cluster/nextid", None).await?;
                parse_vmid(&next)
                    .ok_or_else(|| UpstreamError::Decode(format!("invalid next VM id: {}", next)))?
            }
        };

        let task: Value = self
            .call(
                reqwest::Method::POST,
                &format!("nodes/{}/qemu", node),
                Some(&vm.to_form(vmid)),
            )
            .await?;
        tracing::info!("Created VM {} on node {} (task {})", vmid, node, task);

        self.vm(node, vmid)
            .await?
            .ok_or_else(|| UpstreamError::Decode(format!("VM {} missing after creation", vmid)))
    }

    async fn vm_status_action(&self, node: &str, vmid: u64, action: &str) -> Result<Option<String>, UpstreamError> {
        if self.vm(node, vmid).await?.is_none() {
            return Ok(None);
        }
        let _task: Value = self
            .call(
                reqwest::Method::POST,
                &format!("nodes/{}/qemu/{}/status/{}", node, vmid, action),
                Some(&[]),
            )
            .await?;
        tracing::info!("VM {} {} initiated on node {}", vmid, action, node);
        Ok(Some(format!("VM {} {} initiated", vmid, action)))
    }

    /// Start a VM. `None` when the VM does not exist.
    pub async fn start_vm(&self, node: &str, vmid: u64) -> Result<Option<String>, UpstreamError> {
        self.vm_status_action(node, vmid, "start").await
    }

    /// Stop a VM. `None` when the VM does not exist.
    pub async fn stop_vm(&self, node: &str, vmid: u64) -> Result<Option<String>, UpstreamError> {
        self.vm_status_action(node, vmid, "stop").await
    }

    /// Delete a VM. Returns `false` when it does not exist.
    pub async fn delete_vm(&self, node: &str, vmid: u64) -> Result<bool, UpstreamError> {
        if self.vm(node, vmid).await?.is_none() {
            return Ok(false);
        }
        let _task: Value = self
            .call(
                reqwest::Method::DELETE,
                &format!("nodes/{}/qemu/{}", node, vmid),
                None,
            )
            .await?;
        tracing::info!("Deleted VM {} on node {}", vmid, node);
        Ok(true)
    }
}

fn parse_vmid(value: &Value) -> Option<u64> {
    match value {
        Value::String(s) => s.parse().ok(),
        other => other.as_u64(),
    }
}

//! ServiceMesh server binary.

use servicemesh::auth::ADMIN_USERNAME;
use servicemesh::config::ServerConfig;
use servicemesh::db::Store;
use servicemesh::web::{AppState, Server};

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Load configuration
    let cfg = ServerConfig::load();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(format!("servicemesh={}", cfg.log_level).parse()?))
        .init();

    tracing::info!("Starting ServiceMesh on port {}...", cfg.http_port);
    tracing::info!("Using database at {}", cfg.db_path);

    // Initialize database
    let store = Arc::new(Store::new(&cfg.db_path)?);
    tracing::info!("Database initialized successfully");

    let admin_password = cfg.admin_default_password.clone();
    let state = AppState::from_config(cfg, store)?;

    // Seed the admin account on first start
    if let Some(password) = admin_password {
        if state.credentials.ensure_admin(&password)? {
            tracing::info!("Created default superuser {}", ADMIN_USERNAME);
        }
    }

    for (name, enabled) in [
        ("Uptime Kuma", state.uptime_kuma.is_enabled()),
        ("Prometheus", state.prometheus.is_enabled()),
        ("Grafana", state.grafana.is_enabled()),
        ("Proxmox", state.proxmox.is_enabled()),
    ] {
        if !enabled {
            tracing::warn!("{} is not configured; its routes will return errors", name);
        }
    }

    // Start web server
    let server = Server::new(state);
    server.start().await?;

    Ok(())
}

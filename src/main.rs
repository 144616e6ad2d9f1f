//! Evidence Registry Daemon
//!
//! ## Usage
//!
//! ```bash
//! # Start with defaults
//! evidence-registry
//!
//! # Start with custom config
//! evidence-registry --config /path/to/config.toml
//!
//! # Custom port, storage directory and identifier domain
//! evidence-registry --http-port 8096 --storage-dir /data/registry --domain-id audit-log
//! ```
//!
//! See [`evidence_registry::http`] for the HTTP API.

use anyhow::Context;
use clap::Parser;
use evidence_registry::services::events::spawn_logging_listener;
use evidence_registry::{Config, HttpServer, RegistryDb, Services, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "evidence-registry")]
#[command(about = "Append-only evidence registry with provenance tracking")]
struct Args {
    /// Path to config file
    #[arg(short, long, env = "EVIDENCE_REGISTRY_CONFIG")]
    config: Option<PathBuf>,

    /// Storage directory
    #[arg(long, env = "EVIDENCE_REGISTRY_STORAGE_DIR")]
    storage_dir: Option<PathBuf>,

    /// HTTP API port
    #[arg(long, env = "EVIDENCE_REGISTRY_HTTP_PORT")]
    http_port: Option<u16>,

    /// Domain separation constant for main identifiers
    #[arg(long, env = "EVIDENCE_REGISTRY_DOMAIN_ID")]
    domain_id: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("evidence_registry=info".parse()?),
        )
        .init();

    let args = Args::parse();

    // Load config
    let mut config = if let Some(config_path) = &args.config {
        Config::load(config_path)
            .with_context(|| format!("loading config {}", config_path.display()))?
    } else {
        Config::default()
    };

    // Apply CLI overrides
    if let Some(dir) = args.storage_dir {
        config.storage_dir = dir;
    }
    if let Some(port) = args.http_port {
        config.http_port = port;
    }
    if let Some(domain_id) = args.domain_id {
        config.domain_id = domain_id;
    }
    config.validate()?;

    info!(
        storage_dir = %config.storage_dir.display(),
        http_port = config.http_port,
        domain_id = %config.domain_id,
        protocol = PROTOCOL_VERSION,
        "Starting evidence-registry"
    );

    // Ensure storage directory exists
    tokio::fs::create_dir_all(&config.storage_dir).await?;

    // Save default config if it doesn't exist
    let config_path = config.config_path();
    if !config_path.exists() {
        config.save(&config_path)?;
        info!(path = %config_path.display(), "Created default config");
    }

    let db = Arc::new(
        RegistryDb::open(config.db_path(), config.cache_capacity_bytes)
            .context("opening registry database")?,
    );
    let services = Arc::new(Services::new(db, &config));
    let listener = spawn_logging_listener(Arc::clone(&services.events));

    let http_addr: SocketAddr = format!("{}:{}", config.bind_address, config.http_port)
        .parse()
        .context("parsing bind address")?;
    let http_server = Arc::new(HttpServer::new(Arc::clone(&services), http_addr));

    info!("HTTP API available at http://{}", http_addr);
    info!("Endpoints:");
    info!("  GET  /health                   - Health check");
    info!("  GET  /version                  - Protocol revision");
    info!("  POST /evidence                 - Submit evidence");
    info!("  GET  /evidence/{{id}}            - Query evidence");
    info!("  PUT  /evidence/{{id}}/resources  - Update resource locator");
    info!("  POST /evidence/{{id}}/extra      - Attach extra info");
    info!("  GET  /evidence/{{id}}/extra      - List attachments");
    info!("  GET  /extra/{{id}}               - Query extra info");
    info!("  WS   /events                   - Registry event stream");
    info!("Press Ctrl+C to stop.");

    // Handle shutdown signal
    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutting down...");
    };

    tokio::select! {
        result = http_server.run() => {
            if let Err(e) = result {
                error!(error = %e, "HTTP server error");
            }
        }
        _ = shutdown => {}
    }

    listener.abort();
    services.flush()?;

    if let Ok(stats) = services.stats() {
        info!(
            evidence = stats.evidence_count,
            extra_info = stats.extra_info_count,
            global_counter = stats.global_counter,
            "Final registry stats"
        );
    }

    Ok(())
}

//! vgate-ad (Access Decision) - gate access decision service
//!
//! Receives plate detections from the perception system, decides
//! authorized / denied / pending against the resident and guest registries,
//! and records every decision in the access ledger.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vgate_ad::policy::AccessPolicyConfig;
use vgate_ad::{build_router, AppState};
use vgate_common::config::{CompiledDefaults, RootFolderInitializer, RootFolderResolver, TomlConfig};
use vgate_common::EventBus;

const MODULE_NAME: &str = "vgate-ad";
const DEFAULT_PORT: u16 = 5870;

/// Command-line arguments for vgate-ad
#[derive(Parser, Debug)]
#[command(name = "vgate-ad")]
#[command(about = "Gate access decision service")]
#[command(version)]
struct Args {
    /// Root folder holding the database (overrides VGATE_ROOT_FOLDER and TOML)
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "VGATE_AD_PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(short, long, env = "VGATE_AD_BIND")]
    bind: Option<String>,
}

/// Default filter when RUST_LOG is unset
fn default_filter(level: &str) -> String {
    if level.contains('=') {
        level.to_string()
    } else {
        format!("vgate_ad={0},vgate_common={0},tower_http={0}", level)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let toml_config = TomlConfig::load_for_module(MODULE_NAME);
    let defaults = CompiledDefaults::for_current_platform();

    let log_level = match toml_config.logging.level.trim() {
        "" => defaults.log_level.clone(),
        level => level.to_string(),
    };
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(&log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting VGate Access Decision ({}) v{} [{}] built {} ({})",
        MODULE_NAME,
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let bind_address = args
        .bind
        .or_else(|| toml_config.bind_address.clone())
        .unwrap_or(defaults.bind_address);
    let port = args.port.or(toml_config.port).unwrap_or(DEFAULT_PORT);

    let root_folder = RootFolderResolver::new(args.root_folder, toml_config).resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;

    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());

    let pool = vgate_common::db::init_database(&db_path)
        .await
        .context("Failed to open database")?;

    let policy = AccessPolicyConfig::load(&pool)
        .await
        .context("Failed to load access policy")?;
    info!(
        plate_threshold = policy.plate_confidence_threshold,
        retention_days = policy.attempt_retention_days,
        fallback = policy.allow_perception_fallback,
        "Access policy loaded"
    );

    let event_bus = EventBus::new(256);
    let state = AppState::new(pool, event_bus, policy);
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", bind_address, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind_address, port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}

//! pks-lot - parking lot exit sequencing service
//!
//! Startup: parse CLI, initialize tracing, load bootstrap TOML, resolve the
//! root folder, ensure the database schema, build the verifier, serve HTTP.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use pks_common::config::{default_config_path, load_toml_config, RootFolderInitializer, RootFolderResolver};
use pks_common::db::init_database;
use pks_lot::verifier::webdriver::WebDriverClient;
use pks_lot::verifier::{AttributeVerifier, VerifierConfig};
use pks_lot::{build_router, logging, AppState};
use tokio::signal;
use tracing::info;

/// Command-line arguments for pks-lot
#[derive(Parser, Debug)]
#[command(name = "pks-lot")]
#[command(about = "Parking lot exit sequencing service")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides config file)
    #[arg(short, long, env = "PKS_PORT")]
    port: Option<u16>,

    /// Root folder holding pks.db
    #[arg(short, long, env = "PKS_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Bootstrap TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// WebDriver endpoint for low-emission lookups (overrides config file)
    #[arg(long, env = "PKS_WEBDRIVER_URL")]
    webdriver_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_filter = logging::init();

    let config_path = args.config.clone().or_else(|| default_config_path("lot"));
    let config = load_toml_config(config_path.as_deref()).context("Failed to load config file")?;
    logging::apply_level(&log_filter, &config.logging.level).context("Failed to apply log level")?;

    info!("Starting PKS lot service (pks-lot) v{}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &config_path {
        info!("Config file: {}", path.display());
    }

    let root_folder = RootFolderResolver::new("lot")
        .with_cli_arg(args.root_folder.clone())
        .with_config(&config)
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer.ensure_directory_exists()?;

    let db_path = initializer.database_path();
    info!("Database path: {}", db_path.display());
    let pool = init_database(&db_path)
        .await
        .context("Failed to initialize database")?;

    let webdriver_url = args.webdriver_url.unwrap_or(config.webdriver_url.clone());
    let driver = WebDriverClient::new(webdriver_url.as_str()).context("Failed to create WebDriver client")?;
    let verifier_config = VerifierConfig::load(&pool).await?;
    info!(
        webdriver = %webdriver_url,
        headless = verifier_config.headless,
        attempt_budget = ?verifier_config.attempt_budget(),
        "Low-emission verifier ready"
    );
    let verifier = Arc::new(AttributeVerifier::new(Arc::new(driver), verifier_config));

    let state = AppState::new(pool, verifier, config.lane_count);
    let app = build_router(state);

    let port = args.port.unwrap_or(config.port);
    let addr: SocketAddr = format!("{}:{}", config.bind_address, port)
        .parse()
        .context("Invalid bind address")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("pks-lot listening on http://{}", addr);
    info!("Lanes: 1..={}", config.lane_count);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}

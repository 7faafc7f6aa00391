//! booknook-web - Book Nook HTTP service
//!
//! Book discovery over an external catalog plus community reviews kept
//! in a document store. Configuration resolves CLI → ENV → TOML →
//! default; missing required configuration or store secrets abort
//! startup with the variable to set.

use anyhow::{Context, Result};
use booknook_common::config::TomlConfig;
use booknook_common::store::{SharedConnection, SqliteConnector};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use booknook_web::catalog::CatalogClient;
use booknook_web::config::{CliOverrides, ServiceConfig};
use booknook_web::{build_router, AppState};

/// Command-line arguments for booknook-web
#[derive(Parser, Debug)]
#[command(name = "booknook-web")]
#[command(about = "Book discovery and community review service")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "BOOKNOOK_PORT")]
    port: Option<u16>,

    /// Path to config.toml
    #[arg(short, long, env = "BOOKNOOK_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the document store database
    #[arg(short, long, env = "BOOKNOOK_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Build identification first, before any slow startup step
    info!(
        "Starting Book Nook (booknook-web) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let toml = TomlConfig::load(args.config.as_deref()).context("Failed to load config.toml")?;
    let cli = CliOverrides {
        port: args.port,
        data_dir: args.data_dir,
    };
    let config = ServiceConfig::resolve(&cli, &toml).context("Invalid configuration")?;

    let connection = Arc::new(SharedConnection::new(SqliteConnector::new(
        config.data_dir.clone(),
    )));

    // Construct the store now so missing secrets stop startup
    match connection.get_shared_connection().await {
        Ok(store) => info!("✓ Document store ready ({})", store.name()),
        Err(e) => {
            error!("Failed to initialize document store: {}", e);
            return Err(e).context("Document store initialization failed");
        }
    }

    let catalog = CatalogClient::new(&config.catalog_base_url, &config.catalog_api_key)
        .context("Failed to build catalog client")?;

    let state = AppState::new(connection.clone(), catalog, config.public_config());
    let shutdown = state.shutdown.clone();
    let app = build_router(state);

    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("booknook-web listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .context("Server error")?;

    connection.shutdown().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM, cancelling `shutdown` so open SSE
/// streams end and graceful shutdown can drain
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }

    shutdown.cancel();
}

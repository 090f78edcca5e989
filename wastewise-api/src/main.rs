//! WasteWise API (wastewise-api) - Main entry point
//!
//! Article, user, waste bank and subscription backend with proxies to the
//! ML classifier and the Midtrans payment gateway.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wastewise_api::{build_router, AppState};
use wastewise_common::config::{load_toml_config, ConfigOverrides, ServiceConfig};
use wastewise_common::db::init_database;

/// Command-line arguments for wastewise-api
#[derive(Parser, Debug)]
#[command(name = "wastewise-api")]
#[command(about = "Waste classification backend API")]
#[command(version)]
struct Args {
    /// Host to bind
    #[arg(long, env = "HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// SQLite database file
    #[arg(long = "database", env = "DATABASE_PATH")]
    database_path: Option<PathBuf>,

    /// Directory for article cover images
    #[arg(long, env = "UPLOAD_DIR")]
    upload_dir: Option<PathBuf>,

    /// Deployment environment name
    #[arg(long, env = "APP_ENV")]
    environment: Option<String>,

    #[arg(long, env = "ML_SERVICE_URL")]
    ml_service_url: Option<String>,

    #[arg(long, env = "FRONTEND_URL")]
    frontend_url: Option<String>,

    /// "sandbox" or "production"
    #[arg(long, env = "MIDTRANS_ENV")]
    midtrans_env: Option<String>,

    #[arg(long, env = "MIDTRANS_SERVER_KEY", hide_env_values = true)]
    midtrans_server_key: Option<String>,

    #[arg(long, env = "MIDTRANS_CLIENT_KEY", hide_env_values = true)]
    midtrans_client_key: Option<String>,

    /// TOML config file (defaults to <config dir>/wastewise/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            host: self.host.clone(),
            port: self.port,
            database_path: self.database_path.clone(),
            upload_dir: self.upload_dir.clone(),
            environment: self.environment.clone(),
            ml_service_url: self.ml_service_url.clone(),
            frontend_url: self.frontend_url.clone(),
            midtrans_environment: self.midtrans_env.clone(),
            midtrans_server_key: self.midtrans_server_key.clone(),
            midtrans_client_key: self.midtrans_client_key.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env must be loaded before clap reads the environment
    dotenv::dotenv().ok();

    let args = Args::parse();

    let toml_config =
        load_toml_config(args.config.as_deref()).context("Failed to load config file")?;
    let config = ServiceConfig::resolve(args.overrides(), toml_config)
        .context("Invalid configuration")?;

    // Initialize tracing; RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("wastewise_api={0},wastewise_common={0},tower_http=info", config.log_level)
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting WasteWise API v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!(
        environment = %config.environment,
        database = %config.database_path.display(),
        upload_dir = %config.upload_dir.display(),
        ml_service = %config.ml_service_url,
        "Configuration resolved"
    );

    if !config.midtrans.is_configured() {
        warn!("Midtrans keys are not configured; payment routes will fail");
    }
    info!(mode = config.midtrans.mode.as_str(), "Midtrans mode");

    let pool = init_database(&config.database_path)
        .await
        .context("Failed to initialize database")?;

    let bind_address = config.bind_address();
    let state = AppState::new(pool, config).context("Failed to build application state")?;
    state
        .images
        .ensure_dir()
        .await
        .context("Failed to create upload directory")?;

    let app = build_router(state);

    info!("Starting HTTP server on {}", bind_address);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_address))?;

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
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
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
}

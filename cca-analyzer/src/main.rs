//! cca-analyzer - Cultural Context Analyzer service
//!
//! **Module Identity:**
//! - Name: cca-analyzer
//! - Default port: 5780
//!
//! Configuration precedence: command line → environment → TOML → defaults.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cca_analyzer::services::{EntityDetector, GeminiClient, LexiconDetector};
use cca_analyzer::{ApiSettings, AppState};
use cca_common::config::{self, BootstrapOverrides, ServiceConfig};

/// Command-line arguments for cca-analyzer
#[derive(Parser, Debug)]
#[command(name = "cca-analyzer")]
#[command(about = "Cultural Context Analyzer HTTP service")]
#[command(version)]
struct Args {
    /// TOML config file (default: platform config dir)
    #[arg(short, long, env = "CCA_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "CCA_PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(short, long, env = "CCA_BIND_ADDRESS")]
    bind: Option<String>,

    /// SQLite database file
    #[arg(short, long, env = "CCA_DATABASE_PATH")]
    database: Option<PathBuf>,

    /// Default log directive, e.g. "debug" or "cca_analyzer=trace" (RUST_LOG wins)
    #[arg(long, env = "CCA_LOG")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config is read before logging starts so its level can seed the filter
    let toml_config = config::load_toml_config(args.config.as_deref())
        .context("Failed to load configuration")?;
    let service_config = ServiceConfig::resolve(
        BootstrapOverrides {
            bind_address: args.bind,
            port: args.port,
            database_path: args.database,
            log_level: args.log_level,
        },
        toml_config,
    )
    .context("Invalid configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| service_config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting cca-analyzer v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE"),
    );

    let db_pool = cca_common::db::init_database(&service_config.database_path)
        .await
        .context("Failed to open database")?;
    info!(path = %service_config.database_path.display(), "Database ready");

    let backend = GeminiClient::new(&service_config.generative)
        .context("Failed to create generative backend client")?;
    info!(
        model = backend.model(),
        configured = backend.is_configured(),
        "Generative backend ready"
    );

    let detector: Arc<dyn EntityDetector> = match &service_config.lexicon_path {
        Some(path) => Arc::new(
            LexiconDetector::with_lexicon_file(path).context("Failed to load entity lexicon")?,
        ),
        None => Arc::new(LexiconDetector::builtin()),
    };

    let state = AppState::new(
        db_pool,
        Arc::new(backend),
        detector,
        service_config.cache_ttl_days,
        ApiSettings {
            max_text_chars: service_config.max_text_chars,
            allowed_origins: service_config.allowed_origins.clone(),
        },
    );

    let app = cca_analyzer::build_router(state);

    let addr: SocketAddr = format!("{}:{}", service_config.bind_address, service_config.port)
        .parse()
        .with_context(|| {
            format!(
                "Invalid bind address {}:{}",
                service_config.bind_address, service_config.port
            )
        })?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM
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
                warn!("Failed to install SIGTERM handler: {}", e);
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

//! pcoq-server - Planning Center People query service
//!
//! Serves the browser UI and proxies searches, exports and bulk updates to
//! the PCO People API through one rate-limited client.

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pcoq_server::config::{Args, ServerConfig};
use pcoq_server::services::PcoClient;
use pcoq_server::session::SessionStore;
use pcoq_server::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logging comes up before config loading so config warnings are visible;
    // the configured level only applies when RUST_LOG is unset.
    let default_level = args.log_level.clone().unwrap_or_else(|| "info".to_string());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("pcoq_server={0},pcoq_common={0},tower_http={0}", default_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting pcoq-server v{} (git {}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let config = ServerConfig::load(&args).context("Failed to load configuration")?;

    let pco = PcoClient::new(config.pco.clone()).context("Failed to build PCO client")?;
    let sessions = SessionStore::new(config.session_ttl);
    let state =
        AppState::new(pco, sessions, config.bulk_concurrency).with_body_limit(config.max_body_bytes);

    let app = pcoq_server::build_router(state);

    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
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

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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

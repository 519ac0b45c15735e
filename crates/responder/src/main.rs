//! Pod Responder - deletes pods named by Falco alerts
//!
//! Runs as a Deployment next to falcosidekick, receiving one webhook
//! per Falco event and deleting the offending pod.

use anyhow::{Context, Result};
use responder_lib::{api, initialize, StructuredLogger};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

const RESPONDER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = config::ResponderConfig::load().context("Failed to load configuration")?;
    let settings = config.responder_settings();

    let instance = std::env::var("HOSTNAME").unwrap_or_else(|_| "pod-responder".to_string());
    let logger = StructuredLogger::new(instance);
    logger.log_startup(RESPONDER_VERSION, settings.credentials.kind());

    // No traffic is served without a working cluster client
    let state = match initialize(&settings, logger.clone()).await {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!(error = %e, "Startup failed");
            return Err(e).context("Failed to initialize cluster access");
        }
    };

    let shutdown_logger = logger.clone();
    let shutdown = async move {
        let reason = shutdown_signal().await;
        shutdown_logger.log_shutdown(reason);
    };

    api::serve(config.api_port, &config.alert_path, state, shutdown)
        .await
        .context("API server failed")?;

    info!("Shutting down");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM, returning which one arrived
async fn shutdown_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => "SIGINT received",
        _ = terminate => "SIGTERM received",
    }
}

//! AssetDesk server - main entry point.

use std::sync::Arc;

use anyhow::Context;
use assetdesk_core::{
    api::{self, AppState},
    config::Config,
    middleware::{AuthLayer, Authenticator},
    rbac::{self, FieldPolicy},
    telemetry::{init_logging, init_metrics},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = match std::env::var("ASSETDESK_CONFIG") {
        Ok(path) => Config::from_file(&path),
        Err(_) => Config::load(),
    }
    .context("Failed to load configuration")?;

    init_logging(&config.logging)?;
    let metrics = init_metrics(&config.metrics)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting AssetDesk server"
    );

    // Any matrix or auth misconfiguration aborts startup.
    let matrix = rbac::load_matrix(config.access.matrix_path.as_deref())
        .context("Invalid permission matrix")?;
    let authenticator =
        Authenticator::new(config.auth.clone()).context("Invalid auth configuration")?;
    if !config.auth.enabled {
        tracing::warn!("Authentication disabled; every request has an unresolved actor");
    }

    let state = AppState::new(FieldPolicy::new(matrix), metrics);
    let app = api::build_router(state, AuthLayer::new(Arc::new(authenticator)));

    let addr = config.server.bind_address();
    tracing::info!(address = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

//! OIDC Kubeconfig Helper - Main entry point
//!
//! Discovers the configured OIDC provider, then serves the login and callback
//! routes until interrupted.

use anyhow::Context;
use oidc_kubeconfig_helper::config::Config;
use oidc_kubeconfig_helper::middleware::install_prometheus_recorder;
use oidc_kubeconfig_helper::oidc::{self, OidcClient};
use oidc_kubeconfig_helper::server::{self, AppState, SHUTDOWN_GRACE};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn setup_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{}", config.log_level())));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() {
    let config = Config::parse_args();

    setup_logging(&config);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(config).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    info!("OIDC Provider: {}", config.provider);
    info!("Client ID: {}", config.client_id);
    info!("Callback URL: {}", config.callback_url);

    let oidc_client = OidcClient::discover(
        &config.provider,
        config.oauth_client(),
        config.state_ttl(),
        config.http_timeout(),
    )
    .await
    .context("Unable to initialise provider")?;
    let oidc_client = Arc::new(oidc_client);

    info!("OIDC provider discovered");

    let metrics = match install_prometheus_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Failed to install Prometheus recorder: {}", e);
            None
        }
    };

    let cleanup = oidc::state::spawn_cleanup_task(
        oidc_client.states(),
        Duration::from_secs(oidc::state::DEFAULT_CLEANUP_INTERVAL_SECS),
    );

    let app = server::router(AppState::new(oidc_client, metrics), &config.callback_path()?);
    let addr = config.listen_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Listening on http://{}", addr);

    let result = server::serve(listener, app, shutdown_signal(), SHUTDOWN_GRACE).await;
    cleanup.abort();
    result?;

    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
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
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down gracefully..."),
        _ = terminate => info!("Received SIGTERM, shutting down gracefully..."),
    }
}

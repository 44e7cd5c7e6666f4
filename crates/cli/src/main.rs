//! House-call service entry point.
//!
//! This binary is the composition root for the entire system. Responsibilities:
//!
//! 1. **Parse configuration**: load `housecall.toml` (or `--config`), apply
//!    `HOUSECALL__*` environment overrides, and validate the result.
//! 2. **Wire observability**: install `tracing-subscriber` with a JSON or
//!    human-readable layer and, when configured, an OpenTelemetry OTLP
//!    exporter. Every span and event emitted by the workspace flows through it.
//! 3. **Construct infrastructure**: seed the in-memory store from
//!    configuration, pick the webhook or log notifier, build the static auth
//!    gateway, and inject them into the workflow services.
//! 4. **Serve**: run the HTTP router until SIGINT or SIGTERM.

mod config;
mod telemetry;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use api::AppState;
use casework::{NotificationGateway, SystemClock};
use clap::Parser;
use storage::InMemoryStore;
use workflow::{CaseService, NoticeDispatcher, OnCallService, ShiftService};

use crate::config::Config;

#[derive(Parser)]
#[command(
    name = "housecall",
    about = "Case, shift, and on-call coordination service for house-call practices",
    version
)]
struct Cli {
    /// Path to the TOML configuration file. Defaults to `housecall.toml` when present.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides `server.port`.
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {e}"))?;

    let _telemetry_guard =
        telemetry::init(&config.logging).context("Failed to initialize logging/telemetry")?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        regions = config.regions.len(),
        physicians = config.physicians.len(),
        "Starting house-call service"
    );

    let addr = config
        .socket_addr()
        .context("Failed to determine socket address")?;
    let app = api::router(build_state(&config)?);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind TCP listener on {addr}"))?;
    tracing::info!(listen_addr = %addr, "Listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server terminated unexpectedly");
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let store = Arc::new(InMemoryStore::seeded(config.region_seed(), config.physician_seed()));
    let clock = Arc::new(SystemClock);
    let settings = config.storage;

    let notifier: Arc<dyn NotificationGateway> = match &config.notifications.webhook_url {
        Some(url) => {
            tracing::info!(webhook_url = %url, "Delivering notices by webhook");
            let timeout = Duration::from_millis(config.notifications.timeout_ms);
            Arc::new(
                notify::WebhookNotifier::new(url.clone(), timeout)
                    .context("Failed to build notification client")?,
            )
        }
        None => {
            tracing::warn!("No notification webhook configured; notices will only be logged");
            Arc::new(notify::LogNotifier)
        }
    };

    let auth = access::StaticAuthGateway::new(config.token_seed(), config.grant_seed());

    Ok(AppState {
        cases: CaseService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            clock.clone(),
            NoticeDispatcher::new(notifier),
            settings,
        ),
        shifts: ShiftService::new(store.clone(), store.clone(), clock.clone(), settings),
        on_call: OnCallService::new(store.clone(), store, clock, settings),
        auth: Arc::new(auth),
    })
}

/// Resolves on SIGINT or SIGTERM.
#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let sigint = tokio::signal::ctrl_c();
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = sigint => tracing::info!("SIGINT received, starting graceful shutdown"),
                _ = sigterm.recv() => {
                    tracing::info!("SIGTERM received, starting graceful shutdown")
                }
            }
        }
        Err(err) => {
            tracing::warn!(
                error = %err,
                "Failed to install SIGTERM handler; waiting for SIGINT only"
            );
            let _ = sigint.await;
            tracing::info!("SIGINT received, starting graceful shutdown");
        }
    }
}

/// Resolves on Ctrl+C.
#[cfg(not(unix))]
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for Ctrl+C");
    }
    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

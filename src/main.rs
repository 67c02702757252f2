//! logview server
//!
//! Serves the log viewer API over records loaded from a fixtures file.

use std::fs;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use logview::upstream::{FixtureSet, MemoryUpstream};
use logview::{create_router, AppState, Config};

/// Main entry point for the logview server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration and policies
/// 3. Load fixtures into the in-memory upstream
/// 4. Build application state (cache, prefetch workers, cleanup task)
/// 5. Start HTTP server on configured port
/// 6. Drain background work on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "logview=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting logview server");

    let config = Config::from_env()?;
    let policies = config.load_policies()?;
    let upstream = Arc::new(load_upstream(&config)?);

    let state = AppState::from_config(&config, upstream, policies);
    let app = create_router(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("could not bind {}", addr))?;
    info!(%addr, "logview listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    state.shutdown().await;
    info!("logview stopped");
    Ok(())
}

fn load_upstream(config: &Config) -> anyhow::Result<MemoryUpstream> {
    let Some(path) = &config.fixtures_file else {
        warn!("FIXTURES_FILE not set; serving no records");
        return Ok(MemoryUpstream::new("https://upstream.invalid"));
    };

    let raw = fs::read_to_string(path)
        .with_context(|| format!("could not read fixtures file {}", path.display()))?;
    let fixtures: FixtureSet = serde_json::from_str(&raw)
        .with_context(|| format!("could not parse fixtures file {}", path.display()))?;
    info!(
        messages = fixtures.messages.len(),
        calls = fixtures.calls.len(),
        alerts = fixtures.alerts.len(),
        "Fixtures loaded"
    );
    Ok(MemoryUpstream::from_fixtures(fixtures, config.page_size as usize)?)
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Ctrl+C received, shutting down");
        }
        _ = terminate => {
            info!("SIGTERM received, shutting down");
        }
    }
}

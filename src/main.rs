//! Cacheguard - HTTP server embedding the cache and its guards
//!
//! Serves cache, rate-limit and verification-code operations over a
//! file or memory backend chosen at startup.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cacheguard::api::{create_router, AppState};
use cacheguard::cache::{Cache, FileCache, MemoryCache};
use cacheguard::config::{Config, Driver};
use cacheguard::tasks::{spawn_sweep_task, Sweep};

/// Main entry point for the Cacheguard server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build the configured storage backend
/// 4. Start the background expiry sweep, unless disabled
/// 5. Create Axum router with all endpoints
/// 6. Start HTTP server on configured port
/// 7. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cacheguard=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Cacheguard server");

    let config = Config::from_env();
    info!(
        "Configuration loaded: driver={:?}, prefix={}, port={}, sweep_interval={}s",
        config.driver, config.prefix, config.server_port, config.sweep_interval
    );

    let (cache, guards, sweeper) = build_backend(&config)?;
    info!(backend = cache.name(), "Cache backend initialized");

    let sweep_handle = if config.sweep_interval > 0 {
        Some(spawn_sweep_task(sweeper, config.sweep_interval))
    } else {
        info!("Expiry sweep disabled");
        None
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let app = create_router(AppState::new(cache, guards, config));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(sweep_handle))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Builds the backend selected by `CACHE_DRIVER`.
///
/// Returns the cache view, the guard view under its own prefix, and the
/// engine behind `Sweep`. One sweep covers both views since they share
/// storage.
fn build_backend(
    config: &Config,
) -> anyhow::Result<(Arc<dyn Cache>, Arc<dyn Cache>, Arc<dyn Sweep>)> {
    match config.driver {
        Driver::File => {
            std::fs::create_dir_all(&config.cache_dir).with_context(|| {
                format!(
                    "failed to create cache directory {}",
                    config.cache_dir.display()
                )
            })?;
            let engine = Arc::new(FileCache::new(&config.prefix, &config.cache_dir));
            let guards: Arc<dyn Cache> =
                Arc::new(FileCache::new(config.guard_prefix(), &config.cache_dir));
            let cache: Arc<dyn Cache> = engine.clone();
            let sweeper: Arc<dyn Sweep> = engine;
            Ok((cache, guards, sweeper))
        }
        Driver::Memory => {
            let engine = Arc::new(MemoryCache::new(&config.prefix));
            let guards: Arc<dyn Cache> = Arc::new(engine.shared_with(config.guard_prefix()));
            let cache: Arc<dyn Cache> = engine.clone();
            let sweeper: Arc<dyn Sweep> = engine;
            Ok((cache, guards, sweeper))
        }
    }
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the sweep task and allows graceful shutdown.
async fn shutdown_signal(sweep_handle: Option<tokio::task::JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
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
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    if let Some(handle) = sweep_handle {
        handle.abort();
        warn!("Expiry sweep task aborted");
    }
}

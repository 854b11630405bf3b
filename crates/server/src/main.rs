use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dashvault_core::{
    load_config, validate_config, Dashcam, OffloadError, Offloader, ViofoCam,
};

use dashvault_server::api::create_router;
use dashvault_server::metrics;
use dashvault_server::state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("DASHVAULT_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Device address: {}", config.device.address);
    info!("Download dir: {:?}", config.storage.download_dir);

    // Create the device driver and offloader
    let device: Arc<dyn Dashcam> = Arc::new(ViofoCam::new(&config.device));
    info!("Using device backend: viofo");

    let offloader = Arc::new(Offloader::new(
        config.offloader.clone(),
        config.storage.download_dir.clone(),
        device,
    ));

    // Start the offload loop
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let loop_handle = tokio::spawn(offload_loop(Arc::clone(&offloader), shutdown_rx));
    info!("Offload loop started");

    // Create app state and router
    let state = Arc::new(AppState::new(config.clone(), offloader));
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    let _ = shutdown_tx.send(());
    let _ = loop_handle.await;
    info!("Offload loop stopped");

    Ok(())
}

/// Runs offload cycles forever, backing off according to the outcome of each
/// cycle: the regular interval after a clean drain, a short backoff on
/// retryable failures, a long one once the device went fatally offline.
async fn offload_loop(offloader: Arc<Offloader>, mut shutdown: broadcast::Receiver<()>) {
    let config = offloader.config().clone();

    loop {
        let delay = match offloader.run_cycle().await {
            Ok(report) => {
                metrics::CYCLES_TOTAL.with_label_values(&["completed"]).inc();
                metrics::TRANSFERS_TOTAL.inc_by(report.transferred as u64);
                metrics::BYTES_TRANSFERRED_TOTAL.inc_by(report.bytes_transferred);
                metrics::QUEUE_REBUILDS_TOTAL.inc_by(report.rebuilds as u64);
                Duration::from_secs(config.cycle_interval_secs)
            }
            Err(err @ OffloadError::FatalOffline(_)) => {
                error!(error = %err, "device offline, backing off");
                metrics::CYCLES_TOTAL
                    .with_label_values(&["fatal_offline"])
                    .inc();
                Duration::from_secs(config.offline_backoff_secs)
            }
            Err(err) if err.is_retryable() => {
                warn!(error = %err, "cycle deferred");
                metrics::CYCLES_TOTAL.with_label_values(&["deferred"]).inc();
                Duration::from_secs(config.retry_backoff_secs)
            }
            Err(err) => {
                error!(error = %err, "cycle failed");
                metrics::CYCLES_TOTAL.with_label_values(&["failed"]).inc();
                Duration::from_secs(config.retry_backoff_secs)
            }
        };

        tokio::select! {
            _ = shutdown.recv() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

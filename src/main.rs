// src/main.rs
use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;

use store_connector::{
    config,
    health::HealthMonitor,
    metrics::{serve_metrics, MetricsRegistry},
    server::{AppState, RequestHandler, ServerBuilder},
    store::{store_check, PostgresStore, Store},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("store_connector=debug".parse()?)
                .add_directive("hyper=info".parse()?),
        )
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yaml".to_string());

    info!("Loading configuration from: {}", config_path);
    let config = config::load_config(&config_path).await?;

    // Initialize metrics
    let metrics_registry = MetricsRegistry::new()?;
    let metrics = metrics_registry.collector();

    // Create the store client; connections are opened lazily
    let store: Arc<dyn Store> = Arc::new(PostgresStore::connect(&config.store)?);

    // Start the health sampler
    let monitor = Arc::new(
        HealthMonitor::new(store_check(store.clone()), config.health.interval())
            .with_metrics(metrics.clone()),
    );
    let monitor_task = tokio::spawn(monitor.clone().start());

    // Shutdown signal shared by the auxiliary servers
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Start metrics server if enabled
    let metrics_task = if config.metrics.enabled {
        let metrics_addr: SocketAddr = ([0, 0, 0, 0], config.metrics.port).into();
        let (_, handle) = serve_metrics(
            metrics_addr,
            metrics_registry,
            config.metrics.path.clone(),
            shutdown_rx.clone(),
        )
        .await?;
        Some(handle)
    } else {
        None
    };

    // Create request handler
    let state = Arc::new(AppState {
        store: store.clone(),
        monitor: monitor.clone(),
        cached: config.health.cached,
        metrics: Some(metrics),
    });
    let handler = RequestHandler::new(state);

    // Start main server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Starting store connector on {}", addr);

    let server = ServerBuilder::new(addr)
        .with_handler(handler)
        .with_timeouts(config.server.timeouts())
        .serve();

    tokio::select! {
        result = server => result?,
        _ = shutdown_signal() => {}
    }

    // Drain in order: sampler, metrics server, then the pool.
    monitor.shutdown();
    let _ = shutdown_tx.send(true);
    monitor_task.await??;
    if let Some(task) = metrics_task {
        task.await?;
    }
    store.close().await?;

    Ok(())
}

// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

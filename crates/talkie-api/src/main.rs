//! Axum API server binary.
//!
//! Runs the HTTP API and the inference worker in one process.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use talkie_api::{create_router, metrics, ApiConfig, AppState, TicketAuthenticator};
use talkie_models::TaskStatus;
use talkie_queue::TaskQueue;
use talkie_store::{SqliteTaskStore, TaskStore};
use talkie_worker::{TaskExecutor, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting talkie-api");

    let config = ApiConfig::from_env();
    let worker_config = WorkerConfig::from_env();
    info!(
        "API config: host={}, port={}, uploads={}, results={}",
        config.host,
        config.port,
        config.upload_dir.display(),
        config.result_dir.display()
    );

    for dir in [&config.upload_dir, &config.result_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("failed to create directory {}", dir.display()))?;
    }

    let store = Arc::new(
        SqliteTaskStore::connect(&config.database_url)
            .await
            .with_context(|| format!("failed to open database {}", config.database_url))?,
    );
    recover_tasks(&store).await?;

    let auth = TicketAuthenticator::from_key_file(
        &config.private_key_path,
        config.token_ttl_secs(),
        config.token_expire_enabled,
    )?;
    if auth.enforces_expiry() {
        info!("Ticket expiry enforced ({}s)", auth.ttl_secs());
    } else {
        warn!("Ticket expiry disabled, old tickets stay valid");
    }

    if let Err(e) = talkie_media::check_executable(&worker_config.inference_bin) {
        warn!("{}; every job will fail until it is installed", e);
    }

    let metrics_handle = if config.metrics_enabled {
        info!("Prometheus metrics enabled at /metrics");
        Some(metrics::init_metrics().context("failed to install Prometheus recorder")?)
    } else {
        None
    };

    let queue = Arc::new(TaskQueue::new());
    let shutdown_timeout = worker_config.shutdown_timeout;
    let executor = Arc::new(TaskExecutor::new(
        worker_config,
        Arc::clone(&store),
        Arc::clone(&queue),
    ));
    let worker = {
        let executor = Arc::clone(&executor);
        tokio::spawn(async move { executor.run().await })
    };

    let state = AppState::new(config.clone(), Arc::clone(&store), queue, auth);
    let app = create_router(state, metrics_handle);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid bind address")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    info!("Waiting for the worker to finish the current job...");
    executor.shutdown();
    match tokio::time::timeout(shutdown_timeout, worker).await {
        Ok(Ok(())) => info!("Worker stopped"),
        Ok(Err(e)) => error!("Worker task failed: {}", e),
        Err(_) => warn!(
            "Worker did not stop within {}s, abandoning the running job",
            shutdown_timeout.as_secs()
        ),
    }

    store.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Colored output for dev, JSON when `LOG_FORMAT=json`.
fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
    });

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

/// Reconcile records left behind by a previous process.
///
/// Queue entries live in memory only, so a `running` record can never
/// finish and a `pending` one will never be picked up.
async fn recover_tasks(store: &SqliteTaskStore) -> anyhow::Result<()> {
    let interrupted = store
        .interrupt_running()
        .await
        .context("failed to reset interrupted tasks")?;
    if interrupted > 0 {
        warn!("Marked {} interrupted task(s) as failed", interrupted);
    }

    let orphaned = store
        .count_by_status(TaskStatus::Pending)
        .await
        .context("failed to count pending tasks")?;
    if orphaned > 0 {
        warn!(
            "{} pending task(s) from a previous run are no longer queued and will stay pending",
            orphaned
        );
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}

//! Hookline - Webhook Delivery Daemon
//! Wires SQLite storage, the HTTP transport, the delivery worker and the JSON-RPC server.

mod config;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::{LogFormat, Settings};
use hookline_api_rpc::{RpcHandler, RpcServer, RpcServerConfig};
use hookline_core::application::worker::shutdown_with_grace;
use hookline_core::application::{
    shutdown_channel, DeliveryTransport, KeyedRateLimiter, RetentionScheduler, RetryPolicy,
    TestWebhookService, WebhookWorker, WorkerConfig,
};
use hookline_core::port::id_provider::UuidProvider;
use hookline_core::port::time_provider::SystemTimeProvider;
use hookline_core::port::TimeProvider;
use hookline_infra_http::ReqwestTransport;
use hookline_infra_sqlite::{
    create_pool, run_migrations, SqliteDeliveryRepository, SqliteSubscriptionRepository,
    SqliteWorkspaceRepository,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const LOG_FILE_PREFIX: &str = "hookline.log";

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load configuration (defaults < hookline.toml < HOOKLINE_* env)
    let settings = Settings::load().context("Failed to load configuration")?;

    // 2. Initialize logging; the guard flushes the file writer on exit
    let _log_guard = init_logging(&settings)?;

    info!("Hookline v{} starting...", VERSION);

    // 3. Initialize database
    let db_url = settings.sqlite_url();
    if !db_url.contains(":memory:") {
        if let Some(parent) = std::path::Path::new(&settings.database_path()).parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    info!(db_url = %db_url, "Initializing database...");

    let pool = create_pool(&db_url)
        .await
        .context("DB pool creation failed")?;
    run_migrations(&pool).await.context("Migration failed")?;

    // 4. Setup dependencies (DI wiring)
    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let id_provider = Arc::new(UuidProvider);

    let workspace_repo = Arc::new(SqliteWorkspaceRepository::new(pool.clone()));
    let subscription_repo = Arc::new(SqliteSubscriptionRepository::new(pool.clone()));
    let delivery_repo = Arc::new(SqliteDeliveryRepository::new(
        pool.clone(),
        time_provider.clone(),
    ));

    let http = Arc::new(
        ReqwestTransport::new(settings.http_timeout()).context("HTTP client setup failed")?,
    );
    let transport = Arc::new(DeliveryTransport::new(
        http,
        time_provider.clone(),
        id_provider,
    ));
    let retry_policy = Arc::new(RetryPolicy::new(time_provider.clone()));

    // 5. Start JSON-RPC server
    info!("Starting JSON-RPC server...");
    let test_webhooks = Arc::new(TestWebhookService::new(
        transport.clone(),
        time_provider.clone(),
    ));
    let mut handler = RpcHandler::new(
        subscription_repo.clone(),
        delivery_repo.clone(),
        test_webhooks,
    );
    if settings.rpc_rate_limit_burst > 0 {
        handler = handler.with_rate_limiter(Arc::new(KeyedRateLimiter::new(
            settings.rpc_rate_limit_burst,
            settings.rpc_rate_limit_per_sec,
            time_provider.clone(),
        )));
    }
    let rpc_config = RpcServerConfig {
        host: settings.rpc_host.clone(),
        port: settings.rpc_port,
    };
    let (rpc_addr, rpc_handle) = RpcServer::new(rpc_config, handler)
        .start()
        .await
        .context("RPC server start failed")?;
    info!(addr = %rpc_addr, "JSON-RPC server listening");

    // 6. Start worker (delivery loop)
    info!("Starting webhook worker...");
    let (shutdown_tx, shutdown_rx) = shutdown_channel();

    let worker_config = WorkerConfig {
        poll_interval: settings.poll_interval(),
        batch_size: settings.batch_size,
    };
    worker_config.validate()?;

    let mut worker = WebhookWorker::new(
        workspace_repo,
        delivery_repo.clone(),
        subscription_repo,
        transport,
        retry_policy,
        time_provider.clone(),
        worker_config,
    );
    if settings.rate_limit_burst > 0 {
        worker = worker.with_rate_limiter(Arc::new(KeyedRateLimiter::new(
            settings.rate_limit_burst,
            settings.rate_limit_per_sec,
            time_provider.clone(),
        )));
    }

    let worker_shutdown = shutdown_rx.clone();
    let worker_handle = tokio::spawn(async move {
        if let Err(e) = worker.run(worker_shutdown).await {
            tracing::error!(error = ?e, "Worker failed");
        }
    });

    // 7. Start retention scheduler
    let retention = RetentionScheduler::new(
        delivery_repo,
        time_provider,
        settings.retention_days,
        settings.retention_interval(),
    )?;
    let retention_handle = tokio::spawn(retention.run(shutdown_rx));

    info!("System ready. Delivering webhooks...");
    info!("Press Ctrl+C to shutdown");

    // 8. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received. Exiting gracefully...");

    // 9. Graceful shutdown: stop accepting RPC, then drain the worker
    rpc_handle
        .stop()
        .map_err(|e| anyhow::anyhow!("RPC server stop failed: {}", e))?;

    let grace = settings.shutdown_grace();
    if !shutdown_with_grace(&shutdown_tx, worker_handle, grace).await {
        tracing::warn!("Worker did not stop within grace period");
    }
    let _ = tokio::time::timeout(Duration::from_secs(1), retention_handle).await;

    info!("Shutdown complete.");

    Ok(())
}

/// Console logging (pretty or JSON) plus an optional daily-rolling JSON file
fn init_logging(settings: &Settings) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("hookline=info"))
        .context("Failed to create env filter")?;

    let mut layers = Vec::new();
    match settings.log_format()? {
        // Production: JSON structured logging
        LogFormat::Json => layers.push(fmt::layer().json().boxed()),
        // Development: Pretty formatting with colors
        LogFormat::Pretty => layers.push(fmt::layer().pretty().boxed()),
    }

    let guard = match settings.log_dir() {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            layers.push(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer)
                    .boxed(),
            );
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .init();

    Ok(guard)
}

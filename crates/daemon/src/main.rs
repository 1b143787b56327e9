//! powq - Main Entry Point
//! HTTP admission + worker pool + maintenance, wired against Redis or in-memory adapters

mod config;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use powq_api_http::{ApiServer, ApiServerConfig};
use powq_core::application::{
    shutdown_channel, AdmissionService, CallbackDelivery, MaintenanceScheduler, RecoveryService,
    RetryPolicy, WorkerContext, WorkerPool,
};
use powq_core::port::id_provider::UuidProvider;
use powq_core::port::time_provider::SystemTimeProvider;
use powq_core::port::{CounterStore, JobQueue, JobStore, TimeProvider};
use powq_infra_memory::{InMemoryCounterStore, InMemoryJobQueue, InMemoryJobStore};
use powq_infra_redis::{RedisCounterStore, RedisJobQueue, RedisJobStore};
use powq_infra_system::{HashCompute, HttpCallbackSender};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const WORKER_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

struct Backends {
    counter_store: Arc<dyn CounterStore>,
    queue: Arc<dyn JobQueue>,
    store: Arc<dyn JobStore>,
}

async fn build_backends(config: &Config, time_provider: Arc<dyn TimeProvider>) -> Result<Backends> {
    match config.redis_url.as_deref() {
        Some(url) => {
            info!(prefix = %config.redis_prefix, "Connecting to Redis...");
            let conn = powq_infra_redis::connect(url)
                .await
                .context("Redis connection failed")?;
            Ok(Backends {
                counter_store: Arc::new(RedisCounterStore::new(conn.clone())),
                queue: Arc::new(RedisJobQueue::new(
                    conn.clone(),
                    &config.redis_prefix,
                    time_provider,
                )),
                store: Arc::new(RedisJobStore::new(conn, &config.redis_prefix, config.retention())),
            })
        }
        None => {
            warn!("No Redis URL configured; using in-memory adapters (single process, not durable)");
            Ok(Backends {
                counter_store: Arc::new(InMemoryCounterStore::new(time_provider.clone())),
                queue: Arc::new(InMemoryJobQueue::new(time_provider.clone())),
                store: Arc::new(InMemoryJobStore::new(config.retention(), time_provider)),
            })
        }
    }
}

fn init_logging() -> Result<()> {
    let log_format = std::env::var("POWQ_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("powq=info"))
        .context("Failed to create env filter")?;

    match log_format.as_str() {
        "json" => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .init(),
        _ => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty())
            .init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();

    // 1. Logging
    init_logging()?;
    info!("powq v{} starting...", VERSION);

    // 2. Adapters (DI wiring)
    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let backends = build_backends(&config, time_provider.clone()).await?;
    let compute = Arc::new(HashCompute::new());

    let (compute_base, compute_max) = config.compute_backoff();
    let retry_policy = Arc::new(RetryPolicy::for_compute(
        config.compute_max_retries,
        compute_base,
        compute_max,
    ));

    let (callback_base, callback_max) = config.callback_backoff();
    let callbacks = Arc::new(CallbackDelivery::new(
        Arc::new(HttpCallbackSender::new()),
        backends.store.clone(),
        time_provider.clone(),
        RetryPolicy::for_callbacks(config.callback_max_attempts, callback_base, callback_max),
        config.callback_timeout(),
    ));

    // 3. Crash recovery: reservations left by a previous process
    let recovery = Arc::new(RecoveryService::new(
        backends.queue.clone(),
        backends.store.clone(),
        Some(config.visibility_timeout()),
    ));
    info!("Running crash recovery...");
    match recovery.recover_orphaned_jobs().await {
        Ok(count) => info!(recovered_jobs = count, "Crash recovery completed"),
        Err(e) => error!(error = %e, "Crash recovery failed"),
    }

    // 4. Workers
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let pool = WorkerPool::new(
        config.workers,
        WorkerContext {
            queue: backends.queue.clone(),
            store: backends.store.clone(),
            compute: compute.clone(),
            retry_policy,
            callbacks: Some(callbacks.clone()),
            time_provider: time_provider.clone(),
        },
    );
    let pool_handle = pool.spawn(shutdown_rx.clone());

    // 5. Maintenance
    let maintenance = MaintenanceScheduler::new(
        backends.store.clone(),
        recovery,
        config.maintenance_interval(),
    );
    let maintenance_handle = tokio::spawn(maintenance.run(shutdown_rx));

    // 6. HTTP admission
    let admission = Arc::new(AdmissionService::new(
        backends.counter_store,
        backends.queue,
        backends.store,
        compute,
        Arc::new(UuidProvider),
        time_provider.clone(),
        config.admission(),
    ));
    let server = ApiServer::new(
        ApiServerConfig {
            bind_addr: config.bind_addr.clone(),
            service_name: config.service_name.clone(),
            admission_secret: config.admission_secret.clone(),
        },
        admission,
        time_provider,
    );

    let mut server_shutdown = shutdown_tx.token();
    let mut server_handle = tokio::spawn(server.run(async move { server_shutdown.wait().await }));

    info!("System ready. Press Ctrl+C to shutdown");

    // 7. Wait for a shutdown signal (or the server dying on its own)
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for shutdown signal")?;
            info!("Shutdown signal received. Exiting gracefully...");
        }
        result = &mut server_handle => {
            match result {
                Ok(Ok(())) => warn!("HTTP server exited unexpectedly"),
                Ok(Err(e)) => error!(error = %e, "HTTP server failed"),
                Err(e) => error!(error = %e, "HTTP server task failed"),
            }
        }
    }

    // 8. Graceful shutdown: stop admission, let in-flight jobs finish
    shutdown_tx.shutdown();
    if !server_handle.is_finished() {
        match server_handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "HTTP server failed during shutdown"),
            Err(e) => error!(error = %e, "HTTP server task failed"),
        }
    }
    if tokio::time::timeout(WORKER_DRAIN_TIMEOUT, pool_handle.join())
        .await
        .is_err()
    {
        warn!("Workers did not stop in time; unacknowledged jobs will be recovered on restart");
    }
    // Workers are stopped, so no new deliveries can start
    let abandoned = callbacks.drain(config.callback_drain_timeout()).await;
    if abandoned > 0 {
        warn!(abandoned, "Webhook deliveries still retrying at shutdown were recorded as failed");
    }
    let _ = maintenance_handle.await;

    info!("Shutdown complete.");
    Ok(())
}

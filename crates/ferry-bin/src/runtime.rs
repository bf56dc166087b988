// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Service runtime orchestration.
//!
//! The runtime wires every component in dependency order and runs until a
//! shutdown signal arrives:
//!
//! 1. Postgres pool + migrations (fatal on failure)
//! 2. Redis client (fatal on failure)
//! 3. Buffer store (fatal on failure, including a held lock)
//! 4. Health monitor, operation bridge, drain scheduler
//! 5. Retention sweeper and API server
//!
//! Teardown runs the other way around: the HTTP server stops accepting
//! first (graceful shutdown), then the lifecycle registry unwinds the
//! drain scheduler, the health monitor, the buffer store and finally the
//! primary-store clients.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use ferry_api::{ApiConfig, ApiServer, AppState};
use ferry_buffer::apply::Applier;
use ferry_buffer::bridge::BufferBridge;
use ferry_buffer::drain::{DrainConfig, DrainScheduler};
use ferry_buffer::rocksdb::RocksDbBuffer;
use ferry_buffer::traits::{BufferConfig, BufferStore};
use ferry_config::AppConfig;
use ferry_core::monitor::{HealthMonitor, MonitorConfig};
use ferry_storage::{PostgresTaskRepository, PostgresUserRepository, RedisKvStore};

use crate::error::{BinError, BinResult};
use crate::shutdown::{Lifecycle, ShutdownCoordinator};

/// Period of the buffer retention sweep.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

// =============================================================================
// ServiceRuntime
// =============================================================================

/// The main service runtime.
pub struct ServiceRuntime {
    config: AppConfig,
}

impl ServiceRuntime {
    /// Creates a runtime from loaded configuration.
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Runs the service until shutdown is signaled.
    pub async fn run(self) -> BinResult<()> {
        let config = &self.config;
        info!(
            app = %config.app_name,
            environment = %config.environment,
            "starting FERRY v{}",
            ferry_core::VERSION
        );

        // 1. Primary row store. Unreachable at boot means nothing to
        //    reconcile against, so this is fatal.
        let pool = ferry_storage::connect(
            &config.database.url,
            config.database.max_connections,
            config.database.connect_timeout(),
        )
        .await
        .map_err(|e| BinError::Initialization(format!("postgres: {e}")))?;

        ferry_storage::migrate(&pool)
            .await
            .map_err(|e| BinError::Initialization(format!("migrations: {e}")))?;

        let users = Arc::new(PostgresUserRepository::new(pool.clone()));
        let tasks = Arc::new(PostgresTaskRepository::new(pool.clone()));

        // 2. Primary KV store.
        let kv = RedisKvStore::connect(&config.redis.url)
            .await
            .map_err(|e| BinError::Initialization(format!("redis: {e}")))?;

        // 3. Buffer store. A held lock (another process owns the file)
        //    surfaces here and aborts startup.
        let buffer_config = BufferConfig::builder()
            .path(&config.buffer.path)
            .max_records(config.buffer.max_size)
            .retention(config.buffer.retention())
            .sync_writes(config.buffer.sync_writes)
            .build();
        let store = Arc::new(
            RocksDbBuffer::open(buffer_config)
                .await
                .map_err(|e| BinError::Initialization(format!("buffer store: {e}")))?,
        );

        // 4. Monitor, bridge, drain.
        let monitor_config = MonitorConfig {
            probe_interval: config.monitor.probe_interval(),
            ..MonitorConfig::default()
        };
        let monitor = Arc::new(HealthMonitor::new(
            users.clone(),
            Arc::new(kv.clone()),
            store.clone(),
            monitor_config,
        ));
        let monitor_handle = monitor.start();

        let applier = Applier::new(users.clone(), tasks.clone());
        let bridge = Arc::new(BufferBridge::new(
            store.clone(),
            monitor.clone(),
            applier.clone(),
        ));

        let drain_config = DrainConfig {
            interval: config.sync.interval(),
            batch_size: config.sync.batch_size,
            max_retries: config.sync.max_retry_attempts,
        };
        let drain = Arc::new(DrainScheduler::new(
            store.clone(),
            monitor.clone(),
            applier,
            drain_config,
        ));
        let drain_handle = drain.start();

        // 5. Shutdown plumbing. Hooks registered innermost-first; they
        //    run in reverse, so the drain stops before the buffer closes
        //    and the buffer closes before the pool does.
        let coordinator = ShutdownCoordinator::new();
        let lifecycle = Lifecycle::new(config.shutdown_timeout());

        {
            let pool = pool.clone();
            lifecycle
                .register("postgres-pool", move || async move {
                    pool.close().await;
                    Ok(())
                })
                .await;
        }
        {
            let store = store.clone();
            lifecycle
                .register("buffer-store", move || async move {
                    store.sync().await.map_err(|e| e.to_string())
                })
                .await;
        }
        {
            let monitor = monitor.clone();
            lifecycle
                .register("health-monitor", move || async move {
                    monitor.stop();
                    monitor_handle.await.map_err(|e| e.to_string())
                })
                .await;
        }
        {
            let drain = drain.clone();
            lifecycle
                .register("drain-scheduler", move || async move {
                    drain.shutdown();
                    drain_handle.await.map_err(|e| e.to_string())
                })
                .await;
        }

        // Retention sweeper: periodically drops records older than the
        // configured window.
        let sweeper_handle = spawn_retention_sweeper(
            store.clone(),
            config.buffer.retention(),
            coordinator.clone(),
        );
        {
            lifecycle
                .register("retention-sweeper", move || async move {
                    sweeper_handle.await.map_err(|e| e.to_string())
                })
                .await;
        }

        // 6. API server.
        let api_config = ApiConfig {
            host: config.server.host.clone(),
            port: config.server.port,
            request_timeout: config.server.request_timeout(),
        };
        let state = AppState::builder()
            .config(api_config)
            .monitor(monitor.clone())
            .buffer(bridge)
            .users(users)
            .tasks(tasks)
            .build()
            .map_err(|e| BinError::Initialization(format!("app state: {e}")))?;

        let server = ApiServer::new(state);
        info!("FERRY is ready (API: {})", server.addr());

        // Signal watcher: flips the coordinator on SIGTERM/SIGINT, which
        // resolves the server's graceful-shutdown future below.
        let signal_coordinator = coordinator.clone();
        tokio::spawn(async move {
            signal_coordinator.wait_for_shutdown().await;
        });

        let result = server
            .run_with_shutdown(coordinator.shutdown_signal())
            .await
            .map_err(|e| BinError::Runtime(e.to_string()));

        // Server stopped (signal or error); unwind everything else.
        coordinator.initiate_shutdown();
        if let Err(e) = lifecycle.shutdown().await {
            warn!(error = %e, "shutdown finished with failed hooks");
        }

        info!("FERRY shutdown complete");
        result
    }
}

/// Spawns the periodic retention sweep over the buffer store.
fn spawn_retention_sweeper(
    store: Arc<dyn BufferStore>,
    retention: Duration,
    coordinator: ShutdownCoordinator,
) -> tokio::task::JoinHandle<()> {
    let mut shutdown = coordinator.subscribe();

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
        // Skip the immediate first tick.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let cutoff = Utc::now() - chrono::Duration::seconds(retention.as_secs() as i64);
                    match store.cleanup(cutoff).await {
                        Ok(0) => {}
                        Ok(removed) => info!(removed, "retention sweep removed expired records"),
                        Err(e) => warn!(error = %e, "retention sweep failed"),
                    }
                }
                _ = shutdown.recv() => break,
            }
        }
    })
}

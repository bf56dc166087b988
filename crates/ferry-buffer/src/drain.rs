// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Background drain scheduler.
//!
//! The scheduler wakes on a fixed interval and reconciles the buffer
//! store against the primary-store repositories:
//!
//! 1. If the health monitor reports offline, the tick is a no-op; the
//!    buffer is not touched.
//! 2. Otherwise a bounded batch is read and each record is applied in
//!    order. Success removes the record; a poison record is removed
//!    immediately under its own counter; any other failure bumps the
//!    retry count and either requeues the record or, once the retry
//!    budget is spent, drops it with a warning.
//! 3. A store that turns unreachable mid-batch aborts the remainder of
//!    the tick without touching the unprocessed records; the next tick
//!    retries them.
//!
//! At most one tick is in flight: ticks run inline in a single loop task,
//! and each is bounded by the tick interval so a hung repository cannot
//! delay the next tick indefinitely. There is no per-record back-off
//! beyond the tick period.
//!
//! Per-record state machine:
//!
//! ```text
//! enqueued → draining → applied              (removed)
//!                     → failed → requeued    (retries < budget)
//!                              → dropped     (budget spent, removed)
//!          → poison                          (removed immediately)
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use ferry_core::monitor::HealthMonitor;

use crate::apply::Applier;
use crate::metrics;
use crate::traits::BufferStore;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the drain scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrainConfig {
    /// Interval between drain ticks.
    #[serde(default = "default_interval")]
    #[serde(with = "duration_secs")]
    pub interval: Duration,

    /// Maximum records processed per tick.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Per-record retry budget before a record is dropped.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_batch_size() -> usize {
    50
}

fn default_max_retries() -> u32 {
    3
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
        }
    }
}

impl DrainConfig {
    /// Creates a configuration with short intervals for testing.
    pub fn for_testing() -> Self {
        Self {
            interval: Duration::from_millis(20),
            batch_size: 10,
            max_retries: 3,
        }
    }
}

// =============================================================================
// Drain Metrics
// =============================================================================

/// Lock-free drain counters.
#[derive(Debug, Default)]
pub struct DrainMetricsInner {
    /// Completed drain ticks.
    pub ticks: AtomicU64,
    /// Ticks skipped because the monitor reported offline.
    pub skipped_offline: AtomicU64,
    /// Records replayed successfully.
    pub applied: AtomicU64,
    /// Records requeued after a failed apply.
    pub requeued: AtomicU64,
    /// Records dropped after retry exhaustion.
    pub dropped: AtomicU64,
    /// Records dropped because the payload was undecodable.
    pub poison: AtomicU64,
}

impl DrainMetricsInner {
    /// Creates an immutable snapshot.
    pub fn snapshot(&self) -> DrainMetrics {
        DrainMetrics {
            ticks: self.ticks.load(Ordering::Relaxed),
            skipped_offline: self.skipped_offline.load(Ordering::Relaxed),
            applied: self.applied.load(Ordering::Relaxed),
            requeued: self.requeued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            poison: self.poison.load(Ordering::Relaxed),
        }
    }
}

/// Immutable snapshot of drain counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrainMetrics {
    /// Completed drain ticks.
    pub ticks: u64,
    /// Ticks skipped because the monitor reported offline.
    pub skipped_offline: u64,
    /// Records replayed successfully.
    pub applied: u64,
    /// Records requeued after a failed apply.
    pub requeued: u64,
    /// Records dropped after retry exhaustion.
    pub dropped: u64,
    /// Records dropped because the payload was undecodable.
    pub poison: u64,
}

// =============================================================================
// Drain Scheduler
// =============================================================================

/// Cooperative background reconciler of the buffer store.
pub struct DrainScheduler {
    store: Arc<dyn BufferStore>,
    monitor: Arc<HealthMonitor>,
    applier: Applier,
    config: DrainConfig,
    metrics: Arc<DrainMetricsInner>,
    shutdown: Arc<Notify>,
    running: Arc<AtomicBool>,
}

impl DrainScheduler {
    /// Creates a scheduler. Call [`start`](Self::start) to begin
    /// draining.
    pub fn new(
        store: Arc<dyn BufferStore>,
        monitor: Arc<HealthMonitor>,
        applier: Applier,
        config: DrainConfig,
    ) -> Self {
        Self {
            store,
            monitor,
            applier,
            config,
            metrics: Arc::new(DrainMetricsInner::default()),
            shutdown: Arc::new(Notify::new()),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Starts the drain loop in the background.
    pub fn start(&self) -> JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);

        let store = self.store.clone();
        let monitor = self.monitor.clone();
        let applier = self.applier.clone();
        let config = self.config.clone();
        let metrics = self.metrics.clone();
        let shutdown = self.shutdown.clone();
        let running = self.running.clone();

        tokio::spawn(async move {
            info!(
                interval_ms = config.interval.as_millis() as u64,
                batch_size = config.batch_size,
                max_retries = config.max_retries,
                "drain scheduler started"
            );

            let mut interval = tokio::time::interval(config.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // Consume the immediate first tick; the first drain runs one
            // interval after startup.
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if !running.load(Ordering::SeqCst) {
                            break;
                        }
                        Self::tick(&store, &monitor, &applier, &config, &metrics, &running).await;
                    }
                    _ = shutdown.notified() => {
                        info!("drain scheduler shutting down");
                        // One final reconciliation attempt before exit.
                        Self::tick(&store, &monitor, &applier, &config, &metrics, &running).await;
                        break;
                    }
                }
            }

            running.store(false, Ordering::SeqCst);
            info!("drain scheduler stopped");
        })
    }

    /// Signals the drain loop to stop after a final drain attempt.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Returns `true` if the drain loop is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Returns a snapshot of the drain counters.
    pub fn metrics(&self) -> DrainMetrics {
        self.metrics.snapshot()
    }

    /// Runs one drain tick synchronously, independent of the background
    /// loop.
    pub async fn drain_now(&self) {
        let uncancelled = Arc::new(AtomicBool::new(true));
        Self::tick(
            &self.store,
            &self.monitor,
            &self.applier,
            &self.config,
            &self.metrics,
            &uncancelled,
        )
        .await;
    }

    /// One bounded tick: the whole pass runs under the tick interval as
    /// its deadline.
    async fn tick(
        store: &Arc<dyn BufferStore>,
        monitor: &Arc<HealthMonitor>,
        applier: &Applier,
        config: &DrainConfig,
        metrics: &Arc<DrainMetricsInner>,
        running: &Arc<AtomicBool>,
    ) {
        let started = std::time::Instant::now();
        let result = tokio::time::timeout(
            config.interval,
            Self::drain_once(store, monitor, applier, config, metrics, running),
        )
        .await;
        metrics::observe_drain_duration(started.elapsed().as_secs_f64());

        if result.is_err() {
            warn!("drain tick exceeded its interval and was cancelled");
            metrics::inc_drain_tick("timed_out");
        }
        metrics::set_depth(store.len() as u64);
    }

    async fn drain_once(
        store: &Arc<dyn BufferStore>,
        monitor: &Arc<HealthMonitor>,
        applier: &Applier,
        config: &DrainConfig,
        metrics: &Arc<DrainMetricsInner>,
        running: &Arc<AtomicBool>,
    ) {
        if !monitor.is_online() {
            debug!("skipping drain tick (offline)");
            metrics.skipped_offline.fetch_add(1, Ordering::Relaxed);
            metrics::inc_drain_tick("skipped_offline");
            return;
        }

        let records = match store.get_batch(config.batch_size).await {
            Ok(records) => records,
            Err(e) => {
                error!(error = %e, "failed to read buffer batch");
                return;
            }
        };

        for mut record in records {
            // Respect cancellation between records.
            if !running.load(Ordering::SeqCst) {
                break;
            }

            match applier.apply(&record).await {
                Ok(()) => {
                    if let Err(e) = store.remove(&record).await {
                        warn!(record_id = %record.id, error = %e, "failed to purge applied record");
                        continue;
                    }
                    metrics.applied.fetch_add(1, Ordering::Relaxed);
                    metrics::inc_applied();
                    info!(
                        record_id = %record.id,
                        entity = %record.entity,
                        operation = %record.operation,
                        "buffer record applied"
                    );
                }
                Err(e) if e.is_permanent() => {
                    if let Err(remove_err) = store.remove(&record).await {
                        warn!(record_id = %record.id, error = %remove_err, "failed to purge poison record");
                        continue;
                    }
                    metrics.poison.fetch_add(1, Ordering::Relaxed);
                    metrics::inc_poison();
                    warn!(
                        record_id = %record.id,
                        entity = %record.entity,
                        operation = %record.operation,
                        error = %e,
                        "dropping poison record"
                    );
                }
                Err(e) if e.is_unavailable() => {
                    // The store went away mid-batch; leave this record
                    // and the rest untouched for the next tick.
                    debug!(
                        record_id = %record.id,
                        error = %e,
                        "primary store unavailable mid-batch, ending tick"
                    );
                    break;
                }
                Err(e) => {
                    record.retries += 1;
                    error!(
                        record_id = %record.id,
                        entity = %record.entity,
                        operation = %record.operation,
                        retries = record.retries,
                        error = %e,
                        "failed to apply buffer record"
                    );

                    if record.retries >= config.max_retries {
                        if let Err(remove_err) = store.remove(&record).await {
                            warn!(record_id = %record.id, error = %remove_err, "failed to remove exhausted record");
                            continue;
                        }
                        metrics.dropped.fetch_add(1, Ordering::Relaxed);
                        metrics::inc_dropped();
                        warn!(
                            record_id = %record.id,
                            entity = %record.entity,
                            operation = %record.operation,
                            "dropping buffer record after retries"
                        );
                    } else {
                        match store.requeue(record).await {
                            Ok(_) => {
                                metrics.requeued.fetch_add(1, Ordering::Relaxed);
                                metrics::inc_requeued();
                            }
                            Err(requeue_err) => {
                                error!(error = %requeue_err, "failed to requeue buffer record");
                            }
                        }
                    }
                }
            }
        }

        metrics.ticks.fetch_add(1, Ordering::Relaxed);
        metrics::inc_drain_tick("completed");
    }
}

impl std::fmt::Debug for DrainScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrainScheduler")
            .field("running", &self.is_running())
            .field("buffered", &self.store.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBuffer;
    use crate::record::{BufferRecord, Entity, Operation};
    use ferry_core::error::{RepoError, RepoResult};
    use ferry_core::memory::{MemoryTaskRepository, MemoryUserRepository};
    use ferry_core::monitor::MonitorConfig;
    use ferry_core::repository::{TaskRepository, UserRepository};
    use ferry_core::types::{Task, TaskFilter, User};

    use async_trait::async_trait;

    /// A task repository whose writes always fail with a terminal error.
    #[derive(Debug, Default)]
    struct BrokenTaskRepository;

    #[async_trait]
    impl TaskRepository for BrokenTaskRepository {
        async fn get_by_id(&self, id: &str) -> RepoResult<Task> {
            Err(RepoError::not_found("task", id))
        }

        async fn list(&self, _filter: &TaskFilter) -> RepoResult<Vec<Task>> {
            Ok(vec![])
        }

        async fn create(&self, _task: &Task) -> RepoResult<Task> {
            Err(RepoError::query_failed("constraint violation"))
        }

        async fn update(&self, _task: &Task) -> RepoResult<()> {
            Err(RepoError::query_failed("constraint violation"))
        }

        async fn delete(&self, _id: &str) -> RepoResult<()> {
            Err(RepoError::query_failed("constraint violation"))
        }
    }

    struct Harness {
        scheduler: DrainScheduler,
        store: Arc<MemoryBuffer>,
        users: Arc<MemoryUserRepository>,
        tasks: Arc<MemoryTaskRepository>,
        monitor: Arc<HealthMonitor>,
    }

    async fn harness() -> Harness {
        let store = Arc::new(MemoryBuffer::with_defaults());
        let users = Arc::new(MemoryUserRepository::new());
        let tasks = Arc::new(MemoryTaskRepository::new());
        let monitor = Arc::new(HealthMonitor::new(
            users.clone(),
            tasks.clone(),
            store.clone(),
            MonitorConfig::for_testing(),
        ));
        monitor.probe_now().await;

        let applier = Applier::new(users.clone(), tasks.clone());
        Harness {
            scheduler: DrainScheduler::new(
                store.clone(),
                monitor.clone(),
                applier,
                DrainConfig::for_testing(),
            ),
            store,
            users,
            tasks,
            monitor,
        }
    }

    fn task_record(task: &Task, operation: Operation) -> BufferRecord {
        let mut record = BufferRecord::new(
            &task.user_id,
            Entity::Task,
            operation,
            serde_json::to_vec(task).unwrap(),
            4,
        );
        record.id = task.id.clone();
        record
    }

    fn profile_record(user: &User) -> BufferRecord {
        BufferRecord::new(
            &user.id,
            Entity::Profile,
            Operation::Update,
            serde_json::to_vec(user).unwrap(),
            3,
        )
    }

    #[tokio::test]
    async fn test_drain_applies_and_removes() {
        let h = harness().await;
        let task = Task::new("t1", "u1", "x");
        h.store
            .enqueue(task_record(&task, Operation::Create))
            .await
            .unwrap();

        h.scheduler.drain_now().await;

        assert_eq!(h.store.len(), 0);
        assert_eq!(h.tasks.get_by_id("t1").await.unwrap().title, "x");
        assert_eq!(h.scheduler.metrics().applied, 1);
    }

    #[tokio::test]
    async fn test_offline_tick_is_noop() {
        let h = harness().await;
        let task = Task::new("t1", "u1", "x");
        h.store
            .enqueue(task_record(&task, Operation::Create))
            .await
            .unwrap();

        h.users.set_unavailable(true);
        h.monitor.probe_now().await;

        h.scheduler.drain_now().await;

        assert_eq!(h.store.len(), 1);
        let metrics = h.scheduler.metrics();
        assert_eq!(metrics.skipped_offline, 1);
        assert_eq!(metrics.applied, 0);
    }

    #[tokio::test]
    async fn test_failed_record_requeues_with_bumped_retries() {
        let store = Arc::new(MemoryBuffer::with_defaults());
        let users = Arc::new(MemoryUserRepository::new());
        let broken = Arc::new(BrokenTaskRepository);
        let monitor = Arc::new(HealthMonitor::new(
            users.clone(),
            users.clone(),
            store.clone(),
            MonitorConfig::for_testing(),
        ));
        monitor.probe_now().await;

        let applier = Applier::new(users, broken);
        let scheduler = DrainScheduler::new(
            store.clone(),
            monitor,
            applier,
            DrainConfig::for_testing(),
        );

        let task = Task::new("t1", "u1", "x");
        store
            .enqueue(task_record(&task, Operation::Create))
            .await
            .unwrap();

        scheduler.drain_now().await;

        assert_eq!(store.len(), 1);
        let batch = store.get_batch(10).await.unwrap();
        assert_eq!(batch[0].retries, 1);
        assert_eq!(scheduler.metrics().requeued, 1);
    }

    #[tokio::test]
    async fn test_retry_budget_drops_record() {
        let store = Arc::new(MemoryBuffer::with_defaults());
        let users = Arc::new(MemoryUserRepository::new());
        let broken = Arc::new(BrokenTaskRepository);
        let monitor = Arc::new(HealthMonitor::new(
            users.clone(),
            users.clone(),
            store.clone(),
            MonitorConfig::for_testing(),
        ));
        monitor.probe_now().await;

        let applier = Applier::new(users, broken);
        let scheduler = DrainScheduler::new(
            store.clone(),
            monitor,
            applier,
            DrainConfig::for_testing(),
        );

        let task = Task::new("t1", "u1", "x");
        store
            .enqueue(task_record(&task, Operation::Create))
            .await
            .unwrap();

        for _ in 0..3 {
            scheduler.drain_now().await;
        }

        assert_eq!(store.len(), 0);
        let metrics = scheduler.metrics();
        assert_eq!(metrics.dropped, 1);
        assert_eq!(metrics.requeued, 2);
    }

    #[tokio::test]
    async fn test_poison_record_dropped_immediately() {
        let h = harness().await;
        let poison = BufferRecord::new("u1", Entity::Task, Operation::Create, b"{bad".to_vec(), 4);
        h.store.enqueue(poison).await.unwrap();

        h.scheduler.drain_now().await;

        assert_eq!(h.store.len(), 0);
        let metrics = h.scheduler.metrics();
        assert_eq!(metrics.poison, 1);
        assert_eq!(metrics.requeued, 0);
        assert!(h.tasks.is_empty());
    }

    #[tokio::test]
    async fn test_priority_classes_drain_in_key_order() {
        let h = harness().await;

        let task = Task::new("t1", "u1", "x");
        h.store
            .enqueue(task_record(&task, Operation::Create))
            .await
            .unwrap();
        let mut user = User::new("u1");
        user.role = "admin".to_string();
        h.store.enqueue(profile_record(&user)).await.unwrap();

        let batch = h.store.get_batch(10).await.unwrap();
        // Profile (priority 3) before task (priority 4) despite the later
        // enqueue.
        assert_eq!(batch[0].entity, Entity::Profile);

        h.scheduler.drain_now().await;

        assert_eq!(h.store.len(), 0);
        assert_eq!(h.users.get_by_id("u1").await.unwrap().role, "admin");
        assert_eq!(h.tasks.get_by_id("t1").await.unwrap().title, "x");
    }

    #[tokio::test]
    async fn test_mid_batch_unavailable_leaves_rest_untouched() {
        let h = harness().await;

        for i in 0..3 {
            let task = Task::new(format!("t{i}"), "u1", "x");
            h.store
                .enqueue(task_record(&task, Operation::Create))
                .await
                .unwrap();
        }

        // Monitor snapshot is stale-online, but the repository is gone.
        h.tasks.set_unavailable(true);

        h.scheduler.drain_now().await;

        // Nothing removed, nothing retried; the next tick sees all three.
        assert_eq!(h.store.len(), 3);
        let batch = h.store.get_batch(10).await.unwrap();
        assert!(batch.iter().all(|r| r.retries == 0));
    }

    #[tokio::test]
    async fn test_start_and_shutdown_drains_pending() {
        let h = harness().await;
        let task = Task::new("t1", "u1", "x");
        h.store
            .enqueue(task_record(&task, Operation::Create))
            .await
            .unwrap();

        let handle = h.scheduler.start();
        assert!(h.scheduler.is_running());

        tokio::time::sleep(Duration::from_millis(60)).await;
        h.scheduler.shutdown();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("drain loop should stop")
            .unwrap();

        assert!(!h.scheduler.is_running());
        assert_eq!(h.store.len(), 0);
    }

    #[test]
    fn test_config_defaults() {
        let config = DrainConfig::default();
        assert_eq!(config.interval, Duration::from_secs(30));
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.max_retries, 3);
    }
}

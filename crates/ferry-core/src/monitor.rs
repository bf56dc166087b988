// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Dependency health monitoring.
//!
//! The monitor periodically probes the primary row store, the primary KV
//! store and the operation buffer, and publishes the result as an
//! immutable [`HealthSnapshot`] behind a readers-writer lock. Mutating
//! handlers consult [`HealthMonitor::is_online`] to choose between a
//! direct apply and buffering; the drain scheduler skips its tick while
//! the snapshot reports offline.
//!
//! Each probe runs under its own bounded timeout so a hanging dependency
//! cannot stall the probe loop. A probe in flight when [`HealthMonitor::stop`]
//! is called may complete, but its result is discarded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::repository::{BufferProbe, HealthProbe};

// =============================================================================
// Health Snapshot
// =============================================================================

/// Immutable result of the most recent probe round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSnapshot {
    /// Primary row store reachability.
    pub postgresql: bool,

    /// Primary KV store reachability.
    pub redis: bool,

    /// Whether the buffer size query succeeded.
    pub buffer: bool,

    /// Number of buffered records at probe time.
    pub buffer_size: u64,

    /// When the probe round finished.
    pub last_check: DateTime<Utc>,
}

impl HealthSnapshot {
    /// Returns `true` when both primary stores are reachable.
    pub fn is_online(&self) -> bool {
        self.postgresql && self.redis
    }
}

impl Default for HealthSnapshot {
    fn default() -> Self {
        Self {
            postgresql: false,
            redis: false,
            buffer: false,
            buffer_size: 0,
            last_check: Utc::now(),
        }
    }
}

// =============================================================================
// Monitor Configuration
// =============================================================================

/// Configuration for the health monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Interval between probe rounds.
    #[serde(default = "default_probe_interval")]
    #[serde(with = "duration_secs")]
    pub probe_interval: Duration,

    /// Timeout for the row store probe.
    #[serde(default = "default_row_store_timeout")]
    #[serde(with = "duration_secs")]
    pub row_store_timeout: Duration,

    /// Timeout for the KV store probe.
    #[serde(default = "default_kv_store_timeout")]
    #[serde(with = "duration_secs")]
    pub kv_store_timeout: Duration,

    /// Timeout for the buffer size query.
    #[serde(default = "default_buffer_timeout")]
    #[serde(with = "duration_secs")]
    pub buffer_timeout: Duration,
}

fn default_probe_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_row_store_timeout() -> Duration {
    Duration::from_secs(3)
}

fn default_kv_store_timeout() -> Duration {
    Duration::from_secs(2)
}

fn default_buffer_timeout() -> Duration {
    Duration::from_secs(1)
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

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            probe_interval: default_probe_interval(),
            row_store_timeout: default_row_store_timeout(),
            kv_store_timeout: default_kv_store_timeout(),
            buffer_timeout: default_buffer_timeout(),
        }
    }
}

impl MonitorConfig {
    /// Creates a configuration with short intervals for testing.
    pub fn for_testing() -> Self {
        Self {
            probe_interval: Duration::from_millis(20),
            row_store_timeout: Duration::from_millis(200),
            kv_store_timeout: Duration::from_millis(200),
            buffer_timeout: Duration::from_millis(200),
        }
    }
}

// =============================================================================
// Health Monitor
// =============================================================================

/// Periodic prober of the dependency graph.
///
/// # Thread Safety
///
/// The monitor is `Send + Sync`; the probe loop runs in a background task
/// and replaces the snapshot under a writer lock, while `status()` and
/// `is_online()` take a reader lock and copy.
pub struct HealthMonitor {
    row_store: Arc<dyn HealthProbe>,
    kv_store: Arc<dyn HealthProbe>,
    buffer: Arc<dyn BufferProbe>,
    config: MonitorConfig,
    status: Arc<RwLock<HealthSnapshot>>,
    shutdown: Arc<Notify>,
    running: Arc<AtomicBool>,
}

impl HealthMonitor {
    /// Creates a monitor over the given probes. Call [`start`](Self::start)
    /// to begin probing.
    pub fn new(
        row_store: Arc<dyn HealthProbe>,
        kv_store: Arc<dyn HealthProbe>,
        buffer: Arc<dyn BufferProbe>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            row_store,
            kv_store,
            buffer,
            config,
            status: Arc::new(RwLock::new(HealthSnapshot::default())),
            shutdown: Arc::new(Notify::new()),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Starts the probe loop in the background.
    ///
    /// One probe round runs immediately so the snapshot is populated
    /// before the first interval elapses.
    pub fn start(&self) -> JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);

        let row_store = self.row_store.clone();
        let kv_store = self.kv_store.clone();
        let buffer = self.buffer.clone();
        let config = self.config.clone();
        let status = self.status.clone();
        let shutdown = self.shutdown.clone();
        let running = self.running.clone();

        tokio::spawn(async move {
            info!(
                interval_ms = config.probe_interval.as_millis() as u64,
                "health monitor started"
            );

            let mut interval = tokio::time::interval(config.probe_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    // The first tick fires immediately, populating the
                    // snapshot before the first interval elapses.
                    _ = interval.tick() => {
                        if !running.load(Ordering::SeqCst) {
                            break;
                        }
                        let snapshot =
                            Self::probe_round(&row_store, &kv_store, &buffer, &config).await;
                        // A round finishing after stop() is discarded;
                        // readers keep the last published snapshot.
                        if running.load(Ordering::SeqCst) {
                            *status.write() = snapshot;
                        }
                    }
                    _ = shutdown.notified() => {
                        break;
                    }
                }
            }

            running.store(false, Ordering::SeqCst);
            info!("health monitor stopped");
        })
    }

    /// Stops the probe loop. A probe already in flight is discarded.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.notify_one();
    }

    /// Returns `true` when the latest snapshot shows both primary stores up.
    pub fn is_online(&self) -> bool {
        self.status.read().is_online()
    }

    /// Returns a copy of the latest snapshot.
    pub fn status(&self) -> HealthSnapshot {
        self.status.read().clone()
    }

    /// Returns `true` if the probe loop is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Runs one probe round synchronously and publishes the result.
    pub async fn probe_now(&self) {
        let snapshot =
            Self::probe_round(&self.row_store, &self.kv_store, &self.buffer, &self.config).await;
        *self.status.write() = snapshot;
    }

    async fn probe_round(
        row_store: &Arc<dyn HealthProbe>,
        kv_store: &Arc<dyn HealthProbe>,
        buffer: &Arc<dyn BufferProbe>,
        config: &MonitorConfig,
    ) -> HealthSnapshot {
        let postgresql = Self::check_probe(row_store, config.row_store_timeout).await;
        let redis = Self::check_probe(kv_store, config.kv_store_timeout).await;
        let (buffer_up, buffer_size) = Self::check_buffer(buffer, config.buffer_timeout).await;

        let snapshot = HealthSnapshot {
            postgresql,
            redis,
            buffer: buffer_up,
            buffer_size,
            last_check: Utc::now(),
        };

        debug!(
            postgresql = snapshot.postgresql,
            redis = snapshot.redis,
            buffer_size = snapshot.buffer_size,
            "health snapshot refreshed"
        );

        snapshot
    }

    async fn check_probe(probe: &Arc<dyn HealthProbe>, timeout: Duration) -> bool {
        match tokio::time::timeout(timeout, probe.ping()).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(dependency = probe.name(), error = %e, "health probe failed");
                false
            }
            Err(_) => {
                warn!(dependency = probe.name(), "health probe timed out");
                false
            }
        }
    }

    async fn check_buffer(buffer: &Arc<dyn BufferProbe>, timeout: Duration) -> (bool, u64) {
        match tokio::time::timeout(timeout, buffer.depth()).await {
            Ok(Ok(size)) => (true, size),
            Ok(Err(e)) => {
                warn!(error = %e, "buffer size check failed");
                (false, 0)
            }
            Err(_) => {
                warn!("buffer size check timed out");
                (false, 0)
            }
        }
    }
}

impl std::fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("running", &self.is_running())
            .field("status", &self.status())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BufferResult, RepoError, RepoResult};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU64;

    struct StaticProbe {
        up: AtomicBool,
    }

    impl StaticProbe {
        fn up() -> Arc<Self> {
            Arc::new(Self {
                up: AtomicBool::new(true),
            })
        }

        fn down() -> Arc<Self> {
            Arc::new(Self {
                up: AtomicBool::new(false),
            })
        }

        fn set(&self, up: bool) {
            self.up.store(up, Ordering::Relaxed);
        }
    }

    #[async_trait]
    impl HealthProbe for StaticProbe {
        async fn ping(&self) -> RepoResult<()> {
            if self.up.load(Ordering::Relaxed) {
                Ok(())
            } else {
                Err(RepoError::unavailable("down"))
            }
        }

        fn name(&self) -> &'static str {
            "static"
        }
    }

    struct StaticDepth {
        depth: AtomicU64,
        fail: AtomicBool,
    }

    impl StaticDepth {
        fn of(depth: u64) -> Arc<Self> {
            Arc::new(Self {
                depth: AtomicU64::new(depth),
                fail: AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl BufferProbe for StaticDepth {
        async fn depth(&self) -> BufferResult<u64> {
            if self.fail.load(Ordering::Relaxed) {
                return Err(crate::error::BufferError::database("boom"));
            }
            Ok(self.depth.load(Ordering::Relaxed))
        }
    }

    fn monitor(
        row: Arc<StaticProbe>,
        kv: Arc<StaticProbe>,
        depth: Arc<StaticDepth>,
    ) -> HealthMonitor {
        HealthMonitor::new(row, kv, depth, MonitorConfig::for_testing())
    }

    #[tokio::test]
    async fn test_snapshot_all_up() {
        let m = monitor(StaticProbe::up(), StaticProbe::up(), StaticDepth::of(3));
        m.probe_now().await;

        let status = m.status();
        assert!(status.postgresql);
        assert!(status.redis);
        assert!(status.buffer);
        assert_eq!(status.buffer_size, 3);
        assert!(m.is_online());
    }

    #[tokio::test]
    async fn test_offline_when_row_store_down() {
        let row = StaticProbe::down();
        let m = monitor(row, StaticProbe::up(), StaticDepth::of(0));
        m.probe_now().await;

        assert!(!m.is_online());
        assert!(m.status().redis);
    }

    #[tokio::test]
    async fn test_online_requires_both_stores() {
        let kv = StaticProbe::down();
        let m = monitor(StaticProbe::up(), kv.clone(), StaticDepth::of(0));

        m.probe_now().await;
        assert!(!m.is_online());

        kv.set(true);
        m.probe_now().await;
        assert!(m.is_online());
    }

    #[tokio::test]
    async fn test_buffer_probe_failure_marks_buffer_down() {
        let depth = StaticDepth::of(7);
        depth.fail.store(true, Ordering::Relaxed);

        let m = monitor(StaticProbe::up(), StaticProbe::up(), depth);
        m.probe_now().await;

        let status = m.status();
        assert!(!status.buffer);
        assert_eq!(status.buffer_size, 0);
        // The primary stores alone decide online-ness.
        assert!(m.is_online());
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let m = monitor(StaticProbe::up(), StaticProbe::up(), StaticDepth::of(0));
        let handle = m.start();

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(m.is_running());
        assert!(m.is_online());

        m.stop();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("monitor loop should stop")
            .unwrap();
        assert!(!m.is_running());
    }

    #[tokio::test]
    async fn test_probe_now_without_start() {
        // Manual probes publish even when the background loop never ran.
        let m = monitor(StaticProbe::up(), StaticProbe::up(), StaticDepth::of(2));
        assert!(!m.is_online());

        m.probe_now().await;
        assert!(m.is_online());
        assert_eq!(m.status().buffer_size, 2);
    }
}

// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Buffer store trait and configuration.
//!
//! This module defines the core abstraction for the durable operation
//! queue. Implementations must provide:
//!
//! - **Atomic enqueue**: a record is either durably visible or the call
//!   errors; no partial writes.
//! - **Ordered batch reads**: iteration order is the storage key order
//!   `(priority, enqueued_at, id)`.
//! - **O(1) len**: `len()` and `is_empty()` answer from an atomic counter,
//!   never by scanning storage.
//! - **At-least-once requeue**: a requeue never loses the record, even if
//!   fused with the removal of its previous incarnation.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ferry_core::error::BufferResult;

use crate::record::BufferRecord;

/// Batch size used when `get_batch` is called with a zero limit.
pub const DEFAULT_BATCH_LIMIT: usize = 50;

// =============================================================================
// Buffer Configuration
// =============================================================================

/// Configuration for the buffer store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Path to the buffer storage directory.
    #[serde(default = "default_buffer_path")]
    pub path: String,

    /// Soft upper bound on buffered records (advisory).
    #[serde(default = "default_max_records")]
    pub max_records: u64,

    /// Retention window for `cleanup()`.
    #[serde(default = "default_retention")]
    #[serde(with = "duration_secs")]
    pub retention: Duration,

    /// Whether to fsync each write.
    #[serde(default)]
    pub sync_writes: bool,

    /// Enable compression (LZ4) for the persistent backend.
    #[serde(default = "default_compression")]
    pub compression: bool,

    /// Write buffer size for the persistent backend (in bytes).
    #[serde(default = "default_write_buffer_size")]
    pub write_buffer_size: usize,
}

fn default_buffer_path() -> String {
    "./data/buffer".to_string()
}

fn default_max_records() -> u64 {
    1_000_000
}

fn default_retention() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn default_compression() -> bool {
    true
}

fn default_write_buffer_size() -> usize {
    16 * 1024 * 1024
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

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            path: default_buffer_path(),
            max_records: default_max_records(),
            retention: default_retention(),
            sync_writes: false,
            compression: default_compression(),
            write_buffer_size: default_write_buffer_size(),
        }
    }
}

impl BufferConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> BufferConfigBuilder {
        BufferConfigBuilder::default()
    }

    /// Creates a configuration for testing (small limits, no compression).
    pub fn for_testing() -> Self {
        Self {
            path: "/tmp/ferry-buffer-test".to_string(),
            max_records: 10_000,
            retention: Duration::from_secs(3600),
            sync_writes: false,
            compression: false,
            write_buffer_size: 4 * 1024 * 1024,
        }
    }
}

/// Builder for [`BufferConfig`].
#[derive(Debug, Default)]
pub struct BufferConfigBuilder {
    config: BufferConfig,
}

impl BufferConfigBuilder {
    /// Sets the storage path.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.config.path = path.into();
        self
    }

    /// Sets the advisory record cap.
    pub fn max_records(mut self, max: u64) -> Self {
        self.config.max_records = max;
        self
    }

    /// Sets the retention window.
    pub fn retention(mut self, retention: Duration) -> Self {
        self.config.retention = retention;
        self
    }

    /// Sets whether writes are fsynced.
    pub fn sync_writes(mut self, sync: bool) -> Self {
        self.config.sync_writes = sync;
        self
    }

    /// Sets whether compression is enabled.
    pub fn compression(mut self, enabled: bool) -> Self {
        self.config.compression = enabled;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> BufferConfig {
        self.config
    }
}

// =============================================================================
// Queue Statistics
// =============================================================================

/// Lock-free store statistics. All operations are O(1).
#[derive(Debug, Default)]
pub struct QueueStatsInner {
    /// Records accepted by `enqueue` (cumulative).
    pub records_enqueued: AtomicU64,
    /// Records deleted by `remove` or `cleanup` (cumulative).
    pub records_removed: AtomicU64,
    /// Records re-inserted by `requeue` (cumulative).
    pub records_requeued: AtomicU64,
    /// Undecodable records skipped during iteration (cumulative).
    pub records_corrupt: AtomicU64,
    /// Current record count (live counter).
    pub current_records: AtomicU64,
}

impl QueueStatsInner {
    /// Creates statistics with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful enqueue.
    #[inline]
    pub fn record_enqueue(&self) {
        self.records_enqueued.fetch_add(1, Ordering::Relaxed);
        self.current_records.fetch_add(1, Ordering::Relaxed);
    }

    /// Records `count` removals.
    #[inline]
    pub fn record_removal(&self, count: u64) {
        self.records_removed.fetch_add(count, Ordering::Relaxed);
        self.current_records.fetch_sub(count, Ordering::Relaxed);
    }

    /// Records a requeue (count unchanged).
    #[inline]
    pub fn record_requeue(&self) {
        self.records_requeued.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a corrupt record skipped during iteration.
    #[inline]
    pub fn record_corrupt(&self) {
        self.records_corrupt.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the O(1) current record count.
    #[inline]
    pub fn current_records(&self) -> u64 {
        self.current_records.load(Ordering::Relaxed)
    }

    /// Creates an immutable snapshot.
    pub fn snapshot(&self) -> QueueStats {
        QueueStats {
            records_enqueued: self.records_enqueued.load(Ordering::Relaxed),
            records_removed: self.records_removed.load(Ordering::Relaxed),
            records_requeued: self.records_requeued.load(Ordering::Relaxed),
            records_corrupt: self.records_corrupt.load(Ordering::Relaxed),
            current_records: self.current_records.load(Ordering::Relaxed),
        }
    }

    /// Resets all counters (for testing).
    pub fn reset(&self) {
        self.records_enqueued.store(0, Ordering::Relaxed);
        self.records_removed.store(0, Ordering::Relaxed);
        self.records_requeued.store(0, Ordering::Relaxed);
        self.records_corrupt.store(0, Ordering::Relaxed);
        self.current_records.store(0, Ordering::Relaxed);
    }
}

/// Immutable snapshot of store statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStats {
    /// Records accepted by `enqueue` (cumulative).
    pub records_enqueued: u64,
    /// Records deleted by `remove` or `cleanup` (cumulative).
    pub records_removed: u64,
    /// Records re-inserted by `requeue` (cumulative).
    pub records_requeued: u64,
    /// Undecodable records skipped during iteration (cumulative).
    pub records_corrupt: u64,
    /// Current record count.
    pub current_records: u64,
}

// =============================================================================
// BufferStore Trait
// =============================================================================

/// The durable, ordered, single-process operation queue.
///
/// # Implementation Requirements
///
/// - `len()` and `is_empty()` MUST be O(1) via atomic counters
/// - `get_batch` must observe a consistent snapshot for its duration
/// - Concurrent enqueues must serialize without blocking batch readers
/// - Corrupted records are skipped during iteration, counted, and left in
///   place
#[async_trait]
pub trait BufferStore: Send + Sync + Debug {
    /// Normalizes and durably stores a record.
    ///
    /// Returns the stored record with its id, priority and storage key
    /// populated. The write is atomic: on error the record is not
    /// visible.
    async fn enqueue(&self, record: BufferRecord) -> BufferResult<BufferRecord>;

    /// Returns up to `limit` records in `(priority, enqueued_at, id)`
    /// order without removing them. A zero limit falls back to
    /// [`DEFAULT_BATCH_LIMIT`]. Each record carries its storage key
    /// handle for later removal.
    async fn get_batch(&self, limit: usize) -> BufferResult<Vec<BufferRecord>>;

    /// Deletes a record by its storage key handle, falling back to a
    /// lookup by id when the handle is absent.
    async fn remove(&self, record: &BufferRecord) -> BufferResult<()>;

    /// Re-inserts a record with a refreshed `enqueued_at`, removing its
    /// previous incarnation. The record is never observably absent.
    async fn requeue(&self, record: BufferRecord) -> BufferResult<BufferRecord>;

    /// Returns the current record count.
    ///
    /// # Performance
    ///
    /// **MUST be O(1)** via an atomic counter.
    fn len(&self) -> usize;

    /// Returns `true` if the store holds no records.
    #[inline]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes records whose `enqueued_at` is before `older_than`.
    /// Returns the number of records removed.
    async fn cleanup(&self, older_than: DateTime<Utc>) -> BufferResult<u64>;

    /// Removes every record.
    async fn clear(&self) -> BufferResult<()>;

    /// Flushes pending writes to durable storage.
    async fn sync(&self) -> BufferResult<()>;

    /// Returns a snapshot of the store statistics.
    fn stats(&self) -> QueueStats;

    /// Returns the configuration used by this store.
    fn config(&self) -> &BufferConfig;
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = BufferConfig::default();
        assert_eq!(config.max_records, 1_000_000);
        assert_eq!(config.retention, Duration::from_secs(86_400));
        assert!(config.compression);
        assert!(!config.sync_writes);
    }

    #[test]
    fn test_config_builder() {
        let config = BufferConfig::builder()
            .path("/tmp/q")
            .max_records(500)
            .retention(Duration::from_secs(60))
            .compression(false)
            .build();

        assert_eq!(config.path, "/tmp/q");
        assert_eq!(config.max_records, 500);
        assert_eq!(config.retention, Duration::from_secs(60));
        assert!(!config.compression);
    }

    #[test]
    fn test_stats_enqueue_and_removal() {
        let stats = QueueStatsInner::new();

        stats.record_enqueue();
        stats.record_enqueue();
        assert_eq!(stats.current_records(), 2);

        stats.record_removal(1);
        assert_eq!(stats.current_records(), 1);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.records_enqueued, 2);
        assert_eq!(snapshot.records_removed, 1);
        assert_eq!(snapshot.current_records, 1);
    }

    #[test]
    fn test_stats_requeue_keeps_count() {
        let stats = QueueStatsInner::new();
        stats.record_enqueue();
        stats.record_requeue();

        assert_eq!(stats.current_records(), 1);
        assert_eq!(stats.snapshot().records_requeued, 1);
    }

    #[test]
    fn test_stats_reset() {
        let stats = QueueStatsInner::new();
        stats.record_enqueue();
        stats.record_corrupt();
        stats.reset();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.records_enqueued, 0);
        assert_eq!(snapshot.records_corrupt, 0);
        assert_eq!(snapshot.current_records, 0);
    }
}

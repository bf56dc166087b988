// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! In-memory buffer store for testing and development.
//!
//! Records live in a `BTreeMap` keyed by the same byte-sortable key the
//! persistent backend uses, so iteration order is identical:
//! `(priority, enqueued_at, id)`. Data is lost when the store is dropped.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use ferry_core::error::BufferResult;
use ferry_core::repository::BufferProbe;

use crate::record::BufferRecord;
use crate::traits::{BufferConfig, BufferStore, QueueStats, QueueStatsInner, DEFAULT_BATCH_LIMIT};

// =============================================================================
// Memory Buffer
// =============================================================================

/// An in-memory [`BufferStore`] implementation.
///
/// # Thread Safety
///
/// `Send + Sync`. The ordered map is protected by a `parking_lot::RwLock`
/// and the record count by an atomic, so `len()` never takes the lock.
#[derive(Debug)]
pub struct MemoryBuffer {
    entries: RwLock<BTreeMap<Vec<u8>, BufferRecord>>,
    config: BufferConfig,
    record_count: AtomicU64,
    stats: QueueStatsInner,
}

impl MemoryBuffer {
    /// Creates an empty in-memory buffer.
    pub fn new(config: BufferConfig) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            config,
            record_count: AtomicU64::new(0),
            stats: QueueStatsInner::new(),
        }
    }

    /// Creates a buffer with the testing configuration.
    pub fn with_defaults() -> Self {
        Self::new(BufferConfig::for_testing())
    }

    fn remove_key(&self, key: &[u8]) -> bool {
        let removed = self.entries.write().remove(key).is_some();
        if removed {
            self.record_count.fetch_sub(1, Ordering::Relaxed);
            self.stats.record_removal(1);
        }
        removed
    }

    fn find_key_by_id(&self, id: &str) -> Option<Vec<u8>> {
        self.entries
            .read()
            .iter()
            .find(|(_, record)| record.id == id)
            .map(|(key, _)| key.clone())
    }
}

#[async_trait]
impl BufferStore for MemoryBuffer {
    async fn enqueue(&self, mut record: BufferRecord) -> BufferResult<BufferRecord> {
        record.normalize();
        let key = record.key();
        record.storage_key = Some(key.clone());

        self.entries.write().insert(key, record.clone());
        let count = self.record_count.fetch_add(1, Ordering::Relaxed) + 1;
        self.stats.record_enqueue();

        // The cap is advisory: records are never evicted, only flagged.
        if count > self.config.max_records {
            tracing::warn!(
                records = count,
                max_records = self.config.max_records,
                "buffer exceeds its advisory capacity"
            );
        }

        Ok(record)
    }

    async fn get_batch(&self, limit: usize) -> BufferResult<Vec<BufferRecord>> {
        let limit = if limit == 0 { DEFAULT_BATCH_LIMIT } else { limit };

        let entries = self.entries.read();
        Ok(entries.values().take(limit).cloned().collect())
    }

    async fn remove(&self, record: &BufferRecord) -> BufferResult<()> {
        match &record.storage_key {
            Some(key) => {
                self.remove_key(key);
            }
            None => {
                if let Some(key) = self.find_key_by_id(&record.id) {
                    self.remove_key(&key);
                }
            }
        }
        Ok(())
    }

    async fn requeue(&self, mut record: BufferRecord) -> BufferResult<BufferRecord> {
        let old_key = record.storage_key.take();
        record.enqueued_at = Utc::now();
        record.normalize();
        let new_key = record.key();
        record.storage_key = Some(new_key.clone());

        // Swap under one write lock so the record is never absent.
        {
            let mut entries = self.entries.write();
            if let Some(key) = old_key {
                entries.remove(&key);
            }
            entries.insert(new_key, record.clone());
        }
        self.stats.record_requeue();

        Ok(record)
    }

    #[inline]
    fn len(&self) -> usize {
        self.record_count.load(Ordering::Relaxed) as usize
    }

    async fn cleanup(&self, older_than: DateTime<Utc>) -> BufferResult<u64> {
        let mut removed = 0u64;
        {
            let mut entries = self.entries.write();
            entries.retain(|_, record| {
                let keep = record.enqueued_at >= older_than;
                if !keep {
                    removed += 1;
                }
                keep
            });
        }

        if removed > 0 {
            self.record_count.fetch_sub(removed, Ordering::Relaxed);
            self.stats.record_removal(removed);
        }
        Ok(removed)
    }

    async fn clear(&self) -> BufferResult<()> {
        self.entries.write().clear();
        self.record_count.store(0, Ordering::Relaxed);
        self.stats.reset();
        Ok(())
    }

    async fn sync(&self) -> BufferResult<()> {
        // No persistence to flush.
        Ok(())
    }

    fn stats(&self) -> QueueStats {
        self.stats.snapshot()
    }

    fn config(&self) -> &BufferConfig {
        &self.config
    }
}

#[async_trait]
impl BufferProbe for MemoryBuffer {
    async fn depth(&self) -> BufferResult<u64> {
        Ok(self.record_count.load(Ordering::Relaxed))
    }
}

// =============================================================================
// Tests
// =============================================================================

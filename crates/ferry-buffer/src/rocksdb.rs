// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! RocksDB-based persistent buffer store.
//!
//! This backend owns the buffer directory exclusively: RocksDB holds an
//! OS-level lock on its `LOCK` file, so a second process (or a second
//! open in the same process) fails immediately and the error surfaces as
//! `BufferError::Unavailable`. The store survives restarts; the record
//! counter is reconstructed by a full scan on open.
//!
//! # Key Format
//!
//! Keys come from [`BufferRecord::key`]:
//! `[priority:1][enqueued_at_nanos:8 BE][id]`. Plain forward iteration
//! therefore yields records in drain order.
//!
//! # Envelope Format
//!
//! Records are stored as bincode-encoded [`StorableRecord`]s, a flat
//! mirror of [`BufferRecord`] that keeps chrono's string encoding and the
//! transient storage handle out of the on-disk envelope. Envelopes that
//! fail to decode are skipped during iteration and counted, never
//! deleted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{
    BlockBasedOptions, DBCompressionType, IteratorMode, Options, WriteBatch, WriteOptions, DB,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use ferry_core::error::{BufferError, BufferResult};
use ferry_core::repository::BufferProbe;

use crate::metrics;
use crate::record::{BufferRecord, Entity, Operation};
use crate::traits::{BufferConfig, BufferStore, QueueStats, QueueStatsInner, DEFAULT_BATCH_LIMIT};

// =============================================================================
// Storage Envelope
// =============================================================================

/// Flat on-disk representation of a buffer record.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StorableRecord {
    id: String,
    owner_id: String,
    entity: StorableEntity,
    operation: StorableOperation,
    payload: Vec<u8>,
    priority: u8,
    retries: u32,
    enqueued_at_nanos: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
enum StorableEntity {
    Profile,
    Task,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
enum StorableOperation {
    Create,
    Update,
    Delete,
}

impl StorableRecord {
    fn from_record(record: &BufferRecord) -> Self {
        Self {
            id: record.id.clone(),
            owner_id: record.owner_id.clone(),
            entity: match record.entity {
                Entity::Profile => StorableEntity::Profile,
                Entity::Task => StorableEntity::Task,
            },
            operation: match record.operation {
                Operation::Create => StorableOperation::Create,
                Operation::Update => StorableOperation::Update,
                Operation::Delete => StorableOperation::Delete,
            },
            payload: record.payload.clone(),
            priority: record.priority,
            retries: record.retries,
            enqueued_at_nanos: record.enqueued_at_nanos(),
        }
    }

    fn into_record(self) -> BufferRecord {
        BufferRecord {
            id: self.id,
            owner_id: self.owner_id,
            entity: match self.entity {
                StorableEntity::Profile => Entity::Profile,
                StorableEntity::Task => Entity::Task,
            },
            operation: match self.operation {
                StorableOperation::Create => Operation::Create,
                StorableOperation::Update => Operation::Update,
                StorableOperation::Delete => Operation::Delete,
            },
            payload: self.payload,
            priority: self.priority,
            retries: self.retries,
            enqueued_at: DateTime::from_timestamp_nanos(self.enqueued_at_nanos),
            storage_key: None,
        }
    }
}

// =============================================================================
// RocksDB Buffer
// =============================================================================

/// A persistent [`BufferStore`] backed by RocksDB.
///
/// # Thread Safety
///
/// `Send + Sync`. RocksDB handles internal locking; the record counter is
/// an atomic, so `len()` is O(1) and never touches the database.
#[derive(Debug)]
pub struct RocksDbBuffer {
    db: Arc<DB>,
    config: BufferConfig,
    record_count: AtomicU64,
    stats: QueueStatsInner,
}

impl RocksDbBuffer {
    /// Opens (or creates) the buffer at `config.path`.
    ///
    /// Fails with `BufferError::Unavailable` when another process holds
    /// the store's lock, and reconstructs the record counter by scanning
    /// existing data.
    pub async fn open(config: BufferConfig) -> BufferResult<Self> {
        let path = config.path.clone();
        let db_config = config.clone();

        let db = tokio::task::spawn_blocking(move || Self::open_db(&path, &db_config))
            .await
            .map_err(|e| BufferError::database(format!("open task failed: {e}")))?
            .map_err(map_open_error)?;

        let db = Arc::new(db);
        let record_count = Self::reconstruct_counter(&db)?;

        info!(
            path = %config.path,
            records = record_count,
            "buffer store opened"
        );

        let store = Self {
            db,
            config,
            record_count: AtomicU64::new(record_count),
            stats: QueueStatsInner::new(),
        };
        store
            .stats
            .current_records
            .store(record_count, Ordering::Relaxed);

        Ok(store)
    }

    fn open_db(path: &str, config: &BufferConfig) -> Result<DB, rocksdb::Error> {
        if let Err(e) = std::fs::create_dir_all(path) {
            warn!(path = %path, error = %e, "failed to create buffer directory");
        }

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_write_buffer_size(config.write_buffer_size);

        if config.compression {
            opts.set_compression_type(DBCompressionType::Lz4);
        } else {
            opts.set_compression_type(DBCompressionType::None);
        }

        let mut block_opts = BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);

        opts.set_max_background_jobs(2);

        DB::open(&opts, path)
    }

    /// Reconstructs the record counter by scanning the database.
    fn reconstruct_counter(db: &DB) -> BufferResult<u64> {
        let mut count = 0u64;
        for result in db.iterator(IteratorMode::Start) {
            match result {
                Ok(_) => count += 1,
                Err(e) => warn!(error = %e, "iterator error during counter reconstruction"),
            }
        }
        debug!(records = count, "buffer counter reconstructed");
        Ok(count)
    }

    fn serialize_record(record: &BufferRecord) -> BufferResult<Vec<u8>> {
        bincode::serialize(&StorableRecord::from_record(record))
            .map_err(|e| BufferError::store_failed(format!("serialization error: {e}")))
    }

    fn deserialize_record(bytes: &[u8]) -> BufferResult<BufferRecord> {
        let storable: StorableRecord = bincode::deserialize(bytes)
            .map_err(|e| BufferError::corrupted_data(format!("deserialization error: {e}")))?;
        Ok(storable.into_record())
    }

    fn write_options(&self) -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(self.config.sync_writes);
        opts
    }

    /// Scans for the key holding the record with the given id.
    async fn find_key_by_id(&self, id: String) -> BufferResult<Option<Vec<u8>>> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            for result in db.iterator(IteratorMode::Start) {
                let (key, value) = match result {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!(error = %e, "iterator error during id lookup");
                        continue;
                    }
                };
                if let Ok(record) = Self::deserialize_record(&value) {
                    if record.id == id {
                        return Ok(Some(key.to_vec()));
                    }
                }
            }
            Ok(None)
        })
        .await
        .map_err(|e| BufferError::database(format!("lookup task failed: {e}")))?
    }

    async fn delete_key(&self, key: Vec<u8>) -> BufferResult<()> {
        let db = self.db.clone();
        let write_opts = self.write_options();
        tokio::task::spawn_blocking(move || {
            db.delete_opt(&key, &write_opts)
                .map_err(|e| BufferError::database(format!("delete failed: {e}")))
        })
        .await
        .map_err(|e| BufferError::database(format!("delete task failed: {e}")))??;

        self.record_count.fetch_sub(1, Ordering::Relaxed);
        self.stats.record_removal(1);
        Ok(())
    }
}

fn map_open_error(e: rocksdb::Error) -> BufferError {
    let message = e.to_string();
    if message.to_lowercase().contains("lock") {
        BufferError::unavailable(format!("buffer store is locked: {message}"))
    } else {
        BufferError::database(format!("failed to open buffer store: {message}"))
    }
}

#[async_trait]
impl BufferStore for RocksDbBuffer {
    async fn enqueue(&self, mut record: BufferRecord) -> BufferResult<BufferRecord> {
        record.normalize();
        let key = record.key();
        record.storage_key = Some(key.clone());

        let serialized = Self::serialize_record(&record)?;
        let db = self.db.clone();
        let write_opts = self.write_options();

        tokio::task::spawn_blocking(move || {
            db.put_opt(&key, &serialized, &write_opts)
                .map_err(|e| BufferError::store_failed(format!("put failed: {e}")))
        })
        .await
        .map_err(|e| BufferError::store_failed(format!("enqueue task failed: {e}")))??;

        let count = self.record_count.fetch_add(1, Ordering::Relaxed) + 1;
        self.stats.record_enqueue();

        // The cap is advisory: records are never evicted, only flagged.
        if count > self.config.max_records {
            warn!(
                records = count,
                max_records = self.config.max_records,
                "buffer exceeds its advisory capacity"
            );
        }

        Ok(record)
    }

    async fn get_batch(&self, limit: usize) -> BufferResult<Vec<BufferRecord>> {
        let limit = if limit == 0 { DEFAULT_BATCH_LIMIT } else { limit };
        let db = self.db.clone();

        let (records, corrupt) = tokio::task::spawn_blocking(move || {
            let mut records = Vec::with_capacity(limit);
            let mut corrupt = 0u64;

            for result in db.iterator(IteratorMode::Start) {
                if records.len() >= limit {
                    break;
                }
                match result {
                    Ok((key, value)) => match Self::deserialize_record(&value) {
                        Ok(mut record) => {
                            record.storage_key = Some(key.to_vec());
                            records.push(record);
                        }
                        Err(e) => {
                            // Corrupted envelopes are left in place.
                            warn!(error = %e, "skipping corrupted buffer record");
                            corrupt += 1;
                        }
                    },
                    Err(e) => {
                        warn!(error = %e, "iterator error during batch read");
                    }
                }
            }

            Ok::<_, BufferError>((records, corrupt))
        })
        .await
        .map_err(|e| BufferError::database(format!("batch task failed: {e}")))??;

        for _ in 0..corrupt {
            self.stats.record_corrupt();
            metrics::inc_corrupt();
        }

        Ok(records)
    }

    async fn remove(&self, record: &BufferRecord) -> BufferResult<()> {
        match &record.storage_key {
            Some(key) => self.delete_key(key.clone()).await,
            None => match self.find_key_by_id(record.id.clone()).await? {
                Some(key) => self.delete_key(key).await,
                None => Ok(()),
            },
        }
    }

    async fn requeue(&self, mut record: BufferRecord) -> BufferResult<BufferRecord> {
        let old_key = record.storage_key.take();
        record.enqueued_at = Utc::now();
        record.normalize();

        let new_key = record.key();
        record.storage_key = Some(new_key.clone());
        let serialized = Self::serialize_record(&record)?;

        let db = self.db.clone();
        let write_opts = self.write_options();

        // Delete + put in one batch: a crash cannot observe the record
        // absent.
        tokio::task::spawn_blocking(move || {
            let mut batch = WriteBatch::default();
            if let Some(key) = old_key {
                batch.delete(&key);
            }
            batch.put(&new_key, &serialized);
            db.write_opt(batch, &write_opts)
                .map_err(|e| BufferError::store_failed(format!("requeue batch failed: {e}")))
        })
        .await
        .map_err(|e| BufferError::store_failed(format!("requeue task failed: {e}")))??;

        self.stats.record_requeue();
        Ok(record)
    }

    #[inline]
    fn len(&self) -> usize {
        self.record_count.load(Ordering::Relaxed) as usize
    }

    async fn cleanup(&self, older_than: DateTime<Utc>) -> BufferResult<u64> {
        let cutoff_nanos = older_than.timestamp_nanos_opt().unwrap_or(0);
        let db = self.db.clone();
        let write_opts = self.write_options();

        let removed = tokio::task::spawn_blocking(move || {
            let mut batch = WriteBatch::default();
            let mut removed = 0u64;

            for result in db.iterator(IteratorMode::Start) {
                let (key, value) = match result {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!(error = %e, "iterator error during cleanup");
                        continue;
                    }
                };
                match Self::deserialize_record(&value) {
                    Ok(record) if record.enqueued_at_nanos() < cutoff_nanos => {
                        batch.delete(&key);
                        removed += 1;
                    }
                    Ok(_) => {}
                    Err(_) => {
                        // Corrupted envelopes are handled by iteration
                        // skipping, not retention.
                    }
                }
            }

            if removed > 0 {
                db.write_opt(batch, &write_opts)
                    .map_err(|e| BufferError::database(format!("cleanup batch failed: {e}")))?;
            }
            Ok::<_, BufferError>(removed)
        })
        .await
        .map_err(|e| BufferError::database(format!("cleanup task failed: {e}")))??;

        if removed > 0 {
            self.record_count.fetch_sub(removed, Ordering::Relaxed);
            self.stats.record_removal(removed);
            info!(removed, "expired buffer records removed");
        }
        Ok(removed)
    }

    async fn clear(&self) -> BufferResult<()> {
        let db = self.db.clone();

        tokio::task::spawn_blocking(move || {
            let mut batch = WriteBatch::default();
            for entry in db.iterator(IteratorMode::Start).flatten() {
                batch.delete(&entry.0);
            }
            db.write(batch)
                .map_err(|e| BufferError::database(format!("clear failed: {e}")))
        })
        .await
        .map_err(|e| BufferError::database(format!("clear task failed: {e}")))??;

        self.record_count.store(0, Ordering::Relaxed);
        self.stats.reset();
        Ok(())
    }

    async fn sync(&self) -> BufferResult<()> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            db.flush()
                .map_err(|e| BufferError::database(format!("flush failed: {e}")))
        })
        .await
        .map_err(|e| BufferError::database(format!("sync task failed: {e}")))?
    }

    fn stats(&self) -> QueueStats {
        self.stats.snapshot()
    }

    fn config(&self) -> &BufferConfig {
        &self.config
    }
}

#[async_trait]
impl BufferProbe for RocksDbBuffer {
    async fn depth(&self) -> BufferResult<u64> {
        Ok(self.record_count.load(Ordering::Relaxed))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Entity, Operation};
    use tempfile::TempDir;

    fn record(priority: u8) -> BufferRecord {
        BufferRecord::new(
            "u1",
            Entity::Task,
            Operation::Create,
            br#"{"id":"t1"}"#.to_vec(),
            priority,
        )
    }

    async fn open_store() -> (RocksDbBuffer, TempDir) {
        let temp = TempDir::new().unwrap();
        let config = BufferConfig::builder()
            .path(temp.path().to_str().unwrap())
            .compression(false)
            .build();
        let store = RocksDbBuffer::open(config).await.unwrap();
        (store, temp)
    }

    #[tokio::test]
    async fn test_enqueue_and_batch() {
        let (store, _temp) = open_store().await;

        store.enqueue(record(3)).await.unwrap();
        store.enqueue(record(3)).await.unwrap();

        assert_eq!(store.len(), 2);
        let batch = store.get_batch(10).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert!(batch[0].storage_key.is_some());
    }

    #[tokio::test]
    async fn test_priority_ordering() {
        let (store, _temp) = open_store().await;

        let low = store.enqueue(record(5)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let high = store.enqueue(record(1)).await.unwrap();

        let batch = store.get_batch(10).await.unwrap();
        assert_eq!(batch[0].id, high.id);
        assert_eq!(batch[1].id, low.id);
    }

    #[tokio::test]
    async fn test_enqueue_time_ordering_within_priority() {
        let (store, _temp) = open_store().await;

        let first = store.enqueue(record(3)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let second = store.enqueue(record(3)).await.unwrap();

        let batch = store.get_batch(10).await.unwrap();
        assert_eq!(batch[0].id, first.id);
        assert_eq!(batch[1].id, second.id);
    }

    #[tokio::test]
    async fn test_remove_by_handle_and_by_id() {
        let (store, _temp) = open_store().await;

        let by_handle = store.enqueue(record(3)).await.unwrap();
        let mut by_id = store.enqueue(record(3)).await.unwrap();
        by_id.storage_key = None;

        store.remove(&by_handle).await.unwrap();
        assert_eq!(store.len(), 1);

        store.remove(&by_id).await.unwrap();
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn test_requeue_refreshes_timestamp_and_keeps_record() {
        let (store, _temp) = open_store().await;
        let mut stored = store.enqueue(record(3)).await.unwrap();
        let id = stored.id.clone();

        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        stored.retries += 1;
        let requeued = store.requeue(stored).await.unwrap();

        assert_eq!(requeued.id, id);
        assert_eq!(requeued.retries, 1);
        assert_eq!(store.len(), 1);

        let batch = store.get_batch(10).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].retries, 1);
    }

    #[tokio::test]
    async fn test_persistence_across_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().to_str().unwrap().to_string();

        {
            let config = BufferConfig::builder().path(&path).compression(false).build();
            let store = RocksDbBuffer::open(config).await.unwrap();
            for _ in 0..5 {
                store.enqueue(record(3)).await.unwrap();
            }
            store.sync().await.unwrap();
        }

        {
            let config = BufferConfig::builder().path(&path).compression(false).build();
            let store = RocksDbBuffer::open(config).await.unwrap();
            assert_eq!(store.len(), 5);
            assert_eq!(store.get_batch(10).await.unwrap().len(), 5);
        }
    }

    #[tokio::test]
    async fn test_second_open_is_unavailable() {
        let (store, temp) = open_store().await;

        let config = BufferConfig::builder()
            .path(temp.path().to_str().unwrap())
            .compression(false)
            .build();
        let err = RocksDbBuffer::open(config).await.unwrap_err();
        assert!(matches!(err, BufferError::Unavailable { .. }));

        drop(store);
    }

    #[tokio::test]
    async fn test_cleanup_removes_expired() {
        let (store, _temp) = open_store().await;

        store.enqueue(record(3)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let cutoff = Utc::now();
        store.enqueue(record(3)).await.unwrap();

        let removed = store.cleanup(cutoff).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_record_skipped_not_removed() {
        let (store, _temp) = open_store().await;
        store.enqueue(record(3)).await.unwrap();

        // Plant an undecodable envelope directly in the database.
        store.db.put(b"\x02garbage-key", b"not bincode").unwrap();

        let batch = store.get_batch(10).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(store.stats().records_corrupt, 1);

        // Still present on a second read.
        store.get_batch(10).await.unwrap();
        assert_eq!(store.stats().records_corrupt, 2);
    }

    #[tokio::test]
    async fn test_clear_resets_counters() {
        let (store, _temp) = open_store().await;
        for _ in 0..4 {
            store.enqueue(record(3)).await.unwrap();
        }

        store.clear().await.unwrap();
        assert_eq!(store.len(), 0);
        assert!(store.get_batch(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_batch_limit_zero_uses_default() {
        let (store, _temp) = open_store().await;
        store.enqueue(record(3)).await.unwrap();

        let batch = store.get_batch(0).await.unwrap();
        assert_eq!(batch.len(), 1);
    }

    #[tokio::test]
    async fn test_depth_probe() {
        let (store, _temp) = open_store().await;
        store.enqueue(record(3)).await.unwrap();
        assert_eq!(store.depth().await.unwrap(), 1);
    }
}

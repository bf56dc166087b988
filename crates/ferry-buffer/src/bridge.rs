// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Operation buffer bridge.
//!
//! The bridge is what mutating handlers talk to. It converts a
//! domain-level mutation into either an immediate apply against the
//! primary store, or a durable enqueue for later replay:
//!
//! 1. If the health monitor reports online, attempt the apply directly.
//!    On success the caller is done.
//! 2. On apply failure (or offline), serialize the object and enqueue it.
//!    The caller sees success as soon as the record is durable; the
//!    original intent is preserved for the drain scheduler.
//!
//! Task mutations are enqueued one priority class below profile updates,
//! so with lower-value-first drain order a backlog of profile upserts
//! clears before the task backlog. The assignment per `(entity,
//! operation)` is deterministic, which is the property replays depend on.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use ferry_core::error::{BufferError, BufferResult};
use ferry_core::monitor::HealthMonitor;
use ferry_core::types::{Task, User};

use crate::apply::Applier;
use crate::metrics;
use crate::record::{BufferRecord, Entity, Operation};
use crate::traits::BufferStore;

/// Drain priority for profile updates.
pub const PROFILE_PRIORITY: u8 = 3;

/// Drain priority for task mutations.
pub const TASK_PRIORITY: u8 = 4;

// =============================================================================
// OperationBuffer Trait
// =============================================================================

/// The surface mutating handlers depend on.
#[async_trait]
pub trait OperationBuffer: Send + Sync {
    /// Applies or buffers a profile mutation.
    async fn buffer_profile(&self, operation: Operation, user: &User) -> BufferResult<()>;

    /// Applies or buffers a task mutation.
    async fn buffer_task(&self, operation: Operation, task: &Task) -> BufferResult<()>;
}

// =============================================================================
// BufferBridge
// =============================================================================

/// Default [`OperationBuffer`] implementation over a buffer store, the
/// health monitor and the repository applier.
pub struct BufferBridge {
    store: Arc<dyn BufferStore>,
    monitor: Arc<HealthMonitor>,
    applier: Applier,
}

impl BufferBridge {
    /// Creates a bridge.
    pub fn new(
        store: Arc<dyn BufferStore>,
        monitor: Arc<HealthMonitor>,
        applier: Applier,
    ) -> Self {
        Self {
            store,
            monitor,
            applier,
        }
    }

    /// Attempts a direct apply when online, otherwise (or on failure)
    /// persists the record for replay.
    async fn apply_or_enqueue(&self, record: BufferRecord) -> BufferResult<()> {
        if self.monitor.is_online() {
            match self.applier.apply(&record).await {
                Ok(()) => {
                    debug!(
                        record_id = %record.id,
                        entity = %record.entity,
                        operation = %record.operation,
                        "operation applied directly"
                    );
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        record_id = %record.id,
                        entity = %record.entity,
                        operation = %record.operation,
                        error = %e,
                        "direct apply failed, buffering"
                    );
                }
            }
        }

        let stored = self.store.enqueue(record).await?;
        metrics::inc_enqueued();
        debug!(
            record_id = %stored.id,
            entity = %stored.entity,
            operation = %stored.operation,
            priority = stored.priority,
            "operation buffered"
        );
        Ok(())
    }
}

#[async_trait]
impl OperationBuffer for BufferBridge {
    async fn buffer_profile(&self, operation: Operation, user: &User) -> BufferResult<()> {
        if user.id.is_empty() {
            return Err(BufferError::store_failed("user id is empty"));
        }
        let payload = serde_json::to_vec(user)
            .map_err(|e| BufferError::store_failed(format!("payload encode failed: {e}")))?;

        let record = BufferRecord::new(
            &user.id,
            Entity::Profile,
            operation,
            payload,
            PROFILE_PRIORITY,
        );
        self.apply_or_enqueue(record).await
    }

    async fn buffer_task(&self, operation: Operation, task: &Task) -> BufferResult<()> {
        if task.id.is_empty() {
            return Err(BufferError::store_failed("task id is empty"));
        }
        let payload = serde_json::to_vec(task)
            .map_err(|e| BufferError::store_failed(format!("payload encode failed: {e}")))?;

        // Task records reuse the task id so repeated failures of the same
        // mutation keep one identity in the logs.
        let mut record =
            BufferRecord::new(&task.user_id, Entity::Task, operation, payload, TASK_PRIORITY);
        record.id = task.id.clone();
        self.apply_or_enqueue(record).await
    }
}

impl std::fmt::Debug for BufferBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferBridge")
            .field("buffered", &self.store.len())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBuffer;
    use ferry_core::memory::{MemoryTaskRepository, MemoryUserRepository};
    use ferry_core::monitor::MonitorConfig;
    use ferry_core::repository::UserRepository;

    struct Harness {
        bridge: BufferBridge,
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
            bridge: BufferBridge::new(store.clone(), monitor.clone(), applier),
            store,
            users,
            tasks,
            monitor,
        }
    }

    #[tokio::test]
    async fn test_online_applies_directly() {
        let h = harness().await;
        let mut user = User::new("u1");
        user.role = "admin".to_string();

        h.bridge.buffer_profile(Operation::Update, &user).await.unwrap();

        assert_eq!(h.users.get_by_id("u1").await.unwrap().role, "admin");
        assert_eq!(h.store.len(), 0);
    }

    #[tokio::test]
    async fn test_offline_enqueues() {
        let h = harness().await;
        h.users.set_unavailable(true);
        h.monitor.probe_now().await;
        assert!(!h.monitor.is_online());

        let task = Task::new("t1", "u1", "x");
        h.bridge.buffer_task(Operation::Create, &task).await.unwrap();

        assert_eq!(h.store.len(), 1);
        let batch = h.store.get_batch(10).await.unwrap();
        assert_eq!(batch[0].entity, Entity::Task);
        assert_eq!(batch[0].operation, Operation::Create);
        assert_eq!(batch[0].retries, 0);
        assert_eq!(batch[0].priority, TASK_PRIORITY);
    }

    #[tokio::test]
    async fn test_online_but_failing_repo_falls_back_to_enqueue() {
        let h = harness().await;
        assert!(h.monitor.is_online());

        // Monitor still says online, but the next write fails.
        h.tasks.set_unavailable(true);

        let task = Task::new("t1", "u1", "x");
        h.bridge.buffer_task(Operation::Create, &task).await.unwrap();

        assert_eq!(h.store.len(), 1);
    }

    #[tokio::test]
    async fn test_task_record_reuses_task_id() {
        let h = harness().await;
        h.users.set_unavailable(true);
        h.monitor.probe_now().await;

        let task = Task::new("t-42", "u1", "x");
        h.bridge.buffer_task(Operation::Update, &task).await.unwrap();

        let batch = h.store.get_batch(10).await.unwrap();
        assert_eq!(batch[0].id, "t-42");
        assert_eq!(batch[0].owner_id, "u1");
    }

    #[tokio::test]
    async fn test_empty_id_is_rejected() {
        let h = harness().await;
        let user = User::new("");
        assert!(h
            .bridge
            .buffer_profile(Operation::Update, &user)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_priority_assignment() {
        let h = harness().await;
        h.users.set_unavailable(true);
        h.tasks.set_unavailable(true);
        h.monitor.probe_now().await;

        let user = User::new("u1");
        let task = Task::new("t1", "u1", "x");
        h.bridge.buffer_profile(Operation::Update, &user).await.unwrap();
        h.bridge.buffer_task(Operation::Create, &task).await.unwrap();

        let batch = h.store.get_batch(10).await.unwrap();
        assert_eq!(batch[0].priority, PROFILE_PRIORITY);
        assert_eq!(batch[1].priority, TASK_PRIORITY);
    }
}

// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Repository mocks for failure-path tests.
//!
//! `MemoryUserRepository`/`MemoryTaskRepository` (from `ferry-core`)
//! cover the reachable and unreachable cases; the mocks here cover the
//! shapes those cannot express: terminal write failures (for retry
//! accounting) and apply-order recording.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use ferry_core::error::{RepoError, RepoResult};
use ferry_core::repository::{TaskRepository, UserRepository};
use ferry_core::types::{Task, TaskFilter, User};

// =============================================================================
// BrokenTaskRepository
// =============================================================================

/// A task repository whose writes always fail with a terminal (non
/// connectivity) error. Used to exercise retry accounting and drops.
#[derive(Debug, Default)]
pub struct BrokenTaskRepository {
    attempts: AtomicU64,
}

impl BrokenTaskRepository {
    /// Creates the repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns how many writes were attempted.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl TaskRepository for BrokenTaskRepository {
    async fn get_by_id(&self, id: &str) -> RepoResult<Task> {
        Err(RepoError::not_found("task", id))
    }

    async fn list(&self, _filter: &TaskFilter) -> RepoResult<Vec<Task>> {
        Ok(vec![])
    }

    async fn create(&self, _task: &Task) -> RepoResult<Task> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        Err(RepoError::query_failed("constraint violation"))
    }

    async fn update(&self, _task: &Task) -> RepoResult<()> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        Err(RepoError::query_failed("constraint violation"))
    }

    async fn delete(&self, _id: &str) -> RepoResult<()> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        Err(RepoError::query_failed("constraint violation"))
    }
}

// =============================================================================
// Apply-order recording
// =============================================================================

/// Shared log of applied operations, in apply order.
pub type ApplyLog = Arc<Mutex<Vec<String>>>;

/// Creates an empty apply log.
pub fn apply_log() -> ApplyLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// A user repository that records every successful apply.
#[derive(Debug)]
pub struct RecordingUserRepository {
    inner: ferry_core::memory::MemoryUserRepository,
    log: ApplyLog,
}

impl RecordingUserRepository {
    /// Creates a recording repository over an in-memory one.
    pub fn new(log: ApplyLog) -> Self {
        Self {
            inner: ferry_core::memory::MemoryUserRepository::new(),
            log,
        }
    }
}

#[async_trait]
impl UserRepository for RecordingUserRepository {
    async fn get_by_id(&self, id: &str) -> RepoResult<User> {
        self.inner.get_by_id(id).await
    }

    async fn upsert(&self, user: &User) -> RepoResult<()> {
        self.inner.upsert(user).await?;
        self.log.lock().push(format!("profile:{}", user.id));
        Ok(())
    }
}

/// A task repository that records every successful apply.
#[derive(Debug)]
pub struct RecordingTaskRepository {
    inner: ferry_core::memory::MemoryTaskRepository,
    log: ApplyLog,
}

impl RecordingTaskRepository {
    /// Creates a recording repository over an in-memory one.
    pub fn new(log: ApplyLog) -> Self {
        Self {
            inner: ferry_core::memory::MemoryTaskRepository::new(),
            log,
        }
    }
}

#[async_trait]
impl TaskRepository for RecordingTaskRepository {
    async fn get_by_id(&self, id: &str) -> RepoResult<Task> {
        self.inner.get_by_id(id).await
    }

    async fn list(&self, filter: &TaskFilter) -> RepoResult<Vec<Task>> {
        self.inner.list(filter).await
    }

    async fn create(&self, task: &Task) -> RepoResult<Task> {
        let created = self.inner.create(task).await?;
        self.log.lock().push(format!("task:{}", task.id));
        Ok(created)
    }

    async fn update(&self, task: &Task) -> RepoResult<()> {
        self.inner.update(task).await?;
        self.log.lock().push(format!("task:{}", task.id));
        Ok(())
    }

    async fn delete(&self, id: &str) -> RepoResult<()> {
        self.inner.delete(id).await?;
        self.log.lock().push(format!("task:{id}"));
        Ok(())
    }
}

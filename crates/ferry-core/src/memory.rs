// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! In-memory repository implementations.
//!
//! HashMap-backed repositories used by tests and development wiring.
//! Each repository carries failure-injection switches so outage behavior
//! (buffering, retry, drop) can be exercised without a real backend:
//!
//! ```rust,ignore
//! let users = MemoryUserRepository::new();
//! users.set_unavailable(true);      // every call now returns Unavailable
//! ```
//!
//! The switches and call counters are atomics, so a repository can be
//! flipped mid-test while the drain scheduler is running against it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{RepoError, RepoResult};
use crate::repository::{HealthProbe, SessionStore, TaskRepository, UserRepository};
use crate::types::{Session, Task, TaskFilter, User};

const DEFAULT_LIST_LIMIT: i64 = 50;

// =============================================================================
// MemoryUserRepository
// =============================================================================

/// An in-memory user repository with failure injection.
#[derive(Debug, Default)]
pub struct MemoryUserRepository {
    users: RwLock<HashMap<String, User>>,
    unavailable: AtomicBool,
    write_count: AtomicU64,
}

impl MemoryUserRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository that reports every call as unavailable.
    pub fn unavailable() -> Self {
        let repo = Self::default();
        repo.unavailable.store(true, Ordering::Relaxed);
        repo
    }

    /// Flips the unavailable switch.
    pub fn set_unavailable(&self, down: bool) {
        self.unavailable.store(down, Ordering::Relaxed);
    }

    /// Returns the number of successful writes.
    pub fn write_count(&self) -> u64 {
        self.write_count.load(Ordering::Relaxed)
    }

    /// Returns the number of stored users.
    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    /// Returns `true` if no users are stored.
    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }

    fn check_available(&self) -> RepoResult<()> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(RepoError::unavailable("user repository down"));
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn get_by_id(&self, id: &str) -> RepoResult<User> {
        self.check_available()?;
        self.users
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| RepoError::not_found("user", id))
    }

    async fn upsert(&self, user: &User) -> RepoResult<()> {
        self.check_available()?;
        if user.id.is_empty() {
            return Err(RepoError::invalid("user id is empty"));
        }
        self.users.write().insert(user.id.clone(), user.clone());
        self.write_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[async_trait]
impl HealthProbe for MemoryUserRepository {
    async fn ping(&self) -> RepoResult<()> {
        self.check_available()
    }

    fn name(&self) -> &'static str {
        "memory-users"
    }
}

// =============================================================================
// MemoryTaskRepository
// =============================================================================

/// An in-memory task repository with failure injection.
#[derive(Debug, Default)]
pub struct MemoryTaskRepository {
    tasks: RwLock<HashMap<String, Task>>,
    unavailable: AtomicBool,
    write_count: AtomicU64,
}

impl MemoryTaskRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository that reports every call as unavailable.
    pub fn unavailable() -> Self {
        let repo = Self::default();
        repo.unavailable.store(true, Ordering::Relaxed);
        repo
    }

    /// Flips the unavailable switch.
    pub fn set_unavailable(&self, down: bool) {
        self.unavailable.store(down, Ordering::Relaxed);
    }

    /// Returns the number of successful writes.
    pub fn write_count(&self) -> u64 {
        self.write_count.load(Ordering::Relaxed)
    }

    /// Returns the number of stored tasks.
    pub fn len(&self) -> usize {
        self.tasks.read().len()
    }

    /// Returns `true` if no tasks are stored.
    pub fn is_empty(&self) -> bool {
        self.tasks.read().is_empty()
    }

    fn check_available(&self) -> RepoResult<()> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(RepoError::unavailable("task repository down"));
        }
        Ok(())
    }
}

#[async_trait]
impl TaskRepository for MemoryTaskRepository {
    async fn get_by_id(&self, id: &str) -> RepoResult<Task> {
        self.check_available()?;
        self.tasks
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| RepoError::not_found("task", id))
    }

    async fn list(&self, filter: &TaskFilter) -> RepoResult<Vec<Task>> {
        self.check_available()?;

        let limit = if filter.limit <= 0 {
            DEFAULT_LIST_LIMIT
        } else {
            filter.limit
        } as usize;
        let offset = filter.offset.max(0) as usize;

        let mut tasks: Vec<Task> = self
            .tasks
            .read()
            .values()
            .filter(|t| t.user_id == filter.user_id)
            .filter(|t| {
                filter
                    .status
                    .as_deref()
                    .map(|s| t.status == s)
                    .unwrap_or(true)
            })
            .cloned()
            .collect();

        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks.into_iter().skip(offset).take(limit).collect())
    }

    async fn create(&self, task: &Task) -> RepoResult<Task> {
        self.check_available()?;
        if task.id.is_empty() {
            return Err(RepoError::invalid("task id is empty"));
        }
        self.tasks.write().insert(task.id.clone(), task.clone());
        self.write_count.fetch_add(1, Ordering::Relaxed);
        Ok(task.clone())
    }

    async fn update(&self, task: &Task) -> RepoResult<()> {
        self.check_available()?;
        if task.id.is_empty() {
            return Err(RepoError::invalid("task id is empty"));
        }
        self.tasks.write().insert(task.id.clone(), task.clone());
        self.write_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn delete(&self, id: &str) -> RepoResult<()> {
        self.check_available()?;
        match self.tasks.write().remove(id) {
            Some(_) => {
                self.write_count.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            None => Err(RepoError::not_found("task", id)),
        }
    }
}

#[async_trait]
impl HealthProbe for MemoryTaskRepository {
    async fn ping(&self) -> RepoResult<()> {
        self.check_available()
    }

    fn name(&self) -> &'static str {
        "memory-tasks"
    }
}

// =============================================================================
// MemorySessionStore
// =============================================================================

/// An in-memory session store. TTLs are honored on read.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    unavailable: AtomicBool,
}

impl MemorySessionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips the unavailable switch.
    pub fn set_unavailable(&self, down: bool) {
        self.unavailable.store(down, Ordering::Relaxed);
    }

    fn check_available(&self) -> RepoResult<()> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(RepoError::unavailable("session store down"));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, token: &str) -> RepoResult<Option<Session>> {
        self.check_available()?;
        let session = self.sessions.read().get(token).cloned();
        Ok(session.filter(|s| !s.is_expired()))
    }

    async fn put(&self, session: &Session, _ttl: Duration) -> RepoResult<()> {
        self.check_available()?;
        self.sessions
            .write()
            .insert(session.token.clone(), session.clone());
        Ok(())
    }

    async fn delete(&self, token: &str) -> RepoResult<()> {
        self.check_available()?;
        self.sessions.write().remove(token);
        Ok(())
    }
}

#[async_trait]
impl HealthProbe for MemorySessionStore {
    async fn ping(&self) -> RepoResult<()> {
        self.check_available()
    }

    fn name(&self) -> &'static str {
        "memory-sessions"
    }
}

// =============================================================================
// Tests
// =============================================================================

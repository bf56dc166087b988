// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Repository and probe traits.
//!
//! These traits are the seams between the write path and its
//! collaborators: the relational primary store (users, tasks), the KV
//! primary store (sessions) and the durable operation buffer. Handlers,
//! the bridge and the drain scheduler depend only on these interfaces.
//!
//! # Idempotence contract
//!
//! The replay pipeline is at-least-once, so implementations must treat
//! apply operations as idempotent:
//!
//! - `upsert` / `create` write unconditionally by id
//! - `update` is an unconditional write by id
//! - `delete` of a missing row is reported as `NotFound`, which callers
//!   on the replay path treat as success

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{BufferResult, RepoResult};
use crate::types::{Session, Task, TaskFilter, User};

// =============================================================================
// UserRepository
// =============================================================================

/// Access to the authoritative user rows.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fetches a user by id.
    async fn get_by_id(&self, id: &str) -> RepoResult<User>;

    /// Inserts or replaces the user row identified by `user.id`.
    async fn upsert(&self, user: &User) -> RepoResult<()>;
}

// =============================================================================
// TaskRepository
// =============================================================================

/// Access to the authoritative task rows.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Fetches a task by id.
    async fn get_by_id(&self, id: &str) -> RepoResult<Task>;

    /// Lists tasks matching the filter, newest first.
    async fn list(&self, filter: &TaskFilter) -> RepoResult<Vec<Task>>;

    /// Creates the task row. Replays of the same id must not fail.
    async fn create(&self, task: &Task) -> RepoResult<Task>;

    /// Replaces the task row identified by `task.id`.
    async fn update(&self, task: &Task) -> RepoResult<()>;

    /// Deletes the task row. Missing rows surface as `NotFound`.
    async fn delete(&self, id: &str) -> RepoResult<()>;
}

// =============================================================================
// SessionStore
// =============================================================================

/// Opaque session storage in the primary KV store.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Looks up a session by token.
    async fn get(&self, token: &str) -> RepoResult<Option<Session>>;

    /// Stores a session with the given time-to-live.
    async fn put(&self, session: &Session, ttl: Duration) -> RepoResult<()>;

    /// Removes a session. Removing an absent token is not an error.
    async fn delete(&self, token: &str) -> RepoResult<()>;
}

// =============================================================================
// Probes
// =============================================================================

/// Liveness probe for a primary store.
///
/// Implementations issue the cheapest round-trip the backend supports
/// (`SELECT 1`, `PING`). The health monitor calls this under a bounded
/// timeout on every tick.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Checks reachability of the dependency.
    async fn ping(&self) -> RepoResult<()>;

    /// Returns the dependency name for logging.
    fn name(&self) -> &'static str;
}

/// Depth probe for the durable operation buffer.
#[async_trait]
pub trait BufferProbe: Send + Sync {
    /// Returns the number of buffered records.
    async fn depth(&self) -> BufferResult<u64>;
}

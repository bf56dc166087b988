// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Record replay dispatch.
//!
//! The [`Applier`] executes one buffer record against the matching
//! primary-store repository. The set of admissible `(entity, operation)`
//! pairs is closed:
//!
//! | entity  | operation | action |
//! |---------|-----------|--------|
//! | profile | update    | `UserRepository::upsert` |
//! | task    | create    | `TaskRepository::create` |
//! | task    | update    | `TaskRepository::update` |
//! | task    | delete    | `TaskRepository::delete` |
//!
//! Anything else is [`ApplyError::Unsupported`] and participates in
//! normal retry accounting. A payload that fails to decode is
//! [`ApplyError::Poison`] and is dropped immediately by the caller.
//! Deleting a row that no longer exists is a success: the replay pipeline
//! is at-least-once, and the row being gone is the desired end state.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use ferry_core::error::RepoError;
use ferry_core::repository::{TaskRepository, UserRepository};
use ferry_core::types::{Task, User};

use crate::record::{BufferRecord, Entity, Operation};

// =============================================================================
// ApplyError
// =============================================================================

/// Failure modes of a record replay.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// The payload cannot be decoded; the record can never succeed.
    #[error("poison record: {0}")]
    Poison(String),

    /// The `(entity, operation)` pair is outside the dispatch table.
    #[error("unsupported operation {entity}/{operation}")]
    Unsupported {
        /// Entity tag of the record.
        entity: Entity,
        /// Operation tag of the record.
        operation: Operation,
    },

    /// The repository call failed.
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl ApplyError {
    /// Returns `true` when retrying cannot ever succeed.
    pub fn is_permanent(&self) -> bool {
        matches!(self, ApplyError::Poison(_))
    }

    /// Returns `true` when the failure came from an unreachable store.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ApplyError::Repo(e) if e.is_retryable())
    }
}

// =============================================================================
// Applier
// =============================================================================

/// Dispatches buffer records to the primary-store repositories.
#[derive(Clone)]
pub struct Applier {
    users: Arc<dyn UserRepository>,
    tasks: Arc<dyn TaskRepository>,
}

impl Applier {
    /// Creates an applier over the given repositories.
    pub fn new(users: Arc<dyn UserRepository>, tasks: Arc<dyn TaskRepository>) -> Self {
        Self { users, tasks }
    }

    /// Replays one record against the matching repository.
    pub async fn apply(&self, record: &BufferRecord) -> Result<(), ApplyError> {
        match (record.entity, record.operation) {
            (Entity::Profile, Operation::Update) => {
                let user: User = decode(&record.payload)?;
                self.users.upsert(&user).await?;
                Ok(())
            }
            (Entity::Task, Operation::Create) => {
                let task: Task = decode(&record.payload)?;
                self.tasks.create(&task).await?;
                Ok(())
            }
            (Entity::Task, Operation::Update) => {
                let task: Task = decode(&record.payload)?;
                self.tasks.update(&task).await?;
                Ok(())
            }
            (Entity::Task, Operation::Delete) => {
                let task: Task = decode(&record.payload)?;
                match self.tasks.delete(&task.id).await {
                    Ok(()) => Ok(()),
                    Err(e) if e.is_not_found() => {
                        debug!(task_id = %task.id, "delete target already gone");
                        Ok(())
                    }
                    Err(e) => Err(e.into()),
                }
            }
            (entity, operation) => Err(ApplyError::Unsupported { entity, operation }),
        }
    }
}

impl std::fmt::Debug for Applier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Applier").finish_non_exhaustive()
    }
}

fn decode<T: serde::de::DeserializeOwned>(payload: &[u8]) -> Result<T, ApplyError> {
    serde_json::from_slice(payload).map_err(|e| ApplyError::Poison(e.to_string()))
}

// =============================================================================
// Tests
// =============================================================================

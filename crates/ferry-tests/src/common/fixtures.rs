// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Domain object fixtures.

use ferry_buffer::record::{BufferRecord, Entity, Operation};
use ferry_core::types::{Task, User};

/// User fixtures.
pub struct UserFixtures;

impl UserFixtures {
    /// An active admin user.
    pub fn admin(id: &str) -> User {
        let mut user = User::new(id);
        user.role = "admin".to_string();
        user.status = "active".to_string();
        user
    }

    /// An active member user.
    pub fn member(id: &str) -> User {
        let mut user = User::new(id);
        user.role = "member".to_string();
        user.status = "active".to_string();
        user
    }
}

/// Task fixtures.
pub struct TaskFixtures;

impl TaskFixtures {
    /// A pending task.
    pub fn pending(id: &str, user_id: &str) -> Task {
        let mut task = Task::new(id, user_id, format!("task {id}"));
        task.priority = 3;
        task
    }

    /// A batch of pending tasks owned by one user.
    pub fn batch(user_id: &str, count: usize) -> Vec<Task> {
        (0..count)
            .map(|i| Self::pending(&format!("t{i}"), user_id))
            .collect()
    }
}

/// Buffer record fixtures.
pub struct RecordFixtures;

impl RecordFixtures {
    /// A profile-update record for the given user.
    pub fn profile_update(user: &User) -> BufferRecord {
        BufferRecord::new(
            &user.id,
            Entity::Profile,
            Operation::Update,
            serde_json::to_vec(user).expect("user serializes"),
            3,
        )
    }

    /// A task record for the given operation.
    pub fn task(task: &Task, operation: Operation) -> BufferRecord {
        let mut record = BufferRecord::new(
            &task.user_id,
            Entity::Task,
            operation,
            serde_json::to_vec(task).expect("task serializes"),
            4,
        );
        record.id = task.id.clone();
        record
    }

    /// A record whose payload can never decode.
    pub fn poison() -> BufferRecord {
        BufferRecord::new(
            "u1",
            Entity::Task,
            Operation::Create,
            b"\x00not a json document".to_vec(),
            4,
        )
    }
}

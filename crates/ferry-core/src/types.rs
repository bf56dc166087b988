// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Domain types for the FERRY write path.
//!
//! These are the objects that flow through handlers, repositories and the
//! operation buffer. They serialize to the same JSON documents the wire
//! API exchanges, so a buffered payload is byte-for-byte the object the
//! handler accepted.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn now() -> DateTime<Utc> {
    Utc::now()
}

// =============================================================================
// User
// =============================================================================

/// An authenticated identity in the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Stable identifier.
    pub id: String,

    /// Contact address, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Authorization role (`admin`, `member`, ...).
    #[serde(default)]
    pub role: String,

    /// Account status (`active`, `suspended`, ...).
    #[serde(default)]
    pub status: String,

    /// Free-form string metadata.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,

    /// Creation timestamp.
    #[serde(default = "now")]
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp.
    #[serde(default = "now")]
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Creates a user with the given id and empty attributes.
    pub fn new(id: impl Into<String>) -> Self {
        let ts = Utc::now();
        Self {
            id: id.into(),
            email: None,
            role: String::new(),
            status: String::new(),
            metadata: HashMap::new(),
            created_at: ts,
            updated_at: ts,
        }
    }

    /// Returns `true` if the account is active.
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}

// =============================================================================
// Task
// =============================================================================

/// Default status for newly created tasks.
pub const TASK_STATUS_PENDING: &str = "pending";

/// A user-owned activity item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Stable identifier.
    pub id: String,

    /// Owner of the task.
    pub user_id: String,

    /// Short human-readable title.
    #[serde(default)]
    pub title: String,

    /// Longer description, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Workflow status (`pending`, `in_progress`, `completed`, ...).
    #[serde(default = "default_task_status")]
    pub status: String,

    /// User-facing priority (unrelated to buffer drain priority).
    #[serde(default)]
    pub priority: i32,

    /// Optional due date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,

    /// Free-form string metadata.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,

    /// Creation timestamp.
    #[serde(default = "now")]
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp.
    #[serde(default = "now")]
    pub updated_at: DateTime<Utc>,
}

fn default_task_status() -> String {
    TASK_STATUS_PENDING.to_string()
}

impl Task {
    /// Creates a pending task owned by `user_id`.
    pub fn new(id: impl Into<String>, user_id: impl Into<String>, title: impl Into<String>) -> Self {
        let ts = Utc::now();
        Self {
            id: id.into(),
            user_id: user_id.into(),
            title: title.into(),
            description: None,
            status: default_task_status(),
            priority: 0,
            due_date: None,
            metadata: HashMap::new(),
            created_at: ts,
            updated_at: ts,
        }
    }

    /// Returns `true` if the task reached its terminal status.
    pub fn is_completed(&self) -> bool {
        self.status == "completed"
    }
}

// =============================================================================
// TaskFilter
// =============================================================================

/// Filter for task list queries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskFilter {
    /// Restrict to tasks owned by this user.
    pub user_id: String,

    /// Restrict to tasks with this status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Page size (0 falls back to the repository default).
    #[serde(default)]
    pub limit: i64,

    /// Page offset.
    #[serde(default)]
    pub offset: i64,
}

impl TaskFilter {
    /// Creates a filter scoped to one user.
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            status: None,
            limit: 0,
            offset: 0,
        }
    }

    /// Restricts the filter to one status.
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Sets the page size.
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }
}

// =============================================================================
// Session
// =============================================================================

/// An authenticated session stored in the primary KV store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque session token.
    pub token: String,

    /// Identity the session belongs to.
    pub user_id: String,

    /// Creation timestamp.
    #[serde(default = "now")]
    pub created_at: DateTime<Utc>,

    /// Expiry timestamp.
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Returns `true` if the session is past its expiry.
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_is_active() {
        let mut user = User::new("u1");
        assert!(!user.is_active());

        user.status = "active".to_string();
        assert!(user.is_active());
    }

    #[test]
    fn test_task_defaults_to_pending() {
        let task = Task::new("t1", "u1", "write report");
        assert_eq!(task.status, TASK_STATUS_PENDING);
        assert!(!task.is_completed());
    }

    #[test]
    fn test_task_deserialize_fills_defaults() {
        let task: Task =
            serde_json::from_str(r#"{"id":"t1","user_id":"u1","title":"x"}"#).unwrap();
        assert_eq!(task.status, "pending");
        assert_eq!(task.priority, 0);
        assert!(task.metadata.is_empty());
    }

    #[test]
    fn test_user_round_trip() {
        let mut user = User::new("u1");
        user.role = "admin".to_string();
        user.metadata.insert("team".to_string(), "core".to_string());

        let json = serde_json::to_string(&user).unwrap();
        let back: User = serde_json::from_str(&json).unwrap();
        assert_eq!(back, user);
    }

    #[test]
    fn test_task_filter_builder() {
        let filter = TaskFilter::for_user("u1").with_status("pending").with_limit(10);
        assert_eq!(filter.user_id, "u1");
        assert_eq!(filter.status.as_deref(), Some("pending"));
        assert_eq!(filter.limit, 10);
        assert_eq!(filter.offset, 0);
    }

    #[test]
    fn test_session_expiry() {
        let session = Session {
            token: "tok".to_string(),
            user_id: "u1".to_string(),
            created_at: Utc::now(),
            expires_at: Utc::now() - chrono::Duration::seconds(1),
        };
        assert!(session.is_expired());
    }
}

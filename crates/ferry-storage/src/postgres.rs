// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Postgres-backed repositories.
//!
//! The relational primary store holds the authoritative user and task
//! rows. Both repositories are safe to share across request handlers:
//! each call leases a connection from a `sqlx::PgPool` with an explicit
//! acquire timeout. A timed-out lease surfaces as
//! `RepoError::Unavailable`, which is exactly the signal that routes a
//! mutation into the buffer.
//!
//! The replay pipeline is at-least-once, so every write here is
//! idempotent: user writes are `INSERT ... ON CONFLICT (id) DO UPDATE`
//! and task rows are keyed by a caller-supplied id.
//!
//! DB-facing row structs are kept separate from the domain types so the
//! SQL schema (column names, JSONB metadata) stays localized here.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::info;

use ferry_core::error::{RepoError, RepoResult};
use ferry_core::repository::{HealthProbe, TaskRepository, UserRepository};
use ferry_core::types::{Task, TaskFilter, User};

const DEFAULT_LIST_LIMIT: i64 = 50;

// =============================================================================
// Pool Construction
// =============================================================================

/// Connects a pool with explicit sizing and timeouts.
pub async fn connect(
    url: &str,
    max_connections: u32,
    connect_timeout: Duration,
) -> RepoResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(connect_timeout)
        .connect(url)
        .await
        .map_err(map_sqlx_error)?;

    info!(max_connections, "postgres pool connected");
    Ok(pool)
}

/// Runs the embedded schema migrations.
pub async fn migrate(pool: &PgPool) -> RepoResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| RepoError::query_failed(format!("migration failed: {e}")))?;

    info!("postgres migrations applied");
    Ok(())
}

fn map_sqlx_error(e: sqlx::Error) -> RepoError {
    match e {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed => RepoError::unavailable_with("postgres unreachable", e),
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            RepoError::serialization(e.to_string())
        }
        other => RepoError::query_failed(other.to_string()),
    }
}

// =============================================================================
// Row Types
// =============================================================================

/// Row shape of the `users` table.
#[derive(Debug, FromRow)]
struct DbUser {
    id: String,
    email: Option<String>,
    role: String,
    status: String,
    metadata: Json<HashMap<String, String>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DbUser> for User {
    fn from(row: DbUser) -> Self {
        User {
            id: row.id,
            email: row.email,
            role: row.role,
            status: row.status,
            metadata: row.metadata.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Row shape of the `tasks` table.
#[derive(Debug, FromRow)]
struct DbTask {
    id: String,
    user_id: String,
    title: String,
    description: Option<String>,
    status: String,
    priority: i32,
    due_date: Option<DateTime<Utc>>,
    metadata: Json<HashMap<String, String>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DbTask> for Task {
    fn from(row: DbTask) -> Self {
        Task {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            description: row.description,
            status: row.status,
            priority: row.priority,
            due_date: row.due_date,
            metadata: row.metadata.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// =============================================================================
// PostgresUserRepository
// =============================================================================

/// Users backed by the `users` table.
#[derive(Debug, Clone)]
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    /// Creates a repository over a shared pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn get_by_id(&self, id: &str) -> RepoResult<User> {
        let row = sqlx::query_as::<_, DbUser>(
            "SELECT id, email, role, status, metadata, created_at, updated_at \
             FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(User::from)
            .ok_or_else(|| RepoError::not_found("user", id))
    }

    async fn upsert(&self, user: &User) -> RepoResult<()> {
        if user.id.is_empty() {
            return Err(RepoError::invalid("user id is empty"));
        }

        sqlx::query(
            "INSERT INTO users (id, email, role, status, metadata, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, now()) \
             ON CONFLICT (id) DO UPDATE SET \
                 email = EXCLUDED.email, \
                 role = EXCLUDED.role, \
                 status = EXCLUDED.status, \
                 metadata = EXCLUDED.metadata, \
                 updated_at = now()",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.role)
        .bind(&user.status)
        .bind(Json(user.metadata.clone()))
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }
}

#[async_trait]
impl HealthProbe for PostgresUserRepository {
    async fn ping(&self) -> RepoResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "postgresql"
    }
}

// =============================================================================
// PostgresTaskRepository
// =============================================================================

/// Tasks backed by the `tasks` table.
#[derive(Debug, Clone)]
pub struct PostgresTaskRepository {
    pool: PgPool,
}

impl PostgresTaskRepository {
    /// Creates a repository over a shared pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskRepository for PostgresTaskRepository {
    async fn get_by_id(&self, id: &str) -> RepoResult<Task> {
        let row = sqlx::query_as::<_, DbTask>(
            "SELECT id, user_id, title, description, status, priority, due_date, \
                    metadata, created_at, updated_at \
             FROM tasks WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(Task::from)
            .ok_or_else(|| RepoError::not_found("task", id))
    }

    async fn list(&self, filter: &TaskFilter) -> RepoResult<Vec<Task>> {
        let limit = if filter.limit <= 0 {
            DEFAULT_LIST_LIMIT
        } else {
            filter.limit
        };
        let offset = filter.offset.max(0);

        let rows = match &filter.status {
            Some(status) => {
                sqlx::query_as::<_, DbTask>(
                    "SELECT id, user_id, title, description, status, priority, due_date, \
                            metadata, created_at, updated_at \
                     FROM tasks WHERE user_id = $1 AND status = $2 \
                     ORDER BY created_at DESC LIMIT $3 OFFSET $4",
                )
                .bind(&filter.user_id)
                .bind(status)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, DbTask>(
                    "SELECT id, user_id, title, description, status, priority, due_date, \
                            metadata, created_at, updated_at \
                     FROM tasks WHERE user_id = $1 \
                     ORDER BY created_at DESC LIMIT $2 OFFSET $3",
                )
                .bind(&filter.user_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Task::from).collect())
    }

    async fn create(&self, task: &Task) -> RepoResult<Task> {
        if task.id.is_empty() {
            return Err(RepoError::invalid("task id is empty"));
        }

        // Replays of the same record must not fail, so create is an
        // upsert keyed by the caller-supplied id.
        sqlx::query(
            "INSERT INTO tasks (id, user_id, title, description, status, priority, \
                                due_date, metadata, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, now()) \
             ON CONFLICT (id) DO UPDATE SET \
                 title = EXCLUDED.title, \
                 description = EXCLUDED.description, \
                 status = EXCLUDED.status, \
                 priority = EXCLUDED.priority, \
                 due_date = EXCLUDED.due_date, \
                 metadata = EXCLUDED.metadata, \
                 updated_at = now()",
        )
        .bind(&task.id)
        .bind(&task.user_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(&task.status)
        .bind(task.priority)
        .bind(task.due_date)
        .bind(Json(task.metadata.clone()))
        .bind(task.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        self.get_by_id(&task.id).await
    }

    async fn update(&self, task: &Task) -> RepoResult<()> {
        if task.id.is_empty() {
            return Err(RepoError::invalid("task id is empty"));
        }

        sqlx::query(
            "UPDATE tasks SET \
                 title = $2, description = $3, status = $4, priority = $5, \
                 due_date = $6, metadata = $7, updated_at = now() \
             WHERE id = $1",
        )
        .bind(&task.id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(&task.status)
        .bind(task.priority)
        .bind(task.due_date)
        .bind(Json(task.metadata.clone()))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn delete(&self, id: &str) -> RepoResult<()> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::not_found("task", id));
        }
        Ok(())
    }
}

#[async_trait]
impl HealthProbe for PostgresTaskRepository {
    async fn ping(&self) -> RepoResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "postgresql"
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_errors_map_to_unavailable() {
        let err = map_sqlx_error(sqlx::Error::PoolTimedOut);
        assert!(err.is_retryable());
        assert_eq!(err.status_code(), 503);

        let err = map_sqlx_error(sqlx::Error::PoolClosed);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_row_not_found_maps_to_query_failed() {
        // RowNotFound never reaches callers (lookups use fetch_optional);
        // an unexpected one is an internal error, not a 404.
        let err = map_sqlx_error(sqlx::Error::RowNotFound);
        assert!(!err.is_retryable());
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_db_user_conversion() {
        let row = DbUser {
            id: "u1".to_string(),
            email: Some("a@b.c".to_string()),
            role: "admin".to_string(),
            status: "active".to_string(),
            metadata: Json(HashMap::from([("k".to_string(), "v".to_string())])),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let user = User::from(row);
        assert_eq!(user.id, "u1");
        assert_eq!(user.metadata.get("k").map(String::as_str), Some("v"));
        assert!(user.is_active());
    }

    #[test]
    fn test_db_task_conversion() {
        let row = DbTask {
            id: "t1".to_string(),
            user_id: "u1".to_string(),
            title: "x".to_string(),
            description: None,
            status: "completed".to_string(),
            priority: 2,
            due_date: None,
            metadata: Json(HashMap::new()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let task = Task::from(row);
        assert!(task.is_completed());
        assert_eq!(task.priority, 2);
    }
}

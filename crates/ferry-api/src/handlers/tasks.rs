// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Task handlers.

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ferry_buffer::bridge::OperationBuffer;
use ferry_buffer::record::Operation;
use ferry_core::repository::TaskRepository;
use ferry_core::types::{Task, TaskFilter};

use crate::error::{ApiError, ApiResult};
use crate::extract::Subject;
use crate::response::Envelope;
use crate::state::AppState;

// =============================================================================
// Requests
// =============================================================================

/// Body of `POST /api/v1/tasks` and `PUT /api/v1/tasks/{id}`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TaskRequest {
    /// Task id; generated for creates when absent.
    #[serde(default)]
    pub id: String,

    /// Short title.
    #[serde(default)]
    pub title: String,

    /// Longer description.
    #[serde(default)]
    pub description: Option<String>,

    /// Workflow status; empty means `pending`.
    #[serde(default)]
    pub status: String,

    /// User-facing priority.
    #[serde(default)]
    pub priority: i32,

    /// Optional due date (RFC 3339).
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,

    /// Free-form string metadata.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl TaskRequest {
    fn into_task(self, user_id: &str) -> Task {
        let mut task = Task::new(self.id, user_id, self.title);
        task.description = self.description;
        if !self.status.is_empty() {
            task.status = self.status;
        }
        task.priority = self.priority;
        task.due_date = self.due_date;
        task.metadata = self.metadata;
        task
    }
}

/// Query parameters of `GET /api/v1/tasks`.
#[derive(Debug, Default, Deserialize)]
pub struct TaskListQuery {
    /// Restrict to one status.
    #[serde(default)]
    pub status: Option<String>,

    /// Page size.
    #[serde(default)]
    pub limit: Option<i64>,

    /// Page offset.
    #[serde(default)]
    pub offset: Option<i64>,
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /api/v1/tasks
pub async fn list_tasks(
    State(state): State<AppState>,
    subject: Subject,
    Query(query): Query<TaskListQuery>,
) -> ApiResult<Json<Envelope<Vec<Task>>>> {
    let filter = TaskFilter {
        user_id: subject.id().to_string(),
        status: query.status,
        limit: query.limit.unwrap_or(0),
        offset: query.offset.unwrap_or(0),
    };

    let tasks = state.tasks.list(&filter).await?;
    Ok(Json(Envelope::success(tasks)))
}

/// GET /api/v1/tasks/{id}
pub async fn get_task(
    State(state): State<AppState>,
    subject: Subject,
    Path(id): Path<String>,
) -> ApiResult<Json<Envelope<Task>>> {
    let task = state.tasks.get_by_id(&id).await?;
    if task.user_id != subject.id() {
        return Err(ApiError::not_found(format!("task {id}")));
    }
    Ok(Json(Envelope::success(task)))
}

/// POST /api/v1/tasks
pub async fn create_task(
    State(state): State<AppState>,
    subject: Subject,
    Json(request): Json<TaskRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<Task>>)> {
    let mut task = request.into_task(subject.id());
    if task.id.is_empty() {
        task.id = Uuid::new_v4().to_string();
    }

    state.buffer.buffer_task(Operation::Create, &task).await?;
    Ok((StatusCode::CREATED, Json(Envelope::success(task))))
}

/// PUT /api/v1/tasks/{id}
pub async fn update_task(
    State(state): State<AppState>,
    subject: Subject,
    Path(id): Path<String>,
    Json(request): Json<TaskRequest>,
) -> ApiResult<Json<Envelope<Task>>> {
    let mut task = request.into_task(subject.id());
    if task.id.is_empty() {
        task.id = id;
    }
    if task.id.is_empty() {
        return Err(ApiError::bad_request("missing task id"));
    }

    state.buffer.buffer_task(Operation::Update, &task).await?;
    Ok(Json(Envelope::success(task)))
}

/// DELETE /api/v1/tasks/{id}
pub async fn delete_task(
    State(state): State<AppState>,
    subject: Subject,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if id.is_empty() {
        return Err(ApiError::bad_request("missing task id"));
    }

    let task = Task::new(id, subject.id(), "");
    state.buffer.buffer_task(Operation::Delete, &task).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Tests
// =============================================================================

// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Profile handlers.

use std::collections::HashMap;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use ferry_buffer::bridge::OperationBuffer;
use ferry_buffer::record::Operation;
use ferry_core::repository::UserRepository;
use ferry_core::types::User;

use crate::error::ApiResult;
use crate::extract::Subject;
use crate::response::Envelope;
use crate::state::AppState;

// =============================================================================
// Requests
// =============================================================================

/// Body of `PUT /api/v1/profile`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ProfileUpdateRequest {
    /// Contact address.
    #[serde(default)]
    pub email: Option<String>,

    /// Authorization role.
    #[serde(default)]
    pub role: String,

    /// Account status.
    #[serde(default)]
    pub status: String,

    /// Free-form string metadata.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /api/v1/profile
pub async fn get_profile(
    State(state): State<AppState>,
    subject: Subject,
) -> ApiResult<Json<Envelope<User>>> {
    let user = state.users.get_by_id(subject.id()).await?;
    Ok(Json(Envelope::success(user)))
}

/// PUT /api/v1/profile
///
/// The write goes through the operation buffer: applied directly when the
/// primary store is reachable, durably queued otherwise. Either way the
/// caller gets a 200: the mutation has been accepted.
pub async fn update_profile(
    State(state): State<AppState>,
    subject: Subject,
    Json(request): Json<ProfileUpdateRequest>,
) -> ApiResult<Json<Envelope<User>>> {
    let mut user = User::new(subject.id());
    user.email = request.email;
    user.role = request.role;
    user.status = request.status;
    user.metadata = request.metadata;

    state.buffer.buffer_profile(Operation::Update, &user).await?;
    Ok(Json(Envelope::success(user)))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::tests::{test_harness, TestHarness};
    use ferry_buffer::BufferStore;

    fn subject() -> Subject {
        Subject("u1".to_string())
    }

    #[tokio::test]
    async fn test_update_profile_applies_when_online() {
        let TestHarness { state, users, .. } = test_harness().await;
        state.monitor.probe_now().await;

        let request = ProfileUpdateRequest {
            role: "admin".to_string(),
            status: "active".to_string(),
            ..Default::default()
        };
        let response = update_profile(State(state), subject(), Json(request))
            .await
            .unwrap();

        assert!(response.0.is_success());
        assert_eq!(users.get_by_id("u1").await.unwrap().role, "admin");
    }

    #[tokio::test]
    async fn test_update_profile_buffers_when_offline() {
        let TestHarness {
            state,
            users,
            store,
            ..
        } = test_harness().await;
        users.set_unavailable(true);
        state.monitor.probe_now().await;

        let request = ProfileUpdateRequest::default();
        update_profile(State(state), subject(), Json(request))
            .await
            .unwrap();

        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_get_profile_missing_is_404() {
        let TestHarness { state, .. } = test_harness().await;
        let err = get_profile(State(state), subject()).await.unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::NOT_FOUND);
    }
}

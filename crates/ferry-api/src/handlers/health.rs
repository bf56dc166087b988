// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Health check handler.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use serde_json::json;

use crate::response::Envelope;
use crate::state::AppState;

/// GET /health
///
/// Read-only aggregate of the latest health snapshot. Returns 200 when
/// both primary stores are up, otherwise 503 with a `DEGRADED` code and
/// the same service map. No side effects: the snapshot is whatever the
/// monitor last published.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.monitor.status();

    let payload = json!({
        "timestamp": Utc::now(),
        "services": {
            "postgresql": status.postgresql,
            "redis": status.redis,
            "buffer": {
                "online": status.buffer,
                "size": status.buffer_size,
            },
        },
    });

    if status.is_online() {
        (StatusCode::OK, Json(Envelope::success(payload)))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(Envelope::error_with_data(
                "DEGRADED",
                "dependencies unhealthy",
                payload,
            )),
        )
    }
}

// =============================================================================
// Tests
// =============================================================================

// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # ferry-api
//!
//! HTTP surface of the FERRY write path, built on axum:
//!
//! - `GET /health`: aggregate dependency health (200 / 503 `DEGRADED`)
//! - `GET /metrics`: Prometheus text exposition
//! - `GET|PUT /api/v1/profile`: profile read and buffered update
//! - `GET|POST /api/v1/tasks`, `GET|PUT|DELETE /api/v1/tasks/{id}`:
//!   task reads and buffered mutations
//!
//! Mutations never talk to a repository directly: they go through the
//! operation buffer, which applies them immediately when the primary
//! stores are reachable and queues them durably when they are not. A
//! buffered mutation still answers 2xx, because the operation has been
//! durably accepted and will be replayed.
//!
//! The authenticated subject arrives in the `X-User-ID` header; identity
//! verification happens upstream.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod response;
pub mod server;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use extract::{Subject, SUBJECT_HEADER};
pub use response::Envelope;
pub use server::ApiServer;
pub use state::{AppState, AppStateBuilder};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

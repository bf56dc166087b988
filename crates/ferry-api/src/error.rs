// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! API error types and HTTP mapping.
//!
//! Handlers return [`ApiError`]; the `IntoResponse` impl converts it into
//! the standard error envelope with the right status code. Repository and
//! buffer errors convert via `From`, so handlers mostly use `?`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use ferry_core::error::{BufferError, RepoError};

use crate::response::Envelope;

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

// =============================================================================
// ApiError
// =============================================================================

/// API error with HTTP status code mapping.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404).
    #[error("Resource not found: {resource}")]
    NotFound {
        /// The resource that was not found.
        resource: String,
    },

    /// Bad request (400).
    #[error("Bad request: {message}")]
    BadRequest {
        /// Error message.
        message: String,
    },

    /// Unauthorized (401).
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Error message.
        message: String,
    },

    /// Service unavailable (503).
    #[error("Service unavailable: {message}")]
    ServiceUnavailable {
        /// Error message.
        message: String,
    },

    /// Internal server error (500).
    #[error("Internal error: {message}")]
    Internal {
        /// Error message (logged, not exposed to the caller).
        message: String,
    },
}

impl ApiError {
    /// Creates a not found error.
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Creates a bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Creates an unauthorized error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Creates a service unavailable error.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound { .. } => "NOT_FOUND",
            ApiError::BadRequest { .. } => "INVALID",
            ApiError::Unauthorized { .. } => "UNAUTHORIZED",
            ApiError::ServiceUnavailable { .. } => "UNAVAILABLE",
            ApiError::Internal { .. } => "INTERNAL",
        }
    }

    /// Returns the message exposed to the caller.
    fn public_message(&self) -> String {
        match self {
            // Internal details stay in the logs.
            ApiError::Internal { .. } => "internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<RepoError> for ApiError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound { entity, id } => ApiError::not_found(format!("{entity} {id}")),
            RepoError::Invalid { message } => ApiError::bad_request(message),
            RepoError::Unavailable { message, .. } => ApiError::service_unavailable(message),
            other => ApiError::internal(other.to_string()),
        }
    }
}

impl From<BufferError> for ApiError {
    fn from(e: BufferError) -> Self {
        // A mutation that could neither be applied nor buffered was not
        // accepted; the client must retry.
        ApiError::service_unavailable(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if matches!(self, ApiError::Internal { .. }) {
            tracing::error!(error = %self, "request failed");
        }

        let envelope: Envelope<()> = Envelope::error(self.code(), self.public_message());
        (self.status_code(), Json(envelope)).into_response()
    }
}

// =============================================================================
// Tests
// =============================================================================

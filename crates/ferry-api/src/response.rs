// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! API response envelope.
//!
//! Every endpoint answers with the same wrapper, for success and error
//! payloads alike:
//!
//! ```json
//! { "status": "success", "data": { ... } }
//! { "status": "error", "code": "DEGRADED", "error": "...", "data": { ... } }
//! ```

use serde::{Deserialize, Serialize};

// =============================================================================
// Envelope
// =============================================================================

/// The standard response wrapper.
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// `success` or `error`.
    pub status: String,

    /// Machine-readable error code (error responses only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Response payload. Error responses may carry one too (the health
    /// endpoint returns its service map in both cases).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    /// Human-readable error message (error responses only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> Envelope<T> {
    /// Creates a success envelope.
    pub fn success(data: T) -> Self {
        Self {
            status: "success".to_string(),
            code: None,
            data: Some(data),
            error: None,
        }
    }

    /// Creates an error envelope.
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            code: Some(code.into()),
            data: None,
            error: Some(message.into()),
        }
    }

    /// Creates an error envelope that still carries a payload.
    pub fn error_with_data(
        code: impl Into<String>,
        message: impl Into<String>,
        data: T,
    ) -> Self {
        Self {
            status: "error".to_string(),
            code: Some(code.into()),
            data: Some(data),
            error: Some(message.into()),
        }
    }

    /// Returns `true` for success envelopes.
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope() {
        let envelope = Envelope::success(42);
        assert!(envelope.is_success());
        assert_eq!(envelope.data, Some(42));
        assert!(envelope.code.is_none());
    }

    #[test]
    fn test_error_envelope_serialization() {
        let envelope: Envelope<()> = Envelope::error("NOT_FOUND", "task not found");
        let json = serde_json::to_string(&envelope).unwrap();

        assert!(json.contains("\"status\":\"error\""));
        assert!(json.contains("\"code\":\"NOT_FOUND\""));
        assert!(!json.contains("\"data\""));
    }

    #[test]
    fn test_error_with_data_keeps_payload() {
        let envelope = Envelope::error_with_data("DEGRADED", "dependencies unhealthy", 7);
        assert!(!envelope.is_success());
        assert_eq!(envelope.data, Some(7));
    }
}

// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Request extractors.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::ApiError;

/// Header carrying the authenticated subject id.
///
/// Identity verification happens upstream (gateway middleware); by the
/// time a request reaches these handlers the header is trusted.
pub const SUBJECT_HEADER: &str = "x-user-id";

/// The authenticated subject of a request.
#[derive(Debug, Clone)]
pub struct Subject(pub String);

impl Subject {
    /// Returns the subject id.
    pub fn id(&self) -> &str {
        &self.0
    }
}

impl<S> FromRequestParts<S> for Subject
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(SUBJECT_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(|value| Subject(value.to_string()))
            .ok_or_else(|| ApiError::unauthorized("missing user id"))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> Result<Subject, ApiError> {
        let (mut parts, _) = request.into_parts();
        Subject::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_subject_from_header() {
        let request = Request::builder()
            .header(SUBJECT_HEADER, "u1")
            .body(())
            .unwrap();

        let subject = extract(request).await.unwrap();
        assert_eq!(subject.id(), "u1");
    }

    #[tokio::test]
    async fn test_missing_header_is_unauthorized() {
        let request = Request::builder().body(()).unwrap();
        let err = extract(request).await.unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_empty_header_is_unauthorized() {
        let request = Request::builder()
            .header(SUBJECT_HEADER, "")
            .body(())
            .unwrap();
        assert!(extract(request).await.is_err());
    }
}

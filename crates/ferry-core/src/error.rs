// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Unified error hierarchy for FERRY.
//!
//! This module defines the error types shared by the buffer subsystem and
//! the primary-store repositories:
//!
//! - Provides clear, descriptive error messages
//! - Supports error chaining for traceability
//! - Distinguishes between retryable and non-retryable errors
//! - Maps errors to appropriate HTTP status codes
//! - Supports structured logging
//!
//! # Examples
//!
//! ```
//! use ferry_core::error::RepoError;
//!
//! let error = RepoError::unavailable("connection pool exhausted");
//! assert!(error.is_retryable());
//! assert_eq!(error.status_code(), 503);
//! ```

use thiserror::Error;

// =============================================================================
// BufferError
// =============================================================================

/// Errors raised by the durable operation buffer.
#[derive(Debug, Error)]
pub enum BufferError {
    /// Failed to persist a record.
    #[error("Failed to store record: {message}")]
    StoreFailed {
        /// Error message.
        message: String,
        /// Underlying error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The buffer file could not be opened or is owned by another process.
    #[error("Buffer unavailable: {message}")]
    Unavailable {
        /// Error message.
        message: String,
    },

    /// A stored record could not be decoded.
    #[error("Corrupted record: {message}")]
    CorruptedData {
        /// Error message.
        message: String,
    },

    /// Error from the underlying embedded store.
    #[error("Database error: {message}")]
    Database {
        /// Error message.
        message: String,
    },
}

impl BufferError {
    /// Creates a store failed error.
    pub fn store_failed(message: impl Into<String>) -> Self {
        Self::StoreFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a store failed error with a source.
    pub fn store_failed_with<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::StoreFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a corrupted data error.
    pub fn corrupted_data(message: impl Into<String>) -> Self {
        Self::CorruptedData {
            message: message.into(),
        }
    }

    /// Creates a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BufferError::StoreFailed { .. }
                | BufferError::Unavailable { .. }
                | BufferError::Database { .. }
        )
    }

    /// Returns the error type for logging/metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            BufferError::StoreFailed { .. } => "store_failed",
            BufferError::Unavailable { .. } => "unavailable",
            BufferError::CorruptedData { .. } => "corrupted_data",
            BufferError::Database { .. } => "database",
        }
    }
}

// =============================================================================
// RepoError
// =============================================================================

/// Errors raised by primary-store repositories.
///
/// The variants carry the semantic classification used across the whole
/// write path: `NotFound` is tolerated on deletes, `Unavailable` drives
/// buffering and retry, everything else is terminal for the request.
#[derive(Debug, Error)]
pub enum RepoError {
    /// The requested row does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity name (`user`, `task`, `session`).
        entity: &'static str,
        /// Identifier that was looked up.
        id: String,
    },

    /// Malformed input at the adapter boundary.
    #[error("Invalid input: {message}")]
    Invalid {
        /// Error message.
        message: String,
    },

    /// The primary store is not reachable.
    #[error("Store unavailable: {message}")]
    Unavailable {
        /// Error message.
        message: String,
        /// Underlying error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A query failed for a reason other than connectivity.
    #[error("Query failed: {message}")]
    QueryFailed {
        /// Error message.
        message: String,
    },

    /// Row data could not be converted to a domain object.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message.
        message: String,
    },
}

impl RepoError {
    /// Creates a not found error.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Creates an invalid input error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an unavailable error with a source.
    pub fn unavailable_with<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Unavailable {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a query failed error.
    pub fn query_failed(message: impl Into<String>) -> Self {
        Self::QueryFailed {
            message: message.into(),
        }
    }

    /// Creates a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RepoError::Unavailable { .. })
    }

    /// Returns `true` if the target row was missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RepoError::NotFound { .. })
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            RepoError::NotFound { .. } => 404,
            RepoError::Invalid { .. } => 400,
            RepoError::Unavailable { .. } => 503,
            RepoError::QueryFailed { .. } | RepoError::Serialization { .. } => 500,
        }
    }

    /// Returns the error type for logging/metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            RepoError::NotFound { .. } => "not_found",
            RepoError::Invalid { .. } => "invalid",
            RepoError::Unavailable { .. } => "unavailable",
            RepoError::QueryFailed { .. } => "query_failed",
            RepoError::Serialization { .. } => "serialization",
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// A Result type with BufferError.
pub type BufferResult<T> = Result<T, BufferError>;

/// A Result type with RepoError.
pub type RepoResult<T> = Result<T, RepoError>;

// =============================================================================
// Tests
// =============================================================================

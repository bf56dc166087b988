// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # ferry-core
//!
//! Core domain model and health monitoring for FERRY, the offline-resilient
//! write path.
//!
//! This crate carries everything the buffering and storage crates share:
//!
//! - **Domain types**: [`User`], [`Task`], [`Session`] and query filters.
//! - **Error hierarchy**: [`BufferError`] and [`RepoError`] with
//!   retryability classification and HTTP status mapping.
//! - **Repository traits**: the seams between handlers, the operation
//!   buffer and the primary stores.
//! - **In-memory repositories**: HashMap-backed implementations with
//!   failure injection, used by tests and development wiring.
//! - **Health monitor**: the periodic dependency prober that decides
//!   whether mutations apply directly or buffer.
//!
//! ## Module Overview
//!
//! - [`types`]: domain objects
//! - [`error`]: error types and result aliases
//! - [`repository`]: repository and probe traits
//! - [`memory`]: in-memory repository implementations
//! - [`monitor`]: health snapshot and monitor

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod error;
pub mod memory;
pub mod monitor;
pub mod repository;
pub mod types;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{BufferError, BufferResult, RepoError, RepoResult};
pub use memory::{MemorySessionStore, MemoryTaskRepository, MemoryUserRepository};
pub use monitor::{HealthMonitor, HealthSnapshot, MonitorConfig};
pub use repository::{BufferProbe, HealthProbe, SessionStore, TaskRepository, UserRepository};
pub use types::{Session, Task, TaskFilter, User, TASK_STATUS_PENDING};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Prelude
// =============================================================================

/// A prelude module that re-exports commonly used types.
pub mod prelude {
    pub use crate::error::{BufferError, BufferResult, RepoError, RepoResult};
    pub use crate::monitor::{HealthMonitor, HealthSnapshot, MonitorConfig};
    pub use crate::repository::{
        BufferProbe, HealthProbe, SessionStore, TaskRepository, UserRepository,
    };
    pub use crate::types::{Session, Task, TaskFilter, User};
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}

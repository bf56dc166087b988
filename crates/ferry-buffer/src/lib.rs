// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # ferry-buffer
//!
//! Durable operation buffering and replay for the FERRY write path.
//!
//! When the primary stores are unreachable, mutating operations are
//! absorbed into an embedded, file-backed queue; a background drain
//! scheduler replays them once connectivity returns. Replay is
//! at-least-once, priority-respecting and idempotent.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                                                                  │
//! │  handlers ──▶ BufferBridge ──┬─▶ Applier ──▶ repositories        │
//! │               (online: try   │      ▲                            │
//! │                direct apply) │      │                            │
//! │                              ▼      │                            │
//! │                     ┌─────────────┐ │   ┌────────────────┐       │
//! │                     │ BufferStore │◀┴───│ DrainScheduler │       │
//! │                     │ (RocksDB /  │     │ (periodic task)│       │
//! │                     │  Memory)    │     └───────┬────────┘       │
//! │                     └──────┬──────┘             │                │
//! │                            │ O(1) len()         ▼                │
//! │                            ▼             ┌──────────────┐        │
//! │                     HealthMonitor ◀──────│ retry budget │        │
//! │                     (offline skip)       └──────────────┘        │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - **Durability**: a record whose enqueue returned success is observed
//!   by a later batch read, or has been removed by a successful apply or
//!   retry exhaustion. No record silently vanishes.
//! - **Ordering**: records drain in `(priority, enqueued_at, id)` order;
//!   lower priority values first, enqueue order within a class.
//! - **Bounded retry**: a record is replayed at most `max_retries` times
//!   before it is dropped with a warning.
//! - **Idempotent replay**: the dispatch table maps every operation to an
//!   idempotent repository call, so at-least-once delivery is safe.
//!
//! ## Module Overview
//!
//! - [`record`]: buffer record model and key encoding
//! - [`traits`]: the [`BufferStore`] trait, configuration and statistics
//! - [`rocksdb`]: persistent RocksDB backend
//! - [`memory`]: in-memory backend for tests and development
//! - [`apply`]: record replay dispatch
//! - [`bridge`]: the [`OperationBuffer`] surface handlers depend on
//! - [`drain`]: the background drain scheduler
//! - [`metrics`]: Prometheus metrics
//!
//! ## Feature Flags
//!
//! - `rocksdb-backend` (default): enable the persistent RocksDB store

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod apply;
pub mod bridge;
pub mod drain;
pub mod memory;
pub mod metrics;
pub mod record;
pub mod traits;

#[cfg(feature = "rocksdb-backend")]
pub mod rocksdb;

// =============================================================================
// Re-exports
// =============================================================================

pub use apply::{Applier, ApplyError};
pub use bridge::{BufferBridge, OperationBuffer, PROFILE_PRIORITY, TASK_PRIORITY};
pub use drain::{DrainConfig, DrainMetrics, DrainScheduler};
pub use memory::MemoryBuffer;
pub use record::{BufferRecord, Entity, Operation, DEFAULT_PRIORITY};
pub use traits::{BufferConfig, BufferConfigBuilder, BufferStore, QueueStats};

#[cfg(feature = "rocksdb-backend")]
pub use rocksdb::RocksDbBuffer;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Prelude
// =============================================================================

/// A prelude module that re-exports commonly used types.
pub mod prelude {
    pub use crate::apply::Applier;
    pub use crate::bridge::{BufferBridge, OperationBuffer};
    pub use crate::drain::{DrainConfig, DrainScheduler};
    pub use crate::memory::MemoryBuffer;
    pub use crate::record::{BufferRecord, Entity, Operation};
    pub use crate::traits::{BufferConfig, BufferStore};

    #[cfg(feature = "rocksdb-backend")]
    pub use crate::rocksdb::RocksDbBuffer;
}

// =============================================================================
// Tests
// =============================================================================

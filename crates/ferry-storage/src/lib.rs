// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # ferry-storage
//!
//! Primary-store clients for the FERRY write path:
//!
//! - [`postgres`]: sqlx-backed repositories for the authoritative user
//!   and task rows, plus pool construction and schema migrations.
//! - [`redis`]: the session KV client and KV health probe.
//!
//! Connectivity failures in either backend surface as
//! `RepoError::Unavailable`, which is the signal that routes mutations
//! into the operation buffer. Startup failures (pool, migrations) are
//! fatal to the process by design: a write path that cannot reach its
//! primary store at boot has nothing to reconcile against.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod postgres;
pub mod redis;

pub use postgres::{connect, migrate, PostgresTaskRepository, PostgresUserRepository};
pub use redis::RedisKvStore;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # ferry-config
//!
//! Configuration schema and loading for the FERRY service.
//!
//! Configuration comes from three layers, later layers winning:
//!
//! 1. Built-in defaults (a bootable development setup)
//! 2. An optional TOML file
//! 3. Environment variable overrides (`BUFFER_PATH`,
//!    `SYNC_INTERVAL_SECONDS`, `MAX_RETRY_ATTEMPTS`, ...)

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod loader;
pub mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::load_config;
pub use schema::{
    AppConfig, BufferSettings, DatabaseConfig, LogConfig, MonitorSettings, RedisConfig,
    ServerConfig, SyncSettings,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The `validate` command: check configuration without starting.

use ferry_config::load_config;

use crate::cli::Cli;
use crate::error::{BinError, BinResult};

/// Loads and validates configuration, printing the effective values.
pub fn execute(cli: &Cli) -> BinResult<()> {
    let config = load_config(cli.config.as_deref())
        .map_err(|e| BinError::Configuration(e.to_string()))?;

    println!("Configuration OK");
    println!("  environment:      {}", config.environment);
    println!("  server:           {}", config.server.address());
    println!("  buffer path:      {}", config.buffer.path);
    println!("  retention hours:  {}", config.buffer.retention_hours);
    println!("  drain interval:   {}s", config.sync.interval_seconds);
    println!("  retry budget:     {}", config.sync.max_retry_attempts);
    println!("  probe interval:   {}s", config.monitor.probe_interval_seconds);
    println!("  shutdown timeout: {}s", config.shutdown_timeout_seconds);

    Ok(())
}

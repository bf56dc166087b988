// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The `run` command: start the service.

use ferry_config::load_config;

use crate::cli::Cli;
use crate::error::{BinError, BinResult};
use crate::runtime::ServiceRuntime;

/// Loads configuration and runs the service until shutdown.
pub async fn execute(cli: &Cli) -> BinResult<()> {
    let config = load_config(cli.config.as_deref())
        .map_err(|e| BinError::Configuration(e.to_string()))?;

    ServiceRuntime::new(config).run().await
}

// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Command execution.

mod run;
mod validate;
mod version;

use crate::cli::{Cli, Commands};
use crate::error::BinResult;

/// Executes the selected command; `run` is the default.
pub async fn execute(cli: Cli) -> BinResult<()> {
    match cli.command.clone().unwrap_or(Commands::Run) {
        Commands::Run => run::execute(&cli).await,
        Commands::Validate => validate::execute(&cli),
        Commands::Version => version::execute(),
    }
}

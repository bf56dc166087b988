// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! FERRY - offline-resilient write path for user and task mutations.
//!
//! Mutations apply directly against the primary stores while they are
//! reachable, buffer durably while they are not, and replay once
//! connectivity returns.

use clap::Parser;

use ferry_bin::cli::Cli;
use ferry_bin::commands;
use ferry_bin::error::report_error_and_exit;
use ferry_bin::logging::init_logging;

/// Application entry point.
#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(cli.effective_log_level(), cli.log_format);

    if let Err(error) = commands::execute(cli).await {
        report_error_and_exit(error);
    }
}

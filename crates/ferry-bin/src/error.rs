// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Binary-level error types.

use thiserror::Error;

/// A Result type with BinError.
pub type BinResult<T> = Result<T, BinError>;

/// Errors that terminate the process.
#[derive(Debug, Error)]
pub enum BinError {
    /// Configuration could not be loaded or validated.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A component failed to initialize. Startup failures are fatal: a
    /// write path that cannot open its buffer or reach its primary store
    /// at boot must not serve mutation endpoints.
    #[error("Initialization error: {0}")]
    Initialization(String),

    /// The running service failed.
    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// Prints the error and exits non-zero.
pub fn report_error_and_exit(error: BinError) -> ! {
    tracing::error!(error = %error, "fatal error");
    eprintln!("Error: {error}");
    std::process::exit(1);
}

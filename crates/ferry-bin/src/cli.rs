// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI argument parsing and command definitions.
//!
//! - `run`: start the service (default)
//! - `validate`: validate configuration without starting
//! - `version`: show version information

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

// =============================================================================
// Main CLI Structure
// =============================================================================

/// FERRY - offline-resilient write path for user and task mutations.
#[derive(Parser, Debug)]
#[command(
    name = "ferry",
    author = "Sylvex <contact@sylvex.io>",
    version = ferry_core::VERSION,
    about = "Offline-resilient write path for user and task mutations",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file path (TOML); environment variables override it
    #[arg(short, long, env = "FERRY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", env = "LOG_LEVEL", global = true)]
    pub log_level: String,

    /// Log format
    #[arg(long, default_value = "text", env = "LOG_FORMAT", global = true)]
    pub log_format: LogFormat,

    /// Enable quiet mode (warnings and errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Returns the log level after applying `--quiet`/`--verbose`.
    pub fn effective_log_level(&self) -> &str {
        if self.quiet {
            "warn"
        } else if self.verbose {
            "debug"
        } else {
            &self.log_level
        }
    }
}

// =============================================================================
// Subcommands
// =============================================================================

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the service
    ///
    /// This is the default command when no subcommand is specified.
    Run,

    /// Validate the configuration
    ///
    /// Loads and validates configuration (file plus environment
    /// overrides) without starting the service.
    Validate,

    /// Show detailed version information
    Version,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text (default).
    Text,
    /// JSON lines for log aggregation.
    Json,
    /// Minimal single-line output.
    Compact,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_run() {
        let cli = Cli::parse_from(["ferry"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.effective_log_level(), "info");
    }

    #[test]
    fn test_quiet_overrides_level() {
        let cli = Cli::parse_from(["ferry", "--quiet", "--log-level", "debug"]);
        assert_eq!(cli.effective_log_level(), "warn");
    }

    #[test]
    fn test_verbose_overrides_level() {
        let cli = Cli::parse_from(["ferry", "--verbose"]);
        assert_eq!(cli.effective_log_level(), "debug");
    }

    #[test]
    fn test_subcommand_parsing() {
        let cli = Cli::parse_from(["ferry", "validate", "--config", "ferry.toml"]);
        assert!(matches!(cli.command, Some(Commands::Validate)));
        assert_eq!(cli.config.unwrap().to_str().unwrap(), "ferry.toml");
    }

    #[test]
    fn test_log_format_parsing() {
        let cli = Cli::parse_from(["ferry", "--log-format", "json"]);
        assert_eq!(cli.log_format, LogFormat::Json);
    }
}

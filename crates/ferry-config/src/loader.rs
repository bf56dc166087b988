// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration loading and processing.
//!
//! # Loading Pipeline
//!
//! 1. Parse the TOML file (when one is given)
//! 2. Apply environment variable overrides
//! 3. Validate the result
//!
//! # Environment Variable Overrides
//!
//! The recognized variables mirror the deployment surface of the
//! original service:
//!
//! ```text
//! SERVER_HOST, SERVER_PORT, REQUEST_TIMEOUT_SECONDS
//! DATABASE_URL, REDIS_URL
//! BUFFER_PATH, BUFFER_MAX_SIZE, BUFFER_RETENTION_HOURS
//! SYNC_INTERVAL_SECONDS, MAX_RETRY_ATTEMPTS
//! HEALTH_PROBE_INTERVAL_SECONDS, SHUTDOWN_TIMEOUT_SECONDS
//! APP_ENV, LOG_LEVEL, LOG_FORMAT
//! ```
//!
//! A variable that is present but unparsable is ignored with a warning;
//! the file (or default) value wins.

use std::env;
use std::path::Path;
use std::str::FromStr;

use tracing::warn;

use crate::error::{ConfigError, ConfigResult};
use crate::schema::AppConfig;

// =============================================================================
// Loading
// =============================================================================

/// Loads configuration from an optional TOML file plus environment
/// overrides, and validates it.
pub fn load_config(path: Option<&Path>) -> ConfigResult<AppConfig> {
    let mut config = match path {
        Some(path) => parse_file(path)?,
        None => AppConfig::default(),
    };

    apply_env_overrides(&mut config);
    validate(&config)?;
    Ok(config)
}

fn parse_file(path: &Path) -> ConfigResult<AppConfig> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str(&contents).map_err(|e| ConfigError::parse(path, e.to_string()))
}

// =============================================================================
// Environment Overrides
// =============================================================================

fn apply_env_overrides(config: &mut AppConfig) {
    override_string("APP_ENV", &mut config.environment);
    override_string("SERVER_HOST", &mut config.server.host);
    override_parse("SERVER_PORT", &mut config.server.port);
    override_parse(
        "REQUEST_TIMEOUT_SECONDS",
        &mut config.server.request_timeout_seconds,
    );

    override_string("DATABASE_URL", &mut config.database.url);
    override_string("REDIS_URL", &mut config.redis.url);

    override_string("BUFFER_PATH", &mut config.buffer.path);
    override_parse("BUFFER_MAX_SIZE", &mut config.buffer.max_size);
    override_parse("BUFFER_RETENTION_HOURS", &mut config.buffer.retention_hours);

    override_parse("SYNC_INTERVAL_SECONDS", &mut config.sync.interval_seconds);
    override_parse("MAX_RETRY_ATTEMPTS", &mut config.sync.max_retry_attempts);

    override_parse(
        "HEALTH_PROBE_INTERVAL_SECONDS",
        &mut config.monitor.probe_interval_seconds,
    );
    override_parse(
        "SHUTDOWN_TIMEOUT_SECONDS",
        &mut config.shutdown_timeout_seconds,
    );

    override_string("LOG_LEVEL", &mut config.log.level);
    override_string("LOG_FORMAT", &mut config.log.format);
}

fn override_string(key: &str, target: &mut String) {
    if let Ok(value) = env::var(key) {
        if !value.is_empty() {
            *target = value;
        }
    }
}

fn override_parse<T: FromStr>(key: &str, target: &mut T) {
    if let Ok(value) = env::var(key) {
        if value.is_empty() {
            return;
        }
        match value.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(key, value = %value, "ignoring unparsable environment override"),
        }
    }
}

// =============================================================================
// Validation
// =============================================================================

fn validate(config: &AppConfig) -> ConfigResult<()> {
    if config.buffer.path.is_empty() {
        return Err(ConfigError::validation("buffer.path", "must not be empty"));
    }
    if config.server.port == 0 {
        return Err(ConfigError::validation("server.port", "must not be zero"));
    }
    if config.sync.interval_seconds == 0 {
        return Err(ConfigError::validation(
            "sync.interval_seconds",
            "must be at least 1",
        ));
    }
    if config.sync.max_retry_attempts == 0 {
        return Err(ConfigError::validation(
            "sync.max_retry_attempts",
            "must be at least 1",
        ));
    }
    if config.server.request_timeout_seconds == 0 {
        return Err(ConfigError::validation(
            "server.request_timeout_seconds",
            "must be at least 1",
        ));
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    // Env-var tests mutate process state; keep every key used here unique
    // so parallel test execution cannot interfere.

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[sync]\ninterval_seconds = 7").unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.sync.interval_seconds, 7);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = load_config(Some(Path::new("/nonexistent/ferry.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "this is not toml [").unwrap();

        let err = load_config(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_env_override_wins_over_default() {
        env::set_var("BUFFER_RETENTION_HOURS", "48");
        let config = load_config(None).unwrap();
        env::remove_var("BUFFER_RETENTION_HOURS");

        assert_eq!(config.buffer.retention_hours, 48);
    }

    #[test]
    fn test_unparsable_env_override_is_ignored() {
        env::set_var("MAX_RETRY_ATTEMPTS", "many");
        let config = load_config(None).unwrap();
        env::remove_var("MAX_RETRY_ATTEMPTS");

        assert_eq!(config.sync.max_retry_attempts, 3);
    }

    #[test]
    fn test_validation_rejects_zero_interval() {
        let mut config = AppConfig::default();
        config.sync.interval_seconds = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validation_rejects_empty_buffer_path() {
        let mut config = AppConfig::default();
        config.buffer.path.clear();
        assert!(validate(&config).is_err());
    }
}

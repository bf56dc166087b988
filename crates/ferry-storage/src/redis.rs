// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Redis-backed KV store client.
//!
//! The primary KV store holds opaque session documents and doubles as a
//! health-probe target. The client wraps a `ConnectionManager`, which
//! transparently reconnects after network failures; while disconnected,
//! calls fail fast and surface as `RepoError::Unavailable`.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Client;
use tracing::info;

use ferry_core::error::{RepoError, RepoResult};
use ferry_core::repository::{HealthProbe, SessionStore};
use ferry_core::types::Session;

const SESSION_KEY_PREFIX: &str = "session:";

// =============================================================================
// RedisKvStore
// =============================================================================

/// The primary KV store client.
#[derive(Clone)]
pub struct RedisKvStore {
    manager: ConnectionManager,
}

impl RedisKvStore {
    /// Connects to the KV store at `url`.
    pub async fn connect(url: &str) -> RepoResult<Self> {
        let client = Client::open(url).map_err(map_redis_error)?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(map_redis_error)?;

        info!("redis connection established");
        Ok(Self { manager })
    }

    fn session_key(token: &str) -> String {
        format!("{SESSION_KEY_PREFIX}{token}")
    }
}

fn map_redis_error(e: redis::RedisError) -> RepoError {
    if e.is_io_error() || e.is_connection_refusal() || e.is_timeout() || e.is_connection_dropped() {
        RepoError::unavailable_with("redis unreachable", e)
    } else {
        RepoError::query_failed(e.to_string())
    }
}

#[async_trait]
impl SessionStore for RedisKvStore {
    async fn get(&self, token: &str) -> RepoResult<Option<Session>> {
        let mut conn = self.manager.clone();
        let raw: Option<String> = redis::cmd("GET")
            .arg(Self::session_key(token))
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;

        match raw {
            Some(json) => {
                let session: Session = serde_json::from_str(&json)
                    .map_err(|e| RepoError::serialization(e.to_string()))?;
                Ok(Some(session).filter(|s| !s.is_expired()))
            }
            None => Ok(None),
        }
    }

    async fn put(&self, session: &Session, ttl: Duration) -> RepoResult<()> {
        let json = serde_json::to_string(session)
            .map_err(|e| RepoError::serialization(e.to_string()))?;

        let mut conn = self.manager.clone();
        redis::cmd("SET")
            .arg(Self::session_key(&session.token))
            .arg(json)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async::<()>(&mut conn)
            .await
            .map_err(map_redis_error)
    }

    async fn delete(&self, token: &str) -> RepoResult<()> {
        let mut conn = self.manager.clone();
        redis::cmd("DEL")
            .arg(Self::session_key(token))
            .query_async::<()>(&mut conn)
            .await
            .map_err(map_redis_error)
    }
}

#[async_trait]
impl HealthProbe for RedisKvStore {
    async fn ping(&self) -> RepoResult<()> {
        let mut conn = self.manager.clone();
        let reply: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;

        if reply == "PONG" {
            Ok(())
        } else {
            Err(RepoError::query_failed(format!(
                "unexpected ping reply: {reply}"
            )))
        }
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

impl std::fmt::Debug for RedisKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisKvStore").finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_key_prefix() {
        assert_eq!(RedisKvStore::session_key("abc"), "session:abc");
    }

    #[test]
    fn test_io_errors_map_to_unavailable() {
        let io = redis::RedisError::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "refused",
        ));
        let err = map_redis_error(io);
        assert!(err.is_retryable());
        assert_eq!(err.status_code(), 503);
    }
}

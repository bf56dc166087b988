// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Application state shared across handlers.

use std::sync::Arc;

use ferry_buffer::bridge::OperationBuffer;
use ferry_core::monitor::HealthMonitor;
use ferry_core::repository::{TaskRepository, UserRepository};

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};

// =============================================================================
// AppState
// =============================================================================

/// Application state shared across all handlers.
///
/// Reads go straight to the repositories; mutations go through the
/// operation buffer so the offline fallback applies uniformly.
#[derive(Clone)]
pub struct AppState {
    /// API configuration.
    pub config: Arc<ApiConfig>,
    /// Health monitor backing the health endpoint.
    pub monitor: Arc<HealthMonitor>,
    /// Operation buffer for mutations.
    pub buffer: Arc<dyn OperationBuffer>,
    /// User repository for reads.
    pub users: Arc<dyn UserRepository>,
    /// Task repository for reads.
    pub tasks: Arc<dyn TaskRepository>,
}

impl AppState {
    /// Creates a new state builder.
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::new()
    }
}

// =============================================================================
// AppStateBuilder
// =============================================================================

/// Builder for [`AppState`].
pub struct AppStateBuilder {
    config: Option<ApiConfig>,
    monitor: Option<Arc<HealthMonitor>>,
    buffer: Option<Arc<dyn OperationBuffer>>,
    users: Option<Arc<dyn UserRepository>>,
    tasks: Option<Arc<dyn TaskRepository>>,
}

impl AppStateBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self {
            config: None,
            monitor: None,
            buffer: None,
            users: None,
            tasks: None,
        }
    }

    /// Sets the configuration.
    pub fn config(mut self, config: ApiConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the health monitor.
    pub fn monitor(mut self, monitor: Arc<HealthMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Sets the operation buffer.
    pub fn buffer(mut self, buffer: Arc<dyn OperationBuffer>) -> Self {
        self.buffer = Some(buffer);
        self
    }

    /// Sets the user repository.
    pub fn users(mut self, users: Arc<dyn UserRepository>) -> Self {
        self.users = Some(users);
        self
    }

    /// Sets the task repository.
    pub fn tasks(mut self, tasks: Arc<dyn TaskRepository>) -> Self {
        self.tasks = Some(tasks);
        self
    }

    /// Builds the state; every component except the configuration is
    /// required.
    pub fn build(self) -> ApiResult<AppState> {
        Ok(AppState {
            config: Arc::new(self.config.unwrap_or_default()),
            monitor: self
                .monitor
                .ok_or_else(|| ApiError::internal("state is missing the health monitor"))?,
            buffer: self
                .buffer
                .ok_or_else(|| ApiError::internal("state is missing the operation buffer"))?,
            users: self
                .users
                .ok_or_else(|| ApiError::internal("state is missing the user repository"))?,
            tasks: self
                .tasks
                .ok_or_else(|| ApiError::internal("state is missing the task repository"))?,
        })
    }
}

impl Default for AppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================

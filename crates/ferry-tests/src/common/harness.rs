// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Full write-path wiring over in-memory components.

use std::sync::Arc;

use ferry_api::{AppState, AppStateBuilder};
use ferry_buffer::apply::Applier;
use ferry_buffer::bridge::BufferBridge;
use ferry_buffer::drain::{DrainConfig, DrainScheduler};
use ferry_buffer::memory::MemoryBuffer;
use ferry_core::memory::{MemoryTaskRepository, MemoryUserRepository};
use ferry_core::monitor::{HealthMonitor, MonitorConfig};

/// The whole write path over in-memory components: store, repositories,
/// monitor, bridge and drain scheduler.
pub struct WritePath {
    /// The buffer store.
    pub store: Arc<MemoryBuffer>,
    /// The user repository (with failure injection).
    pub users: Arc<MemoryUserRepository>,
    /// The task repository (with failure injection).
    pub tasks: Arc<MemoryTaskRepository>,
    /// The health monitor.
    pub monitor: Arc<HealthMonitor>,
    /// The operation bridge.
    pub bridge: Arc<BufferBridge>,
    /// The drain scheduler.
    pub drain: DrainScheduler,
}

impl WritePath {
    /// Builds the write path with testing configurations. The monitor is
    /// not started; call `probe()` after flipping repository switches.
    pub fn new() -> Self {
        let store = Arc::new(MemoryBuffer::with_defaults());
        let users = Arc::new(MemoryUserRepository::new());
        let tasks = Arc::new(MemoryTaskRepository::new());
        let monitor = Arc::new(HealthMonitor::new(
            users.clone(),
            tasks.clone(),
            store.clone(),
            MonitorConfig::for_testing(),
        ));

        let applier = Applier::new(users.clone(), tasks.clone());
        let bridge = Arc::new(BufferBridge::new(
            store.clone(),
            monitor.clone(),
            applier.clone(),
        ));
        let drain = DrainScheduler::new(
            store.clone(),
            monitor.clone(),
            applier,
            DrainConfig::for_testing(),
        );

        Self {
            store,
            users,
            tasks,
            monitor,
            bridge,
            drain,
        }
    }

    /// Runs one probe round so `is_online()` reflects the switches.
    pub async fn probe(&self) {
        self.monitor.probe_now().await;
    }

    /// Flips both primary stores and refreshes the snapshot.
    pub async fn set_online(&self, online: bool) {
        self.users.set_unavailable(!online);
        self.tasks.set_unavailable(!online);
        self.probe().await;
    }

    /// Builds an API state over this write path.
    pub fn api_state(&self) -> AppState {
        AppStateBuilder::new()
            .monitor(self.monitor.clone())
            .buffer(self.bridge.clone())
            .users(self.users.clone())
            .tasks(self.tasks.clone())
            .build()
            .expect("complete state")
    }
}

impl Default for WritePath {
    fn default() -> Self {
        Self::new()
    }
}

// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! HTTP request handlers.

mod health;
mod metrics;
mod profile;
mod tasks;

pub use health::health;
pub use metrics::prometheus_metrics;
pub use profile::{get_profile, update_profile, ProfileUpdateRequest};
pub use tasks::{
    create_task, delete_task, get_task, list_tasks, update_task, TaskListQuery, TaskRequest,
};

// =============================================================================
// Shared Test Harness
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use ferry_buffer::apply::Applier;
    use ferry_buffer::bridge::BufferBridge;
    use ferry_buffer::memory::MemoryBuffer;
    use ferry_core::memory::{MemoryTaskRepository, MemoryUserRepository};
    use ferry_core::monitor::{HealthMonitor, MonitorConfig};

    use crate::state::AppState;

    /// Handler-test wiring over in-memory components.
    pub(crate) struct TestHarness {
        pub state: AppState,
        pub users: Arc<MemoryUserRepository>,
        pub tasks: Arc<MemoryTaskRepository>,
        pub store: Arc<MemoryBuffer>,
    }

    pub(crate) async fn test_harness() -> TestHarness {
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
        let bridge = Arc::new(BufferBridge::new(store.clone(), monitor.clone(), applier));

        let state = AppState::builder()
            .monitor(monitor)
            .buffer(bridge)
            .users(users.clone())
            .tasks(tasks.clone())
            .build()
            .unwrap();

        TestHarness {
            state,
            users,
            tasks,
            store,
        }
    }

    pub(crate) async fn test_state() -> AppState {
        test_harness().await.state
    }
}

// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Write Path Integration Tests
//!
//! End-to-end scenarios over the bridge, buffer store, health monitor and
//! drain scheduler:
//!
//! - Direct apply while online, buffering while offline
//! - Drain on recovery, retry accounting, drops and poison records
//! - Priority precedence across entity classes
//! - Offline ticks leaving the buffer untouched

use std::sync::Arc;
use std::time::Duration;

use ferry_buffer::apply::Applier;
use ferry_buffer::bridge::OperationBuffer;
use ferry_buffer::drain::{DrainConfig, DrainScheduler};
use ferry_buffer::memory::MemoryBuffer;
use ferry_buffer::record::{Entity, Operation};
use ferry_buffer::traits::BufferStore;
use ferry_core::memory::MemoryUserRepository;
use ferry_core::monitor::{HealthMonitor, MonitorConfig};
use ferry_core::repository::{TaskRepository, UserRepository};

use ferry_tests::common::fixtures::{RecordFixtures, TaskFixtures, UserFixtures};
use ferry_tests::common::harness::WritePath;
use ferry_tests::common::mocks::{
    apply_log, BrokenTaskRepository, RecordingTaskRepository, RecordingUserRepository,
};

// =============================================================================
// Direct apply & offline buffering
// =============================================================================

#[tokio::test]
async fn test_direct_apply_while_online() {
    let path = WritePath::new();
    path.probe().await;

    let user = UserFixtures::admin("u1");
    path.bridge
        .buffer_profile(Operation::Update, &user)
        .await
        .unwrap();

    assert_eq!(path.users.get_by_id("u1").await.unwrap().role, "admin");
    assert_eq!(path.store.len(), 0, "no buffering on the fast path");
}

#[tokio::test]
async fn test_offline_mutation_is_buffered() {
    let path = WritePath::new();
    path.set_online(false).await;

    let task = TaskFixtures::pending("t1", "u1");
    path.bridge
        .buffer_task(Operation::Create, &task)
        .await
        .unwrap();

    assert_eq!(path.store.len(), 1);
    let batch = path.store.get_batch(10).await.unwrap();
    assert_eq!(batch[0].entity, Entity::Task);
    assert_eq!(batch[0].operation, Operation::Create);
    assert_eq!(batch[0].retries, 0);
    assert!(path.tasks.is_empty(), "nothing reached the repository");
}

// =============================================================================
// Drain on recovery
// =============================================================================

#[tokio::test]
async fn test_drain_after_recovery() {
    let path = WritePath::new();
    path.set_online(false).await;

    let task = TaskFixtures::pending("t1", "u1");
    path.bridge
        .buffer_task(Operation::Create, &task)
        .await
        .unwrap();
    assert_eq!(path.store.len(), 1);

    path.set_online(true).await;
    path.drain.drain_now().await;

    assert_eq!(path.store.len(), 0);
    assert_eq!(path.tasks.get_by_id("t1").await.unwrap().title, "task t1");
    assert_eq!(path.drain.metrics().applied, 1);
}

#[tokio::test]
async fn test_background_loop_drains_on_recovery() {
    let path = WritePath::new();
    path.set_online(false).await;

    for task in TaskFixtures::batch("u1", 5) {
        path.bridge
            .buffer_task(Operation::Create, &task)
            .await
            .unwrap();
    }
    assert_eq!(path.store.len(), 5);

    let monitor_handle = path.monitor.start();
    let drain_handle = path.drain.start();

    // Recovery: the monitor notices, then the drain loop empties the
    // buffer.
    path.users.set_unavailable(false);
    path.tasks.set_unavailable(false);

    let mut drained = false;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        if path.store.is_empty() {
            drained = true;
            break;
        }
    }
    assert!(drained, "drain loop should empty the buffer after recovery");
    assert_eq!(path.tasks.len(), 5);

    path.drain.shutdown();
    path.monitor.stop();
    let _ = tokio::time::timeout(Duration::from_secs(1), drain_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(1), monitor_handle).await;
}

// =============================================================================
// Retry accounting & drops
// =============================================================================

#[tokio::test]
async fn test_record_dropped_after_retry_budget() {
    let store = Arc::new(MemoryBuffer::with_defaults());
    let users = Arc::new(MemoryUserRepository::new());
    let broken = Arc::new(BrokenTaskRepository::new());
    let monitor = Arc::new(HealthMonitor::new(
        users.clone(),
        users.clone(),
        store.clone(),
        MonitorConfig::for_testing(),
    ));
    monitor.probe_now().await;

    let drain = DrainScheduler::new(
        store.clone(),
        monitor,
        Applier::new(users, broken.clone()),
        DrainConfig {
            max_retries: 3,
            ..DrainConfig::for_testing()
        },
    );

    let task = TaskFixtures::pending("t1", "u1");
    store
        .enqueue(RecordFixtures::task(&task, Operation::Create))
        .await
        .unwrap();

    // Tick 1 and 2 requeue; tick 3 exhausts the budget and drops.
    for _ in 0..3 {
        drain.drain_now().await;
    }

    assert_eq!(store.len(), 0, "record removed after retries");
    assert_eq!(broken.attempts(), 3, "no more applies than the budget");

    let metrics = drain.metrics();
    assert_eq!(metrics.requeued, 2);
    assert_eq!(metrics.dropped, 1);
}

#[tokio::test]
async fn test_poison_record_never_reaches_repository() {
    let path = WritePath::new();
    path.probe().await;

    path.store.enqueue(RecordFixtures::poison()).await.unwrap();
    path.drain.drain_now().await;

    assert_eq!(path.store.len(), 0, "poison removed in one tick");
    assert_eq!(path.drain.metrics().poison, 1);
    assert!(path.tasks.is_empty(), "no repository call for poison");
}

// =============================================================================
// Priority precedence
// =============================================================================

#[tokio::test]
async fn test_profile_class_drains_before_task_class() {
    let log = apply_log();
    let store = Arc::new(MemoryBuffer::with_defaults());
    let users = Arc::new(RecordingUserRepository::new(log.clone()));
    let tasks = Arc::new(RecordingTaskRepository::new(log.clone()));
    let probe = Arc::new(MemoryUserRepository::new());
    let monitor = Arc::new(HealthMonitor::new(
        probe.clone(),
        probe,
        store.clone(),
        MonitorConfig::for_testing(),
    ));
    monitor.probe_now().await;

    // Task enqueued first, profile second; the profile class (priority 3)
    // still drains ahead of the task class (priority 4).
    let task = TaskFixtures::pending("t1", "u1");
    store
        .enqueue(RecordFixtures::task(&task, Operation::Create))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(2)).await;
    let user = UserFixtures::admin("u1");
    store
        .enqueue(RecordFixtures::profile_update(&user))
        .await
        .unwrap();

    let drain = DrainScheduler::new(
        store.clone(),
        monitor,
        Applier::new(users, tasks),
        DrainConfig::for_testing(),
    );
    drain.drain_now().await;

    assert_eq!(store.len(), 0);
    assert_eq!(*log.lock(), vec!["profile:u1", "task:t1"]);
}

// =============================================================================
// Offline skip
// =============================================================================

#[tokio::test]
async fn test_offline_tick_does_not_touch_buffer() {
    let path = WritePath::new();
    path.set_online(false).await;

    let task = TaskFixtures::pending("t1", "u1");
    path.bridge
        .buffer_task(Operation::Update, &task)
        .await
        .unwrap();

    for _ in 0..3 {
        path.drain.drain_now().await;
    }

    assert_eq!(path.store.len(), 1, "offline ticks never remove records");
    let batch = path.store.get_batch(10).await.unwrap();
    assert_eq!(batch[0].retries, 0, "offline ticks never mutate records");
    assert_eq!(path.drain.metrics().skipped_offline, 3);
}

// =============================================================================
// Replay idempotence
// =============================================================================

#[tokio::test]
async fn test_duplicate_replay_is_idempotent() {
    let path = WritePath::new();
    path.probe().await;

    let task = TaskFixtures::pending("t1", "u1");
    let record = RecordFixtures::task(&task, Operation::Create);

    // The same record applied twice (at-least-once delivery) leaves the
    // same repository state as applying it once.
    let applier = Applier::new(path.users.clone(), path.tasks.clone());
    applier.apply(&record).await.unwrap();
    applier.apply(&record).await.unwrap();

    assert_eq!(path.tasks.len(), 1);
}

#[tokio::test]
async fn test_replayed_delete_of_missing_row_succeeds() {
    let path = WritePath::new();
    path.probe().await;

    let task = TaskFixtures::pending("ghost", "u1");
    let record = RecordFixtures::task(&task, Operation::Delete);

    let applier = Applier::new(path.users.clone(), path.tasks.clone());
    applier.apply(&record).await.unwrap();
}

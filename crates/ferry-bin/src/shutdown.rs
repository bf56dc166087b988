// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Graceful shutdown coordination.
//!
//! Two pieces cooperate here:
//!
//! - [`ShutdownCoordinator`] owns signal handling (SIGTERM/SIGINT) and a
//!   broadcast channel every long-running task can subscribe to.
//! - [`Lifecycle`] is an ordered registry of named teardown hooks. Hooks
//!   run in reverse registration order under one shared deadline, so the
//!   outermost component (the HTTP server stops first, via the
//!   coordinator) unwinds down to the innermost (primary-store clients).
//!   A failing hook is logged and aggregated; it never prevents the
//!   remaining hooks from running.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tracing::{error, info, warn};

// =============================================================================
// ShutdownCoordinator
// =============================================================================

/// Coordinates shutdown notification across components.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    sender: broadcast::Sender<()>,
    shutdown_initiated: Arc<AtomicBool>,
}

impl ShutdownCoordinator {
    /// Creates a new shutdown coordinator.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self {
            sender,
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Subscribes to shutdown notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }

    /// Creates a future that resolves when shutdown is signaled, suitable
    /// for `axum::serve(..).with_graceful_shutdown(..)`.
    pub fn shutdown_signal(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut receiver = self.sender.subscribe();
        let initiated = self.shutdown_initiated.clone();
        async move {
            if initiated.load(Ordering::SeqCst) {
                return;
            }
            let _ = receiver.recv().await;
        }
    }

    /// Initiates shutdown. Idempotent.
    pub fn initiate_shutdown(&self) {
        if self
            .shutdown_initiated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            info!("shutdown initiated");
            let _ = self.sender.send(());
        }
    }

    /// Returns `true` if shutdown has been initiated.
    pub fn is_shutdown_initiated(&self) -> bool {
        self.shutdown_initiated.load(Ordering::SeqCst)
    }

    /// Blocks until an OS termination signal arrives (or shutdown was
    /// initiated manually), then notifies all subscribers.
    pub async fn wait_for_shutdown(&self) {
        if self.shutdown_initiated.load(Ordering::SeqCst) {
            return;
        }

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let mut sigterm =
                signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
            let mut sigint =
                signal(SignalKind::interrupt()).expect("failed to register SIGINT handler");
            let mut manual = self.sender.subscribe();

            tokio::select! {
                _ = sigterm.recv() => info!("received SIGTERM"),
                _ = sigint.recv() => info!("received SIGINT"),
                _ = manual.recv() => {}
            }
        }

        #[cfg(not(unix))]
        {
            let mut manual = self.sender.subscribe();
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    result.expect("failed to register Ctrl+C handler");
                    info!("received Ctrl+C");
                }
                _ = manual.recv() => {}
            }
        }

        self.initiate_shutdown();
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Lifecycle
// =============================================================================

type HookFuture = Pin<Box<dyn Future<Output = Result<(), String>> + Send>>;
type ShutdownHook = Box<dyn FnOnce() -> HookFuture + Send>;

struct Hook {
    name: String,
    run: ShutdownHook,
}

/// Ordered registry of teardown hooks.
pub struct Lifecycle {
    timeout: Duration,
    hooks: Mutex<Vec<Hook>>,
}

impl Lifecycle {
    /// Creates a lifecycle manager with the given shutdown deadline.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            hooks: Mutex::new(Vec::new()),
        }
    }

    /// Registers a teardown hook. Hooks run in reverse registration
    /// order.
    pub async fn register<F, Fut>(&self, name: impl Into<String>, hook: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        self.hooks.lock().await.push(Hook {
            name: name.into(),
            run: Box::new(move || Box::pin(hook())),
        });
    }

    /// Runs every registered hook in reverse order under the shared
    /// deadline. Hook failures are aggregated but never short-circuit.
    pub async fn shutdown(&self) -> Result<(), String> {
        let deadline = tokio::time::Instant::now() + self.timeout;
        let mut hooks = self.hooks.lock().await;
        let mut failures = Vec::new();

        while let Some(hook) = hooks.pop() {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                warn!(component = %hook.name, "shutdown deadline exhausted, skipping hook");
                failures.push(format!("{}: deadline exhausted", hook.name));
                continue;
            }

            match tokio::time::timeout(remaining, (hook.run)()).await {
                Ok(Ok(())) => info!(component = %hook.name, "component stopped"),
                Ok(Err(e)) => {
                    error!(component = %hook.name, error = %e, "shutdown hook failed");
                    failures.push(format!("{}: {e}", hook.name));
                }
                Err(_) => {
                    error!(component = %hook.name, "shutdown hook timed out");
                    failures.push(format!("{}: timed out", hook.name));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(failures.join("; "))
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

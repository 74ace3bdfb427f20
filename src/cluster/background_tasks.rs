//! Named background tasks with a shared shutdown signal.
//!
//! The change driver is the long-running task of a
//! [`TopologyService`](super::TopologyService). It runs inside this registry
//! so the service can check on it and stop it with a bounded wait.
//!
//! # Example
//!
//! ```rust,no_run
//! use topomorph::cluster::background_tasks::BackgroundTaskRegistry;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut registry = BackgroundTaskRegistry::new();
//!
//!     registry.spawn_essential("driver", async {
//!         loop {
//!             tokio::time::sleep(Duration::from_secs(5)).await;
//!         }
//!     });
//!
//!     for (name, status) in registry.health_check() {
//!         println!("{name}: {}", if status.is_healthy() { "OK" } else { "FAILED" });
//!     }
//!
//!     registry.shutdown_all().await;
//! }
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::constants::DEFAULT_SHUTDOWN_TIMEOUT_SECS;

/// Status of a background task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Running,
    /// The task returned before shutdown. Registered tasks are expected to
    /// run until shutdown, so this means something went wrong.
    Failed,
}

impl TaskStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, TaskStatus::Running)
    }
}

/// Registry of named background tasks.
pub struct BackgroundTaskRegistry {
    tasks: HashMap<&'static str, JoinHandle<()>>,
    shutdown_tx: broadcast::Sender<()>,
    shutting_down: bool,
}

impl BackgroundTaskRegistry {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            tasks: HashMap::new(),
            shutdown_tx,
            shutting_down: false,
        }
    }

    /// Spawn a named task that is expected to run until shutdown. It is
    /// dropped at its next await point once shutdown is requested. A task
    /// already registered under `name` is aborted.
    pub fn spawn_essential<F>(&mut self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.shutting_down {
            tracing::warn!(task = name, "Ignoring spawn during shutdown");
            return;
        }

        if let Some(old) = self.tasks.remove(name) {
            old.abort();
            tracing::debug!(task = name, "Aborted previous task instance");
        }

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = task => {
                    tracing::error!(task = name, "Essential task exited");
                }
                _ = shutdown_rx.recv() => {
                    tracing::debug!(task = name, "Task received shutdown signal");
                }
            }
        });

        tracing::info!(task = name, "Spawned background task");
        self.tasks.insert(name, handle);
    }

    /// Status of every registered task.
    pub fn health_check(&self) -> Vec<(&'static str, TaskStatus)> {
        self.tasks
            .iter()
            .map(|(name, handle)| (*name, Self::status(handle)))
            .collect()
    }

    fn status(handle: &JoinHandle<()>) -> TaskStatus {
        if handle.is_finished() {
            TaskStatus::Failed
        } else {
            TaskStatus::Running
        }
    }

    pub fn all_healthy(&self) -> bool {
        self.tasks
            .values()
            .all(|handle| Self::status(handle).is_healthy())
    }

    pub async fn shutdown_all(&mut self) {
        self.shutdown_all_with_timeout(Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS))
            .await;
    }

    /// Signal every task and wait up to `timeout` in total for them to stop.
    /// Tasks still running at the deadline are aborted.
    pub async fn shutdown_all_with_timeout(&mut self, timeout: Duration) {
        if self.shutting_down {
            return;
        }
        self.shutting_down = true;

        tracing::info!(
            task_count = self.tasks.len(),
            "Initiating background task shutdown"
        );
        let _ = self.shutdown_tx.send(());

        let deadline = tokio::time::Instant::now() + timeout;
        for (name, handle) in self.tasks.drain() {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                tracing::warn!(task = name, "Aborting task (timeout exceeded)");
                handle.abort();
                continue;
            }

            let abort = handle.abort_handle();
            match tokio::time::timeout(remaining, handle).await {
                Ok(Ok(())) => tracing::debug!(task = name, "Task shutdown complete"),
                Ok(Err(e)) => {
                    tracing::warn!(task = name, error = %e, "Task panicked during shutdown")
                }
                Err(_) => {
                    tracing::warn!(task = name, "Task did not respond to shutdown, aborting");
                    abort.abort();
                }
            }
        }

        tracing::info!("All background tasks shutdown complete");
    }
}

impl Default for BackgroundTaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BackgroundTaskRegistry {
    fn drop(&mut self) {
        if !self.shutting_down {
            let _ = self.shutdown_tx.send(());
            for (name, handle) in self.tasks.drain() {
                tracing::debug!(task = name, "Aborting task on registry drop");
                handle.abort();
            }
        }
    }
}

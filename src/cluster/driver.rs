//! Background change driver.
//!
//! The driver executes the pending change plan one operation at a time:
//!
//! 1. Read the latest snapshot and resolve the applier for the head operation.
//! 2. Run `init` and persist the optimistic snapshot if it changed anything,
//!    together with the plan's restore point.
//! 3. Call the executor, retrying transient failures and timeouts with
//!    backoff up to `max_apply_attempts`.
//! 4. On success, advance the plan. On rejection or exhausted retries, fail
//!    the plan and restore the member layout from before step 2. The restore
//!    point is persisted, so this holds for a step resumed after a restart.
//!
//! Between plans the driver sleeps on the store's change notification, so an
//! idle cluster costs nothing.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use backon::Retryable;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use super::applier::{OperationApplier, OperationAppliers, TopologyUpdate};
use super::config::CoordinatorConfig;
use super::error::{ChangeError, ChangeResult, ExecutorError};
use super::metrics;
use super::operation::ChangeOperation;
use super::retry;
use super::store::TopologyStore;
use crate::types::{ChangeId, now_ms};

/// Where the driver is with the operation it is working on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationPhase {
    Pending,
    Initializing,
    Applying,
    Completed,
    Failed,
}

/// Progress of one operation, as reported by
/// [`ChangeCoordinator::change_status`](super::ChangeCoordinator::change_status).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationProgress {
    pub change_id: ChangeId,
    pub operation: ChangeOperation,
    pub phase: OperationPhase,
    /// Executor calls made so far for this operation.
    pub attempts: u32,
}

/// Shared view of the driver's current operation.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    inner: Arc<RwLock<Option<OperationProgress>>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn current(&self) -> Option<OperationProgress> {
        self.inner.read().await.clone()
    }

    async fn start(&self, change_id: ChangeId, operation: &ChangeOperation) {
        *self.inner.write().await = Some(OperationProgress {
            change_id,
            operation: operation.clone(),
            phase: OperationPhase::Pending,
            attempts: 0,
        });
    }

    async fn update(&self, phase: OperationPhase, attempts: u32) {
        if let Some(progress) = self.inner.write().await.as_mut() {
            progress.phase = phase;
            progress.attempts = attempts;
        }
    }

    async fn clear(&self) {
        *self.inner.write().await = None;
    }
}

/// What a single [`ChangeDriver::step`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// No plan was pending.
    Idle,
    /// The head operation finished and more are left.
    Advanced { change_id: ChangeId, remaining: usize },
    /// The last operation finished and the plan is complete.
    Completed { change_id: ChangeId },
    /// The plan was halted at the head operation.
    Failed { change_id: ChangeId, reason: String },
}

/// Executes pending change plans against the executors.
pub struct ChangeDriver {
    store: Arc<dyn TopologyStore>,
    appliers: OperationAppliers,
    config: CoordinatorConfig,
    progress: ProgressTracker,
}

impl ChangeDriver {
    pub fn new(
        store: Arc<dyn TopologyStore>,
        appliers: OperationAppliers,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            store,
            appliers,
            config,
            progress: ProgressTracker::new(),
        }
    }

    /// Handle for reading the driver's progress from elsewhere.
    pub fn progress(&self) -> ProgressTracker {
        self.progress.clone()
    }

    /// Run forever, stepping whenever a plan is pending.
    ///
    /// The loop only ends when its task is dropped, which may happen in the
    /// middle of a step. A step cut short that way is resumed from the
    /// persisted snapshot by the next driver. Store write errors are logged
    /// and the step is retried after the minimum backoff delay.
    pub async fn run(self) {
        let mut changes = self.store.subscribe();
        info!("Topology change driver started");

        loop {
            let _ = changes.borrow_and_update();

            if self.store.current().has_pending_changes() {
                if let Err(e) = self.step().await {
                    error!(error = %e, "Change driver step failed, backing off");
                    tokio::time::sleep(self.config.retry_min_delay()).await;
                }
                continue;
            }

            if changes.changed().await.is_err() {
                debug!("Topology store closed, stopping change driver");
                break;
            }
        }
    }

    /// Drive steps until no plan is pending.
    pub async fn run_pending(&self) -> ChangeResult<Vec<StepOutcome>> {
        let mut outcomes = Vec::new();
        loop {
            match self.step().await? {
                StepOutcome::Idle => return Ok(outcomes),
                outcome => outcomes.push(outcome),
            }
        }
    }

    /// Execute the head operation of the pending plan.
    pub async fn step(&self) -> ChangeResult<StepOutcome> {
        let base = self.store.current();
        let (Some(change_id), Some(operation)) = (
            base.pending_change_id(),
            base.next_pending_operation().cloned(),
        ) else {
            return Ok(StepOutcome::Idle);
        };

        self.progress.start(change_id, &operation).await;
        let applier = self.appliers.resolve(&operation);

        // init
        self.progress.update(OperationPhase::Initializing, 0).await;
        let optimistic = match base.init_operation(|t| applier.init(t)) {
            Ok(optimistic) => optimistic,
            Err(e) => {
                warn!(
                    change_id,
                    operation = %operation,
                    error = %e,
                    "Operation no longer applies to the topology"
                );
                return self.fail(change_id, e.to_string(), 0).await;
            }
        };
        if optimistic != *base {
            self.store
                .compare_and_set(base.version, optimistic)
                .await?;
            debug!(change_id, operation = %operation, "Recorded optimistic state");
        }

        // apply
        let attempts = AtomicU32::new(0);
        let outcome = self.apply_with_retry(applier.as_ref(), &operation, &attempts).await;
        let attempts = attempts.load(Ordering::SeqCst);

        match outcome {
            Ok(update) => {
                let latest = self.store.current();
                if latest.pending_change_id() != Some(change_id) {
                    return Err(ChangeError::ConcurrentChange {
                        change_id: latest.pending_change_id().unwrap_or(latest.version),
                    });
                }
                let advanced = match latest.advance_change(update, now_ms()) {
                    Ok(advanced) => advanced,
                    Err(e) => {
                        error!(
                            change_id,
                            operation = %operation,
                            error = %e,
                            "Failed to record completed operation"
                        );
                        return self.fail(change_id, e.to_string(), attempts).await;
                    }
                };
                let stored = self.store.compare_and_set(latest.version, advanced).await?;
                self.progress.update(OperationPhase::Completed, attempts).await;

                let remaining = stored
                    .pending_changes
                    .as_ref()
                    .map_or(0, |plan| plan.pending_operations.len());
                metrics::set_pending_operations(remaining);
                info!(
                    change_id,
                    operation = %operation,
                    attempts,
                    remaining,
                    "Operation completed"
                );

                if remaining == 0 {
                    self.progress.clear().await;
                    metrics::record_plan("completed");
                    info!(change_id, version = stored.version, "Change plan completed");
                    Ok(StepOutcome::Completed { change_id })
                } else {
                    Ok(StepOutcome::Advanced {
                        change_id,
                        remaining,
                    })
                }
            }
            Err(e) => {
                if e.is_retriable() {
                    retry::record_retry_exhausted(retry::OPERATION_POLICY);
                }
                error!(
                    change_id,
                    operation = %operation,
                    attempts,
                    error = %e,
                    "Operation failed, halting change plan"
                );
                self.fail(change_id, e.to_string(), attempts).await
            }
        }
    }

    async fn apply_with_retry(
        &self,
        applier: &dyn OperationApplier,
        operation: &ChangeOperation,
        attempts: &AtomicU32,
    ) -> Result<TopologyUpdate, ExecutorError> {
        let timeout = self.config.apply_timeout();
        let progress = &self.progress;
        let kind = operation.kind();

        let result = (|| async move {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            progress.update(OperationPhase::Applying, attempt).await;

            let start = Instant::now();
            let result = match tokio::time::timeout(timeout, applier.apply()).await {
                Ok(result) => result,
                Err(_) => Err(ExecutorError::Timeout(timeout)),
            };
            let outcome = match &result {
                Ok(_) => "success",
                Err(e) => e.as_metric_label(),
            };
            metrics::record_operation_attempt(kind, outcome, start.elapsed().as_secs_f64());
            result
        })
        .retry(retry::operation_policy(&self.config))
        .when(ExecutorError::is_retriable)
        .notify(|e: &ExecutorError, delay| {
            warn!(
                operation = %operation,
                error = %e,
                delay_ms = delay.as_millis() as u64,
                "Executor call failed, retrying"
            );
            retry::record_retry_attempt(
                retry::OPERATION_POLICY,
                attempts.load(Ordering::SeqCst) as usize,
                delay,
            );
        })
        .await;

        if result.is_ok() && attempts.load(Ordering::SeqCst) > 1 {
            retry::record_retry_success(retry::OPERATION_POLICY);
        }
        result
    }

    /// Halt the plan, restoring the member layout from before the head
    /// operation's optimistic write.
    async fn fail(
        &self,
        change_id: ChangeId,
        reason: String,
        attempts: u32,
    ) -> ChangeResult<StepOutcome> {
        let latest = self.store.current();
        let failed = latest.fail_change(now_ms())?;
        let stored = self.store.compare_and_set(latest.version, failed).await?;

        self.progress.update(OperationPhase::Failed, attempts).await;
        metrics::set_pending_operations(0);
        metrics::record_plan("failed");
        warn!(change_id, version = stored.version, reason = %reason, "Change plan failed");

        Ok(StepOutcome::Failed { change_id, reason })
    }
}

impl std::fmt::Debug for ChangeDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeDriver")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

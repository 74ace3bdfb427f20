//! Recording executors with scripted failures, for tests.
//!
//! # Usage
//!
//! This module is available when the `test-utilities` feature is enabled,
//! or during unit tests:
//!
//! ```toml
//! [dev-dependencies]
//! topomorph = { path = ".", features = ["test-utilities"] }
//! ```
//!
//! Every executor call is recorded as the [`ChangeOperation`] it carries out,
//! so tests can compare the recorded calls with a plan directly. Results are
//! scripted per operation kind (`"partition_join"`, `"member_leave"`, ...):
//! scripted results are consumed in order, and once they run out calls
//! succeed.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::applier::OperationAppliers;
use super::error::ExecutorError;
use super::executor::{ClusterMembershipChangeExecutor, ExecutorResult, PartitionChangeExecutor};
use super::operation::ChangeOperation;
use crate::types::{MemberId, PartitionId, Priority};

/// Scripted outcome of one executor call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockResponse {
    Succeed,
    Fail(ExecutorError),
    /// Never answer. Only the driver's timeout ends the call.
    Hang,
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<ChangeOperation>,
    scripts: HashMap<&'static str, VecDeque<MockResponse>>,
}

/// Implements both executor traits and records every call.
#[derive(Debug, Clone, Default)]
pub struct RecordingExecutor {
    state: Arc<Mutex<MockState>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appliers that route every call through this executor.
    pub fn appliers(&self) -> OperationAppliers {
        OperationAppliers::new(Arc::new(self.clone()), Arc::new(self.clone()))
    }

    /// Queue `response` for the next call of operation `kind`.
    pub fn script(&self, kind: &'static str, response: MockResponse) -> &Self {
        self.lock()
            .scripts
            .entry(kind)
            .or_default()
            .push_back(response);
        self
    }

    /// Fail the next `times` calls of operation `kind`.
    pub fn fail_times(&self, kind: &'static str, times: usize, error: ExecutorError) -> &Self {
        for _ in 0..times {
            self.script(kind, MockResponse::Fail(error.clone()));
        }
        self
    }

    /// Every call made so far, oldest first.
    pub fn calls(&self) -> Vec<ChangeOperation> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self, kind: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.kind() == kind)
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        // poisoned only if a test panicked while holding it
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn record(&self, call: ChangeOperation) -> ExecutorResult {
        let response = {
            let mut state = self.lock();
            let response = state
                .scripts
                .get_mut(call.kind())
                .and_then(VecDeque::pop_front)
                .unwrap_or(MockResponse::Succeed);
            state.calls.push(call);
            response
        };

        match response {
            MockResponse::Succeed => Ok(()),
            MockResponse::Fail(error) => Err(error),
            MockResponse::Hang => std::future::pending().await,
        }
    }
}

#[async_trait]
impl PartitionChangeExecutor for RecordingExecutor {
    async fn join_partition(
        &self,
        member_id: MemberId,
        partition_id: PartitionId,
        priority: Priority,
    ) -> ExecutorResult {
        self.record(ChangeOperation::partition_join(member_id, partition_id, priority))
            .await
    }

    async fn leave_partition(
        &self,
        member_id: MemberId,
        partition_id: PartitionId,
    ) -> ExecutorResult {
        self.record(ChangeOperation::partition_leave(member_id, partition_id))
            .await
    }

    async fn reconfigure_priority(
        &self,
        member_id: MemberId,
        partition_id: PartitionId,
        priority: Priority,
    ) -> ExecutorResult {
        self.record(ChangeOperation::reconfigure_priority(
            member_id,
            partition_id,
            priority,
        ))
        .await
    }

    async fn force_reconfigure(
        &self,
        member_id: MemberId,
        partition_id: PartitionId,
        members: &[MemberId],
    ) -> ExecutorResult {
        self.record(ChangeOperation::force_reconfigure(
            member_id,
            partition_id,
            members.to_vec(),
        ))
        .await
    }
}

#[async_trait]
impl ClusterMembershipChangeExecutor for RecordingExecutor {
    async fn member_join(&self, member_id: MemberId) -> ExecutorResult {
        self.record(ChangeOperation::member_join(member_id)).await
    }

    async fn member_leave(&self, member_id: MemberId) -> ExecutorResult {
        self.record(ChangeOperation::member_leave(member_id)).await
    }

    async fn member_remove(&self, member_id: MemberId, member_to_remove: MemberId) -> ExecutorResult {
        self.record(ChangeOperation::member_remove(member_id, member_to_remove))
            .await
    }
}

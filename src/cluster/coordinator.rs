//! Change coordinator: the request side of the engine.
//!
//! Every request goes through the same pipeline:
//!
//! 1. Read the latest snapshot and refuse if a plan is already in flight.
//! 2. Let the matching transformer compute the operation list.
//! 3. Simulate the list against a copy of the snapshot. A plan that could
//!    not run to completion is rejected up front.
//! 4. Unless this is a dry run, attach the plan to a new snapshot with a
//!    compare-and-set write. The [`ChangeDriver`](super::ChangeDriver) picks
//!    it up from there.
//!
//! The caller gets the planned operations back immediately and never waits
//! for execution.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::applier::simulate;
use super::driver::ProgressTracker;
use super::error::{ChangeError, ChangeResult, StoreError};
use super::metrics;
use super::requests::{
    AddMembersRequest, ChangeResponse, ChangeStatusResponse, ForceScaleDownRequest,
    JoinPartitionRequest, LeavePartitionRequest, ReassignPartitionsRequest, RemoveMembersRequest,
    ScaleRequest,
};
use super::state::ClusterTopology;
use super::store::TopologyStore;
use super::transformer::{
    AddMembers, ForceScaleDown, JoinPartition, LeavePartition, ReassignPartitions, RemoveMembers,
    Scale, TopologyTransformer,
};
use crate::types::now_ms;

/// Accepts change requests and turns them into persisted change plans.
#[derive(Clone)]
pub struct ChangeCoordinator {
    store: Arc<dyn TopologyStore>,
    progress: ProgressTracker,
}

impl ChangeCoordinator {
    /// `progress` is the driver's tracker, used by [`Self::change_status`].
    pub fn new(store: Arc<dyn TopologyStore>, progress: ProgressTracker) -> Self {
        Self { store, progress }
    }

    /// The latest snapshot.
    pub fn topology(&self) -> Arc<ClusterTopology> {
        self.store.current()
    }

    /// The plan in flight, the last finished plan, and what the driver is doing.
    pub async fn change_status(&self) -> ChangeStatusResponse {
        let topology = self.store.current();
        ChangeStatusResponse {
            topology_version: topology.version,
            pending: topology.pending_changes.clone(),
            last_change: topology.last_change,
            current_operation: self.progress.current().await,
        }
    }

    pub async fn add_members(&self, request: AddMembersRequest) -> ChangeResult<ChangeResponse> {
        self.submit(&AddMembers::new(request.members), request.dry_run)
            .await
    }

    pub async fn remove_members(
        &self,
        request: RemoveMembersRequest,
    ) -> ChangeResult<ChangeResponse> {
        self.submit(&RemoveMembers::new(request.members), request.dry_run)
            .await
    }

    pub async fn join_partition(
        &self,
        request: JoinPartitionRequest,
    ) -> ChangeResult<ChangeResponse> {
        let transformer =
            JoinPartition::new(request.member_id, request.partition_id, request.priority);
        self.submit(&transformer, request.dry_run).await
    }

    pub async fn leave_partition(
        &self,
        request: LeavePartitionRequest,
    ) -> ChangeResult<ChangeResponse> {
        let transformer = LeavePartition::new(request.member_id, request.partition_id);
        self.submit(&transformer, request.dry_run).await
    }

    pub async fn reassign_partitions(
        &self,
        request: ReassignPartitionsRequest,
    ) -> ChangeResult<ChangeResponse> {
        self.submit(&ReassignPartitions::new(request.members), request.dry_run)
            .await
    }

    pub async fn scale(&self, request: ScaleRequest) -> ChangeResult<ChangeResponse> {
        let transformer = Scale::new(request.members, request.new_replication_factor);
        self.submit(&transformer, request.dry_run).await
    }

    pub async fn force_scale_down(
        &self,
        request: ForceScaleDownRequest,
    ) -> ChangeResult<ChangeResponse> {
        self.submit(&ForceScaleDown::new(request.members), request.dry_run)
            .await
    }

    async fn submit(
        &self,
        transformer: &dyn TopologyTransformer,
        dry_run: bool,
    ) -> ChangeResult<ChangeResponse> {
        let result = self.plan(transformer, dry_run).await;

        let outcome = match &result {
            Ok(_) if dry_run => "dry_run",
            Ok(response) if response.is_noop() => "noop",
            Ok(_) => "accepted",
            Err(e) => e.as_metric_label(),
        };
        metrics::record_change_request(transformer.kind(), outcome);

        if let Err(e) = &result {
            warn!(kind = transformer.kind(), error = %e, "Change request rejected");
        }
        result
    }

    async fn plan(
        &self,
        transformer: &dyn TopologyTransformer,
        dry_run: bool,
    ) -> ChangeResult<ChangeResponse> {
        let current = self.store.current();
        if let Some(change_id) = current.pending_change_id() {
            return Err(ChangeError::ConcurrentChange { change_id });
        }

        let operations = transformer.operations(&current)?;
        let expected = simulate(&current, &operations).map_err(|e| {
            ChangeError::invalid(format!("planned changes cannot be applied: {e}"))
        })?;

        let mut response = ChangeResponse {
            change_id: current.version + 1,
            current_topology: current.members.clone(),
            expected_topology: expected.members,
            planned_changes: operations,
        };

        if response.is_noop() {
            debug!(
                kind = transformer.kind(),
                "Cluster already matches the requested topology"
            );
            return Ok(response);
        }
        if dry_run {
            debug!(
                kind = transformer.kind(),
                operations = response.planned_changes.len(),
                "Dry run, plan not persisted"
            );
            return Ok(response);
        }

        let next = current.start_change(response.planned_changes.clone(), now_ms())?;
        let stored = self
            .store
            .compare_and_set(current.version, next)
            .await
            .map_err(|e| match e {
                StoreError::VersionConflict { actual, .. } => {
                    let latest = self.store.current();
                    ChangeError::ConcurrentChange {
                        change_id: latest.pending_change_id().unwrap_or(actual),
                    }
                }
                other => ChangeError::Store(other),
            })?;

        response.change_id = stored.pending_change_id().unwrap_or(stored.version);
        metrics::record_plan("started");
        metrics::set_pending_operations(response.planned_changes.len());
        info!(
            kind = transformer.kind(),
            change_id = response.change_id,
            operations = response.planned_changes.len(),
            "Change plan started"
        );
        Ok(response)
    }
}

impl std::fmt::Debug for ChangeCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeCoordinator")
            .field("version", &self.store.current().version)
            .finish_non_exhaustive()
    }
}

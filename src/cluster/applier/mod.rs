//! Two-phase appliers, one per [`ChangeOperation`] variant.
//!
//! `init` is synchronous and pure. It validates the operation against the
//! latest snapshot and returns the optimistic snapshot (e.g. the joining
//! replica recorded as `JOINING`). `apply` calls the executor and, on
//! success, returns the update that moves the optimistic state to its final
//! value (`JOINING` to `ACTIVE`, `LEAVING` to gone).
//!
//! Both phases are safe to repeat: `init` treats an operation that is already
//! half-done as a retry rather than an error.

mod member;
mod partition;

use std::sync::Arc;

use async_trait::async_trait;

use super::error::{ExecutorError, TopologyResult};
use super::executor::{
    ClusterMembershipChangeExecutor, NoopClusterMembershipChangeExecutor,
    NoopPartitionChangeExecutor, PartitionChangeExecutor,
};
use super::operation::ChangeOperation;
use super::state::ClusterTopology;

pub use member::{MemberJoinApplier, MemberLeaveApplier, MemberRemoveApplier};
pub use partition::{
    PartitionForceReconfigureApplier, PartitionJoinApplier, PartitionLeaveApplier,
    PartitionReconfigurePriorityApplier,
};

/// Moves a snapshot from an operation's optimistic state to its final state.
pub type TopologyUpdate =
    Box<dyn FnOnce(&ClusterTopology) -> TopologyResult<ClusterTopology> + Send>;

/// Executes one change operation.
#[async_trait]
pub trait OperationApplier: Send + Sync {
    /// Validate against `topology` and return the optimistic snapshot.
    fn init(&self, topology: &ClusterTopology) -> TopologyResult<ClusterTopology>;

    /// Call the executor.
    async fn execute(&self) -> Result<(), ExecutorError>;

    /// The update to run once the executor reported success.
    fn completion(&self) -> TopologyUpdate;

    async fn apply(&self) -> Result<TopologyUpdate, ExecutorError> {
        self.execute().await?;
        Ok(self.completion())
    }
}

/// Resolves the applier for an operation.
#[derive(Clone)]
pub struct OperationAppliers {
    partition_executor: Arc<dyn PartitionChangeExecutor>,
    membership_executor: Arc<dyn ClusterMembershipChangeExecutor>,
}

impl OperationAppliers {
    pub fn new(
        partition_executor: Arc<dyn PartitionChangeExecutor>,
        membership_executor: Arc<dyn ClusterMembershipChangeExecutor>,
    ) -> Self {
        Self {
            partition_executor,
            membership_executor,
        }
    }

    /// Appliers whose executors succeed immediately.
    pub fn noop() -> Self {
        Self::new(
            Arc::new(NoopPartitionChangeExecutor),
            Arc::new(NoopClusterMembershipChangeExecutor),
        )
    }

    pub fn resolve(&self, operation: &ChangeOperation) -> Box<dyn OperationApplier> {
        match operation {
            ChangeOperation::MemberJoin { member_id } => Box::new(MemberJoinApplier::new(
                *member_id,
                self.membership_executor.clone(),
            )),
            ChangeOperation::MemberLeave { member_id } => Box::new(MemberLeaveApplier::new(
                *member_id,
                self.membership_executor.clone(),
            )),
            ChangeOperation::MemberRemove {
                member_id,
                member_to_remove,
            } => Box::new(MemberRemoveApplier::new(
                *member_id,
                *member_to_remove,
                self.membership_executor.clone(),
            )),
            ChangeOperation::PartitionJoin {
                member_id,
                partition_id,
                priority,
            } => Box::new(PartitionJoinApplier::new(
                *member_id,
                *partition_id,
                *priority,
                self.partition_executor.clone(),
            )),
            ChangeOperation::PartitionLeave {
                member_id,
                partition_id,
                minimum_allowed_replicas,
            } => Box::new(PartitionLeaveApplier::new(
                *member_id,
                *partition_id,
                *minimum_allowed_replicas,
                self.partition_executor.clone(),
            )),
            ChangeOperation::PartitionReconfigurePriority {
                member_id,
                partition_id,
                priority,
            } => Box::new(PartitionReconfigurePriorityApplier::new(
                *member_id,
                *partition_id,
                *priority,
                self.partition_executor.clone(),
            )),
            ChangeOperation::PartitionForceReconfigure {
                member_id,
                partition_id,
                members,
            } => Box::new(PartitionForceReconfigureApplier::new(
                *member_id,
                *partition_id,
                members.clone(),
                self.partition_executor.clone(),
            )),
        }
    }
}

impl std::fmt::Debug for OperationAppliers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationAppliers").finish_non_exhaustive()
    }
}

/// Run `init` and the success update of every operation against a copy of
/// `topology`, without calling any executor.
///
/// Returns the snapshot the plan would produce if every executor call
/// succeeded.
pub fn simulate(
    topology: &ClusterTopology,
    operations: &[ChangeOperation],
) -> TopologyResult<ClusterTopology> {
    let appliers = OperationAppliers::noop();
    let mut current = topology.clone();
    for operation in operations {
        let applier = appliers.resolve(operation);
        current = applier.init(&current)?;
        current = (applier.completion())(&current)?;
    }
    Ok(current)
}

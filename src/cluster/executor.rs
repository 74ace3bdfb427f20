//! Executor traits: the engine's only way to change the real cluster.
//!
//! The engine never joins a replica or admits a member itself. It asks an
//! executor and waits for the answer. Implementations must be idempotent: the
//! driver may repeat a call after a timeout or a lost response.
//!
//! # Trait Hierarchy
//!
//! - [`PartitionChangeExecutor`]: replica join/leave, priority, forced reconfiguration
//! - [`ClusterMembershipChangeExecutor`]: member join/leave/remove
//!
//! [`NoopPartitionChangeExecutor`] and [`NoopClusterMembershipChangeExecutor`]
//! succeed immediately. The coordinator uses them to simulate plans.

use async_trait::async_trait;

use super::error::ExecutorError;
use crate::types::{MemberId, PartitionId, Priority};

/// Result of an executor call.
pub type ExecutorResult = Result<(), ExecutorError>;

/// Partition-level primitives.
#[async_trait]
pub trait PartitionChangeExecutor: Send + Sync {
    /// Start a replica of `partition_id` on `member_id` and wait until it has caught up.
    async fn join_partition(
        &self,
        member_id: MemberId,
        partition_id: PartitionId,
        priority: Priority,
    ) -> ExecutorResult;

    /// Stop the replica of `partition_id` on `member_id`.
    async fn leave_partition(&self, member_id: MemberId, partition_id: PartitionId)
    -> ExecutorResult;

    async fn reconfigure_priority(
        &self,
        member_id: MemberId,
        partition_id: PartitionId,
        priority: Priority,
    ) -> ExecutorResult;

    /// Replace the replica set of `partition_id` with `members`, acting from
    /// `member_id`. Must work without a quorum of the old replica set.
    async fn force_reconfigure(
        &self,
        member_id: MemberId,
        partition_id: PartitionId,
        members: &[MemberId],
    ) -> ExecutorResult;
}

/// Member-level primitives.
#[async_trait]
pub trait ClusterMembershipChangeExecutor: Send + Sync {
    async fn member_join(&self, member_id: MemberId) -> ExecutorResult;

    async fn member_leave(&self, member_id: MemberId) -> ExecutorResult;

    /// Remove `member_to_remove` from the cluster, acting from `member_id`.
    async fn member_remove(&self, member_id: MemberId, member_to_remove: MemberId)
    -> ExecutorResult;
}

/// Partition executor that succeeds without doing anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPartitionChangeExecutor;

#[async_trait]
impl PartitionChangeExecutor for NoopPartitionChangeExecutor {
    async fn join_partition(&self, _: MemberId, _: PartitionId, _: Priority) -> ExecutorResult {
        Ok(())
    }

    async fn leave_partition(&self, _: MemberId, _: PartitionId) -> ExecutorResult {
        Ok(())
    }

    async fn reconfigure_priority(
        &self,
        _: MemberId,
        _: PartitionId,
        _: Priority,
    ) -> ExecutorResult {
        Ok(())
    }

    async fn force_reconfigure(&self, _: MemberId, _: PartitionId, _: &[MemberId]) -> ExecutorResult {
        Ok(())
    }
}

/// Membership executor that succeeds without doing anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopClusterMembershipChangeExecutor;

#[async_trait]
impl ClusterMembershipChangeExecutor for NoopClusterMembershipChangeExecutor {
    async fn member_join(&self, _: MemberId) -> ExecutorResult {
        Ok(())
    }

    async fn member_leave(&self, _: MemberId) -> ExecutorResult {
        Ok(())
    }

    async fn member_remove(&self, _: MemberId, _: MemberId) -> ExecutorResult {
        Ok(())
    }
}

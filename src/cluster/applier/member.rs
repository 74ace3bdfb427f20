//! Member-level appliers.

use std::sync::Arc;

use async_trait::async_trait;

use super::{OperationApplier, TopologyUpdate};
use crate::cluster::error::{ExecutorError, TopologyError, TopologyResult};
use crate::cluster::executor::ClusterMembershipChangeExecutor;
use crate::cluster::state::{ClusterTopology, MemberState, MemberStatus};
use crate::types::MemberId;

/// Adds a member as `JOINING`; `ACTIVE` once the executor confirms.
pub struct MemberJoinApplier {
    member_id: MemberId,
    executor: Arc<dyn ClusterMembershipChangeExecutor>,
}

impl MemberJoinApplier {
    pub fn new(member_id: MemberId, executor: Arc<dyn ClusterMembershipChangeExecutor>) -> Self {
        Self {
            member_id,
            executor,
        }
    }
}

#[async_trait]
impl OperationApplier for MemberJoinApplier {
    fn init(&self, topology: &ClusterTopology) -> TopologyResult<ClusterTopology> {
        match topology.member(self.member_id).map(|m| m.state) {
            None => topology.add_member(self.member_id, MemberState::joining()),
            Some(MemberStatus::Joining) => Ok(topology.clone()),
            Some(MemberStatus::Active) => Err(TopologyError::MemberAlreadyExists(self.member_id)),
            Some(state) => Err(TopologyError::invalid_state(
                self.member_id,
                format!("cannot join while {state:?}"),
            )),
        }
    }

    async fn execute(&self) -> Result<(), ExecutorError> {
        self.executor.member_join(self.member_id).await
    }

    fn completion(&self) -> TopologyUpdate {
        let member_id = self.member_id;
        Box::new(move |topology| topology.update_member(member_id, |m| Ok(m.to_active())))
    }
}

/// Marks an empty member as `LEAVING`; drops its record once the executor confirms.
pub struct MemberLeaveApplier {
    member_id: MemberId,
    executor: Arc<dyn ClusterMembershipChangeExecutor>,
}

impl MemberLeaveApplier {
    pub fn new(member_id: MemberId, executor: Arc<dyn ClusterMembershipChangeExecutor>) -> Self {
        Self {
            member_id,
            executor,
        }
    }
}

#[async_trait]
impl OperationApplier for MemberLeaveApplier {
    fn init(&self, topology: &ClusterTopology) -> TopologyResult<ClusterTopology> {
        let member = topology
            .member(self.member_id)
            .ok_or(TopologyError::MemberNotFound(self.member_id))?;
        if !member.partitions.is_empty() {
            return Err(TopologyError::MemberHasPartitions {
                member: self.member_id,
                partitions: member.partitions.keys().copied().collect(),
            });
        }
        match member.state {
            MemberStatus::Leaving => Ok(topology.clone()),
            MemberStatus::Active => topology.update_member(self.member_id, |m| Ok(m.to_leaving())),
            state => Err(TopologyError::invalid_state(
                self.member_id,
                format!("cannot leave while {state:?}"),
            )),
        }
    }

    async fn execute(&self) -> Result<(), ExecutorError> {
        self.executor.member_leave(self.member_id).await
    }

    fn completion(&self) -> TopologyUpdate {
        let member_id = self.member_id;
        Box::new(move |topology| topology.remove_member(member_id))
    }
}

/// Removes a member that is not coming back, on behalf of another member.
///
/// Removing a member that is already gone succeeds, so the operation can be
/// replayed after a restart.
pub struct MemberRemoveApplier {
    member_id: MemberId,
    member_to_remove: MemberId,
    executor: Arc<dyn ClusterMembershipChangeExecutor>,
}

impl MemberRemoveApplier {
    pub fn new(
        member_id: MemberId,
        member_to_remove: MemberId,
        executor: Arc<dyn ClusterMembershipChangeExecutor>,
    ) -> Self {
        Self {
            member_id,
            member_to_remove,
            executor,
        }
    }
}

#[async_trait]
impl OperationApplier for MemberRemoveApplier {
    fn init(&self, topology: &ClusterTopology) -> TopologyResult<ClusterTopology> {
        let acting = topology
            .member(self.member_id)
            .ok_or(TopologyError::MemberNotFound(self.member_id))?;
        if !acting.is_active() {
            return Err(TopologyError::invalid_state(
                self.member_id,
                "only an active member can remove another member",
            ));
        }

        let Some(removed) = topology.member(self.member_to_remove) else {
            return Ok(topology.clone());
        };
        if !removed.partitions.is_empty() {
            return Err(TopologyError::MemberHasPartitions {
                member: self.member_to_remove,
                partitions: removed.partitions.keys().copied().collect(),
            });
        }
        if removed.state == MemberStatus::Leaving {
            return Ok(topology.clone());
        }
        topology.update_member(self.member_to_remove, |m| Ok(m.to_leaving()))
    }

    async fn execute(&self) -> Result<(), ExecutorError> {
        self.executor
            .member_remove(self.member_id, self.member_to_remove)
            .await
    }

    fn completion(&self) -> TopologyUpdate {
        let member_to_remove = self.member_to_remove;
        Box::new(move |topology| {
            if topology.has_member(member_to_remove) {
                topology.remove_member(member_to_remove)
            } else {
                Ok(topology.clone())
            }
        })
    }
}

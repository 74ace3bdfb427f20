//! Partition-level appliers.

use std::sync::Arc;

use async_trait::async_trait;

use super::{OperationApplier, TopologyUpdate};
use crate::cluster::error::{ExecutorError, TopologyError, TopologyResult};
use crate::cluster::executor::PartitionChangeExecutor;
use crate::cluster::state::{ClusterTopology, MemberState, PartitionState, PartitionStatus};
use crate::types::{MemberId, PartitionId, Priority};

fn hosted<'a>(
    topology: &'a ClusterTopology,
    member_id: MemberId,
    partition_id: PartitionId,
) -> TopologyResult<(&'a MemberState, &'a PartitionState)> {
    let member = topology
        .member(member_id)
        .ok_or(TopologyError::MemberNotFound(member_id))?;
    let partition = member
        .partition(partition_id)
        .ok_or(TopologyError::PartitionNotFound {
            member: member_id,
            partition: partition_id,
        })?;
    Ok((member, partition))
}

/// Adds a `JOINING` replica; `ACTIVE` once the executor reports it caught up.
pub struct PartitionJoinApplier {
    member_id: MemberId,
    partition_id: PartitionId,
    priority: Priority,
    executor: Arc<dyn PartitionChangeExecutor>,
}

impl PartitionJoinApplier {
    pub fn new(
        member_id: MemberId,
        partition_id: PartitionId,
        priority: Priority,
        executor: Arc<dyn PartitionChangeExecutor>,
    ) -> Self {
        Self {
            member_id,
            partition_id,
            priority,
            executor,
        }
    }
}

#[async_trait]
impl OperationApplier for PartitionJoinApplier {
    fn init(&self, topology: &ClusterTopology) -> TopologyResult<ClusterTopology> {
        let member = topology
            .member(self.member_id)
            .ok_or(TopologyError::MemberNotFound(self.member_id))?;
        if !member.is_active() {
            return Err(TopologyError::invalid_state(
                self.member_id,
                format!("cannot join partition {} unless active", self.partition_id),
            ));
        }
        if let Some(existing) = member.partition(self.partition_id) {
            return if existing.state == PartitionStatus::Joining {
                Ok(topology.clone())
            } else {
                Err(TopologyError::PartitionAlreadyExists {
                    member: self.member_id,
                    partition: self.partition_id,
                })
            };
        }
        if !topology.has_partition(self.partition_id) {
            return Err(TopologyError::invalid_state(
                self.member_id,
                format!("partition {} has no replicas to join", self.partition_id),
            ));
        }

        let (partition_id, priority) = (self.partition_id, self.priority);
        topology.update_member(self.member_id, |m| {
            Ok(m.add_partition(partition_id, PartitionState::joining(priority)))
        })
    }

    async fn execute(&self) -> Result<(), ExecutorError> {
        self.executor
            .join_partition(self.member_id, self.partition_id, self.priority)
            .await
    }

    fn completion(&self) -> TopologyUpdate {
        let (member_id, partition_id) = (self.member_id, self.partition_id);
        Box::new(move |topology| {
            hosted(topology, member_id, partition_id)?;
            topology.update_member(member_id, |m| {
                Ok(m.update_partition(partition_id, PartitionState::to_active))
            })
        })
    }
}

/// Marks a replica `LEAVING`; drops it once the executor confirms.
///
/// Refused if the partition would end up with fewer than
/// `minimum_allowed_replicas` replicas.
pub struct PartitionLeaveApplier {
    member_id: MemberId,
    partition_id: PartitionId,
    minimum_allowed_replicas: usize,
    executor: Arc<dyn PartitionChangeExecutor>,
}

impl PartitionLeaveApplier {
    pub fn new(
        member_id: MemberId,
        partition_id: PartitionId,
        minimum_allowed_replicas: usize,
        executor: Arc<dyn PartitionChangeExecutor>,
    ) -> Self {
        Self {
            member_id,
            partition_id,
            minimum_allowed_replicas,
            executor,
        }
    }
}

#[async_trait]
impl OperationApplier for PartitionLeaveApplier {
    fn init(&self, topology: &ClusterTopology) -> TopologyResult<ClusterTopology> {
        let (_, partition) = hosted(topology, self.member_id, self.partition_id)?;
        if partition.state == PartitionStatus::Leaving {
            return Ok(topology.clone());
        }

        let replicas = topology.replica_count(self.partition_id);
        if replicas <= self.minimum_allowed_replicas {
            return Err(TopologyError::NotEnoughReplicas {
                member: self.member_id,
                partition: self.partition_id,
                replicas,
                minimum: self.minimum_allowed_replicas,
            });
        }

        let partition_id = self.partition_id;
        topology.update_member(self.member_id, |m| {
            Ok(m.update_partition(partition_id, PartitionState::to_leaving))
        })
    }

    async fn execute(&self) -> Result<(), ExecutorError> {
        self.executor
            .leave_partition(self.member_id, self.partition_id)
            .await
    }

    fn completion(&self) -> TopologyUpdate {
        let (member_id, partition_id) = (self.member_id, self.partition_id);
        Box::new(move |topology| {
            topology.update_member(member_id, |m| Ok(m.remove_partition(partition_id)))
        })
    }
}

/// Changes the priority of an existing replica.
pub struct PartitionReconfigurePriorityApplier {
    member_id: MemberId,
    partition_id: PartitionId,
    priority: Priority,
    executor: Arc<dyn PartitionChangeExecutor>,
}

impl PartitionReconfigurePriorityApplier {
    pub fn new(
        member_id: MemberId,
        partition_id: PartitionId,
        priority: Priority,
        executor: Arc<dyn PartitionChangeExecutor>,
    ) -> Self {
        Self {
            member_id,
            partition_id,
            priority,
            executor,
        }
    }
}

#[async_trait]
impl OperationApplier for PartitionReconfigurePriorityApplier {
    fn init(&self, topology: &ClusterTopology) -> TopologyResult<ClusterTopology> {
        hosted(topology, self.member_id, self.partition_id)?;
        Ok(topology.clone())
    }

    async fn execute(&self) -> Result<(), ExecutorError> {
        self.executor
            .reconfigure_priority(self.member_id, self.partition_id, self.priority)
            .await
    }

    fn completion(&self) -> TopologyUpdate {
        let (member_id, partition_id, priority) = (self.member_id, self.partition_id, self.priority);
        Box::new(move |topology| {
            hosted(topology, member_id, partition_id)?;
            topology.update_member(member_id, |m| {
                Ok(m.update_partition(partition_id, |p| p.with_priority(priority)))
            })
        })
    }
}

/// Replaces a partition's replica set with the given survivors.
///
/// Replicas outside the survivor set are dropped from the snapshot once the
/// executor confirms; nothing is asked of them since they are assumed gone.
pub struct PartitionForceReconfigureApplier {
    member_id: MemberId,
    partition_id: PartitionId,
    members: Vec<MemberId>,
    executor: Arc<dyn PartitionChangeExecutor>,
}

impl PartitionForceReconfigureApplier {
    pub fn new(
        member_id: MemberId,
        partition_id: PartitionId,
        members: Vec<MemberId>,
        executor: Arc<dyn PartitionChangeExecutor>,
    ) -> Self {
        Self {
            member_id,
            partition_id,
            members,
            executor,
        }
    }
}

#[async_trait]
impl OperationApplier for PartitionForceReconfigureApplier {
    fn init(&self, topology: &ClusterTopology) -> TopologyResult<ClusterTopology> {
        if self.members.is_empty() {
            return Err(TopologyError::invalid_state(
                self.member_id,
                format!("partition {} needs at least one replica", self.partition_id),
            ));
        }
        hosted(topology, self.member_id, self.partition_id)?;
        for member in &self.members {
            hosted(topology, *member, self.partition_id)?;
        }
        Ok(topology.clone())
    }

    async fn execute(&self) -> Result<(), ExecutorError> {
        self.executor
            .force_reconfigure(self.member_id, self.partition_id, &self.members)
            .await
    }

    fn completion(&self) -> TopologyUpdate {
        let partition_id = self.partition_id;
        let survivors = self.members.clone();
        Box::new(move |topology| {
            topology
                .replicas_of(partition_id)
                .into_iter()
                .map(|(id, _)| id)
                .filter(|id| !survivors.contains(id))
                .try_fold(topology.clone(), |current, id| {
                    current.update_member(id, |m| Ok(m.remove_partition(partition_id)))
                })
        })
    }
}

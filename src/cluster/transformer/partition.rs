//! Single-replica join and leave.

use super::TopologyTransformer;
use crate::cluster::error::{ChangeError, ChangeResult};
use crate::cluster::operation::ChangeOperation;
use crate::cluster::state::ClusterTopology;
use crate::types::{MemberId, PartitionId, Priority};

#[derive(Debug, Clone)]
pub struct JoinPartition {
    member_id: MemberId,
    partition_id: PartitionId,
    priority: Priority,
}

impl JoinPartition {
    pub fn new(member_id: MemberId, partition_id: PartitionId, priority: Priority) -> Self {
        Self {
            member_id,
            partition_id,
            priority,
        }
    }
}

impl TopologyTransformer for JoinPartition {
    fn kind(&self) -> &'static str {
        "join_partition"
    }

    fn operations(&self, topology: &ClusterTopology) -> ChangeResult<Vec<ChangeOperation>> {
        let member = topology
            .member(self.member_id)
            .ok_or(ChangeError::MemberNotFound(self.member_id))?;
        if !topology.has_partition(self.partition_id) {
            return Err(ChangeError::PartitionNotFound(self.partition_id));
        }
        if member.has_partition(self.partition_id) {
            return Err(ChangeError::invalid(format!(
                "member {} already replicates partition {}",
                self.member_id, self.partition_id
            )));
        }
        if self.priority == 0 {
            return Err(ChangeError::invalid("priority must be positive"));
        }

        Ok(vec![ChangeOperation::partition_join(
            self.member_id,
            self.partition_id,
            self.priority,
        )])
    }
}

#[derive(Debug, Clone)]
pub struct LeavePartition {
    member_id: MemberId,
    partition_id: PartitionId,
}

impl LeavePartition {
    pub fn new(member_id: MemberId, partition_id: PartitionId) -> Self {
        Self {
            member_id,
            partition_id,
        }
    }
}

impl TopologyTransformer for LeavePartition {
    fn kind(&self) -> &'static str {
        "leave_partition"
    }

    fn operations(&self, topology: &ClusterTopology) -> ChangeResult<Vec<ChangeOperation>> {
        let member = topology
            .member(self.member_id)
            .ok_or(ChangeError::MemberNotFound(self.member_id))?;
        if !member.has_partition(self.partition_id) {
            return Err(ChangeError::invalid(format!(
                "member {} does not replicate partition {}",
                self.member_id, self.partition_id
            )));
        }
        if topology.replica_count(self.partition_id) <= 1 {
            return Err(ChangeError::invalid(format!(
                "member {} is the last replica of partition {}",
                self.member_id, self.partition_id
            )));
        }

        Ok(vec![ChangeOperation::partition_leave(
            self.member_id,
            self.partition_id,
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topology() -> ClusterTopology {
        ClusterTopology::from_layout([
            (MemberId(0), vec![(1, 2), (2, 1)]),
            (MemberId(1), vec![(1, 1)]),
        ])
    }

    #[test]
    fn test_join() {
        let ops = JoinPartition::new(MemberId(1), 2, 3)
            .operations(&topology())
            .unwrap();
        assert_eq!(ops, vec![ChangeOperation::partition_join(MemberId(1), 2, 3)]);
    }

    #[test]
    fn test_join_rejections() {
        let topology = topology();
        assert!(matches!(
            JoinPartition::new(MemberId(5), 1, 1).operations(&topology),
            Err(ChangeError::MemberNotFound(MemberId(5)))
        ));
        assert!(matches!(
            JoinPartition::new(MemberId(1), 9, 1).operations(&topology),
            Err(ChangeError::PartitionNotFound(9))
        ));
        assert!(matches!(
            JoinPartition::new(MemberId(1), 1, 1).operations(&topology),
            Err(ChangeError::InvalidRequest(_))
        ));
        assert!(matches!(
            JoinPartition::new(MemberId(1), 2, 0).operations(&topology),
            Err(ChangeError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_leave() {
        let ops = LeavePartition::new(MemberId(1), 1)
            .operations(&topology())
            .unwrap();
        assert_eq!(ops, vec![ChangeOperation::partition_leave(MemberId(1), 1)]);
    }

    #[test]
    fn test_leave_rejections() {
        let topology = topology();
        assert!(matches!(
            LeavePartition::new(MemberId(1), 2).operations(&topology),
            Err(ChangeError::InvalidRequest(_))
        ));
        // last replica
        assert!(matches!(
            LeavePartition::new(MemberId(0), 2).operations(&topology),
            Err(ChangeError::InvalidRequest(_))
        ));
        assert!(matches!(
            LeavePartition::new(MemberId(4), 1).operations(&topology),
            Err(ChangeError::MemberNotFound(MemberId(4)))
        ));
    }
}

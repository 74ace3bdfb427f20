//! Spreading partitions over a given member set.

use super::{
    TopologyTransformer, check_replication_factor, distribute, moves, require_members,
    target_members,
};
use crate::cluster::error::ChangeResult;
use crate::cluster::operation::ChangeOperation;
use crate::cluster::state::ClusterTopology;
use crate::types::MemberId;

/// Redistributes every partition over exactly `members`, keeping the current
/// replication factor and the priorities of replicas that stay.
///
/// Joins for a partition always come before its leaves, so a partition never
/// has fewer replicas than it started with while the plan runs.
#[derive(Debug, Clone)]
pub struct ReassignPartitions {
    members: Vec<MemberId>,
}

impl ReassignPartitions {
    pub fn new(members: Vec<MemberId>) -> Self {
        Self { members }
    }
}

impl TopologyTransformer for ReassignPartitions {
    fn kind(&self) -> &'static str {
        "reassign_partitions"
    }

    fn operations(&self, topology: &ClusterTopology) -> ChangeResult<Vec<ChangeOperation>> {
        let targets = target_members(&self.members)?;
        require_members(topology, &targets)?;

        let replication_factor = topology.replication_factor();
        check_replication_factor(replication_factor, targets.len())?;

        let placement = distribute(topology, &targets, replication_factor);
        Ok(moves(topology, &placement, replication_factor, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::error::ChangeError;

    #[test]
    fn test_reassign_to_current_layout_is_empty() {
        let topology = ClusterTopology::from_layout([
            (MemberId(0), vec![(1, 1)]),
            (MemberId(1), vec![(2, 1)]),
        ]);
        let ops = ReassignPartitions::new(vec![MemberId(0), MemberId(1)])
            .operations(&topology)
            .unwrap();
        assert!(ops.is_empty());
    }

    #[test]
    fn test_reassign_onto_new_member() {
        let topology = ClusterTopology::from_layout([
            (MemberId(0), vec![(1, 1), (2, 1)]),
            (MemberId(1), vec![]),
        ]);
        let ops = ReassignPartitions::new(vec![MemberId(0), MemberId(1)])
            .operations(&topology)
            .unwrap();
        assert_eq!(
            ops,
            vec![
                ChangeOperation::partition_join(MemberId(1), 2, 1),
                ChangeOperation::partition_leave(MemberId(0), 2),
            ]
        );
    }

    #[test]
    fn test_reassign_unknown_member() {
        let topology = ClusterTopology::from_layout([(MemberId(0), vec![(1, 1)])]);
        let err = ReassignPartitions::new(vec![MemberId(0), MemberId(2)])
            .operations(&topology)
            .unwrap_err();
        assert!(matches!(err, ChangeError::MemberNotFound(MemberId(2))));
    }

    #[test]
    fn test_reassign_too_few_members() {
        let topology = ClusterTopology::from_layout([
            (MemberId(0), vec![(1, 2)]),
            (MemberId(1), vec![(1, 1)]),
        ]);
        let err = ReassignPartitions::new(vec![MemberId(0)])
            .operations(&topology)
            .unwrap_err();
        assert!(matches!(err, ChangeError::InvalidRequest(_)));
    }

    #[test]
    fn test_reassign_empty_target() {
        let topology = ClusterTopology::from_layout([(MemberId(0), vec![(1, 1)])]);
        let err = ReassignPartitions::new(vec![])
            .operations(&topology)
            .unwrap_err();
        assert!(matches!(err, ChangeError::InvalidRequest(_)));
    }
}

//! Shrinking the cluster after members were lost for good.

use super::{TopologyTransformer, require_members, target_members};
use crate::cluster::error::{ChangeError, ChangeResult};
use crate::cluster::operation::ChangeOperation;
use crate::cluster::state::ClusterTopology;
use crate::types::MemberId;

/// Drops every member outside `members` without a join/leave handoff.
///
/// Each partition that loses replicas is force-reconfigured to its surviving
/// replicas; the lowest surviving id acts for the partition. Departed members
/// are then removed, with the lowest target member acting. Partitions with no
/// surviving replica make the request invalid, since their data would be
/// gone.
#[derive(Debug, Clone)]
pub struct ForceScaleDown {
    members: Vec<MemberId>,
}

impl ForceScaleDown {
    pub fn new(members: Vec<MemberId>) -> Self {
        Self { members }
    }
}

impl TopologyTransformer for ForceScaleDown {
    fn kind(&self) -> &'static str {
        "force_scale_down"
    }

    fn operations(&self, topology: &ClusterTopology) -> ChangeResult<Vec<ChangeOperation>> {
        let targets = target_members(&self.members)?;
        require_members(topology, &targets)?;

        let mut operations = Vec::new();
        for partition in topology.partition_ids() {
            let replicas = topology.replicas_of(partition);
            let survivors: Vec<MemberId> = replicas
                .iter()
                .map(|(id, _)| *id)
                .filter(|id| targets.contains(id))
                .collect();

            if survivors.len() == replicas.len() {
                continue;
            }
            let Some(&acting) = survivors.first() else {
                return Err(ChangeError::invalid(format!(
                    "partition {partition} has no replica among the remaining members"
                )));
            };
            operations.push(ChangeOperation::force_reconfigure(
                acting, partition, survivors,
            ));
        }

        if let Some(&acting) = targets.first() {
            operations.extend(
                topology
                    .member_ids()
                    .into_iter()
                    .filter(|id| !targets.contains(id))
                    .map(|departed| ChangeOperation::member_remove(acting, departed)),
            );
        }

        Ok(operations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn four_members() -> ClusterTopology {
        ClusterTopology::from_layout([
            (MemberId(0), vec![(1, 2)]),
            (MemberId(1), vec![(1, 1)]),
            (MemberId(2), vec![(2, 2)]),
            (MemberId(3), vec![(2, 1)]),
        ])
    }

    #[test]
    fn test_force_scale_down() {
        let ops = ForceScaleDown::new(vec![MemberId(0), MemberId(2)])
            .operations(&four_members())
            .unwrap();
        assert_eq!(
            ops,
            vec![
                ChangeOperation::force_reconfigure(MemberId(0), 1, vec![MemberId(0)]),
                ChangeOperation::force_reconfigure(MemberId(2), 2, vec![MemberId(2)]),
                ChangeOperation::member_remove(MemberId(0), MemberId(1)),
                ChangeOperation::member_remove(MemberId(0), MemberId(3)),
            ]
        );
    }

    #[test]
    fn test_untouched_partitions_are_skipped() {
        let ops = ForceScaleDown::new(vec![MemberId(0), MemberId(1), MemberId(2)])
            .operations(&four_members())
            .unwrap();
        assert_eq!(
            ops,
            vec![
                ChangeOperation::force_reconfigure(MemberId(2), 2, vec![MemberId(2)]),
                ChangeOperation::member_remove(MemberId(0), MemberId(3)),
            ]
        );
    }

    #[test]
    fn test_partition_without_survivors_is_invalid() {
        let err = ForceScaleDown::new(vec![MemberId(0), MemberId(1)])
            .operations(&four_members())
            .unwrap_err();
        assert!(matches!(err, ChangeError::InvalidRequest(_)));
    }

    #[test]
    fn test_all_members_kept_is_empty() {
        let ops = ForceScaleDown::new(vec![MemberId(0), MemberId(1), MemberId(2), MemberId(3)])
            .operations(&four_members())
            .unwrap();
        assert!(ops.is_empty());
    }

    #[test]
    fn test_unknown_target_member() {
        let err = ForceScaleDown::new(vec![MemberId(0), MemberId(8)])
            .operations(&four_members())
            .unwrap_err();
        assert!(matches!(err, ChangeError::MemberNotFound(MemberId(8))));
    }
}

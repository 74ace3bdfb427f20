//! Scaling the member set, optionally with a new replication factor.

use super::{
    TopologyTransformer, check_replication_factor, distribute, moves, target_members,
};
use crate::cluster::error::{ChangeError, ChangeResult};
use crate::cluster::operation::ChangeOperation;
use crate::cluster::state::ClusterTopology;
use crate::types::MemberId;

/// Moves the cluster to exactly `members`.
///
/// Emits, in order: `MemberJoin` for new members, per-partition joins,
/// priority changes and leaves, then `MemberLeave` for members that are not
/// in the target set. Priorities of existing replicas are only revised when
/// the replication factor changes.
#[derive(Debug, Clone)]
pub struct Scale {
    members: Vec<MemberId>,
    new_replication_factor: Option<usize>,
}

impl Scale {
    pub fn new(members: Vec<MemberId>, new_replication_factor: Option<usize>) -> Self {
        Self {
            members,
            new_replication_factor,
        }
    }
}

impl TopologyTransformer for Scale {
    fn kind(&self) -> &'static str {
        "scale"
    }

    fn operations(&self, topology: &ClusterTopology) -> ChangeResult<Vec<ChangeOperation>> {
        let targets = target_members(&self.members)?;

        let current_factor = topology.replication_factor();
        let replication_factor = match self.new_replication_factor {
            Some(0) => {
                return Err(ChangeError::invalid("replication factor must be positive"));
            }
            Some(factor) => factor,
            None => current_factor,
        };
        check_replication_factor(replication_factor, targets.len())?;

        let mut operations: Vec<ChangeOperation> = targets
            .iter()
            .copied()
            .filter(|id| !topology.has_member(*id))
            .map(ChangeOperation::member_join)
            .collect();

        let placement = distribute(topology, &targets, replication_factor);
        operations.extend(moves(
            topology,
            &placement,
            replication_factor,
            replication_factor != current_factor,
        ));

        operations.extend(
            topology
                .member_ids()
                .into_iter()
                .filter(|id| !targets.contains(id))
                .map(ChangeOperation::member_leave),
        );

        Ok(operations)
    }
}

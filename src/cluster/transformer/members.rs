//! Adding and removing members.

use std::collections::{BTreeSet, HashSet};

use super::{TopologyTransformer, check_replication_factor, distribute, moves};
use crate::cluster::error::{ChangeError, ChangeResult};
use crate::cluster::operation::ChangeOperation;
use crate::cluster::state::ClusterTopology;
use crate::types::MemberId;

/// Emits a `MemberJoin` for every requested member not yet in the cluster.
///
/// Members already present are skipped. Output keeps the request order with
/// duplicates removed.
#[derive(Debug, Clone)]
pub struct AddMembers {
    members: Vec<MemberId>,
}

impl AddMembers {
    pub fn new(members: Vec<MemberId>) -> Self {
        Self { members }
    }
}

impl TopologyTransformer for AddMembers {
    fn kind(&self) -> &'static str {
        "add_members"
    }

    fn operations(&self, topology: &ClusterTopology) -> ChangeResult<Vec<ChangeOperation>> {
        if self.members.is_empty() {
            return Err(ChangeError::invalid("no members to add"));
        }

        let mut seen = HashSet::new();
        Ok(self
            .members
            .iter()
            .copied()
            .filter(|id| seen.insert(*id) && !topology.has_member(*id))
            .map(ChangeOperation::member_join)
            .collect())
    }
}

/// Moves every replica off the removed members, then lets them leave.
///
/// Replicas are redistributed over the remaining members with the current
/// replication factor. Members not in the cluster are skipped.
#[derive(Debug, Clone)]
pub struct RemoveMembers {
    members: Vec<MemberId>,
}

impl RemoveMembers {
    pub fn new(members: Vec<MemberId>) -> Self {
        Self { members }
    }
}

impl TopologyTransformer for RemoveMembers {
    fn kind(&self) -> &'static str {
        "remove_members"
    }

    fn operations(&self, topology: &ClusterTopology) -> ChangeResult<Vec<ChangeOperation>> {
        if self.members.is_empty() {
            return Err(ChangeError::invalid("no members to remove"));
        }

        let removed: BTreeSet<MemberId> = self
            .members
            .iter()
            .copied()
            .filter(|id| topology.has_member(*id))
            .collect();
        if removed.is_empty() {
            return Ok(Vec::new());
        }

        let remaining: BTreeSet<MemberId> = topology
            .member_ids()
            .difference(&removed)
            .copied()
            .collect();
        if remaining.is_empty() {
            return Err(ChangeError::invalid("cannot remove every member of the cluster"));
        }

        let replication_factor = topology.replication_factor();
        check_replication_factor(replication_factor, remaining.len())?;

        let placement = distribute(topology, &remaining, replication_factor);
        let mut operations = moves(topology, &placement, replication_factor, false);
        operations.extend(removed.into_iter().map(ChangeOperation::member_leave));
        Ok(operations)
    }
}

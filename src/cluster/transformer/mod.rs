//! Request transformers.
//!
//! A transformer turns one change request into the ordered list of
//! [`ChangeOperation`]s that moves the current topology to the requested
//! target. Transformers are pure: they read a snapshot and never touch it.
//! Business-rule violations come back as [`ChangeError`]s; an empty list
//! means the cluster is already where the request wants it.

mod distribution;
mod force_scale_down;
mod members;
mod partition;
mod reassign;
mod scale;

use std::collections::BTreeSet;

use crate::cluster::error::{ChangeError, ChangeResult};
use crate::cluster::operation::ChangeOperation;
use crate::cluster::state::ClusterTopology;
use crate::types::MemberId;

pub use distribution::{Placement, distribute, moves, priority_at};
pub use force_scale_down::ForceScaleDown;
pub use members::{AddMembers, RemoveMembers};
pub use partition::{JoinPartition, LeavePartition};
pub use reassign::ReassignPartitions;
pub use scale::Scale;

/// Computes the operations for one kind of change request.
pub trait TopologyTransformer: Send + Sync {
    /// Request kind, used for logs and metric labels.
    fn kind(&self) -> &'static str;

    /// The ordered operations taking `topology` to the requested target.
    fn operations(&self, topology: &ClusterTopology) -> ChangeResult<Vec<ChangeOperation>>;
}

/// Non-empty set of target members.
pub(crate) fn target_members(members: &[MemberId]) -> ChangeResult<BTreeSet<MemberId>> {
    if members.is_empty() {
        return Err(ChangeError::invalid("the set of target members is empty"));
    }
    Ok(members.iter().copied().collect())
}

/// Every member in `members` must be part of `topology`.
pub(crate) fn require_members(
    topology: &ClusterTopology,
    members: &BTreeSet<MemberId>,
) -> ChangeResult<()> {
    match members.iter().find(|id| !topology.has_member(**id)) {
        Some(missing) => Err(ChangeError::MemberNotFound(*missing)),
        None => Ok(()),
    }
}

/// Replication factor check shared by every placement-based transformer.
pub(crate) fn check_replication_factor(
    replication_factor: usize,
    member_count: usize,
) -> ChangeResult<()> {
    if replication_factor > member_count {
        return Err(ChangeError::invalid(format!(
            "replication factor {replication_factor} is larger than the number of members {member_count}"
        )));
    }
    Ok(())
}

//! Change requests accepted by the coordinator and the responses it returns.
//!
//! Every request carries a `dry_run` flag. A dry run computes and validates
//! the plan exactly like a real request but never persists it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cluster::driver::OperationProgress;
use crate::cluster::operation::ChangeOperation;
use crate::cluster::state::{ClusterChangePlan, CompletedChange, MemberState};
use crate::types::{ChangeId, MemberId, PartitionId, Priority};

/// Add members to the cluster without moving any partitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddMembersRequest {
    pub members: Vec<MemberId>,
    #[serde(default)]
    pub dry_run: bool,
}

/// Remove members, moving their replicas to the remaining members first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveMembersRequest {
    pub members: Vec<MemberId>,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinPartitionRequest {
    pub member_id: MemberId,
    pub partition_id: PartitionId,
    pub priority: Priority,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeavePartitionRequest {
    pub member_id: MemberId,
    pub partition_id: PartitionId,
    #[serde(default)]
    pub dry_run: bool,
}

/// Spread all partitions over exactly `members`, keeping the replication factor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReassignPartitionsRequest {
    pub members: Vec<MemberId>,
    #[serde(default)]
    pub dry_run: bool,
}

/// Move to exactly `members`, optionally changing the replication factor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleRequest {
    pub members: Vec<MemberId>,
    #[serde(default)]
    pub new_replication_factor: Option<usize>,
    #[serde(default)]
    pub dry_run: bool,
}

/// Shrink to `members` after the other members were lost for good.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForceScaleDownRequest {
    pub members: Vec<MemberId>,
    #[serde(default)]
    pub dry_run: bool,
}

macro_rules! impl_members_request {
    ($($ty:ident),+ $(,)?) => {
        $(
            impl $ty {
                pub fn new(members: impl IntoIterator<Item = MemberId>) -> Self {
                    Self {
                        members: members.into_iter().collect(),
                        dry_run: false,
                    }
                }

                pub fn dry_run(mut self) -> Self {
                    self.dry_run = true;
                    self
                }
            }
        )+
    };
}

impl_members_request!(
    AddMembersRequest,
    RemoveMembersRequest,
    ReassignPartitionsRequest,
    ForceScaleDownRequest,
);

impl ScaleRequest {
    pub fn new(members: impl IntoIterator<Item = MemberId>) -> Self {
        Self {
            members: members.into_iter().collect(),
            new_replication_factor: None,
            dry_run: false,
        }
    }

    pub fn with_replication_factor(mut self, replication_factor: usize) -> Self {
        self.new_replication_factor = Some(replication_factor);
        self
    }

    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }
}

impl JoinPartitionRequest {
    pub fn new(member_id: MemberId, partition_id: PartitionId, priority: Priority) -> Self {
        Self {
            member_id,
            partition_id,
            priority,
            dry_run: false,
        }
    }

    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }
}

impl LeavePartitionRequest {
    pub fn new(member_id: MemberId, partition_id: PartitionId) -> Self {
        Self {
            member_id,
            partition_id,
            dry_run: false,
        }
    }

    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }
}

/// Planned-changes descriptor returned for an accepted request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeResponse {
    /// Id of the started plan. For dry runs and no-op requests this is the
    /// id the plan would have had.
    pub change_id: ChangeId,
    pub current_topology: BTreeMap<MemberId, MemberState>,
    pub expected_topology: BTreeMap<MemberId, MemberState>,
    pub planned_changes: Vec<ChangeOperation>,
}

impl ChangeResponse {
    /// True if the cluster was already at the requested target.
    pub fn is_noop(&self) -> bool {
        self.planned_changes.is_empty()
    }
}

/// What the coordinator knows about the change in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStatusResponse {
    pub topology_version: u64,
    pub pending: Option<ClusterChangePlan>,
    pub last_change: Option<CompletedChange>,
    /// Progress of the operation the driver is working on, if any.
    pub current_operation: Option<OperationProgress>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders() {
        let request = ScaleRequest::new([MemberId(0), MemberId(1)])
            .with_replication_factor(2)
            .dry_run();
        assert_eq!(request.members, vec![MemberId(0), MemberId(1)]);
        assert_eq!(request.new_replication_factor, Some(2));
        assert!(request.dry_run);

        assert!(!AddMembersRequest::new([MemberId(3)]).dry_run);
        assert!(ForceScaleDownRequest::new([MemberId(3)]).dry_run().dry_run);
    }

    #[test]
    fn test_dry_run_defaults_to_false_in_json() {
        let request: RemoveMembersRequest = serde_json::from_str(r#"{"members":[1,2]}"#).unwrap();
        assert_eq!(request, RemoveMembersRequest::new([MemberId(1), MemberId(2)]));

        let request: ScaleRequest = serde_json::from_str(r#"{"members":[0]}"#).unwrap();
        assert_eq!(request.new_replication_factor, None);
    }
}

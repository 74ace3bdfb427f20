//! The closed set of atomic topology change operations.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{MemberId, PartitionId, Priority};

fn default_minimum_replicas() -> usize {
    1
}

/// One structural step of a change plan.
///
/// Each variant carries only what its applier needs. `member_id` is always
/// the member that performs the operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeOperation {
    MemberJoin {
        member_id: MemberId,
    },
    MemberLeave {
        member_id: MemberId,
    },
    /// Removes `member_to_remove` on behalf of `member_id`. Used after the
    /// removed member is gone for good.
    MemberRemove {
        member_id: MemberId,
        member_to_remove: MemberId,
    },
    PartitionJoin {
        member_id: MemberId,
        partition_id: PartitionId,
        priority: Priority,
    },
    PartitionLeave {
        member_id: MemberId,
        partition_id: PartitionId,
        #[serde(default = "default_minimum_replicas")]
        minimum_allowed_replicas: usize,
    },
    PartitionReconfigurePriority {
        member_id: MemberId,
        partition_id: PartitionId,
        priority: Priority,
    },
    /// Replaces the replica set of a partition with `members`, without a
    /// join/leave handoff.
    PartitionForceReconfigure {
        member_id: MemberId,
        partition_id: PartitionId,
        members: Vec<MemberId>,
    },
}

impl ChangeOperation {
    pub fn member_join(member_id: MemberId) -> Self {
        ChangeOperation::MemberJoin { member_id }
    }

    pub fn member_leave(member_id: MemberId) -> Self {
        ChangeOperation::MemberLeave { member_id }
    }

    pub fn member_remove(member_id: MemberId, member_to_remove: MemberId) -> Self {
        ChangeOperation::MemberRemove {
            member_id,
            member_to_remove,
        }
    }

    pub fn partition_join(member_id: MemberId, partition_id: PartitionId, priority: Priority) -> Self {
        ChangeOperation::PartitionJoin {
            member_id,
            partition_id,
            priority,
        }
    }

    pub fn partition_leave(member_id: MemberId, partition_id: PartitionId) -> Self {
        Self::partition_leave_keeping(member_id, partition_id, default_minimum_replicas())
    }

    /// A leave that is refused if fewer than `minimum_allowed_replicas` would remain.
    pub fn partition_leave_keeping(
        member_id: MemberId,
        partition_id: PartitionId,
        minimum_allowed_replicas: usize,
    ) -> Self {
        ChangeOperation::PartitionLeave {
            member_id,
            partition_id,
            minimum_allowed_replicas,
        }
    }

    pub fn reconfigure_priority(
        member_id: MemberId,
        partition_id: PartitionId,
        priority: Priority,
    ) -> Self {
        ChangeOperation::PartitionReconfigurePriority {
            member_id,
            partition_id,
            priority,
        }
    }

    pub fn force_reconfigure(
        member_id: MemberId,
        partition_id: PartitionId,
        members: Vec<MemberId>,
    ) -> Self {
        ChangeOperation::PartitionForceReconfigure {
            member_id,
            partition_id,
            members,
        }
    }

    /// The member executing this operation.
    pub fn member_id(&self) -> MemberId {
        match self {
            ChangeOperation::MemberJoin { member_id }
            | ChangeOperation::MemberLeave { member_id }
            | ChangeOperation::MemberRemove { member_id, .. }
            | ChangeOperation::PartitionJoin { member_id, .. }
            | ChangeOperation::PartitionLeave { member_id, .. }
            | ChangeOperation::PartitionReconfigurePriority { member_id, .. }
            | ChangeOperation::PartitionForceReconfigure { member_id, .. } => *member_id,
        }
    }

    /// The partition this operation touches, for partition-level operations.
    pub fn partition_id(&self) -> Option<PartitionId> {
        match self {
            ChangeOperation::PartitionJoin { partition_id, .. }
            | ChangeOperation::PartitionLeave { partition_id, .. }
            | ChangeOperation::PartitionReconfigurePriority { partition_id, .. }
            | ChangeOperation::PartitionForceReconfigure { partition_id, .. } => {
                Some(*partition_id)
            }
            ChangeOperation::MemberJoin { .. }
            | ChangeOperation::MemberLeave { .. }
            | ChangeOperation::MemberRemove { .. } => None,
        }
    }

    /// Stable name of the operation kind, used for logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            ChangeOperation::MemberJoin { .. } => "member_join",
            ChangeOperation::MemberLeave { .. } => "member_leave",
            ChangeOperation::MemberRemove { .. } => "member_remove",
            ChangeOperation::PartitionJoin { .. } => "partition_join",
            ChangeOperation::PartitionLeave { .. } => "partition_leave",
            ChangeOperation::PartitionReconfigurePriority { .. } => "partition_reconfigure_priority",
            ChangeOperation::PartitionForceReconfigure { .. } => "partition_force_reconfigure",
        }
    }

    pub fn is_member_operation(&self) -> bool {
        self.partition_id().is_none()
    }
}

impl fmt::Display for ChangeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeOperation::MemberJoin { member_id } => write!(f, "MemberJoin({member_id})"),
            ChangeOperation::MemberLeave { member_id } => write!(f, "MemberLeave({member_id})"),
            ChangeOperation::MemberRemove {
                member_id,
                member_to_remove,
            } => write!(f, "MemberRemove({member_id}, {member_to_remove})"),
            ChangeOperation::PartitionJoin {
                member_id,
                partition_id,
                priority,
            } => write!(f, "PartitionJoin({member_id}, {partition_id}, {priority})"),
            ChangeOperation::PartitionLeave {
                member_id,
                partition_id,
                ..
            } => write!(f, "PartitionLeave({member_id}, {partition_id})"),
            ChangeOperation::PartitionReconfigurePriority {
                member_id,
                partition_id,
                priority,
            } => write!(
                f,
                "PartitionReconfigurePriority({member_id}, {partition_id}, {priority})"
            ),
            ChangeOperation::PartitionForceReconfigure {
                member_id,
                partition_id,
                members,
            } => write!(
                f,
                "PartitionForceReconfigure({member_id}, {partition_id}, {members:?})"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_and_partition_accessors() {
        let join = ChangeOperation::partition_join(MemberId(2), 5, 3);
        assert_eq!(join.member_id(), MemberId(2));
        assert_eq!(join.partition_id(), Some(5));
        assert!(!join.is_member_operation());

        let remove = ChangeOperation::member_remove(MemberId(0), MemberId(3));
        assert_eq!(remove.member_id(), MemberId(0));
        assert_eq!(remove.partition_id(), None);
        assert!(remove.is_member_operation());
    }

    #[test]
    fn test_partition_leave_defaults_to_one_replica() {
        match ChangeOperation::partition_leave(MemberId(1), 2) {
            ChangeOperation::PartitionLeave {
                minimum_allowed_replicas,
                ..
            } => assert_eq!(minimum_allowed_replicas, 1),
            other => panic!("unexpected operation {other}"),
        }
    }

    #[test]
    fn test_partition_leave_json_without_minimum_uses_default() {
        let json = r#"{"PartitionLeave":{"member_id":1,"partition_id":2}}"#;
        let op: ChangeOperation = serde_json::from_str(json).unwrap();
        assert_eq!(op, ChangeOperation::partition_leave(MemberId(1), 2));
    }

    #[test]
    fn test_display() {
        assert_eq!(
            ChangeOperation::force_reconfigure(MemberId(0), 1, vec![MemberId(0), MemberId(2)])
                .to_string(),
            "PartitionForceReconfigure(0, 1, [MemberId(0), MemberId(2)])"
        );
        assert_eq!(
            ChangeOperation::member_join(MemberId(4)).to_string(),
            "MemberJoin(4)"
        );
    }

    #[test]
    fn test_kind_labels_are_distinct() {
        let ops = [
            ChangeOperation::member_join(MemberId(0)),
            ChangeOperation::member_leave(MemberId(0)),
            ChangeOperation::member_remove(MemberId(0), MemberId(1)),
            ChangeOperation::partition_join(MemberId(0), 1, 1),
            ChangeOperation::partition_leave(MemberId(0), 1),
            ChangeOperation::reconfigure_priority(MemberId(0), 1, 1),
            ChangeOperation::force_reconfigure(MemberId(0), 1, vec![]),
        ];
        let kinds: std::collections::HashSet<_> = ops.iter().map(|op| op.kind()).collect();
        assert_eq!(kinds.len(), ops.len());
    }
}

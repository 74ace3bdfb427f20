//! Member record: lifecycle status plus the partitions a member hosts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::partition::PartitionState;
use crate::types::PartitionId;

/// Lifecycle of a cluster member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberStatus {
    Joining,
    Active,
    Leaving,
    Unknown,
}

/// State of one member in a topology snapshot.
///
/// `version` is bumped by the snapshot every time the record is replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberState {
    pub version: u64,
    pub state: MemberStatus,
    pub partitions: BTreeMap<PartitionId, PartitionState>,
}

impl MemberState {
    /// A member that has been announced but not yet confirmed by the executor.
    pub fn joining() -> Self {
        Self {
            version: 0,
            state: MemberStatus::Joining,
            partitions: BTreeMap::new(),
        }
    }

    /// An active member hosting the given partitions.
    pub fn active(partitions: BTreeMap<PartitionId, PartitionState>) -> Self {
        Self {
            version: 0,
            state: MemberStatus::Active,
            partitions,
        }
    }

    pub fn to_active(&self) -> Self {
        self.with_status(MemberStatus::Active)
    }

    pub fn to_leaving(&self) -> Self {
        self.with_status(MemberStatus::Leaving)
    }

    fn with_status(&self, state: MemberStatus) -> Self {
        Self {
            state,
            ..self.clone()
        }
    }

    /// Returns a copy with `partition` added or replaced.
    pub fn add_partition(&self, partition: PartitionId, state: PartitionState) -> Self {
        let mut next = self.clone();
        next.partitions.insert(partition, state);
        next
    }

    /// Returns a copy with `partition` replaced by `f(current)`. Unknown
    /// partitions are left untouched.
    pub fn update_partition(
        &self,
        partition: PartitionId,
        f: impl FnOnce(PartitionState) -> PartitionState,
    ) -> Self {
        let mut next = self.clone();
        if let Some(current) = next.partitions.get(&partition).copied() {
            next.partitions.insert(partition, f(current));
        }
        next
    }

    /// Returns a copy without `partition`.
    pub fn remove_partition(&self, partition: PartitionId) -> Self {
        let mut next = self.clone();
        next.partitions.remove(&partition);
        next
    }

    pub fn has_partition(&self, partition: PartitionId) -> bool {
        self.partitions.contains_key(&partition)
    }

    pub fn partition(&self, partition: PartitionId) -> Option<&PartitionState> {
        self.partitions.get(&partition)
    }

    pub fn is_active(&self) -> bool {
        self.state == MemberStatus::Active
    }
}

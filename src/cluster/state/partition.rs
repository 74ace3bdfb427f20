//! Partition record held by a member.

use serde::{Deserialize, Serialize};

use crate::types::Priority;

/// Lifecycle of a partition replica on one member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartitionStatus {
    Joining,
    Active,
    Leaving,
}

/// A replica of one partition, as recorded on the member hosting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionState {
    pub state: PartitionStatus,
    pub priority: Priority,
}

impl PartitionState {
    pub fn joining(priority: Priority) -> Self {
        Self {
            state: PartitionStatus::Joining,
            priority,
        }
    }

    pub fn active(priority: Priority) -> Self {
        Self {
            state: PartitionStatus::Active,
            priority,
        }
    }

    pub fn to_active(self) -> Self {
        Self {
            state: PartitionStatus::Active,
            ..self
        }
    }

    pub fn to_leaving(self) -> Self {
        Self {
            state: PartitionStatus::Leaving,
            ..self
        }
    }

    pub fn with_priority(self, priority: Priority) -> Self {
        Self { priority, ..self }
    }

    pub fn is_active(&self) -> bool {
        self.state == PartitionStatus::Active
    }
}

//! The ordered, partially-executed list of operations attached to a snapshot.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::member::MemberState;
use crate::cluster::operation::ChangeOperation;
use crate::types::{ChangeId, MemberId};

/// Status of a change plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeStatus {
    InProgress,
    Completed,
    Failed,
}

impl ChangeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeStatus::InProgress => "in_progress",
            ChangeStatus::Completed => "completed",
            ChangeStatus::Failed => "failed",
        }
    }
}

/// An operation that has already been applied, with the time it finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedOperation {
    pub operation: ChangeOperation,
    pub completed_at_ms: u64,
}

/// A change plan in flight.
///
/// Operations move from the front of `pending_operations` to the back of
/// `completed_operations` as they finish, so the cursor is simply
/// `completed_operations.len()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterChangePlan {
    pub id: ChangeId,
    pub status: ChangeStatus,
    pub started_at_ms: u64,
    pub pending_operations: Vec<ChangeOperation>,
    pub completed_operations: Vec<CompletedOperation>,
    /// Member layout from before the head operation's optimistic write.
    /// Set together with that write and cleared when the head advances.
    pub restore_point: Option<BTreeMap<MemberId, MemberState>>,
}

impl ClusterChangePlan {
    pub fn init(id: ChangeId, operations: Vec<ChangeOperation>, started_at_ms: u64) -> Self {
        Self {
            id,
            status: ChangeStatus::InProgress,
            started_at_ms,
            pending_operations: operations,
            completed_operations: Vec::new(),
            restore_point: None,
        }
    }

    /// Index of the next operation to execute.
    pub fn cursor(&self) -> usize {
        self.completed_operations.len()
    }

    pub fn total_operations(&self) -> usize {
        self.completed_operations.len() + self.pending_operations.len()
    }

    pub fn next_operation(&self) -> Option<&ChangeOperation> {
        self.pending_operations.first()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending_operations.is_empty()
    }

    /// Move the head operation to the completed list.
    pub fn advance(&self, timestamp_ms: u64) -> Self {
        let mut next = self.clone();
        next.restore_point = None;
        if !next.pending_operations.is_empty() {
            let operation = next.pending_operations.remove(0);
            next.completed_operations.push(CompletedOperation {
                operation,
                completed_at_ms: timestamp_ms,
            });
        }
        next
    }

    pub fn complete(&self, completed_at_ms: u64) -> CompletedChange {
        self.finish(ChangeStatus::Completed, completed_at_ms)
    }

    pub fn fail(&self, completed_at_ms: u64) -> CompletedChange {
        self.finish(ChangeStatus::Failed, completed_at_ms)
    }

    fn finish(&self, status: ChangeStatus, completed_at_ms: u64) -> CompletedChange {
        CompletedChange {
            id: self.id,
            status,
            started_at_ms: self.started_at_ms,
            completed_at_ms,
        }
    }
}

/// Summary of the most recently finished plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedChange {
    pub id: ChangeId,
    pub status: ChangeStatus,
    pub started_at_ms: u64,
    pub completed_at_ms: u64,
}

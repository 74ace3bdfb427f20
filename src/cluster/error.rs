//! Error types for the topology reconfiguration engine.
//!
//! # Error Handling Patterns
//!
//! The engine separates four kinds of failure:
//!
//! ## Validation (synchronous, no state change)
//!
//! Malformed or semantically invalid requests: an empty target set, a
//! non-positive replication factor, an operation referencing a member that
//! does not host the partition. Transformers return these as
//! [`ChangeError::InvalidRequest`] and friends.
//!
//! ## Concurrency conflicts (synchronous, no state change)
//!
//! A request arriving while a plan is pending, or losing the compare-and-set
//! race against another writer. Surfaced as [`ChangeError::ConcurrentChange`];
//! the caller is expected to retry later.
//!
//! ## Executor failures (asynchronous)
//!
//! [`ExecutorError::Transient`] and [`ExecutorError::Timeout`] are retried
//! with backoff at the operation level; [`ExecutorError::Rejected`] halts the
//! plan immediately.
//!
//! ## Invariant violations (asynchronous, fatal)
//!
//! An applier's `init` finding that the snapshot no longer matches what the
//! operation was planned against. Reported as [`TopologyError`]; the plan is
//! halted and no executor call is made.

use std::time::Duration;

use thiserror::Error;

use crate::error::{ErrorCode, ErrorResponse};
use crate::types::{ChangeId, MemberId, PartitionId};

/// Result type for snapshot mutations.
pub type TopologyResult<T> = Result<T, TopologyError>;

/// Result type for change requests.
pub type ChangeResult<T> = Result<T, ChangeError>;

/// Invariant violations detected by the topology model.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TopologyError {
    #[error("Member {0} already exists")]
    MemberAlreadyExists(MemberId),

    #[error("Member {0} is not part of the cluster")]
    MemberNotFound(MemberId),

    #[error("Member {member} still hosts partitions {partitions:?}")]
    MemberHasPartitions {
        member: MemberId,
        partitions: Vec<PartitionId>,
    },

    #[error("Member {member} already hosts partition {partition}")]
    PartitionAlreadyExists {
        member: MemberId,
        partition: PartitionId,
    },

    #[error("Member {member} does not host partition {partition}")]
    PartitionNotFound {
        member: MemberId,
        partition: PartitionId,
    },

    /// Leaving would take the partition below its minimum replica count.
    #[error(
        "Partition {partition} has {replicas} replicas, cannot go below {minimum} by removing member {member}"
    )]
    NotEnoughReplicas {
        member: MemberId,
        partition: PartitionId,
        replicas: usize,
        minimum: usize,
    },

    /// A member or partition is in a state that does not allow the operation.
    #[error("Invalid state for member {member}: {reason}")]
    InvalidState { member: MemberId, reason: String },

    #[error("Change {change_id} is still in progress")]
    ChangeInProgress { change_id: ChangeId },

    #[error("No change is in progress")]
    NoPendingChange,

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl TopologyError {
    pub(crate) fn invalid_state(member: MemberId, reason: impl Into<String>) -> Self {
        TopologyError::InvalidState {
            member,
            reason: reason.into(),
        }
    }
}

/// Failure reported by an external executor.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutorError {
    /// Network hiccup, leader change or similar. Retried.
    #[error("Transient executor failure: {0}")]
    Transient(String),

    /// The executor did not answer in time. Retried; never treated as success.
    #[error("Executor call timed out after {0:?}")]
    Timeout(Duration),

    /// The executor explicitly refused the operation. Not retried.
    #[error("Executor rejected operation: {0}")]
    Rejected(String),
}

impl ExecutorError {
    /// Returns true if the operation should be attempted again.
    pub fn is_retriable(&self) -> bool {
        matches!(self, ExecutorError::Transient(_) | ExecutorError::Timeout(_))
    }

    /// Returns a string label for metrics.
    pub fn as_metric_label(&self) -> &'static str {
        match self {
            ExecutorError::Transient(_) => "transient",
            ExecutorError::Timeout(_) => "timeout",
            ExecutorError::Rejected(_) => "rejected",
        }
    }
}

/// Errors from the topology store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Another writer replaced the snapshot first.
    #[error("Topology version conflict: expected {expected}, found {actual}")]
    VersionConflict { expected: u64, actual: u64 },

    #[error("Snapshot serialization error: {0}")]
    Serialization(String),

    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),
}

/// Request-level errors returned by the change coordinator.
#[derive(Debug, Error)]
pub enum ChangeError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Operation not allowed: {0}")]
    OperationNotAllowed(String),

    #[error("Cannot start a new change while change {change_id} is in progress")]
    ConcurrentChange { change_id: ChangeId },

    #[error("Member {0} is not part of the cluster")]
    MemberNotFound(MemberId),

    #[error("Partition {0} does not exist")]
    PartitionNotFound(PartitionId),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ChangeError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        ChangeError::InvalidRequest(message.into())
    }

    /// Map to the error code returned to callers.
    pub fn code(&self) -> ErrorCode {
        match self {
            ChangeError::InvalidRequest(_) => ErrorCode::InvalidRequest,
            ChangeError::OperationNotAllowed(_) => ErrorCode::OperationNotAllowed,
            ChangeError::ConcurrentChange { .. } => ErrorCode::ConcurrentChangeInProgress,
            ChangeError::MemberNotFound(_) => ErrorCode::MemberNotFound,
            ChangeError::PartitionNotFound(_) => ErrorCode::PartitionNotFound,
            ChangeError::Topology(e) => match e {
                TopologyError::ChangeInProgress { .. } => ErrorCode::ConcurrentChangeInProgress,
                TopologyError::MemberNotFound(_) => ErrorCode::MemberNotFound,
                TopologyError::Serialization(_) => ErrorCode::InternalError,
                _ => ErrorCode::InvalidRequest,
            },
            ChangeError::Store(e) => match e {
                StoreError::VersionConflict { .. } => ErrorCode::ConcurrentChangeInProgress,
                _ => ErrorCode::InternalError,
            },
        }
    }

    /// Returns a string label for metrics.
    pub fn as_metric_label(&self) -> &'static str {
        match self.code() {
            ErrorCode::InvalidRequest => "invalid_request",
            ErrorCode::OperationNotAllowed => "not_allowed",
            ErrorCode::ConcurrentChangeInProgress => "concurrent_change",
            ErrorCode::MemberNotFound => "member_not_found",
            ErrorCode::PartitionNotFound => "partition_not_found",
            ErrorCode::InternalError => "internal",
        }
    }
}

impl From<ChangeError> for ErrorResponse {
    fn from(e: ChangeError) -> Self {
        ErrorResponse::new(e.code(), e.to_string())
    }
}

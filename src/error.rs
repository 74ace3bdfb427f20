//! Crate & response level errors.
//!
//! # Error Hierarchy
//!
//! The crate uses a two-layer error hierarchy:
//!
//! ## Response Layer (`crate::error`)
//!
//! - [`ErrorCode`]: Stable error codes returned to callers of the change API
//! - [`ErrorResponse`]: The structured `{code, message}` error sent back to callers
//!
//! ## Engine Layer (`crate::cluster::error`)
//!
//! - [`TopologyError`]: Snapshot invariant violations
//! - [`ExecutorError`]: Failures reported by the external executors
//! - [`ChangeError`]: Request-level failures; has `code()` for mapping to [`ErrorCode`]
//!
//! ## Conversion
//!
//! [`ChangeError`] converts into [`ErrorResponse`] via `From`, so request
//! handlers can use `?` internally and hand a structured error to the transport.
//!
//! [`TopologyError`]: crate::cluster::TopologyError
//! [`ExecutorError`]: crate::cluster::ExecutorError
//! [`ChangeError`]: crate::cluster::ChangeError

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes returned by the change API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The request is malformed or would violate a topology invariant.
    InvalidRequest,
    /// The request is well formed but not allowed in the current cluster state.
    OperationNotAllowed,
    /// Another change plan is still in progress.
    ConcurrentChangeInProgress,
    /// A referenced member does not exist.
    MemberNotFound,
    /// A referenced partition does not exist.
    PartitionNotFound,
    /// Unexpected failure inside the engine or its persistence layer.
    InternalError,
}

impl ErrorCode {
    /// Stable string name, as sent over the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidRequest => "INVALID_REQUEST",
            ErrorCode::OperationNotAllowed => "OPERATION_NOT_ALLOWED",
            ErrorCode::ConcurrentChangeInProgress => "CONCURRENT_CHANGE_IN_PROGRESS",
            ErrorCode::MemberNotFound => "MEMBER_NOT_FOUND",
            ErrorCode::PartitionNotFound => "PARTITION_NOT_FOUND",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Returns true if the caller may retry the same request later.
    pub fn is_retriable(&self) -> bool {
        matches!(self, ErrorCode::ConcurrentChangeInProgress)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured error returned to callers of the change API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ErrorResponse {}

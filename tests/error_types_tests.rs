//! Integration tests for error types.
//!
//! These tests verify error display, retry classification and the mapping
//! from engine errors to the codes returned to callers.

use std::time::Duration;

use topomorph::cluster::{ChangeError, ExecutorError, StoreError, TopologyError};
use topomorph::error::{ErrorCode, ErrorResponse};
use topomorph::types::MemberId;

// ============================================================================
// TopologyError Display Tests
// ============================================================================

#[test]
fn test_topology_error_member_has_partitions() {
    let err = TopologyError::MemberHasPartitions {
        member: MemberId(4),
        partitions: vec![1, 7],
    };
    let display = err.to_string();
    assert!(display.contains("Member 4"));
    assert!(display.contains("[1, 7]"));
}

#[test]
fn test_topology_error_not_enough_replicas() {
    let err = TopologyError::NotEnoughReplicas {
        member: MemberId(2),
        partition: 3,
        replicas: 1,
        minimum: 1,
    };
    let display = err.to_string();
    assert!(display.contains("Partition 3"));
    assert!(display.contains("member 2"));
}

#[test]
fn test_topology_error_change_in_progress() {
    let err = TopologyError::ChangeInProgress { change_id: 12 };
    assert!(err.to_string().contains("12"));
}

// ============================================================================
// ExecutorError Tests
// ============================================================================

#[test]
fn test_executor_error_display() {
    assert!(
        ExecutorError::Transient("leader moved".into())
            .to_string()
            .contains("leader moved")
    );
    assert!(
        ExecutorError::Timeout(Duration::from_millis(250))
            .to_string()
            .contains("250ms")
    );
    assert!(
        ExecutorError::Rejected("not a replica".into())
            .to_string()
            .contains("rejected")
    );
}

#[test]
fn test_executor_error_metric_labels() {
    assert_eq!(
        ExecutorError::Transient(String::new()).as_metric_label(),
        "transient"
    );
    assert_eq!(
        ExecutorError::Timeout(Duration::ZERO).as_metric_label(),
        "timeout"
    );
    assert_eq!(
        ExecutorError::Rejected(String::new()).as_metric_label(),
        "rejected"
    );
}

// ============================================================================
// ChangeError Code Mapping Tests
// ============================================================================

#[test]
fn test_store_conflict_is_concurrent_change() {
    let err: ChangeError = StoreError::VersionConflict {
        expected: 3,
        actual: 4,
    }
    .into();
    assert_eq!(err.code(), ErrorCode::ConcurrentChangeInProgress);
    assert!(err.code().is_retriable());
}

#[test]
fn test_store_serialization_is_internal() {
    let err: ChangeError = StoreError::Serialization("truncated".into()).into();
    assert_eq!(err.code(), ErrorCode::InternalError);
    assert_eq!(err.as_metric_label(), "internal");
}

#[test]
fn test_topology_invariant_is_invalid_request() {
    let err: ChangeError = TopologyError::PartitionNotFound {
        member: MemberId(1),
        partition: 9,
    }
    .into();
    assert_eq!(err.code(), ErrorCode::InvalidRequest);
    assert_eq!(err.as_metric_label(), "invalid_request");
}

#[test]
fn test_operation_not_allowed_code() {
    let err = ChangeError::OperationNotAllowed("member is leaving".into());
    assert_eq!(err.code(), ErrorCode::OperationNotAllowed);
    assert!(!err.code().is_retriable());
}

// ============================================================================
// ErrorResponse Conversion Tests
// ============================================================================

#[test]
fn test_error_response_from_change_error() {
    let response: ErrorResponse = ChangeError::MemberNotFound(MemberId(5)).into();
    assert_eq!(response.code, ErrorCode::MemberNotFound);
    assert!(response.message.contains("Member 5"));
}

#[test]
fn test_error_response_json_shape() {
    let response: ErrorResponse = ChangeError::ConcurrentChange { change_id: 7 }.into();
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["code"], "CONCURRENT_CHANGE_IN_PROGRESS");
    assert!(json["message"].as_str().unwrap().contains("change 7"));

    let parsed: ErrorResponse = serde_json::from_value(json).unwrap();
    assert_eq!(parsed, response);
}

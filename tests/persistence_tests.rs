//! Snapshot serialization and durable storage tests.

use std::sync::Arc;
use std::time::Duration;

use object_store::ObjectStore;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use topomorph::cluster::{
    AddMembersRequest, ChangeCoordinator, ChangeOperation, ChangeStatus, ClusterTopology,
    CoordinatorConfig, ExecutorError, JoinPartitionRequest, MemberState, MockResponse,
    ObjectStoreTopologyStore, PartitionStatus, ProgressTracker, RecordingExecutor, ScaleRequest,
    StoreError, TopologyService, TopologyStore,
};
use topomorph::types::MemberId;

fn single_member() -> ClusterTopology {
    ClusterTopology::from_layout([(MemberId(0), vec![(1, 1), (2, 1)])])
}

/// A snapshot with a plan in flight: one operation done, two pending.
fn in_flight() -> ClusterTopology {
    let planned = single_member()
        .start_change(
            vec![
                ChangeOperation::member_join(MemberId(1)),
                ChangeOperation::partition_join(MemberId(1), 2, 1),
                ChangeOperation::partition_leave(MemberId(0), 2),
            ],
            1_700_000_000_000,
        )
        .unwrap();
    planned
        .advance_change(
            |t| t.add_member(MemberId(1), MemberState::active(Default::default())),
            1_700_000_000_500,
        )
        .unwrap()
}

// ============================================================================
// Serialization
// ============================================================================

#[test]
fn test_binary_round_trip_with_plan_in_flight() {
    let topology = in_flight();
    let plan = topology.pending_changes.as_ref().unwrap();
    assert_eq!(plan.cursor(), 1);
    assert_eq!(plan.total_operations(), 3);

    let bytes = topology.to_bytes().unwrap();
    assert_eq!(ClusterTopology::from_bytes(&bytes).unwrap(), topology);
}

#[test]
fn test_json_round_trip_with_plan_in_flight() {
    let topology = in_flight();
    let json = topology.to_json().unwrap();
    let parsed: ClusterTopology = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, topology);
}

#[test]
fn test_truncated_snapshot_is_rejected() {
    let bytes = in_flight().to_bytes().unwrap();
    assert!(ClusterTopology::from_bytes(&bytes[..bytes.len() / 2]).is_err());
}

// ============================================================================
// Durable Store
// ============================================================================

#[tokio::test]
async fn test_snapshot_written_to_local_filesystem() {
    let dir = tempfile::tempdir().unwrap();
    let object_store: Arc<dyn ObjectStore> =
        Arc::new(LocalFileSystem::new_with_prefix(dir.path()).unwrap());

    let store = ObjectStoreTopologyStore::open(object_store.clone(), "topology", single_member())
        .await
        .unwrap();
    let coordinator = ChangeCoordinator::new(Arc::new(store), ProgressTracker::new());
    coordinator
        .add_members(AddMembersRequest::new([MemberId(1)]))
        .await
        .unwrap();

    assert!(dir.path().join("topology").join("topology.bin").exists());

    let bytes = object_store
        .get(&ObjectPath::from("topology/topology.bin"))
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();
    let persisted = ClusterTopology::from_bytes(&bytes).unwrap();
    assert_eq!(persisted, *coordinator.topology());
    assert!(persisted.has_pending_changes());
}

#[tokio::test]
async fn test_stale_write_is_rejected() {
    let object_store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
    let store = ObjectStoreTopologyStore::open(object_store, "topology", single_member())
        .await
        .unwrap();

    let current = store.current();
    let next = current
        .start_change(vec![ChangeOperation::member_join(MemberId(1))], 0)
        .unwrap();
    store.compare_and_set(current.version, next).await.unwrap();

    let err = store
        .compare_and_set(current.version, single_member())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::VersionConflict { .. }));
}

#[tokio::test]
async fn test_restarted_service_resumes_plan() {
    let object_store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
    let config = CoordinatorConfig::default()
        .with_retry_delays(1, 5)
        .with_snapshot_prefix("cluster-a");

    // accept a plan without running a driver, as if the process died right after
    let response = {
        let store = ObjectStoreTopologyStore::open(
            object_store.clone(),
            config.snapshot_prefix.clone(),
            single_member(),
        )
        .await
        .unwrap();
        let coordinator = ChangeCoordinator::new(Arc::new(store), ProgressTracker::new());
        coordinator
            .scale(ScaleRequest::new([MemberId(0), MemberId(1)]))
            .await
            .unwrap()
    };

    // the initial topology passed here is ignored in favour of the persisted one
    let executor = RecordingExecutor::new();
    let service = TopologyService::with_object_store(
        object_store.clone(),
        ClusterTopology::default(),
        executor.appliers(),
        config.clone(),
    )
    .await
    .unwrap();

    let topology = tokio::time::timeout(Duration::from_secs(5), service.wait_for_idle())
        .await
        .expect("resumed plan should finish");
    assert_eq!(topology.members, response.expected_topology);
    assert_eq!(executor.calls(), response.planned_changes);
    service.shutdown().await;

    // and the finished state is what a third process sees
    let reopened = ObjectStoreTopologyStore::open(
        object_store,
        config.snapshot_prefix,
        ClusterTopology::default(),
    )
    .await
    .unwrap();
    assert_eq!(reopened.current().members, response.expected_topology);
    assert!(!reopened.current().has_pending_changes());
}

#[tokio::test]
async fn test_restart_mid_operation_then_failure_restores_layout() {
    let object_store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
    let config = CoordinatorConfig::default().with_retry_delays(1, 5);
    let initial = ClusterTopology::from_layout([
        (MemberId(0), vec![(1, 1)]),
        (MemberId(1), Vec::new()),
    ]);

    // first process: the join is recorded as JOINING, then the process stops
    // while the executor call is still outstanding
    let first = RecordingExecutor::new();
    first.script("partition_join", MockResponse::Hang);
    let service = TopologyService::with_object_store(
        object_store.clone(),
        initial,
        first.appliers(),
        config.clone(),
    )
    .await
    .unwrap();
    let response = service
        .coordinator()
        .join_partition(JoinPartitionRequest::new(MemberId(1), 1, 1))
        .await
        .unwrap();
    let before_init = response.current_topology;

    let mut changes = service.store().subscribe();
    let joining = |t: &ClusterTopology| {
        t.member(MemberId(1))
            .and_then(|m| m.partition(1))
            .is_some_and(|p| p.state == PartitionStatus::Joining)
    };
    tokio::time::timeout(Duration::from_secs(5), changes.wait_for(|t| joining(t)))
        .await
        .expect("optimistic state should be persisted")
        .unwrap();
    service.shutdown().await;

    // second process: resumes the join, which is refused
    let second = RecordingExecutor::new();
    second.script(
        "partition_join",
        MockResponse::Fail(ExecutorError::Rejected("replica directory missing".into())),
    );
    let service = TopologyService::with_object_store(
        object_store.clone(),
        ClusterTopology::default(),
        second.appliers(),
        config.clone(),
    )
    .await
    .unwrap();
    let topology = tokio::time::timeout(Duration::from_secs(5), service.wait_for_idle())
        .await
        .expect("resumed plan should halt");
    service.shutdown().await;

    assert_eq!(second.call_count("partition_join"), 1);
    assert_eq!(topology.members, before_init);
    assert_eq!(
        topology.last_change.map(|c| c.status),
        Some(ChangeStatus::Failed)
    );

    // the restored layout is what gets persisted
    let reopened = ObjectStoreTopologyStore::open(
        object_store,
        config.snapshot_prefix,
        ClusterTopology::default(),
    )
    .await
    .unwrap();
    assert_eq!(reopened.current().members, before_init);
    assert_eq!(reopened.current().replica_count(1), 1);
}

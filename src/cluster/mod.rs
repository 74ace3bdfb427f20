//! Cluster topology reconfiguration engine.
//!
//! Plans and executes changes to cluster membership and partition replica
//! placement, one structural step at a time, so the cluster is never left
//! half inside a step.
//!
//! # Architecture
//!
//! ```text
//!   request ──► ChangeCoordinator ──► TopologyTransformer ──► [ChangeOperation]
//!                      │                                            │
//!                      │  simulate + compare_and_set                │
//!                      ▼                                            │
//!               ┌──────────────┐   watch    ┌─────────────┐         │
//!               │ TopologyStore│ ─────────► │ ChangeDriver│ ◄───────┘
//!               └──────────────┘ ◄───────── └──────┬──────┘
//!                  (snapshots)   advance/fail      │ init / apply
//!                                                  ▼
//!                                        ┌───────────────────┐
//!                                        │ OperationApplier  │
//!                                        └─────────┬─────────┘
//!                                                  ▼
//!                               Partition / Membership executors
//! ```
//!
//! # Features
//!
//! - **Copy-on-write snapshots**: every change produces a new [`ClusterTopology`]
//! - **One plan at a time**: requests are refused while a plan is in flight
//! - **Dry runs**: every request can be planned and simulated without side effects
//! - **Bounded retries**: transient executor failures are retried with backoff
//! - **Durable**: [`ObjectStoreTopologyStore`] lets a restarted process resume a plan
//!
//! # Usage
//!
//! ```rust,no_run
//! use topomorph::cluster::{
//!     ClusterTopology, CoordinatorConfig, OperationAppliers, ScaleRequest, TopologyService,
//! };
//! use topomorph::types::MemberId;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let initial = ClusterTopology::from_layout([(MemberId(0), vec![(1, 1), (2, 1)])]);
//!     let service =
//!         TopologyService::in_memory(initial, OperationAppliers::noop(), CoordinatorConfig::default());
//!
//!     service
//!         .coordinator()
//!         .scale(ScaleRequest::new([MemberId(0), MemberId(1)]).with_replication_factor(2))
//!         .await?;
//!     let topology = service.wait_for_idle().await;
//!     assert_eq!(topology.replica_count(1), 2);
//!     Ok(())
//! }
//! ```

pub mod applier;
pub mod background_tasks;
mod config;
mod coordinator;
pub mod driver;
mod error;
pub mod executor;
pub mod metrics;
pub mod operation;
pub mod requests;
pub mod retry;
mod service;
pub mod state;
pub mod store;
pub mod transformer;

#[cfg(any(test, feature = "test-utilities"))]
pub mod mock_executor;

pub use applier::{OperationApplier, OperationAppliers, TopologyUpdate, simulate};
pub use background_tasks::{BackgroundTaskRegistry, TaskStatus};
pub use config::CoordinatorConfig;
pub use coordinator::ChangeCoordinator;
pub use driver::{ChangeDriver, OperationPhase, OperationProgress, ProgressTracker, StepOutcome};
pub use error::{
    ChangeError, ChangeResult, ExecutorError, StoreError, TopologyError, TopologyResult,
};
pub use executor::{
    ClusterMembershipChangeExecutor, ExecutorResult, NoopClusterMembershipChangeExecutor,
    NoopPartitionChangeExecutor, PartitionChangeExecutor,
};
#[cfg(any(test, feature = "test-utilities"))]
pub use mock_executor::{MockResponse, RecordingExecutor};
pub use operation::ChangeOperation;
pub use requests::{
    AddMembersRequest, ChangeResponse, ChangeStatusResponse, ForceScaleDownRequest,
    JoinPartitionRequest, LeavePartitionRequest, ReassignPartitionsRequest, RemoveMembersRequest,
    ScaleRequest,
};
pub use service::TopologyService;
pub use state::{
    ChangeStatus, ClusterChangePlan, ClusterTopology, CompletedChange, CompletedOperation,
    MemberState, MemberStatus, PartitionState, PartitionStatus,
};
pub use store::{InMemoryTopologyStore, ObjectStoreTopologyStore, TopologyStore};
pub use transformer::TopologyTransformer;

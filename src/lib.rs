//! # Topomorph
//! Cluster topology reconfiguration engine.
//!
//! Topomorph computes and safely executes changes to a replicated cluster's
//! layout: which members exist and which members host replicas of which
//! partitions, at what priority. Callers ask for a target (add these members,
//! scale to those, drop lost members); the engine turns the request into an
//! ordered plan of join/leave/reconfigure steps and drives it through
//! pluggable executors, one step at a time, retrying transient failures and
//! halting cleanly on fatal ones.
//!
//! # Goals
//! - Never leave the cluster half inside a step
//! - At most one reconfiguration in flight
//! - Deterministic plans: the same snapshot and request always give the same plan
//! - Leverage best in class libraries such as [Tokio](https://tokio.rs/) and
//!   [object_store](https://docs.rs/object_store)
//!
//! ## Getting started
//! Implement [`PartitionChangeExecutor`](cluster::PartitionChangeExecutor) and
//! [`ClusterMembershipChangeExecutor`](cluster::ClusterMembershipChangeExecutor)
//! on top of your replication layer, then start a
//! [`TopologyService`](cluster::TopologyService):
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use topomorph::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     topomorph::telemetry::init_logging(topomorph::telemetry::LogFormat::from_env())
//!         .map_err(|e| e.to_string())?;
//!
//!     let initial = ClusterTopology::from_layout([
//!         (MemberId(0), vec![(1, 2), (2, 1)]),
//!         (MemberId(1), vec![(1, 1), (2, 2)]),
//!     ]);
//!     let appliers = OperationAppliers::new(
//!         Arc::new(NoopPartitionChangeExecutor),
//!         Arc::new(NoopClusterMembershipChangeExecutor),
//!     );
//!     let service = TopologyService::in_memory(initial, appliers, CoordinatorConfig::from_env()?);
//!
//!     let response = service
//!         .coordinator()
//!         .scale(ScaleRequest::new([MemberId(0), MemberId(1), MemberId(2)]))
//!         .await?;
//!     for operation in &response.planned_changes {
//!         println!("{operation}");
//!     }
//!
//!     service.wait_for_idle().await;
//!     service.shutdown().await;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub mod types;

pub mod cluster;
pub mod constants;
pub mod telemetry;

pub mod prelude {
    //! The types needed to run the engine and submit requests.
    pub use crate::cluster::{
        AddMembersRequest, ChangeCoordinator, ChangeError, ChangeOperation, ChangeResponse,
        ChangeResult, ClusterMembershipChangeExecutor, ClusterTopology, CoordinatorConfig,
        ExecutorError, ExecutorResult, ForceScaleDownRequest, JoinPartitionRequest,
        LeavePartitionRequest, NoopClusterMembershipChangeExecutor, NoopPartitionChangeExecutor,
        OperationAppliers, PartitionChangeExecutor, ReassignPartitionsRequest,
        RemoveMembersRequest, ScaleRequest, TopologyService, TopologyStore,
    };
    pub use crate::error::{ErrorCode, ErrorResponse};
    pub use crate::types::{ChangeId, MemberId, PartitionId, Priority};
}

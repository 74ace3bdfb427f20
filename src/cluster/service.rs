//! One-call wiring of store, coordinator and change driver.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use topomorph::cluster::{
//!     AddMembersRequest, ClusterTopology, CoordinatorConfig, OperationAppliers, TopologyService,
//! };
//! use topomorph::types::MemberId;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let initial = ClusterTopology::from_layout([(MemberId(0), vec![(1, 1)])]);
//!     let service = TopologyService::in_memory(
//!         initial,
//!         OperationAppliers::noop(),
//!         CoordinatorConfig::from_env()?,
//!     );
//!
//!     let response = service
//!         .coordinator()
//!         .add_members(AddMembersRequest::new([MemberId(1)]))
//!         .await?;
//!     println!("planned {} operations", response.planned_changes.len());
//!
//!     service.wait_for_idle().await;
//!     service.shutdown().await;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use object_store::ObjectStore;
use tracing::info;

use super::applier::OperationAppliers;
use super::background_tasks::{BackgroundTaskRegistry, TaskStatus};
use super::config::CoordinatorConfig;
use super::coordinator::ChangeCoordinator;
use super::driver::ChangeDriver;
use super::error::StoreError;
use super::metrics;
use super::state::ClusterTopology;
use super::store::{InMemoryTopologyStore, ObjectStoreTopologyStore, TopologyStore};
use crate::constants::CHANGE_DRIVER_TASK;

/// A running reconfiguration engine.
pub struct TopologyService {
    store: Arc<dyn TopologyStore>,
    coordinator: ChangeCoordinator,
    tasks: BackgroundTaskRegistry,
}

impl TopologyService {
    /// Start the change driver over `store`. Must be called inside a Tokio
    /// runtime.
    pub fn start(
        store: Arc<dyn TopologyStore>,
        appliers: OperationAppliers,
        config: CoordinatorConfig,
    ) -> Self {
        metrics::init_metrics();

        let driver = ChangeDriver::new(store.clone(), appliers, config);
        let coordinator = ChangeCoordinator::new(store.clone(), driver.progress());

        let mut tasks = BackgroundTaskRegistry::new();
        tasks.spawn_essential(CHANGE_DRIVER_TASK, driver.run());

        let current = store.current();
        info!(
            version = current.version,
            members = current.members.len(),
            pending = current.has_pending_changes(),
            "Topology service started"
        );

        Self {
            store,
            coordinator,
            tasks,
        }
    }

    /// Start over a process-local store.
    pub fn in_memory(
        initial: ClusterTopology,
        appliers: OperationAppliers,
        config: CoordinatorConfig,
    ) -> Self {
        Self::start(
            Arc::new(InMemoryTopologyStore::new(initial)),
            appliers,
            config,
        )
    }

    /// Start over snapshots persisted under `config.snapshot_prefix`.
    ///
    /// A plan that was in flight when the previous process stopped is resumed
    /// from its head operation.
    pub async fn with_object_store(
        object_store: Arc<dyn ObjectStore>,
        initial: ClusterTopology,
        appliers: OperationAppliers,
        config: CoordinatorConfig,
    ) -> Result<Self, StoreError> {
        let store =
            ObjectStoreTopologyStore::open(object_store, config.snapshot_prefix.clone(), initial)
                .await?;
        Ok(Self::start(Arc::new(store), appliers, config))
    }

    pub fn coordinator(&self) -> &ChangeCoordinator {
        &self.coordinator
    }

    pub fn store(&self) -> Arc<dyn TopologyStore> {
        self.store.clone()
    }

    /// Wait until no plan is pending and return that snapshot.
    pub async fn wait_for_idle(&self) -> Arc<ClusterTopology> {
        let mut changes = self.store.subscribe();
        loop {
            let topology = changes.borrow_and_update().clone();
            if !topology.has_pending_changes() {
                return topology;
            }
            if changes.changed().await.is_err() {
                return self.store.current();
            }
        }
    }

    /// True while the change driver is running.
    pub fn is_healthy(&self) -> bool {
        self.tasks.all_healthy()
    }

    pub fn health_check(&self) -> Vec<(&'static str, TaskStatus)> {
        self.tasks.health_check()
    }

    /// Stop the change driver. A plan in flight stays persisted and is
    /// resumed by the next service started over the same store.
    pub async fn shutdown(mut self) {
        self.tasks.shutdown_all().await;
        info!(version = self.store.current().version, "Topology service stopped");
    }
}

impl std::fmt::Debug for TopologyService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopologyService")
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}

//! Versioned topology storage.
//!
//! A [`TopologyStore`] holds the latest [`ClusterTopology`] and replaces it
//! with compare-and-set on the snapshot version, so concurrent writers (the
//! request path and the change driver) can never overwrite each other's
//! progress. Subscribers get a `watch` notification on every accepted write,
//! which is what lets the driver sleep until there is work.
//!
//! # Implementations
//!
//! - [`InMemoryTopologyStore`]: process-local, for tests and embedded use
//! - [`ObjectStoreTopologyStore`]: persists every accepted snapshot to an
//!   [`ObjectStore`] so a restarted process resumes where it left off

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use object_store::ObjectStore;
use object_store::path::Path as ObjectPath;
use tokio::sync::{Mutex, watch};
use tracing::{debug, error, info};

use super::error::StoreError;
use super::metrics;
use super::state::ClusterTopology;

/// Storage for the latest topology snapshot.
#[async_trait]
pub trait TopologyStore: Send + Sync {
    /// The latest accepted snapshot.
    fn current(&self) -> Arc<ClusterTopology>;

    /// Replace the snapshot if its version is still `expected_version`.
    async fn compare_and_set(
        &self,
        expected_version: u64,
        next: ClusterTopology,
    ) -> Result<Arc<ClusterTopology>, StoreError>;

    /// Receiver notified on every accepted write.
    fn subscribe(&self) -> watch::Receiver<Arc<ClusterTopology>>;
}

/// Latest snapshot plus the lock serializing writers.
struct Versioned {
    tx: watch::Sender<Arc<ClusterTopology>>,
    write_lock: Mutex<()>,
}

impl Versioned {
    fn new(initial: ClusterTopology) -> Self {
        let (tx, _) = watch::channel(Arc::new(initial));
        Self {
            tx,
            write_lock: Mutex::new(()),
        }
    }

    fn current(&self) -> Arc<ClusterTopology> {
        self.tx.borrow().clone()
    }

    fn check(&self, expected_version: u64) -> Result<(), StoreError> {
        let actual = self.tx.borrow().version;
        if actual != expected_version {
            return Err(StoreError::VersionConflict {
                expected: expected_version,
                actual,
            });
        }
        Ok(())
    }

    fn publish(&self, next: ClusterTopology) -> Arc<ClusterTopology> {
        let next = Arc::new(next);
        self.tx.send_replace(next.clone());
        next
    }
}

/// Process-local store.
pub struct InMemoryTopologyStore {
    inner: Versioned,
}

impl InMemoryTopologyStore {
    pub fn new(initial: ClusterTopology) -> Self {
        Self {
            inner: Versioned::new(initial),
        }
    }
}

#[async_trait]
impl TopologyStore for InMemoryTopologyStore {
    fn current(&self) -> Arc<ClusterTopology> {
        self.inner.current()
    }

    async fn compare_and_set(
        &self,
        expected_version: u64,
        next: ClusterTopology,
    ) -> Result<Arc<ClusterTopology>, StoreError> {
        let _guard = self.inner.write_lock.lock().await;
        self.inner.check(expected_version)?;
        Ok(self.inner.publish(next))
    }

    fn subscribe(&self) -> watch::Receiver<Arc<ClusterTopology>> {
        self.inner.tx.subscribe()
    }
}

/// Store that writes every accepted snapshot to `<prefix>/topology.bin`.
///
/// # Atomicity
///
/// Snapshots are written to a temporary object first and then renamed over
/// the previous one. If the process dies before the rename, the old snapshot
/// stays valid and the orphaned temporary object is overwritten by the next
/// write. Backends without rename fall back to copy + delete.
pub struct ObjectStoreTopologyStore {
    inner: Versioned,
    object_store: Arc<dyn ObjectStore>,
    prefix: String,
}

impl ObjectStoreTopologyStore {
    /// Open the store, restoring the last persisted snapshot if there is one.
    /// Otherwise `initial` is persisted and used.
    pub async fn open(
        object_store: Arc<dyn ObjectStore>,
        prefix: impl Into<String>,
        initial: ClusterTopology,
    ) -> Result<Self, StoreError> {
        let prefix = prefix.into();
        let path = snapshot_path(&prefix);

        let restored = match object_store.get(&path).await {
            Ok(result) => {
                let bytes = result.bytes().await?;
                let topology = ClusterTopology::from_bytes(&bytes)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                info!(
                    version = topology.version,
                    members = topology.members.len(),
                    pending = topology.has_pending_changes(),
                    "Restored topology snapshot from object store"
                );
                Some(topology)
            }
            Err(object_store::Error::NotFound { .. }) => None,
            Err(e) => return Err(e.into()),
        };

        let store = Self {
            inner: Versioned::new(restored.clone().unwrap_or_else(|| initial.clone())),
            object_store,
            prefix,
        };
        if restored.is_none() {
            store.persist(&initial).await?;
            info!(version = initial.version, "Persisted initial topology snapshot");
        }
        Ok(store)
    }

    async fn persist(&self, topology: &ClusterTopology) -> Result<(), StoreError> {
        let start = Instant::now();
        let bytes = topology
            .to_bytes()
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let size = bytes.len();

        let temp_path = ObjectPath::from(format!("{}/temp-{}.bin", self.prefix, topology.version));
        let final_path = snapshot_path(&self.prefix);

        if let Err(e) = self
            .object_store
            .put(&temp_path, Bytes::from(bytes).into())
            .await
        {
            error!(error = %e, "Failed to write topology snapshot to temp path");
            metrics::record_snapshot_write("error", start.elapsed().as_secs_f64());
            return Err(e.into());
        }

        if let Err(e) = self.object_store.rename(&temp_path, &final_path).await {
            if let Err(copy_err) = self.object_store.copy(&temp_path, &final_path).await {
                error!(error = %copy_err, "Failed to copy topology snapshot to final path");
                let _ = self.object_store.delete(&temp_path).await;
                metrics::record_snapshot_write("error", start.elapsed().as_secs_f64());
                return Err(copy_err.into());
            }
            let _ = self.object_store.delete(&temp_path).await;
            debug!(error = %e, "Used copy+delete fallback for topology snapshot (rename not supported)");
        }

        metrics::record_snapshot_write("success", start.elapsed().as_secs_f64());
        debug!(
            version = topology.version,
            size_bytes = size,
            "Persisted topology snapshot"
        );
        Ok(())
    }
}

fn snapshot_path(prefix: &str) -> ObjectPath {
    ObjectPath::from(format!("{prefix}/topology.bin"))
}

#[async_trait]
impl TopologyStore for ObjectStoreTopologyStore {
    fn current(&self) -> Arc<ClusterTopology> {
        self.inner.current()
    }

    async fn compare_and_set(
        &self,
        expected_version: u64,
        next: ClusterTopology,
    ) -> Result<Arc<ClusterTopology>, StoreError> {
        let _guard = self.inner.write_lock.lock().await;
        self.inner.check(expected_version)?;
        self.persist(&next).await?;
        Ok(self.inner.publish(next))
    }

    fn subscribe(&self) -> watch::Receiver<Arc<ClusterTopology>> {
        self.inner.tx.subscribe()
    }
}

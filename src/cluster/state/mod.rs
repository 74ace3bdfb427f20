//! Topology data model.
//!
//! - [`ClusterTopology`]: immutable snapshot (members + pending plan)
//! - [`MemberState`]: one member's lifecycle and hosted partitions
//! - [`PartitionState`]: one replica's lifecycle and priority
//! - [`ClusterChangePlan`]: ordered operations with a cursor

mod change_plan;
mod member;
mod partition;
mod topology;

pub use change_plan::{
    ChangeStatus, ClusterChangePlan, CompletedChange, CompletedOperation,
};
pub use member::{MemberState, MemberStatus};
pub use partition::{PartitionState, PartitionStatus};
pub use topology::ClusterTopology;

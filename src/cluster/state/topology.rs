//! Immutable, versioned cluster topology snapshot.
//!
//! Every mutator takes `&self` and returns a new snapshot with a higher
//! version; nothing is ever changed in place. Readers can hold on to an
//! `Arc<ClusterTopology>` for as long as they like without locking.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::change_plan::{ClusterChangePlan, CompletedChange};
use super::member::MemberState;
use super::partition::PartitionState;
use crate::cluster::error::{TopologyError, TopologyResult};
use crate::cluster::operation::ChangeOperation;
use crate::types::{ChangeId, MemberId, PartitionId, Priority};

/// A point-in-time view of cluster membership, partition placement and the
/// change plan in flight (if any).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterTopology {
    pub version: u64,
    pub members: BTreeMap<MemberId, MemberState>,
    pub pending_changes: Option<ClusterChangePlan>,
    pub last_change: Option<CompletedChange>,
}

impl ClusterTopology {
    /// Bootstrap a static topology from a set of member records.
    pub fn init(members: BTreeMap<MemberId, MemberState>) -> Self {
        Self {
            version: 1,
            members,
            pending_changes: None,
            last_change: None,
        }
    }

    /// Bootstrap a topology where every member and replica is active.
    pub fn from_layout<I, P>(layout: I) -> Self
    where
        I: IntoIterator<Item = (MemberId, P)>,
        P: IntoIterator<Item = (PartitionId, Priority)>,
    {
        let members = layout
            .into_iter()
            .map(|(id, partitions)| {
                let partitions = partitions
                    .into_iter()
                    .map(|(p, priority)| (p, PartitionState::active(priority)))
                    .collect();
                (id, MemberState::active(partitions))
            })
            .collect();
        Self::init(members)
    }

    fn next_version(&self) -> Self {
        Self {
            version: self.version + 1,
            ..self.clone()
        }
    }

    // ------------------------------------------------------------------
    // Member mutations
    // ------------------------------------------------------------------

    /// Add a new member record. Fails if the member already exists.
    pub fn add_member(&self, id: MemberId, state: MemberState) -> TopologyResult<Self> {
        if self.members.contains_key(&id) {
            return Err(TopologyError::MemberAlreadyExists(id));
        }
        let mut next = self.next_version();
        next.members.insert(id, state);
        Ok(next)
    }

    /// Replace a member record with `f(current)`. The member's own version is
    /// bumped as well.
    pub fn update_member<F>(&self, id: MemberId, f: F) -> TopologyResult<Self>
    where
        F: FnOnce(&MemberState) -> TopologyResult<MemberState>,
    {
        let current = self
            .members
            .get(&id)
            .ok_or(TopologyError::MemberNotFound(id))?;
        let mut updated = f(current)?;
        updated.version = current.version + 1;

        let mut next = self.next_version();
        next.members.insert(id, updated);
        Ok(next)
    }

    /// Drop a member record. Fails if the member is unknown or still hosts
    /// partitions.
    pub fn remove_member(&self, id: MemberId) -> TopologyResult<Self> {
        let member = self
            .members
            .get(&id)
            .ok_or(TopologyError::MemberNotFound(id))?;
        if !member.partitions.is_empty() {
            return Err(TopologyError::MemberHasPartitions {
                member: id,
                partitions: member.partitions.keys().copied().collect(),
            });
        }
        let mut next = self.next_version();
        next.members.remove(&id);
        Ok(next)
    }

    // ------------------------------------------------------------------
    // Change plan
    // ------------------------------------------------------------------

    /// Attach a change plan. The plan id is the version of the returned
    /// snapshot. An empty operation list leaves the snapshot unchanged.
    pub fn start_change(
        &self,
        operations: Vec<ChangeOperation>,
        timestamp_ms: u64,
    ) -> TopologyResult<Self> {
        if let Some(plan) = &self.pending_changes {
            return Err(TopologyError::ChangeInProgress { change_id: plan.id });
        }
        if operations.is_empty() {
            return Ok(self.clone());
        }
        let mut next = self.next_version();
        next.pending_changes = Some(ClusterChangePlan::init(
            next.version,
            operations,
            timestamp_ms,
        ));
        Ok(next)
    }

    /// Apply the effect of the head operation and move the cursor forward.
    /// When the last operation completes the plan is cleared and recorded in
    /// `last_change`.
    pub fn advance_change<F>(&self, update: F, timestamp_ms: u64) -> TopologyResult<Self>
    where
        F: FnOnce(&ClusterTopology) -> TopologyResult<ClusterTopology>,
    {
        let plan = self
            .pending_changes
            .as_ref()
            .ok_or(TopologyError::NoPendingChange)?;
        if !plan.has_pending() {
            return Err(TopologyError::NoPendingChange);
        }

        let updated = update(self)?;
        let advanced = plan.advance(timestamp_ms);

        let mut next = Self {
            version: updated.version.max(self.version) + 1,
            members: updated.members,
            pending_changes: None,
            last_change: self.last_change,
        };
        if advanced.has_pending() {
            next.pending_changes = Some(advanced);
        } else {
            next.last_change = Some(advanced.complete(timestamp_ms));
        }
        Ok(next)
    }

    /// Run `init` for the head operation. If it changes the member layout,
    /// the layout from before is kept as the plan's restore point, unless one
    /// was already recorded by an earlier attempt at the same operation.
    pub fn init_operation<F>(&self, init: F) -> TopologyResult<Self>
    where
        F: FnOnce(&ClusterTopology) -> TopologyResult<ClusterTopology>,
    {
        let plan = self
            .pending_changes
            .as_ref()
            .ok_or(TopologyError::NoPendingChange)?;

        let optimistic = init(self)?;
        if optimistic.members == self.members {
            return Ok(self.clone());
        }

        let mut plan = plan.clone();
        if plan.restore_point.is_none() {
            plan.restore_point = Some(self.members.clone());
        }
        Ok(Self {
            version: optimistic.version.max(self.version + 1),
            members: optimistic.members,
            pending_changes: Some(plan),
            last_change: self.last_change,
        })
    }

    /// Halt the pending plan. Member records go back to the restore point if
    /// the head operation wrote optimistic state, and stay as they are
    /// otherwise.
    pub fn fail_change(&self, timestamp_ms: u64) -> TopologyResult<Self> {
        let plan = self
            .pending_changes
            .as_ref()
            .ok_or(TopologyError::NoPendingChange)?;
        Ok(Self {
            version: self.version + 1,
            members: plan
                .restore_point
                .clone()
                .unwrap_or_else(|| self.members.clone()),
            pending_changes: None,
            last_change: Some(plan.fail(timestamp_ms)),
        })
    }

    /// The operation at the cursor, if a plan is in flight.
    pub fn next_pending_operation(&self) -> Option<&ChangeOperation> {
        self.pending_changes
            .as_ref()
            .and_then(ClusterChangePlan::next_operation)
    }

    pub fn has_pending_changes(&self) -> bool {
        self.pending_changes
            .as_ref()
            .is_some_and(ClusterChangePlan::has_pending)
    }

    pub fn pending_change_id(&self) -> Option<ChangeId> {
        self.pending_changes.as_ref().map(|plan| plan.id)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn member(&self, id: MemberId) -> Option<&MemberState> {
        self.members.get(&id)
    }

    pub fn has_member(&self, id: MemberId) -> bool {
        self.members.contains_key(&id)
    }

    pub fn member_ids(&self) -> BTreeSet<MemberId> {
        self.members.keys().copied().collect()
    }

    /// Every partition id hosted by at least one member.
    pub fn partition_ids(&self) -> BTreeSet<PartitionId> {
        self.members
            .values()
            .flat_map(|m| m.partitions.keys().copied())
            .collect()
    }

    pub fn partition_count(&self) -> usize {
        self.partition_ids().len()
    }

    pub fn has_partition(&self, partition: PartitionId) -> bool {
        self.members.values().any(|m| m.has_partition(partition))
    }

    /// Replica set of a partition, ordered by member id.
    pub fn replicas_of(&self, partition: PartitionId) -> Vec<(MemberId, PartitionState)> {
        self.members
            .iter()
            .filter_map(|(id, m)| m.partition(partition).map(|p| (*id, *p)))
            .collect()
    }

    pub fn replica_count(&self, partition: PartitionId) -> usize {
        self.members
            .values()
            .filter(|m| m.has_partition(partition))
            .count()
    }

    /// Largest replica count over all partitions.
    pub fn replication_factor(&self) -> usize {
        self.partition_ids()
            .into_iter()
            .map(|p| self.replica_count(p))
            .max()
            .unwrap_or(0)
    }

    // ------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------

    pub fn to_bytes(&self) -> TopologyResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| TopologyError::Serialization(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> TopologyResult<Self> {
        bincode::deserialize(bytes).map_err(|e| TopologyError::Serialization(e.to_string()))
    }

    pub fn to_json(&self) -> TopologyResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| TopologyError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::state::{ChangeStatus, MemberStatus};

    fn two_members() -> ClusterTopology {
        ClusterTopology::from_layout([
            (MemberId(0), vec![(1, 2), (2, 1)]),
            (MemberId(1), vec![(1, 1)]),
        ])
    }

    #[test]
    fn test_from_layout() {
        let topology = two_members();
        assert_eq!(topology.version, 1);
        assert_eq!(topology.partition_ids(), BTreeSet::from([1, 2]));
        assert_eq!(topology.replica_count(1), 2);
        assert_eq!(topology.replica_count(2), 1);
        assert_eq!(topology.replication_factor(), 2);
        assert!(!topology.has_pending_changes());
    }

    #[test]
    fn test_add_member_rejects_duplicate() {
        let topology = two_members();
        let err = topology
            .add_member(MemberId(0), MemberState::joining())
            .unwrap_err();
        assert_eq!(err, TopologyError::MemberAlreadyExists(MemberId(0)));

        let added = topology
            .add_member(MemberId(5), MemberState::joining())
            .unwrap();
        assert_eq!(added.version, topology.version + 1);
        assert_eq!(
            added.member(MemberId(5)).map(|m| m.state),
            Some(MemberStatus::Joining)
        );
        // snapshot we started from is untouched
        assert!(!topology.has_member(MemberId(5)));
    }

    #[test]
    fn test_update_member_bumps_member_version() {
        let topology = two_members();
        let updated = topology
            .update_member(MemberId(1), |m| Ok(m.to_leaving()))
            .unwrap();
        let member = updated.member(MemberId(1)).unwrap();
        assert_eq!(member.state, MemberStatus::Leaving);
        assert_eq!(member.version, 1);

        let err = topology
            .update_member(MemberId(9), |m| Ok(m.clone()))
            .unwrap_err();
        assert_eq!(err, TopologyError::MemberNotFound(MemberId(9)));
    }

    #[test]
    fn test_remove_member_with_partitions_fails() {
        let topology = two_members();
        let err = topology.remove_member(MemberId(1)).unwrap_err();
        assert!(matches!(err, TopologyError::MemberHasPartitions { .. }));

        let emptied = topology
            .update_member(MemberId(1), |m| Ok(m.remove_partition(1)))
            .unwrap()
            .remove_member(MemberId(1))
            .unwrap();
        assert!(!emptied.has_member(MemberId(1)));
    }

    #[test]
    fn test_start_change_rejects_second_plan() {
        let topology = two_members();
        let started = topology
            .start_change(vec![ChangeOperation::member_join(MemberId(2))], 10)
            .unwrap();
        assert!(started.has_pending_changes());
        assert_eq!(started.pending_change_id(), Some(started.version));

        let err = started
            .start_change(vec![ChangeOperation::member_join(MemberId(3))], 11)
            .unwrap_err();
        assert_eq!(
            err,
            TopologyError::ChangeInProgress {
                change_id: started.version
            }
        );
    }

    #[test]
    fn test_start_change_with_no_operations_is_noop() {
        let topology = two_members();
        assert_eq!(topology.start_change(vec![], 1).unwrap(), topology);
    }

    #[test]
    fn test_advance_change_until_done() {
        let topology = two_members()
            .start_change(
                vec![
                    ChangeOperation::member_join(MemberId(2)),
                    ChangeOperation::member_join(MemberId(3)),
                ],
                10,
            )
            .unwrap();

        let first = topology
            .advance_change(|t| t.add_member(MemberId(2), MemberState::joining()), 20)
            .unwrap();
        assert!(first.has_pending_changes());
        assert_eq!(
            first.next_pending_operation(),
            Some(&ChangeOperation::member_join(MemberId(3)))
        );
        assert!(first.version > topology.version);

        let second = first
            .advance_change(|t| t.add_member(MemberId(3), MemberState::joining()), 30)
            .unwrap();
        assert!(!second.has_pending_changes());
        assert!(second.pending_changes.is_none());
        let last = second.last_change.unwrap();
        assert_eq!(last.status, ChangeStatus::Completed);
        assert_eq!(last.completed_at_ms, 30);

        assert_eq!(
            second.advance_change(|t| Ok(t.clone()), 40).unwrap_err(),
            TopologyError::NoPendingChange
        );
    }

    #[test]
    fn test_failed_update_leaves_plan_untouched() {
        let topology = two_members()
            .start_change(vec![ChangeOperation::member_join(MemberId(0))], 10)
            .unwrap();
        let err = topology
            .advance_change(|t| t.add_member(MemberId(0), MemberState::joining()), 20)
            .unwrap_err();
        assert_eq!(err, TopologyError::MemberAlreadyExists(MemberId(0)));
        assert_eq!(topology.pending_changes.as_ref().unwrap().cursor(), 0);
    }

    #[test]
    fn test_fail_change_restores_members_before_init() {
        let planned = two_members()
            .start_change(vec![ChangeOperation::member_join(MemberId(4))], 10)
            .unwrap();
        let optimistic = planned
            .init_operation(|t| t.add_member(MemberId(4), MemberState::joining()))
            .unwrap();
        assert_eq!(optimistic.version, planned.version + 1);
        assert_eq!(
            optimistic.pending_changes.as_ref().unwrap().restore_point,
            Some(planned.members.clone())
        );

        let failed = optimistic.fail_change(50).unwrap();
        assert_eq!(failed.members, planned.members);
        assert!(failed.pending_changes.is_none());
        assert!(failed.version > optimistic.version);
        assert_eq!(failed.last_change.unwrap().status, ChangeStatus::Failed);
    }

    #[test]
    fn test_repeated_init_keeps_first_restore_point() {
        let planned = two_members()
            .start_change(vec![ChangeOperation::member_join(MemberId(4))], 10)
            .unwrap();
        let optimistic = planned
            .init_operation(|t| t.add_member(MemberId(4), MemberState::joining()))
            .unwrap();

        // a second attempt that changes the layout again must not move the restore point
        let again = optimistic
            .init_operation(|t| t.update_member(MemberId(4), |m| Ok(m.to_leaving())))
            .unwrap();
        assert_eq!(
            again.pending_changes.as_ref().unwrap().restore_point,
            Some(planned.members.clone())
        );

        // an init that changes nothing returns the snapshot as is
        let unchanged = again.init_operation(|t| Ok(t.clone())).unwrap();
        assert_eq!(unchanged, again);
    }

    #[test]
    fn test_fail_change_without_optimistic_write_keeps_members() {
        let planned = two_members()
            .start_change(vec![ChangeOperation::member_join(MemberId(0))], 10)
            .unwrap();
        let failed = planned.fail_change(20).unwrap();
        assert_eq!(failed.members, planned.members);
    }

    #[test]
    fn test_advance_clears_restore_point() {
        let planned = two_members()
            .start_change(
                vec![
                    ChangeOperation::member_join(MemberId(4)),
                    ChangeOperation::member_leave(MemberId(4)),
                ],
                10,
            )
            .unwrap();
        let optimistic = planned
            .init_operation(|t| t.add_member(MemberId(4), MemberState::joining()))
            .unwrap();
        let advanced = optimistic
            .advance_change(|t| t.update_member(MemberId(4), |m| Ok(m.to_active())), 20)
            .unwrap();
        assert!(advanced.pending_changes.unwrap().restore_point.is_none());
    }

    #[test]
    fn test_bytes_round_trip_with_plan() {
        let topology = two_members()
            .start_change(
                vec![
                    ChangeOperation::partition_join(MemberId(1), 2, 1),
                    ChangeOperation::partition_leave(MemberId(0), 2),
                ],
                99,
            )
            .unwrap();
        let bytes = topology.to_bytes().unwrap();
        assert_eq!(ClusterTopology::from_bytes(&bytes).unwrap(), topology);
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        let err = ClusterTopology::from_bytes(&[0xff, 0x01]).unwrap_err();
        assert!(matches!(err, TopologyError::Serialization(_)));
    }
}

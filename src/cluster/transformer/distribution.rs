//! Replica placement shared by the reassign, scale and remove transformers.
//!
//! Placement is capacity-bounded: with `P` partitions, replication factor
//! `RF` and `N` members, every member ends up with either `⌊P·RF/N⌋` or
//! `⌈P·RF/N⌉` replicas. Replicas already on a target member are kept where
//! capacity allows (highest priority first) so that as little data as
//! possible moves. Free slots go to the least loaded member, ties broken by
//! the lowest member id.

use std::collections::{BTreeMap, BTreeSet};

use crate::cluster::operation::ChangeOperation;
use crate::cluster::state::ClusterTopology;
use crate::types::{MemberId, PartitionId, Priority};

/// Target replica sets, in priority order (position 0 is the preferred primary).
pub type Placement = BTreeMap<PartitionId, Vec<MemberId>>;

/// Priority of the replica at `position` in a placement.
pub fn priority_at(replication_factor: usize, position: usize) -> Priority {
    u32::try_from(replication_factor.saturating_sub(position)).unwrap_or(Priority::MAX)
}

struct Capacity {
    counts: BTreeMap<MemberId, usize>,
    base: usize,
    extra_left: usize,
}

impl Capacity {
    fn new(members: &BTreeSet<MemberId>, total_replicas: usize) -> Self {
        let n = members.len().max(1);
        Self {
            counts: members.iter().map(|id| (*id, 0)).collect(),
            base: total_replicas / n,
            extra_left: total_replicas % n,
        }
    }

    fn has_room(&self, member: MemberId) -> bool {
        match self.counts.get(&member) {
            Some(&count) => count < self.base || (count == self.base && self.extra_left > 0),
            None => false,
        }
    }

    fn take(&mut self, member: MemberId) {
        if let Some(count) = self.counts.get_mut(&member) {
            if *count == self.base {
                self.extra_left -= 1;
            }
            *count += 1;
        }
    }

    /// Members with room, least loaded first.
    fn with_room(&self) -> Vec<MemberId> {
        let mut members: Vec<(usize, MemberId)> = self
            .counts
            .iter()
            .filter(|(id, _)| self.has_room(**id))
            .map(|(id, count)| (*count, *id))
            .collect();
        members.sort();
        members.into_iter().map(|(_, id)| id).collect()
    }

    /// Least loaded member with room that is not in `exclude`.
    fn least_loaded(&self, exclude: &[MemberId]) -> Option<MemberId> {
        self.counts
            .iter()
            .filter(|(id, _)| !exclude.contains(id) && self.has_room(**id))
            .min_by_key(|(id, count)| (**count, **id))
            .map(|(id, _)| *id)
    }
}

/// Place every partition of `topology` on `members` with `replication_factor`
/// replicas each.
///
/// Callers must ensure `replication_factor <= members.len()`.
pub fn distribute(
    topology: &ClusterTopology,
    members: &BTreeSet<MemberId>,
    replication_factor: usize,
) -> Placement {
    let partitions = topology.partition_ids();
    if members.is_empty() || replication_factor == 0 {
        return partitions.into_iter().map(|p| (p, Vec::new())).collect();
    }

    sticky(topology, &partitions, members, replication_factor)
        .unwrap_or_else(|| round_robin(&partitions, members, replication_factor))
}

fn sticky(
    topology: &ClusterTopology,
    partitions: &BTreeSet<PartitionId>,
    members: &BTreeSet<MemberId>,
    replication_factor: usize,
) -> Option<Placement> {
    let mut capacity = Capacity::new(members, partitions.len() * replication_factor);
    let mut placement: Placement = BTreeMap::new();

    // keep
    for &partition in partitions {
        let mut current = topology.replicas_of(partition);
        current.sort_by_key(|(id, state)| (std::cmp::Reverse(state.priority), *id));

        let mut kept = Vec::with_capacity(replication_factor);
        for (id, _) in current {
            if kept.len() == replication_factor {
                break;
            }
            if members.contains(&id) && capacity.has_room(id) {
                capacity.take(id);
                kept.push(id);
            }
        }
        placement.insert(partition, kept);
    }

    // fill
    let order: Vec<PartitionId> = placement.keys().copied().collect();
    for partition in order {
        loop {
            let replicas = placement.get(&partition)?;
            if replicas.len() >= replication_factor {
                break;
            }
            match capacity.least_loaded(replicas) {
                Some(next) => {
                    capacity.take(next);
                    placement.get_mut(&partition)?.push(next);
                }
                None => swap_into(&mut placement, &mut capacity, partition)?,
            }
        }
    }

    Some(placement)
}

/// Every member with room already replicates `partition`. Hand one of them a
/// slot in another partition and move the member it displaces here instead.
fn swap_into(
    placement: &mut Placement,
    capacity: &mut Capacity,
    partition: PartitionId,
) -> Option<()> {
    let stuck = placement.get(&partition)?.clone();

    let mut found = None;
    'search: for candidate in capacity.with_room() {
        for (other, replicas) in placement.iter() {
            if *other == partition || replicas.contains(&candidate) {
                continue;
            }
            if let Some(position) = replicas.iter().position(|id| !stuck.contains(id)) {
                found = Some((candidate, *other, position));
                break 'search;
            }
        }
    }

    let (candidate, other, position) = found?;
    let displaced = std::mem::replace(&mut placement.get_mut(&other)?[position], candidate);
    capacity.take(candidate);
    placement.get_mut(&partition)?.push(displaced);
    Some(())
}

fn round_robin(
    partitions: &BTreeSet<PartitionId>,
    members: &BTreeSet<MemberId>,
    replication_factor: usize,
) -> Placement {
    let sorted: Vec<MemberId> = members.iter().copied().collect();
    let n = sorted.len();
    partitions
        .iter()
        .enumerate()
        .map(|(j, partition)| {
            let replicas = (0..replication_factor)
                .map(|i| sorted[(j * replication_factor + i) % n])
                .collect();
            (*partition, replicas)
        })
        .collect()
}

/// Operations moving `topology` to `placement`.
///
/// Per partition: joins first, then priority changes, then leaves. New
/// replicas get the priority of their position in the placement. Kept
/// replicas keep their priority unless `revise_priorities` is set or the
/// final replica set would hold the same priority twice. In both cases every
/// replica takes its positional priority, which are distinct because a
/// placement holds at most `replication_factor` replicas.
pub fn moves(
    topology: &ClusterTopology,
    placement: &Placement,
    replication_factor: usize,
    revise_priorities: bool,
) -> Vec<ChangeOperation> {
    let mut operations = Vec::new();

    for (&partition, target) in placement {
        let current = topology.replicas_of(partition);
        let priority_of = |member: MemberId| {
            current
                .iter()
                .find(|(id, _)| *id == member)
                .map(|(_, state)| state.priority)
        };

        let mut seen = BTreeSet::new();
        let distinct = target.iter().enumerate().all(|(position, &member)| {
            seen.insert(
                priority_of(member).unwrap_or_else(|| priority_at(replication_factor, position)),
            )
        });

        for (position, &member) in target.iter().enumerate() {
            if priority_of(member).is_none() {
                operations.push(ChangeOperation::partition_join(
                    member,
                    partition,
                    priority_at(replication_factor, position),
                ));
            }
        }

        if revise_priorities || !distinct {
            for (position, &member) in target.iter().enumerate() {
                let priority = priority_at(replication_factor, position);
                if priority_of(member).is_some_and(|kept| kept != priority) {
                    operations.push(ChangeOperation::reconfigure_priority(
                        member, partition, priority,
                    ));
                }
            }
        }

        for (member, _) in &current {
            if !target.contains(member) {
                operations.push(ChangeOperation::partition_leave(*member, partition));
            }
        }
    }

    operations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u32]) -> BTreeSet<MemberId> {
        raw.iter().copied().map(MemberId).collect()
    }

    fn load(placement: &Placement) -> BTreeMap<MemberId, usize> {
        let mut counts = BTreeMap::new();
        for replicas in placement.values() {
            for id in replicas {
                *counts.entry(*id).or_insert(0) += 1;
            }
        }
        counts
    }

    #[test]
    fn test_spread_to_new_member_is_balanced() {
        let topology = ClusterTopology::from_layout([(
            MemberId(0),
            vec![(1, 1), (2, 1), (3, 1), (4, 1)],
        )]);
        let placement = distribute(&topology, &ids(&[0, 1]), 1);

        let counts = load(&placement);
        assert_eq!(counts[&MemberId(0)], 2);
        assert_eq!(counts[&MemberId(1)], 2);
        // kept replicas stay put
        assert_eq!(placement[&1], vec![MemberId(0)]);
        assert_eq!(placement[&2], vec![MemberId(0)]);
    }

    #[test]
    fn test_balance_within_one() {
        let topology = ClusterTopology::from_layout([
            (MemberId(0), vec![(1, 3), (2, 3), (3, 3), (4, 3), (5, 3)]),
            (MemberId(1), vec![(1, 2), (2, 2), (3, 2), (4, 2), (5, 2)]),
            (MemberId(2), vec![(1, 1), (2, 1), (3, 1), (4, 1), (5, 1)]),
        ]);
        let placement = distribute(&topology, &ids(&[0, 1, 2, 3]), 3);

        let counts = load(&placement);
        let min = counts.values().min().copied().unwrap();
        let max = counts.values().max().copied().unwrap();
        assert!(max - min <= 1, "unbalanced: {counts:?}");
        for replicas in placement.values() {
            assert_eq!(replicas.len(), 3);
            let unique: BTreeSet<_> = replicas.iter().collect();
            assert_eq!(unique.len(), 3);
        }
    }

    #[test]
    fn test_ties_go_to_lowest_id() {
        let topology = ClusterTopology::from_layout([(MemberId(9), vec![(1, 1)])]);
        let placement = distribute(&topology, &ids(&[3, 5, 7]), 1);
        assert_eq!(placement[&1], vec![MemberId(3)]);
    }

    #[test]
    fn test_round_robin_layout() {
        let placement = round_robin(&BTreeSet::from([1, 2, 3]), &ids(&[0, 1, 2]), 2);
        assert_eq!(placement[&1], vec![MemberId(0), MemberId(1)]);
        assert_eq!(placement[&2], vec![MemberId(2), MemberId(0)]);
        assert_eq!(placement[&3], vec![MemberId(1), MemberId(2)]);
    }

    #[test]
    fn test_moves_order_join_before_leave() {
        let topology = ClusterTopology::from_layout([(MemberId(0), vec![(1, 1)])]);
        let placement = Placement::from([(1, vec![MemberId(1)])]);
        assert_eq!(
            moves(&topology, &placement, 1, false),
            vec![
                ChangeOperation::partition_join(MemberId(1), 1, 1),
                ChangeOperation::partition_leave(MemberId(0), 1),
            ]
        );
    }

    #[test]
    fn test_moves_revise_priorities_only_when_asked() {
        let topology = ClusterTopology::from_layout([(MemberId(0), vec![(1, 1)])]);
        let placement = Placement::from([(1, vec![MemberId(0), MemberId(1)])]);

        assert_eq!(
            moves(&topology, &placement, 3, true),
            vec![
                ChangeOperation::partition_join(MemberId(1), 1, 2),
                ChangeOperation::reconfigure_priority(MemberId(0), 1, 3),
            ]
        );
        assert_eq!(
            moves(&topology, &placement, 3, false),
            vec![ChangeOperation::partition_join(MemberId(1), 1, 2)]
        );
    }

    #[test]
    fn test_moves_reorders_priorities_that_would_collide() {
        let topology = ClusterTopology::from_layout([
            (MemberId(0), vec![(1, 2)]),
            (MemberId(1), vec![(1, 1)]),
            (MemberId(2), vec![]),
        ]);
        let placement = Placement::from([(1, vec![MemberId(1), MemberId(2)])]);

        assert_eq!(
            moves(&topology, &placement, 2, false),
            vec![
                ChangeOperation::partition_join(MemberId(2), 1, 1),
                ChangeOperation::reconfigure_priority(MemberId(1), 1, 2),
                ChangeOperation::partition_leave(MemberId(0), 1),
            ]
        );
    }

    #[test]
    fn test_moves_repairs_duplicate_priorities_among_kept_replicas() {
        let topology = ClusterTopology::from_layout([
            (MemberId(0), vec![(1, 1)]),
            (MemberId(1), vec![(1, 1)]),
        ]);
        let placement = Placement::from([(1, vec![MemberId(0), MemberId(1)])]);

        assert_eq!(
            moves(&topology, &placement, 2, false),
            vec![ChangeOperation::reconfigure_priority(MemberId(0), 1, 2)]
        );
    }
}

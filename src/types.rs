//! Type-safe identifiers for cluster topology primitives.
//!
//! Member ids get a newtype so they cannot be confused with partition ids or
//! priorities, which share the same underlying integer representation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A partition identifier. Partitions are numbered from 1.
pub type PartitionId = u32;

/// Replica priority within a partition. Higher values contend more strongly
/// for the primary role.
pub type Priority = u32;

/// Identifier of a change plan. Equal to the topology version at which the
/// plan was started.
pub type ChangeId = u64;

/// A cluster member (node) identifier.
///
/// Member ids are stable across restarts and totally ordered; the ordering is
/// used wherever the engine needs a deterministic tie-break.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MemberId(pub u32);

impl MemberId {
    /// Create a member id from a raw value.
    #[inline]
    pub const fn new(value: u32) -> Self {
        MemberId(value)
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl From<u32> for MemberId {
    fn from(value: u32) -> Self {
        MemberId(value)
    }
}

impl From<MemberId> for u32 {
    fn from(id: MemberId) -> Self {
        id.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
///
/// Model types never read the clock themselves; callers pass the value in so
/// that snapshot transitions stay deterministic.
pub fn now_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_id_ordering() {
        let mut ids = vec![MemberId(3), MemberId(1), MemberId(2)];
        ids.sort();
        assert_eq!(ids, vec![MemberId(1), MemberId(2), MemberId(3)]);
    }

    #[test]
    fn test_member_id_conversions() {
        let id = MemberId::from(7);
        assert_eq!(id.value(), 7);
        assert_eq!(u32::from(id), 7);
        assert_eq!(MemberId::new(7), id);
    }

    #[test]
    fn test_member_id_display() {
        assert_eq!(MemberId(42).to_string(), "42");
    }

    #[test]
    fn test_member_id_serializes_as_number() {
        let json = serde_json::to_string(&MemberId(5)).unwrap();
        assert_eq!(json, "5");
        let back: MemberId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, MemberId(5));
    }

    #[test]
    fn test_now_ms_is_recent() {
        // 2020-01-01T00:00:00Z
        assert!(now_ms() > 1_577_836_800_000);
    }
}

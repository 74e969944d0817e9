//! Per-chunk snapshot diffing.
//!
//! Remembers the last accepted shop set of every chunk and only produces a
//! [`ScanBatch`] when a new scan differs from it. Unchanged chunks cost no
//! network traffic at all.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::types::{Observation, RegionCoordinate, ScanBatch};

/// Stored snapshots are shared immutably; a change replaces the whole set.
pub type RegionSnapshot = Arc<HashSet<Observation>>;

pub struct RegionSnapshotDiffer {
    sender_id: String,
    snapshots: DashMap<RegionCoordinate, RegionSnapshot>,
}

impl RegionSnapshotDiffer {
    pub fn new(sender_id: &str) -> Self {
        Self {
            sender_id: sender_id.to_string(),
            snapshots: DashMap::new(),
        }
    }

    /// Compare `observations` with the stored snapshot of `region`.
    ///
    /// Returns a batch when the chunk was never seen or the set differs in any
    /// way; the stored snapshot is replaced before returning.
    pub fn observe(
        &self,
        region: &RegionCoordinate,
        observations: HashSet<Observation>,
    ) -> Option<ScanBatch> {
        match self.snapshots.entry(region.clone()) {
            Entry::Occupied(mut stored) => {
                if **stored.get() == observations {
                    return None;
                }
                debug!(region = %region, before = stored.get().len(), after = observations.len(), "Chunk changed");
                let snapshot = Arc::new(observations);
                stored.insert(Arc::clone(&snapshot));
                Some(self.batch_for(region, &snapshot))
            }
            Entry::Vacant(slot) => {
                debug!(region = %region, shops = observations.len(), "First scan of chunk");
                let snapshot = Arc::new(observations);
                slot.insert(Arc::clone(&snapshot));
                Some(self.batch_for(region, &snapshot))
            }
        }
    }

    /// Drop the snapshot for an unloaded chunk. The next scan of it always emits.
    pub fn forget(&self, region: &RegionCoordinate) -> bool {
        self.snapshots.remove(region).is_some()
    }

    /// Drop every snapshot (world change / disconnect).
    pub fn reset_all(&self) {
        self.snapshots.clear();
    }

    /// Last accepted snapshot for a chunk.
    pub fn snapshot(&self, region: &RegionCoordinate) -> Option<RegionSnapshot> {
        self.snapshots.get(region).map(|s| Arc::clone(s.value()))
    }

    pub fn tracked_regions(&self) -> usize {
        self.snapshots.len()
    }

    pub fn sender_id(&self) -> &str {
        &self.sender_id
    }

    fn batch_for(&self, region: &RegionCoordinate, snapshot: &RegionSnapshot) -> ScanBatch {
        ScanBatch::new(&self.sender_id, region.clone(), snapshot.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BlockPos, Dimension, Price, ShopAction};

    fn shop(owner: &str, amount: u32) -> Observation {
        Observation {
            owner: owner.to_string(),
            item: "Diamond".to_string(),
            price: Price::new(50.0).unwrap(),
            amount,
            dimension: Dimension::Overworld,
            action: ShopAction::Sell,
            position: BlockPos::new(1, 64, 1),
        }
    }

    fn set(items: &[Observation]) -> HashSet<Observation> {
        items.iter().cloned().collect()
    }

    fn region() -> RegionCoordinate {
        RegionCoordinate::from_raw("overworld", 0, 0)
    }

    #[test]
    fn test_first_observation_emits() {
        let differ = RegionSnapshotDiffer::new("tester");
        let batch = differ.observe(&region(), set(&[shop("Alice", 64)])).unwrap();
        assert_eq!(batch.sender_id, "tester");
        assert_eq!(batch.region, region());
        assert_eq!(batch.shops.len(), 1);
    }

    #[test]
    fn test_first_empty_observation_emits() {
        let differ = RegionSnapshotDiffer::new("tester");
        let batch = differ.observe(&region(), HashSet::new()).unwrap();
        assert!(batch.is_empty());
    }

    #[test]
    fn test_same_set_twice_is_silent() {
        let differ = RegionSnapshotDiffer::new("tester");
        assert!(differ.observe(&region(), set(&[shop("Alice", 64)])).is_some());
        assert!(differ.observe(&region(), set(&[shop("Alice", 64)])).is_none());
    }

    #[test]
    fn test_one_unit_amount_change_is_detected() {
        let differ = RegionSnapshotDiffer::new("tester");
        differ.observe(&region(), set(&[shop("Alice", 64)]));
        let batch = differ.observe(&region(), set(&[shop("Alice", 63)])).unwrap();
        assert_eq!(batch.shops[0].amount, 63);
        assert!(differ.observe(&region(), set(&[shop("Alice", 63)])).is_none());
    }

    #[test]
    fn test_regions_are_independent() {
        let differ = RegionSnapshotDiffer::new("tester");
        let other = RegionCoordinate::from_raw("nether", 0, 0);
        assert!(differ.observe(&region(), set(&[shop("Alice", 1)])).is_some());
        assert!(differ.observe(&other, set(&[shop("Alice", 1)])).is_some());
        assert_eq!(differ.tracked_regions(), 2);
    }

    #[test]
    fn test_forget_forces_resend() {
        let differ = RegionSnapshotDiffer::new("tester");
        differ.observe(&region(), set(&[shop("Alice", 1)]));
        assert!(differ.forget(&region()));
        assert!(differ.snapshot(&region()).is_none());
        assert!(differ.observe(&region(), set(&[shop("Alice", 1)])).is_some());
    }

    #[test]
    fn test_reset_all_clears_everything() {
        let differ = RegionSnapshotDiffer::new("tester");
        differ.observe(&region(), set(&[shop("Alice", 1)]));
        differ.observe(&RegionCoordinate::from_raw("end", 3, 3), HashSet::new());
        differ.reset_all();
        assert_eq!(differ.tracked_regions(), 0);
    }

    #[test]
    fn test_snapshot_is_shared_not_copied() {
        let differ = RegionSnapshotDiffer::new("tester");
        differ.observe(&region(), set(&[shop("Alice", 1)]));
        let held = differ.snapshot(&region()).unwrap();
        differ.observe(&region(), set(&[shop("Alice", 2)]));
        // A reader holding the old snapshot still sees the old set.
        assert!(held.contains(&shop("Alice", 1)));
        assert!(differ.snapshot(&region()).unwrap().contains(&shop("Alice", 2)));
    }
}

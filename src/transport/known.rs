//! Local belief about which chunks the service holds shops for.
//!
//! An empty scan of a chunk is only worth sending when the service still
//! thinks that chunk has shops. Everything else would be a no-op "nothing
//! here" message, and chunks scroll in and out of view constantly.
//!
//! Non-empty batches that are buffered or queued but not yet settled are
//! tracked per chunk by scan id. While any is outstanding the chunk stays
//! known, whatever order earlier deliveries complete in.

use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use std::collections::HashSet;
use uuid::Uuid;

use crate::types::RegionCoordinate;

#[derive(Debug, Default)]
pub struct KnownRegionCache {
    regions: DashSet<RegionCoordinate>,
    pending: DashMap<RegionCoordinate, HashSet<Uuid>>,
}

impl KnownRegionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_known_non_empty(&self, region: &RegionCoordinate) -> bool {
        self.regions.contains(region)
    }

    pub fn mark_non_empty(&self, region: RegionCoordinate) {
        self.regions.insert(region);
    }

    pub fn mark_empty(&self, region: &RegionCoordinate) {
        self.regions.remove(region);
    }

    /// A non-empty batch for `region` is buffered or queued. The chunk is
    /// known until every held batch is released. Holding twice is a no-op.
    pub fn hold(&self, region: &RegionCoordinate, scan_id: Uuid) {
        // Pending shard lock first, then regions, same as `settle_empty`.
        let mut held = self.pending.entry(region.clone()).or_default();
        held.insert(scan_id);
        self.regions.insert(region.clone());
    }

    /// The held batch was delivered, dropped or evicted.
    pub fn release(&self, region: &RegionCoordinate, scan_id: Uuid) {
        self.pending.remove_if_mut(region, |_, held| {
            held.remove(&scan_id);
            held.is_empty()
        });
    }

    /// Outstanding non-empty batches for `region`.
    pub fn held(&self, region: &RegionCoordinate) -> usize {
        self.pending.get(region).map_or(0, |held| held.len())
    }

    /// Apply a delivered empty batch. Returns false, leaving the chunk known,
    /// when a newer non-empty batch for it is still outstanding.
    pub fn settle_empty(&self, region: &RegionCoordinate) -> bool {
        match self.pending.entry(region.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(_) => {
                self.regions.remove(region);
                true
            }
        }
    }

    /// Add chunks reported by the service. Returns how many were new.
    pub fn seed<I>(&self, regions: I) -> usize
    where
        I: IntoIterator<Item = RegionCoordinate>,
    {
        regions
            .into_iter()
            .filter(|region| self.regions.insert(region.clone()))
            .count()
    }

    pub fn clear(&self) {
        self.pending.clear();
        self.regions.clear();
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_and_query() {
        let cache = KnownRegionCache::new();
        let region = RegionCoordinate::from_raw("overworld", 1, 1);
        assert!(!cache.is_known_non_empty(&region));

        cache.mark_non_empty(region.clone());
        assert!(cache.is_known_non_empty(&region));
        // dimension case does not matter
        assert!(cache.is_known_non_empty(&RegionCoordinate::from_raw("Overworld", 1, 1)));

        cache.mark_empty(&region);
        assert!(!cache.is_known_non_empty(&region));
    }

    #[test]
    fn test_seed_counts_new_entries() {
        let cache = KnownRegionCache::new();
        cache.mark_non_empty(RegionCoordinate::from_raw("nether", 0, 0));
        let added = cache.seed(vec![
            RegionCoordinate::from_raw("nether", 0, 0),
            RegionCoordinate::from_raw("nether", 0, 1),
            RegionCoordinate::from_raw("end", 0, 1),
        ]);
        assert_eq!(added, 2);
        assert_eq!(cache.len(), 3);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_held_batch_outlives_older_empty_delivery() {
        let cache = KnownRegionCache::new();
        let region = RegionCoordinate::from_raw("overworld", 2, 2);
        let newer = Uuid::new_v4();

        cache.hold(&region, newer);
        cache.hold(&region, newer);
        assert_eq!(cache.held(&region), 1);

        // An older empty batch lands while the newer shop batch is queued
        assert!(!cache.settle_empty(&region));
        assert!(cache.is_known_non_empty(&region));

        cache.release(&region, newer);
        assert_eq!(cache.held(&region), 0);
        assert!(cache.settle_empty(&region));
        assert!(!cache.is_known_non_empty(&region));
    }

    #[test]
    fn test_clear_drops_held_batches() {
        let cache = KnownRegionCache::new();
        let region = RegionCoordinate::from_raw("end", 0, 0);
        cache.hold(&region, Uuid::new_v4());

        cache.clear();
        assert_eq!(cache.held(&region), 0);
        assert!(!cache.is_known_non_empty(&region));
    }

    #[test]
    fn test_concurrent_marks() {
        let cache = std::sync::Arc::new(KnownRegionCache::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let cache = std::sync::Arc::clone(&cache);
                std::thread::spawn(move || {
                    for x in 0..250 {
                        cache.mark_non_empty(RegionCoordinate::from_raw("overworld", x, t));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cache.len(), 1000);
    }
}

//! Region source abstraction.
//!
//! The host world owns the live chunk/sign graph. The pipeline never touches
//! it directly: the host hands over a read-only snapshot of each chunk's sign
//! text through [`RegionSource`], and the extractor works on that copy.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use thiserror::Error;
use tracing::debug;

use super::sign_parser::parse_sign;
use crate::types::{BlockPos, Observation, RegionCoordinate};

/// Region source errors
#[derive(Debug, Error)]
pub enum RegionSourceError {
    #[error("region {0} is not loaded")]
    NotLoaded(RegionCoordinate),

    #[error("source unavailable: {0}")]
    Unavailable(String),
}

/// Raw text of one sign, as read from the world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMarker {
    pub position: BlockPos,
    pub lines: Vec<String>,
}

impl RawMarker {
    pub fn new<S: Into<String>>(position: BlockPos, lines: impl IntoIterator<Item = S>) -> Self {
        Self {
            position,
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }
}

/// Read-only view of sign content per chunk.
pub trait RegionSource: Send + Sync {
    /// Every sign currently in `region`.
    fn region_content(&self, region: &RegionCoordinate) -> Result<Vec<RawMarker>, RegionSourceError>;
}

/// Parse every marker of a chunk into a set of observations.
///
/// Markers whose position falls outside `region` are skipped.
pub fn extract_region(region: &RegionCoordinate, markers: &[RawMarker]) -> HashSet<Observation> {
    markers
        .iter()
        .filter(|marker| {
            let inside = marker.position.chunk_x() == region.chunk_x
                && marker.position.chunk_z() == region.chunk_z;
            if !inside {
                debug!(region = %region, position = %marker.position, "Marker outside its region, skipping");
            }
            inside
        })
        .filter_map(|marker| parse_sign(&marker.lines, marker.position, &region.dimension))
        .collect()
}

/// In-memory region source, fed by the host (or a replay driver) as chunks
/// load and unload.
#[derive(Debug, Default)]
pub struct SnapshotRegionSource {
    regions: RwLock<HashMap<RegionCoordinate, Vec<RawMarker>>>,
}

impl SnapshotRegionSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the content of a chunk.
    pub fn load(&self, region: RegionCoordinate, markers: Vec<RawMarker>) {
        self.regions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(region, markers);
    }

    /// Drop a chunk. Returns whether it was loaded.
    pub fn unload(&self, region: &RegionCoordinate) -> bool {
        self.regions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(region)
            .is_some()
    }

    /// All currently loaded chunks.
    pub fn loaded_regions(&self) -> Vec<RegionCoordinate> {
        self.regions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.regions.write().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl RegionSource for SnapshotRegionSource {
    fn region_content(&self, region: &RegionCoordinate) -> Result<Vec<RawMarker>, RegionSourceError> {
        self.regions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(region)
            .cloned()
            .ok_or_else(|| RegionSourceError::NotLoaded(region.clone()))
    }
}

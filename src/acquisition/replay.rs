//! Replay input
//!
//! Newline-delimited JSON chunk snapshots for the headless driver:
//!
//! ```text
//! {"dimension":"overworld","chunkX":0,"chunkZ":0,"markers":[{"position":[1,64,2],"lines":["Alice","Selling 64","Diamond","50"]}]}
//! {"unload":{"dimension":"overworld","chunkX":0,"chunkZ":0}}
//! ```

use serde::Deserialize;

use super::source::RawMarker;
use crate::types::RegionCoordinate;

/// One line of replay input.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ReplayEvent {
    /// The host unloaded a chunk.
    Unload { unload: RegionCoordinate },
    /// Current sign content of a chunk.
    Snapshot {
        #[serde(flatten)]
        region: RegionCoordinate,
        #[serde(default)]
        markers: Vec<RawMarker>,
    },
}

impl ReplayEvent {
    pub fn region(&self) -> &RegionCoordinate {
        match self {
            ReplayEvent::Unload { unload } => unload,
            ReplayEvent::Snapshot { region, .. } => region,
        }
    }
}

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse_replay_line(line: &str) -> Result<Option<ReplayEvent>, serde_json::Error> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(line).map(Some)
}

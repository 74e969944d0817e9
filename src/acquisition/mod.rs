//! Shop sign acquisition
//!
//! Reads sign text from a host-provided region snapshot and turns it into
//! structured shop observations.

pub mod replay;
pub mod sign_parser;
pub mod source;

pub use replay::{parse_replay_line, ReplayEvent};
pub use sign_parser::{parse_sign, SignStatus};
pub use source::{extract_region, RawMarker, RegionSource, RegionSourceError, SnapshotRegionSource};

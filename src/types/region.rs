//! Dimensions and chunk coordinates

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// World dimension a shop or chunk lives in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Dimension {
    Overworld,
    Nether,
    End,
    /// Unrecognized dimension, kept as the trimmed raw identifier.
    Other(String),
}

impl Dimension {
    /// Canonicalize a raw world identifier.
    ///
    /// Matches by substring, ignoring case and surrounding whitespace, so
    /// registry ids (`minecraft:the_nether`) and modded worlds
    /// (`mymod:nether_deep`) fold into the vanilla dimension they name.
    /// "nether" is checked before "end", then "overworld".
    pub fn canonical(raw: &str) -> Self {
        let trimmed = raw.trim();
        let lower = trimmed.to_lowercase();
        if lower.contains("nether") {
            Dimension::Nether
        } else if lower.contains("end") {
            Dimension::End
        } else if lower.contains("overworld") {
            Dimension::Overworld
        } else {
            Dimension::Other(trimmed.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Dimension::Overworld => "overworld",
            Dimension::Nether => "nether",
            Dimension::End => "end",
            Dimension::Other(raw) => raw,
        }
    }

    /// Case-folded form used as a map key.
    fn folded(self) -> Self {
        match self {
            Dimension::Other(raw) => Dimension::Other(raw.to_lowercase()),
            known => known,
        }
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Dimension {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Dimension {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Dimension::canonical(&raw))
    }
}

/// A 16x16 chunk column in one dimension.
///
/// The dimension is case-folded on construction (and on deserialization),
/// so `Nether`/`nether` and `Custom`/`custom` address the same chunk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawRegion")]
pub struct RegionCoordinate {
    pub dimension: Dimension,
    pub chunk_x: i32,
    pub chunk_z: i32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRegion {
    dimension: Dimension,
    chunk_x: i32,
    chunk_z: i32,
}

impl From<RawRegion> for RegionCoordinate {
    fn from(raw: RawRegion) -> Self {
        Self::new(raw.dimension, raw.chunk_x, raw.chunk_z)
    }
}

impl RegionCoordinate {
    pub fn new(dimension: Dimension, chunk_x: i32, chunk_z: i32) -> Self {
        Self {
            dimension: dimension.folded(),
            chunk_x,
            chunk_z,
        }
    }

    /// Parse the dimension from a raw identifier.
    pub fn from_raw(dimension: &str, chunk_x: i32, chunk_z: i32) -> Self {
        Self::new(Dimension::canonical(dimension), chunk_x, chunk_z)
    }

    /// The chunk containing a block position.
    pub fn containing(dimension: Dimension, pos: super::BlockPos) -> Self {
        Self::new(dimension, pos.chunk_x(), pos.chunk_z())
    }
}

impl std::fmt::Display for RegionCoordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}, {}]", self.dimension, self.chunk_x, self.chunk_z)
    }
}

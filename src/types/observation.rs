//! Shop observations extracted from sign text

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use super::Dimension;

/// Trade direction advertised on a shop sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShopAction {
    Sell,
    Buy,
}

impl ShopAction {
    /// Value sent to the pricebook service.
    pub fn api_value(&self) -> &'static str {
        match self {
            ShopAction::Sell => "sell",
            ShopAction::Buy => "buy",
        }
    }
}

impl std::fmt::Display for ShopAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.api_value())
    }
}

/// Integer block position in the world.
///
/// Serialized as a `[x, y, z]` array on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "[i32; 3]", into = "[i32; 3]")]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Chunk column X containing this block.
    pub const fn chunk_x(&self) -> i32 {
        self.x >> 4
    }

    /// Chunk column Z containing this block.
    pub const fn chunk_z(&self) -> i32 {
        self.z >> 4
    }
}

impl From<[i32; 3]> for BlockPos {
    fn from([x, y, z]: [i32; 3]) -> Self {
        Self { x, y, z }
    }
}

impl From<BlockPos> for [i32; 3] {
    fn from(pos: BlockPos) -> Self {
        [pos.x, pos.y, pos.z]
    }
}

impl std::fmt::Display for BlockPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Non-negative shop price.
///
/// Wraps `f64` so observations can live in hash sets: equality and hashing
/// go through the bit pattern, with `-0.0` folded into `0.0`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(f64);

impl Price {
    /// Returns `None` for negative, NaN or infinite values.
    pub fn new(value: f64) -> Option<Self> {
        if value.is_finite() && value >= 0.0 {
            // folds -0.0
            Some(Self(value + 0.0))
        } else {
            None
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl PartialEq for Price {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for Price {}

impl Hash for Price {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl PartialOrd for Price {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Price {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One shop parsed from a sign.
///
/// Immutable once built; equality covers every field so two scans of an
/// unchanged chunk produce equal sets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Observation {
    pub owner: String,
    pub item: String,
    pub price: Price,
    pub amount: u32,
    pub dimension: Dimension,
    pub action: ShopAction,
    pub position: BlockPos,
}

impl Observation {
    /// Wire ordering: owner and item case-insensitively, then position, then
    /// action. The remaining comparisons only break ties so the order is total.
    pub fn wire_order(&self, other: &Self) -> Ordering {
        cmp_ignore_case(&self.owner, &other.owner)
            .then_with(|| cmp_ignore_case(&self.item, &other.item))
            .then_with(|| self.position.cmp(&other.position))
            .then_with(|| self.action.cmp(&other.action))
            .then_with(|| self.owner.cmp(&other.owner))
            .then_with(|| self.item.cmp(&other.item))
            .then_with(|| self.price.cmp(&other.price))
            .then_with(|| self.amount.cmp(&other.amount))
            .then_with(|| self.dimension.as_str().cmp(other.dimension.as_str()))
    }
}

fn cmp_ignore_case(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

//! Outbound scan batches

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Observation, RegionCoordinate};

/// One detected change for one chunk, ready to ship.
///
/// Serializes to the `POST /api/scans` body:
///
/// ```json
/// { "senderId": "...", "scanId": "uuid", "dimension": "overworld",
///   "chunkX": 0, "chunkZ": 0, "scannedAt": "2024-01-01T00:00:00Z",
///   "shops": [{ "owner": "...", "item": "...", "price": 50.0, "amount": 64,
///               "dimension": "overworld", "action": "sell", "position": [10, 64, -5] }] }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanBatch {
    pub sender_id: String,
    pub scan_id: Uuid,
    #[serde(flatten)]
    pub region: RegionCoordinate,
    pub scanned_at: DateTime<Utc>,
    /// Sorted with [`Observation::wire_order`].
    pub shops: Vec<Observation>,
}

impl ScanBatch {
    /// Build a batch with a fresh id and timestamp; `shops` is sorted here.
    pub fn new<I>(sender_id: &str, region: RegionCoordinate, shops: I) -> Self
    where
        I: IntoIterator<Item = Observation>,
    {
        let mut shops: Vec<Observation> = shops.into_iter().collect();
        shops.sort_by(Observation::wire_order);
        Self {
            sender_id: sender_id.to_string(),
            scan_id: Uuid::new_v4(),
            region,
            scanned_at: Utc::now(),
            shops,
        }
    }

    /// True when this batch tells the service the chunk has no shops.
    pub fn is_empty(&self) -> bool {
        self.shops.is_empty()
    }

    pub fn observed_count(&self) -> usize {
        self.shops.len()
    }
}

/// A batch waiting in the delivery queue, with its retry bookkeeping.
#[derive(Debug, Clone)]
pub struct PendingDelivery {
    pub batch: ScanBatch,
    /// Failed attempts so far.
    pub attempt: u32,
    /// Whether this was a "chunk is now empty" notification.
    pub empty: bool,
}

impl PendingDelivery {
    pub fn new(batch: ScanBatch) -> Self {
        let empty = batch.is_empty();
        Self {
            batch,
            attempt: 0,
            empty,
        }
    }

    /// Same batch, one more failure recorded.
    pub fn next_attempt(self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self
        }
    }
}

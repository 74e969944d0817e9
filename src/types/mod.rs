//! Shared data structures for the shop scanning pipeline
//!
//! - Observation: one shop parsed from a sign (owner, item, price, amount, action)
//! - RegionCoordinate: the chunk a set of observations belongs to
//! - ScanBatch: a detected change for one chunk, as sent to the service
//! - PendingDelivery: a ScanBatch plus retry bookkeeping

mod observation;
mod region;
mod scan;

pub use observation::*;
pub use region::*;
pub use scan::*;

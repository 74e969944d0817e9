//! Scan Pipeline Module
//!
//! ```text
//! extract ──► diff ──► gate ──► ScanBuffer ──► (tick) ──► DeliveryTransport
//! ```
//!
//! - **RegionSnapshotDiffer**: last accepted shop set per chunk, emits on change
//! - **ScanBuffer**: bounded FIFO between detection and delivery
//! - **ScanPipeline**: owns both plus the transport for one session

mod buffer;
mod coordinator;
mod differ;

pub use buffer::ScanBuffer;
pub use coordinator::{PipelineStats, ScanOutcome, ScanPipeline};
pub use differ::{RegionSnapshot, RegionSnapshotDiffer};

//! Pricebook Scanner: shop sign change detection and delivery
//!
//! Turns the sign text of loaded chunks into shop observations, detects which
//! chunks changed since they were last seen, and ships only those changes to
//! the pricebook service over an unreliable link.
//!
//! ## Architecture
//!
//! - **Acquisition**: sign parsing and the read-only region source seam
//! - **Pipeline**: per-chunk diffing, bounded buffering, session lifecycle
//! - **Transport**: HTTP sink, known-chunk cache, retry/backoff, bootstrap
//! - **Config**: TOML configuration with defaults and validation

pub mod acquisition;
pub mod config;
pub mod pipeline;
pub mod transport;
pub mod types;

// Re-export configuration
pub use config::ScannerConfig;

// Re-export commonly used types
pub use types::{
    BlockPos, Dimension, Observation, PendingDelivery, Price, RegionCoordinate, ScanBatch,
    ShopAction,
};

// Re-export pipeline components
pub use acquisition::{parse_sign, RawMarker, RegionSource, SnapshotRegionSource};
pub use pipeline::{PipelineStats, ScanOutcome, ScanPipeline};
pub use transport::{DeliveryError, DeliveryTransport, HttpScanSink, KnownRegionCache, ScanSink};

//! Transport: reliable delivery of scan batches to the pricebook service
//!
//! ## Architecture
//!
//! - **ScanSink**: the service as a trait; `HttpScanSink` is the reqwest implementation
//! - **KnownRegionCache**: chunks the service is believed to hold shops for
//! - **BackoffPolicy**: fixed or exponential delay between failed sends
//! - **DeliveryTransport**: single-in-flight queue with retry ceiling and stale-session guard
//! - **BootstrapSync**: paged inventory fetch that seeds the known-chunk cache
//!
//! ## Design Principles
//!
//! - Never block the host: sends run on the tokio runtime, callers only enqueue
//! - Bounded: failed batches are retried a fixed number of times, then dropped
//! - Quiet: empty chunks are only announced when the service thinks they have shops

pub mod backoff;
pub mod bootstrap;
pub mod client;
pub mod delivery;
pub mod known;

pub use backoff::{BackoffPolicy, ExponentialBackoff, FixedBackoff};
pub use bootstrap::{BootstrapReport, BootstrapSync};
pub use client::{DeliveryError, HttpScanSink, RegionPage, ScanSink};
pub use delivery::{DeliveryStats, DeliveryTransport};
pub use known::KnownRegionCache;

//! Scan Pipeline - session-scoped owner of the observe → deliver sequence
//!
//! ```text
//! PHASE 1: Extraction   (sign text → observations, per region)
//! PHASE 2: Diff         (skip regions whose shop set is unchanged)
//! PHASE 3: Gate         (skip empty regions the service holds nothing for)
//! PHASE 4: Buffer       (bounded, oldest batch dropped when full)
//! PHASE 5: Flush        (every flush_interval_ticks, into the transport)
//! PHASE 6: Delivery     (single in flight, retry with backoff)
//! ```
//!
//! One `ScanPipeline` lives for one connection. `connect()` seeds the
//! known-chunk cache from the service, `disconnect()` ships what is pending
//! and then drops every piece of session state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};

use super::buffer::ScanBuffer;
use super::differ::RegionSnapshotDiffer;
use crate::acquisition::{extract_region, RawMarker, RegionSource, RegionSourceError};
use crate::config::defaults::SHUTDOWN_GRACE_SECS;
use crate::config::ScannerConfig;
use crate::transport::{
    BootstrapReport, BootstrapSync, DeliveryError, DeliveryStats, DeliveryTransport,
    HttpScanSink, KnownRegionCache, ScanSink,
};
use crate::types::RegionCoordinate;

/// Poll period while waiting for the transport to drain on disconnect.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What happened to one region observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Scanning is switched off in the config.
    Disabled,
    /// Same shop set as last time.
    Unchanged,
    /// Region is empty and the service holds nothing for it. Nothing is
    /// remembered, so the next empty scan is gated again.
    SuppressedEmpty,
    /// A batch was buffered for delivery.
    Queued,
}

/// Pipeline counters plus the transport's own view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub observed: u64,
    pub emitted: u64,
    pub suppressed_empty: u64,
    pub evicted: u64,
    pub buffered: usize,
    pub tracked_regions: usize,
    pub known_regions: usize,
    pub delivery: DeliveryStats,
}

pub struct ScanPipeline {
    config: ScannerConfig,
    sink: Arc<dyn ScanSink>,
    differ: RegionSnapshotDiffer,
    buffer: ScanBuffer,
    transport: Arc<DeliveryTransport>,
    runtime: Handle,
    bootstrap: Mutex<Option<AbortHandle>>,
    shutdown_grace: Duration,
    ticks: AtomicU64,
    observed: AtomicU64,
    emitted: AtomicU64,
    suppressed_empty: AtomicU64,
    evicted: AtomicU64,
}

impl ScanPipeline {
    /// Build a pipeline around an arbitrary sink. Sends are spawned on `runtime`.
    pub fn new(config: ScannerConfig, sink: Arc<dyn ScanSink>, runtime: Handle) -> Self {
        let known = Arc::new(KnownRegionCache::new());
        let transport = DeliveryTransport::new(Arc::clone(&sink), known, runtime.clone())
            .with_backoff(config.delivery.backoff_policy())
            .with_max_attempts(config.delivery.max_attempts);

        info!(
            sender = %config.identity.sender_id,
            buffer = config.scanner.max_queued_scans,
            flush_ticks = config.scanner.flush_interval_ticks,
            max_attempts = config.delivery.max_attempts,
            "Initializing scan pipeline"
        );

        Self {
            differ: RegionSnapshotDiffer::new(&config.identity.sender_id),
            buffer: ScanBuffer::new(config.scanner.max_queued_scans),
            transport: Arc::new(transport),
            sink,
            runtime,
            bootstrap: Mutex::new(None),
            shutdown_grace: Duration::from_secs(SHUTDOWN_GRACE_SECS),
            ticks: AtomicU64::new(0),
            observed: AtomicU64::new(0),
            emitted: AtomicU64::new(0),
            suppressed_empty: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
            config,
        }
    }

    /// Build a pipeline that talks HTTP to `config.service.api_base_url`.
    pub fn from_config(config: ScannerConfig, runtime: Handle) -> Result<Self, DeliveryError> {
        let sink = HttpScanSink::new(
            &config.service.api_base_url,
            config.service.request_timeout(),
            config.service.connect_timeout(),
        )?;
        info!(url = %sink.base_url(), "Pricebook service configured");
        Ok(Self::new(config, Arc::new(sink), runtime))
    }

    /// How long `disconnect()` waits for pending deliveries.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    // ========================================================================
    // Session lifecycle
    // ========================================================================

    /// Start a session: seed the known-chunk cache from the service in the
    /// background. The returned handle resolves once the walk ends.
    pub fn connect(&self) -> JoinHandle<BootstrapReport> {
        info!(sender = %self.config.identity.sender_id, "Scan session started");
        let bootstrap = BootstrapSync::new(Arc::clone(&self.sink), Arc::clone(&self.transport))
            .with_page_size(self.config.service.bootstrap_page_size);
        let handle = self.runtime.spawn(async move { bootstrap.run().await });

        let previous = self
            .bootstrap
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(handle.abort_handle());
        if let Some(previous) = previous {
            previous.abort();
        }
        handle
    }

    /// End the session. Buffered batches are flushed and given up to the
    /// shutdown grace period to deliver; everything left is then discarded.
    pub async fn disconnect(&self) {
        let flushed = self.flush_now();
        let deadline = tokio::time::Instant::now() + self.shutdown_grace;

        while self.transport.pending_len() > 0 || self.transport.is_sending() {
            if tokio::time::Instant::now() >= deadline {
                warn!(
                    pending = self.transport.pending_len(),
                    "Shutdown grace period elapsed with scans still pending"
                );
                break;
            }
            self.transport.on_tick();
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }

        if let Some(bootstrap) = self.bootstrap.lock().unwrap_or_else(|e| e.into_inner()).take() {
            bootstrap.abort();
        }
        self.differ.reset_all();
        self.buffer.clear();
        self.transport.clear();
        self.ticks.store(0, Ordering::Relaxed);
        info!(flushed, "Scan session ended");
    }

    // ========================================================================
    // Host-facing scan calls
    // ========================================================================

    /// Feed the markers currently present in `region`.
    pub fn observe_region(&self, region: &RegionCoordinate, markers: &[RawMarker]) -> ScanOutcome {
        if !self.config.scanner.enabled {
            return ScanOutcome::Disabled;
        }
        self.observed.fetch_add(1, Ordering::Relaxed);

        let observations = extract_region(region, markers);
        let Some(batch) = self.differ.observe(region, observations) else {
            return ScanOutcome::Unchanged;
        };

        if batch.is_empty() && !self.transport.known().is_known_non_empty(region) {
            // No snapshot kept: the cache may learn about this chunk later
            // (bootstrap still paging), and the next empty scan must be
            // gated again rather than read as unchanged.
            self.differ.forget(region);
            self.suppressed_empty.fetch_add(1, Ordering::Relaxed);
            debug!(region = %region, "Empty chunk unknown to service, not reporting");
            return ScanOutcome::SuppressedEmpty;
        }

        self.emitted.fetch_add(1, Ordering::Relaxed);
        self.transport.note_queued(&batch);
        debug!(scan_id = %batch.scan_id, region = %region, shops = batch.observed_count(), "Chunk change buffered");
        if let Some(evicted) = self.buffer.enqueue(batch) {
            self.evicted.fetch_add(1, Ordering::Relaxed);
            self.transport.note_discarded(&evicted);
        }
        ScanOutcome::Queued
    }

    /// Read `region` from the host snapshot and observe it.
    pub fn scan_region(
        &self,
        source: &dyn RegionSource,
        region: &RegionCoordinate,
    ) -> Result<ScanOutcome, RegionSourceError> {
        if !self.config.scanner.enabled {
            return Ok(ScanOutcome::Disabled);
        }
        let markers = source.region_content(region)?;
        Ok(self.observe_region(region, &markers))
    }

    /// The host unloaded `region`; its next scan is reported unconditionally.
    pub fn forget_region(&self, region: &RegionCoordinate) {
        if self.differ.forget(region) {
            debug!(region = %region, "Forgot chunk snapshot");
        }
    }

    /// One host tick: pump retries and flush the buffer on schedule.
    pub fn tick(&self) {
        self.transport.on_tick();
        let ticks = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;
        let interval = u64::from(self.config.scanner.flush_interval_ticks.max(1));
        if ticks % interval == 0 {
            self.flush_now();
        }
    }

    /// Hand every buffered batch to the transport. Returns how many moved.
    pub fn flush_now(&self) -> usize {
        let batches = self.buffer.drain_all();
        let count = batches.len();
        if count > 0 {
            debug!(batches = count, "Flushing scan buffer");
            self.transport.submit(batches);
        }
        count
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            observed: self.observed.load(Ordering::Relaxed),
            emitted: self.emitted.load(Ordering::Relaxed),
            suppressed_empty: self.suppressed_empty.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            buffered: self.buffer.len(),
            tracked_regions: self.differ.tracked_regions(),
            known_regions: self.transport.known().len(),
            delivery: self.transport.stats(),
        }
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    pub fn transport(&self) -> &Arc<DeliveryTransport> {
        &self.transport
    }

    pub fn known(&self) -> &Arc<KnownRegionCache> {
        self.transport.known()
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

//! Delivery Transport: single-sender queue with retry and backoff
//!
//! Every batch moves through:
//!
//! ```text
//! Queued ──► Sending ──► Delivered
//!               │
//!               └──► Retrying ──► Queued      (attempt < max_attempts, after backoff)
//!                        └──► Exhausted       (dropped, logged at error)
//! ```
//!
//! At most one request is in flight. The in-flight slot holds a token that is
//! unique per send; `clear()` resets it, so a completion arriving after a
//! session reset finds a different token and is ignored.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::backoff::{BackoffPolicy, FixedBackoff};
use super::client::{DeliveryError, ScanSink};
use super::known::KnownRegionCache;
use crate::config::defaults::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RECONNECT_BACKOFF_SECS};
use crate::types::{PendingDelivery, RegionCoordinate, ScanBatch};

/// Value of the in-flight slot when nothing is being sent.
const IDLE: u64 = 0;

#[derive(Debug, Default)]
struct DeliveryState {
    queue: VecDeque<PendingDelivery>,
    next_attempt: Option<Instant>,
    consecutive_failures: u32,
    delivered: u64,
    retried: u64,
    dropped: u64,
}

/// Point-in-time view of the transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    pub queued: usize,
    pub in_flight: bool,
    pub delivered: u64,
    pub retried: u64,
    pub dropped: u64,
    pub consecutive_failures: u32,
}

pub struct DeliveryTransport {
    sink: Arc<dyn ScanSink>,
    known: Arc<KnownRegionCache>,
    backoff: Arc<dyn BackoffPolicy>,
    max_attempts: u32,
    runtime: Handle,
    state: Mutex<DeliveryState>,
    in_flight: AtomicU64,
    next_token: AtomicU64,
    generation: AtomicU64,
}

impl DeliveryTransport {
    /// Create a transport with the default fixed backoff and attempt ceiling.
    ///
    /// Sends are spawned on `runtime`; none of the public methods block.
    pub fn new(sink: Arc<dyn ScanSink>, known: Arc<KnownRegionCache>, runtime: Handle) -> Self {
        Self {
            sink,
            known,
            backoff: Arc::new(FixedBackoff::new(Duration::from_secs(
                DEFAULT_RECONNECT_BACKOFF_SECS,
            ))),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            runtime,
            state: Mutex::new(DeliveryState::default()),
            in_flight: AtomicU64::new(IDLE),
            next_token: AtomicU64::new(IDLE),
            generation: AtomicU64::new(0),
        }
    }

    pub fn with_backoff(mut self, backoff: Arc<dyn BackoffPolicy>) -> Self {
        self.backoff = backoff;
        self
    }

    /// Total sends per batch before it is dropped. Clamped to at least 1.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Record that a non-empty batch for this chunk is on its way.
    ///
    /// Called when the batch enters the scan buffer, so an empty scan of the
    /// same chunk that follows before delivery is not suppressed. The hold
    /// lasts until the batch is delivered, dropped or evicted.
    pub fn note_queued(&self, batch: &ScanBatch) {
        if !batch.is_empty() {
            self.known.hold(&batch.region, batch.scan_id);
        }
    }

    /// A batch noted with `note_queued` will never reach the transport.
    pub fn note_discarded(&self, batch: &ScanBatch) {
        if !batch.is_empty() {
            self.known.release(&batch.region, batch.scan_id);
        }
    }

    /// Queue batches for delivery and kick the sender. Fire-and-forget.
    pub fn submit(self: &Arc<Self>, batches: Vec<ScanBatch>) {
        if batches.is_empty() {
            return;
        }
        {
            let mut state = self.lock_state();
            for batch in batches {
                self.note_queued(&batch);
                debug!(scan_id = %batch.scan_id, region = %batch.region, shops = batch.observed_count(), "Scan queued for delivery");
                state.queue.push_back(PendingDelivery::new(batch));
            }
        }
        self.process_queue();
    }

    /// Periodic pump: starts the next send once any backoff has elapsed.
    pub fn on_tick(self: &Arc<Self>) {
        self.process_queue();
    }

    /// Discard queued and retrying batches and the known-chunk cache.
    ///
    /// An in-flight request is not aborted; its completion is ignored.
    pub fn clear(&self) {
        let mut state = self.lock_state();
        let discarded = state.queue.len();
        state.queue.clear();
        state.next_attempt = None;
        state.consecutive_failures = 0;
        self.in_flight.store(IDLE, Ordering::Release);
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.known.clear();
        if discarded > 0 {
            info!(discarded, "Delivery transport cleared");
        } else {
            debug!("Delivery transport cleared");
        }
    }

    /// Session generation, bumped by every `clear()`.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Seed the known-chunk cache, unless the session has moved on since
    /// `generation` was read. Returns the number of new entries.
    pub fn seed_known(&self, generation: u64, regions: Vec<RegionCoordinate>) -> Option<usize> {
        let _state = self.lock_state();
        if self.generation() != generation {
            return None;
        }
        Some(self.known.seed(regions))
    }

    pub fn known(&self) -> &Arc<KnownRegionCache> {
        &self.known
    }

    pub fn pending_len(&self) -> usize {
        self.lock_state().queue.len()
    }

    pub fn is_sending(&self) -> bool {
        self.in_flight.load(Ordering::Acquire) != IDLE
    }

    /// Earliest time the next send may start, if backing off.
    pub fn next_attempt(&self) -> Option<Instant> {
        self.lock_state().next_attempt
    }

    pub fn stats(&self) -> DeliveryStats {
        let state = self.lock_state();
        DeliveryStats {
            queued: state.queue.len(),
            in_flight: self.is_sending(),
            delivered: state.delivered,
            retried: state.retried,
            dropped: state.dropped,
            consecutive_failures: state.consecutive_failures,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, DeliveryState> {
        self.state.lock().unwrap_or_else(|e| {
            warn!("Delivery state mutex poisoned, recovering");
            e.into_inner()
        })
    }

    fn process_queue(self: &Arc<Self>) {
        let (token, pending) = {
            let mut state = self.lock_state();
            if let Some(at) = state.next_attempt {
                if Instant::now() < at {
                    return;
                }
                state.next_attempt = None;
            }
            if self.in_flight.load(Ordering::Acquire) != IDLE {
                return;
            }
            let Some(pending) = state.queue.pop_front() else {
                return;
            };
            let token = self.next_token.fetch_add(1, Ordering::Relaxed).wrapping_add(1).max(1);
            self.in_flight.store(token, Ordering::Release);
            (token, pending)
        };
        self.spawn_send(token, pending);
    }

    fn spawn_send(self: &Arc<Self>, token: u64, pending: PendingDelivery) {
        let this = Arc::clone(self);
        self.runtime.spawn(async move {
            let sink = Arc::clone(&this.sink);
            let batch = pending.batch.clone();
            // A panicking sink counts as a failed send.
            let result = match tokio::spawn(async move { sink.send_scan(&batch).await }).await {
                Ok(result) => result,
                Err(e) => Err(DeliveryError::Unavailable(format!("send task failed: {e}"))),
            };
            this.complete(token, pending, result);
        });
    }

    fn complete(
        self: &Arc<Self>,
        token: u64,
        pending: PendingDelivery,
        result: Result<(), DeliveryError>,
    ) {
        {
            let mut state = self.lock_state();
            if self.in_flight.load(Ordering::Acquire) != token {
                debug!(scan_id = %pending.batch.scan_id, "Ignoring completion from a cleared session");
                return;
            }

            let scan_id = pending.batch.scan_id;
            let region = pending.batch.region.clone();
            match result {
                Ok(()) => {
                    if !pending.empty {
                        self.known.mark_non_empty(region.clone());
                        self.known.release(&region, scan_id);
                    } else if !self.known.settle_empty(&region) {
                        debug!(region = %region, "Newer shops queued for chunk, keeping it known");
                    }
                    state.consecutive_failures = 0;
                    state.delivered += 1;
                    debug!(scan_id = %scan_id, region = %region, empty = pending.empty, attempt = pending.attempt, "Delivered scan");
                }
                Err(e) => {
                    state.consecutive_failures = state.consecutive_failures.saturating_add(1);
                    if pending.attempt + 1 >= self.max_attempts {
                        state.dropped += 1;
                        self.note_discarded(&pending.batch);
                        error!(
                            scan_id = %scan_id,
                            region = %region,
                            attempts = pending.attempt + 1,
                            error = %e,
                            "Exceeded retry attempts for scan, dropping"
                        );
                    } else {
                        let delay = self.backoff.delay(state.consecutive_failures);
                        state.next_attempt = Some(Instant::now() + delay);
                        state.retried += 1;
                        warn!(
                            scan_id = %scan_id,
                            region = %region,
                            attempt = pending.attempt + 1,
                            retry_in_ms = delay.as_millis() as u64,
                            error = %e,
                            "Failed to send scan, will retry"
                        );
                        state.queue.push_back(pending.next_attempt());
                    }
                }
            }
            self.in_flight.store(IDLE, Ordering::Release);
        }
        self.process_queue();
    }
}

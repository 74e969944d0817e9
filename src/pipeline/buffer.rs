//! Scan Buffer: bounded hand-off between change detection and delivery
//!
//! Fixed-capacity FIFO of pending scan batches. When full, the oldest batch
//! is dropped to make room: a dropped intermediate state is re-derived the
//! next time its chunk is scanned.

use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::debug;

use crate::types::ScanBatch;

pub struct ScanBuffer {
    queue: Mutex<VecDeque<ScanBatch>>,
    capacity: usize,
}

impl ScanBuffer {
    /// Capacity is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Append a batch, evicting (and returning) the oldest one when full.
    pub fn enqueue(&self, batch: ScanBatch) -> Option<ScanBatch> {
        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        let evicted = if queue.len() >= self.capacity {
            queue.pop_front()
        } else {
            None
        };
        if let Some(ref old) = evicted {
            debug!(scan_id = %old.scan_id, region = %old.region, "Scan buffer full, dropped oldest batch");
        }
        queue.push_back(batch);
        evicted
    }

    /// Take everything, oldest first.
    pub fn drain_all(&self) -> Vec<ScanBatch> {
        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        queue.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

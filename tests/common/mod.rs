//! Shared test doubles for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use pricebook_scanner::transport::{DeliveryError, RegionPage, ScanSink};
use pricebook_scanner::{BlockPos, RawMarker, RegionCoordinate, ScanBatch};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

/// How the next `send_scan` call behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Ok,
    Fail,
    Panic,
}

/// In-memory sink with scripted results. Unscripted sends succeed.
#[derive(Default)]
pub struct ScriptedSink {
    steps: Mutex<VecDeque<Step>>,
    default_step: Mutex<Option<Step>>,
    pages: Mutex<VecDeque<Result<RegionPage, DeliveryError>>>,
    attempts: Mutex<Vec<ScanBatch>>,
    page_requests: Mutex<Vec<(usize, usize)>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    send_gate: Option<Arc<Semaphore>>,
    fetch_gate: Option<Arc<Semaphore>>,
}

impl ScriptedSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends block until a permit is added to the returned semaphore.
    pub fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let sink = Self {
            send_gate: Some(Arc::clone(&gate)),
            ..Self::default()
        };
        (sink, gate)
    }

    /// Page fetches block until a permit is added to the returned semaphore.
    pub fn gated_fetch() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let sink = Self {
            fetch_gate: Some(Arc::clone(&gate)),
            ..Self::default()
        };
        (sink, gate)
    }

    pub fn script(self, steps: &[Step]) -> Self {
        self.steps.lock().unwrap().extend(steps.iter().copied());
        self
    }

    /// Behaviour once the script is used up.
    pub fn otherwise(self, step: Step) -> Self {
        *self.default_step.lock().unwrap() = Some(step);
        self
    }

    pub fn page(self, page: Result<RegionPage, DeliveryError>) -> Self {
        self.pages.lock().unwrap().push_back(page);
        self
    }

    /// Every batch handed to `send_scan`, including failed attempts.
    pub fn attempts(&self) -> Vec<ScanBatch> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    pub fn page_requests(&self) -> Vec<(usize, usize)> {
        self.page_requests.lock().unwrap().clone()
    }

    pub fn max_concurrent_sends(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ScanSink for ScriptedSink {
    async fn send_scan(&self, batch: &ScanBatch) -> Result<(), DeliveryError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        let _active = ActiveGuard(&self.active);
        self.max_active.fetch_max(now, Ordering::SeqCst);
        self.attempts.lock().unwrap().push(batch.clone());

        if let Some(gate) = &self.send_gate {
            gate.acquire().await.unwrap().forget();
        }

        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .or(*self.default_step.lock().unwrap())
            .unwrap_or(Step::Ok);
        match step {
            Step::Ok => Ok(()),
            Step::Fail => Err(DeliveryError::Unavailable("scripted failure".to_string())),
            Step::Panic => panic!("scripted sink panic"),
        }
    }

    async fn fetch_regions(&self, offset: usize, limit: usize) -> Result<RegionPage, DeliveryError> {
        self.page_requests.lock().unwrap().push((offset, limit));
        if let Some(gate) = &self.fetch_gate {
            gate.acquire().await.unwrap().forget();
        }
        self.pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(RegionPage::default()))
    }
}

/// Let every runnable task finish. With a paused clock this advances time
/// by at most one millisecond.
pub async fn settle() {
    for _ in 0..4 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

pub fn region(x: i32, z: i32) -> RegionCoordinate {
    RegionCoordinate::from_raw("overworld", x, z)
}

pub fn batch(x: i32, shops: usize) -> ScanBatch {
    let shops = (0..shops).map(|i| {
        let marker = sign(x * 16 + i as i32, 64, 0, "Alice", "Selling 64", "Diamond", "50");
        pricebook_scanner::parse_sign(&marker.lines, marker.position, &pricebook_scanner::Dimension::Overworld)
            .unwrap()
    });
    ScanBatch::new("tester", region(x, 0), shops)
}

pub fn sign(x: i32, y: i32, z: i32, owner: &str, status: &str, item: &str, price: &str) -> RawMarker {
    RawMarker::new(BlockPos::new(x, y, z), [owner, status, item, price])
}

pub fn page(regions: &[RegionCoordinate], entries: usize) -> Result<RegionPage, DeliveryError> {
    Ok(RegionPage {
        regions: regions.to_vec(),
        entries,
    })
}

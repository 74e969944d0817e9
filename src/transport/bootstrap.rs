//! Bootstrap sync: seeds the known-chunk cache from the service at startup
//!
//! Pages through `GET /api/chunks` so a freshly started client does not
//! re-announce chunks the service already knows about. Any failure just ends
//! the walk: the cache keeps whatever was loaded so far, which at worst costs
//! a few redundant "chunk is empty" messages later.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::client::ScanSink;
use super::delivery::DeliveryTransport;
use crate::config::defaults::{BOOTSTRAP_MAX_PAGES, DEFAULT_BOOTSTRAP_PAGE_SIZE};

/// Outcome of a bootstrap walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    pub pages: usize,
    pub regions_seeded: usize,
    pub skipped_entries: usize,
    /// The walk ended on an error rather than a short page.
    pub failed: bool,
    /// The session was cleared mid-walk and results were discarded.
    pub stale: bool,
}

pub struct BootstrapSync {
    sink: Arc<dyn ScanSink>,
    transport: Arc<DeliveryTransport>,
    page_size: usize,
    max_pages: usize,
}

impl BootstrapSync {
    pub fn new(sink: Arc<dyn ScanSink>, transport: Arc<DeliveryTransport>) -> Self {
        Self {
            sink,
            transport,
            page_size: DEFAULT_BOOTSTRAP_PAGE_SIZE,
            max_pages: BOOTSTRAP_MAX_PAGES,
        }
    }

    /// Page size requested from the service. Clamped to at least 1.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Walk the inventory until a short page, an error or the page ceiling.
    pub async fn run(&self) -> BootstrapReport {
        let generation = self.transport.generation();
        let mut report = BootstrapReport::default();
        let mut offset = 0usize;
        let mut exhausted = false;

        debug!(page_size = self.page_size, "Bootstrapping known chunks from service");

        while report.pages < self.max_pages {
            let page = match self.sink.fetch_regions(offset, self.page_size).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(error = %e, offset, "Failed to fetch chunk bootstrap data");
                    report.failed = true;
                    break;
                }
            };
            report.pages += 1;
            report.skipped_entries += page.entries.saturating_sub(page.regions.len());

            let entries = page.entries;
            match self.transport.seed_known(generation, page.regions) {
                Some(added) => report.regions_seeded += added,
                None => {
                    debug!("Session cleared during bootstrap, discarding results");
                    report.stale = true;
                    break;
                }
            }

            if entries < self.page_size {
                exhausted = true;
                break;
            }
            offset += entries;
        }

        if !exhausted && !report.failed && !report.stale {
            warn!(pages = report.pages, "Chunk bootstrap hit the page ceiling");
        }
        if !report.stale {
            info!(
                regions = report.regions_seeded,
                pages = report.pages,
                skipped = report.skipped_entries,
                "Loaded known chunks from service"
            );
        }
        report
    }
}

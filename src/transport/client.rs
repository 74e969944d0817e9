//! Scan Sink: the pricebook service as seen by the delivery transport
//!
//! [`ScanSink`] is the seam between retry/backoff policy and the wire.
//! [`HttpScanSink`] is the production implementation over reqwest; tests swap
//! in scripted sinks.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::types::{RegionCoordinate, ScanBatch};

/// Delivery errors
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Server returned status {status}: {body}")]
    ServerError {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid base URL '{0}'")]
    InvalidBaseUrl(String),
    #[error("Sink unavailable: {0}")]
    Unavailable(String),
}

/// One page of the service's chunk inventory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionPage {
    /// Entries that parsed cleanly.
    pub regions: Vec<RegionCoordinate>,
    /// Raw entries in the page, malformed ones included.
    pub entries: usize,
}

/// Where scan batches go.
#[async_trait]
pub trait ScanSink: Send + Sync + 'static {
    /// Deliver one batch. `Ok` only on a 2xx response.
    async fn send_scan(&self, batch: &ScanBatch) -> Result<(), DeliveryError>;

    /// Fetch one page of chunks the service holds shops for.
    async fn fetch_regions(&self, offset: usize, limit: usize) -> Result<RegionPage, DeliveryError>;
}

/// Parse a `{ "chunks": [{ "dimension", "chunkX", "chunkZ" }, ...] }` body.
///
/// Malformed entries are skipped; a body that is valid JSON but not the
/// expected shape yields an empty page. Only unparseable JSON is an error.
pub fn parse_region_inventory(body: &str) -> Result<RegionPage, DeliveryError> {
    let root: serde_json::Value = serde_json::from_str(body)?;
    let Some(chunks) = root.get("chunks").and_then(|c| c.as_array()) else {
        return Ok(RegionPage::default());
    };

    let regions = chunks
        .iter()
        .filter_map(|entry| match serde_json::from_value::<RegionCoordinate>(entry.clone()) {
            Ok(region) => Some(region),
            Err(e) => {
                debug!(error = %e, "Skipping malformed chunk entry");
                None
            }
        })
        .collect();

    Ok(RegionPage {
        regions,
        entries: chunks.len(),
    })
}

/// Normalize a configured base URL: trim, drop trailing slashes, require a
/// scheme and host.
pub fn normalize_base_url(raw: &str) -> Result<String, DeliveryError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let parsed = reqwest::Url::parse(trimmed)
        .map_err(|_| DeliveryError::InvalidBaseUrl(raw.to_string()))?;
    if parsed.host_str().is_none() || !matches!(parsed.scheme(), "http" | "https") {
        return Err(DeliveryError::InvalidBaseUrl(raw.to_string()));
    }
    Ok(trimmed.to_string())
}

/// HTTP client for the pricebook service
#[derive(Clone)]
pub struct HttpScanSink {
    http: reqwest::Client,
    base_url: String,
}

impl HttpScanSink {
    pub fn new(
        base_url: &str,
        request_timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, DeliveryError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: normalize_base_url(base_url)?,
        })
    }

    /// Get base URL for logging
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ScanSink for HttpScanSink {
    async fn send_scan(&self, batch: &ScanBatch) -> Result<(), DeliveryError> {
        let resp = self
            .http
            .post(format!("{}/api/scans", self.base_url))
            .header("Accept", "application/json")
            .json(batch)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(DeliveryError::ServerError { status, body })
        }
    }

    async fn fetch_regions(&self, offset: usize, limit: usize) -> Result<RegionPage, DeliveryError> {
        let resp = self
            .http
            .get(format!("{}/api/chunks", self.base_url))
            .header("Accept", "application/json")
            .query(&[("offset", offset), ("limit", limit)])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DeliveryError::ServerError { status, body });
        }

        let body = resp.text().await?;
        parse_region_inventory(&body)
    }
}

//! System-wide default constants.
//!
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Service
// ============================================================================

/// Base URL used when none (or an invalid one) is configured.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:49876";

/// Whole-request timeout for service calls (seconds).
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// TCP connect timeout for service calls (seconds).
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

// ============================================================================
// Scanner
// ============================================================================

/// Host ticks between scan buffer flushes. 600 ticks = 30 s at 20 TPS.
pub const DEFAULT_FLUSH_INTERVAL_TICKS: u32 = 600;

/// Scan buffer capacity (batches).
pub const DEFAULT_MAX_QUEUED_SCANS: usize = 128;

// ============================================================================
// Delivery
// ============================================================================

/// Sends per batch before it is dropped.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Base delay after a failed send (seconds).
pub const DEFAULT_RECONNECT_BACKOFF_SECS: u64 = 5;

/// Cap for exponential backoff (seconds).
pub const DEFAULT_MAX_BACKOFF_SECS: u64 = 300;

/// Random jitter added to exponential backoff (seconds).
pub const DEFAULT_BACKOFF_JITTER_SECS: u64 = 2;

// ============================================================================
// Bootstrap
// ============================================================================

/// Chunks requested per bootstrap page.
pub const DEFAULT_BOOTSTRAP_PAGE_SIZE: usize = 256;

/// Hard stop for the bootstrap walk. 4 096 pages × 256 = ~1M chunks.
pub const BOOTSTRAP_MAX_PAGES: usize = 4_096;

// ============================================================================
// Replay driver
// ============================================================================

/// Tick period of the headless driver (milliseconds). 50 ms = 20 TPS.
pub const DEFAULT_TICK_MS: u64 = 50;

/// How long the driver waits for in-flight deliveries on shutdown (seconds).
pub const SHUTDOWN_GRACE_SECS: u64 = 10;

/// How long the driver waits for the known-chunk bootstrap before replaying
/// (seconds).
pub const BOOTSTRAP_WAIT_SECS: u64 = 30;

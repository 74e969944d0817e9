//! Scanner Configuration Module
//!
//! Sender identity, service endpoint and delivery tuning loaded from TOML.
//!
//! ## Loading Order
//!
//! 1. `PRICEBOOK_CONFIG` environment variable (path to TOML file)
//! 2. `pricebook.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! The config is an ordinary value handed to the pipeline at construction:
//!
//! ```ignore
//! let config = ScannerConfig::load();
//! let pipeline = ScanPipeline::from_config(config, Handle::current())?;
//! ```

mod scanner_config;
pub mod defaults;

pub use scanner_config::*;

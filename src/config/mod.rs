//! # Request Tracker Configuration
//!
//! YAML-based configuration with environment overrides, loaded once at process
//! start and shared read-only.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use request_tracker::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let pool = manager.config().tracking.max_concurrent_trees;
//! let deadline = manager.config().tracking.request_timeout();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::classification::{ClassificationConfig, ClassificationTable};
use crate::constants::{data_types, system};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring tracker-config.yaml
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Tree walk limits and worker pool sizing
    pub tracking: TrackingConfig,

    /// Status → stage table
    pub classification: ClassificationConfig,

    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Root-sample trees built concurrently per request
    pub max_concurrent_trees: usize,
    /// Time budget for one request evaluation
    pub request_timeout_ms: u64,
    /// Deepest lineage level walked below a root sample
    pub max_tree_depth: usize,
    /// Data type of lineage records
    pub sample_record_type: String,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            max_concurrent_trees: system::MAX_CONCURRENT_TREES,
            request_timeout_ms: system::REQUEST_TIMEOUT_MS,
            max_tree_depth: system::MAX_TREE_DEPTH,
            sample_record_type: data_types::SAMPLE.to_string(),
        }
    }
}

impl TrackingConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when RUST_LOG is not set
    pub level: Option<String>,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl TrackerConfig {
    /// Check cross-field constraints serde cannot express
    pub fn validate(&self) -> ConfigResult<()> {
        if self.tracking.max_concurrent_trees == 0 {
            return Err(ConfigurationError::invalid_value(
                "tracking.max_concurrent_trees",
                "0",
                "at least one tree worker is required",
            ));
        }
        if self.tracking.request_timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "tracking.request_timeout_ms",
                "0",
                "deadline must be positive",
            ));
        }
        if self.tracking.max_tree_depth == 0 {
            return Err(ConfigurationError::invalid_value(
                "tracking.max_tree_depth",
                "0",
                "root samples must be walkable",
            ));
        }
        if self.tracking.sample_record_type.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "tracking.sample_record_type",
                self.tracking.sample_record_type.clone(),
                "must name a data type",
            ));
        }
        ClassificationTable::from_config(&self.classification).map(|_| ())
    }
}

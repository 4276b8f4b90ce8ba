#![allow(dead_code)]

pub mod builders;
pub mod strategies;

pub use builders::*;

use request_tracker::config::{ConfigManager, TrackerConfig};
use std::sync::Arc;

/// Configuration with built-in defaults and the given overrides applied
pub fn test_config(configure: impl FnOnce(&mut TrackerConfig)) -> Arc<ConfigManager> {
    let mut config = TrackerConfig::default();
    configure(&mut config);
    ConfigManager::from_config_with_env(config, "test").expect("test configuration should be valid")
}

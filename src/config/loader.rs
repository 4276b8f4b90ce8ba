//! Configuration Loader
//!
//! Environment-aware loading: a base `tracker-config.yaml` plus optional
//! per-environment sections (`development`, `test`, `production`) that are
//! deep-merged over the base before deserialization.

use super::error::{ConfigResult, ConfigurationError};
use super::TrackerConfig;
use crate::classification::{ClassificationTable, StageClassifier};
use serde_yaml::Value as YamlValue;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const CONFIG_FILE_NAMES: &[&str] = &["tracker-config.yaml", "tracker-config.yml"];
const ENVIRONMENTS: &[&str] = &["development", "test", "production"];
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

/// Loaded, validated configuration plus the classification table built from it
#[derive(Debug)]
pub struct ConfigManager {
    config: TrackerConfig,
    environment: String,
    config_directory: Option<PathBuf>,
    classification: Arc<ClassificationTable>,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment.
    /// Useful for testing without modifying global environment variables.
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(|| PathBuf::from("config"));

        debug!(
            environment = environment,
            directory = %config_directory.display(),
            "Loading tracker configuration"
        );

        let config = Self::load_and_merge_config(&config_directory, environment)?;
        let manager = Self::build(config, environment, Some(config_directory))?;

        info!(
            environment = environment,
            max_concurrent_trees = manager.config.tracking.max_concurrent_trees,
            request_timeout_ms = manager.config.tracking.request_timeout_ms,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(manager))
    }

    /// Wrap an in-memory configuration (embedding, tests)
    pub fn from_config(config: TrackerConfig) -> ConfigResult<Arc<ConfigManager>> {
        Self::from_config_with_env(config, &Self::detect_environment())
    }

    pub fn from_config_with_env(
        config: TrackerConfig,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        Ok(Arc::new(Self::build(config, environment, None)?))
    }

    fn build(
        config: TrackerConfig,
        environment: &str,
        config_directory: Option<PathBuf>,
    ) -> ConfigResult<ConfigManager> {
        config.validate()?;
        let classification = Arc::new(ClassificationTable::from_config(&config.classification)?);
        Ok(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
            classification,
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> Option<&Path> {
        self.config_directory.as_deref()
    }

    /// Classifier sharing the table loaded at startup
    pub fn classifier(&self) -> StageClassifier {
        StageClassifier::new(Arc::clone(&self.classification))
    }

    /// Detect current environment: TRACKER_ENV || APP_ENV || 'development'
    pub fn detect_environment() -> String {
        env::var("TRACKER_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    fn find_config_file(config_directory: &Path) -> ConfigResult<PathBuf> {
        let mut searched_paths = Vec::new();

        for name in CONFIG_FILE_NAMES {
            let config_path = config_directory.join(name);
            searched_paths.push(config_path.clone());

            if config_path.exists() {
                debug!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        Err(ConfigurationError::config_file_not_found(searched_paths))
    }

    fn read_config_file_safely(path: &Path) -> ConfigResult<String> {
        let metadata = std::fs::metadata(path)
            .map_err(|e| ConfigurationError::file_read_error(path.display().to_string(), e))?;

        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigurationError::invalid_value(
                "file_size",
                metadata.len().to_string(),
                format!("Configuration file larger than {MAX_CONFIG_FILE_SIZE} bytes"),
            ));
        }

        if !metadata.is_file() {
            return Err(ConfigurationError::invalid_value(
                "file_type",
                "directory or special file",
                "Configuration path must point to a regular file",
            ));
        }

        std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::file_read_error(path.display().to_string(), e))
    }

    fn load_and_merge_config(
        config_directory: &Path,
        environment: &str,
    ) -> ConfigResult<TrackerConfig> {
        let config_file = Self::find_config_file(config_directory)?;
        let yaml_content = Self::read_config_file_safely(&config_file)?;
        Self::parse_with_environment(&yaml_content, environment)
            .map_err(|e| match e {
                ConfigurationError::InvalidYaml { error, .. } => {
                    ConfigurationError::invalid_yaml(config_file.display().to_string(), error)
                }
                other => other,
            })
    }

    /// Parse YAML text and apply the overrides for `environment`
    pub fn parse_with_environment(
        yaml_content: &str,
        environment: &str,
    ) -> ConfigResult<TrackerConfig> {
        let mut yaml_data: YamlValue = if yaml_content.trim().is_empty() {
            YamlValue::Mapping(Default::default())
        } else {
            serde_yaml::from_str(yaml_content)
                .map_err(|e| ConfigurationError::invalid_yaml("<inline>", e))?
        };

        if let Some(env_overrides) = yaml_data
            .get(YamlValue::String(environment.to_string()))
            .cloned()
        {
            debug!(environment = environment, "Applying environment-specific overrides");
            Self::merge_yaml_values(&mut yaml_data, env_overrides)
                .map_err(|e| ConfigurationError::environment_override(environment, e))?;
        }

        if let YamlValue::Mapping(ref mut map) = yaml_data {
            for name in ENVIRONMENTS {
                map.remove(YamlValue::String((*name).to_string()));
            }
        }

        serde_yaml::from_value(yaml_data).map_err(|e| {
            ConfigurationError::invalid_yaml(
                "<inline>",
                format!("Failed to deserialize configuration: {e}"),
            )
        })
    }

    /// Recursively merge YAML values (environment overrides into base config)
    fn merge_yaml_values(base: &mut YamlValue, override_value: YamlValue) -> Result<(), String> {
        match (&mut *base, override_value) {
            (YamlValue::Mapping(base_map), YamlValue::Mapping(override_map)) => {
                for (key, value) in override_map {
                    if let Some(existing_value) = base_map.get_mut(&key) {
                        Self::merge_yaml_values(existing_value, value)?;
                    } else {
                        base_map.insert(key, value);
                    }
                }
            }
            (YamlValue::Mapping(_), other) => {
                return Err(format!(
                    "cannot merge non-mapping override {other:?} into a section"
                ));
            }
            (base_ref, override_val) => {
                *base_ref = override_val;
            }
        }
        Ok(())
    }
}

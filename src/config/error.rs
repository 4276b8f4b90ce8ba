//! Errors raised while loading the tracker configuration or building the
//! classification table from it.

use std::path::PathBuf;
use thiserror::Error;

pub type ConfigResult<T> = std::result::Result<T, ConfigurationError>;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("No tracker configuration found. Searched paths: {searched_paths:?}")]
    ConfigFileNotFound { searched_paths: Vec<PathBuf> },

    #[error("Tracker configuration '{file_path}' could not be read: {error}")]
    FileReadError { file_path: String, error: String },

    #[error("Invalid YAML in tracker configuration '{file_path}': {error}")]
    InvalidYaml { file_path: String, error: String },

    /// A section of the `environment` block does not line up with the base layout
    #[error("Overrides for environment '{environment}' could not be applied: {error}")]
    EnvironmentOverride { environment: String, error: String },

    /// A parsed value is outside what the tracker accepts (zero worker counts,
    /// empty record types, status keys that map to a sentinel stage, ...)
    #[error("Invalid value '{value}' for '{field}': {context}")]
    InvalidValue {
        field: String,
        value: String,
        context: String,
    },
}

impl ConfigurationError {
    pub fn config_file_not_found(searched_paths: Vec<PathBuf>) -> Self {
        Self::ConfigFileNotFound { searched_paths }
    }

    pub fn file_read_error<P: Into<String>>(file_path: P, error: std::io::Error) -> Self {
        Self::FileReadError {
            file_path: file_path.into(),
            error: error.to_string(),
        }
    }

    pub fn invalid_yaml<P: Into<String>, E: std::fmt::Display>(file_path: P, error: E) -> Self {
        Self::InvalidYaml {
            file_path: file_path.into(),
            error: error.to_string(),
        }
    }

    pub fn environment_override<N: Into<String>, E: Into<String>>(environment: N, error: E) -> Self {
        Self::EnvironmentOverride {
            environment: environment.into(),
            error: error.into(),
        }
    }

    pub fn invalid_value<F: Into<String>, V: Into<String>, C: Into<String>>(
        field: F,
        value: V,
        context: C,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            context: context.into(),
        }
    }
}

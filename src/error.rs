//! Error types for request tracking.
//!
//! Two layers: [`RecordStoreError`] is what a [`crate::record_store::RecordStore`]
//! reports for a single lookup, [`TrackerError`] is what a caller of
//! [`crate::request::RequestTracker`] sees.

use crate::config::ConfigurationError;
use crate::record_store::RecordId;
use thiserror::Error;

/// Failure of a single record store operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordStoreError {
    #[error("Record not found: {record}")]
    NotFound { record: String },
    #[error("Communication error reading {record}: {reason}")]
    Communication { record: String, reason: String },
}

impl RecordStoreError {
    pub fn not_found(record: impl Into<String>) -> Self {
        Self::NotFound {
            record: record.into(),
        }
    }

    pub fn communication(record: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Communication {
            record: record.into(),
            reason: reason.into(),
        }
    }

    pub fn for_record(record: &RecordId, reason: impl Into<String>) -> Self {
        Self::communication(record.to_string(), reason)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackerError {
    #[error("Record not found: {record}")]
    RecordNotFound { record: String },
    #[error("Record access error for {record}: {reason}")]
    RecordAccess { record: String, reason: String },
    #[error("Timed out tracking request {request_id} after {elapsed_ms}ms")]
    Timeout { request_id: String, elapsed_ms: u64 },
    /// A root sample could not be read before the deadline
    #[error("Timed out reading sample {record} after {elapsed_ms}ms")]
    SampleTimeout { record: String, elapsed_ms: u64 },
    #[error("Aggregation inconsistency: {0}")]
    AggregationInconsistency(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Worker error: {0}")]
    Worker(String),
}

impl From<RecordStoreError> for TrackerError {
    fn from(error: RecordStoreError) -> Self {
        match error {
            RecordStoreError::NotFound { record } => TrackerError::RecordNotFound { record },
            RecordStoreError::Communication { record, reason } => {
                TrackerError::RecordAccess { record, reason }
            }
        }
    }
}

impl From<ConfigurationError> for TrackerError {
    fn from(error: ConfigurationError) -> Self {
        TrackerError::Configuration(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;

//! # Record Store Boundary
//!
//! The only I/O the tracker performs goes through [`RecordStore`]. Implementations
//! wrap whatever LIMS client the host process holds; [`InMemoryRecordStore`] backs
//! tests, fixtures and the CLI.
//!
//! Every operation may fail with [`RecordStoreError`]. An empty child list is a
//! valid, non-error answer.

pub mod memory;

use crate::error::RecordStoreError;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

pub use memory::{FixtureRecord, InMemoryRecordStore, RecordFixture, StoreOperation};

pub type StoreResult<T> = std::result::Result<T, RecordStoreError>;

/// Opaque record identifier issued by the record store
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

/// Raw status of a sample record as stored
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordStatus {
    pub status: String,
    pub sample_type: String,
}

impl RecordStatus {
    pub fn new(status: impl Into<String>, sample_type: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            sample_type: sample_type.into(),
        }
    }
}

/// A single field value read from a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Boolean(bool),
    Long(i64),
    Text(String),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Text(s) => Some(s.clone()),
            Self::Long(n) => Some(n.to_string()),
            Self::Boolean(b) => Some(b.to_string()),
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Self::Long(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Boolean(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Long(_) => None,
        }
    }

    /// Interpret the value as epoch milliseconds
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        self.as_long()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
    }

    /// Whether the value matches a query string
    pub fn matches(&self, value: &str) -> bool {
        self.as_text().is_some_and(|text| text == value)
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Boolean(b) => serde_json::Value::Bool(*b),
            Self::Long(n) => serde_json::Value::from(*n),
            Self::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

/// Read access to LIMS records
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Status and sample type of a sample record
    async fn get_status(&self, record: &RecordId) -> StoreResult<RecordStatus>;

    /// Immediate children of `record` whose data type is `type_filter`
    async fn get_children(&self, record: &RecordId, type_filter: &str)
        -> StoreResult<Vec<RecordId>>;

    /// A single field of a record; `None` when the field is not set
    async fn get_field(&self, record: &RecordId, field: &str) -> StoreResult<Option<FieldValue>>;

    /// Records of `data_type` whose `field` equals `value`
    async fn find_records(
        &self,
        data_type: &str,
        field: &str,
        value: &str,
    ) -> StoreResult<Vec<RecordId>>;

    /// Field lookup where any failure reads as absent
    async fn optional_field(&self, record: &RecordId, field: &str) -> Option<FieldValue> {
        match self.get_field(record, field).await {
            Ok(value) => value,
            Err(e) => {
                debug!(record = %record, field = field, error = %e, "Field lookup failed, treating as absent");
                None
            }
        }
    }

    async fn text_field(&self, record: &RecordId, field: &str) -> Option<String> {
        self.optional_field(record, field)
            .await
            .and_then(|v| v.as_text())
    }

    async fn long_field(&self, record: &RecordId, field: &str) -> Option<i64> {
        self.optional_field(record, field)
            .await
            .and_then(|v| v.as_long())
    }

    async fn bool_field(&self, record: &RecordId, field: &str) -> Option<bool> {
        self.optional_field(record, field)
            .await
            .and_then(|v| v.as_bool())
    }

    async fn timestamp_field(&self, record: &RecordId, field: &str) -> Option<DateTime<Utc>> {
        self.optional_field(record, field)
            .await
            .and_then(|v| v.as_timestamp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_value_conversions() {
        assert_eq!(FieldValue::Long(7).as_text(), Some("7".to_string()));
        assert_eq!(FieldValue::Text(" 12 ".into()).as_long(), Some(12));
        assert_eq!(FieldValue::Text("true".into()).as_bool(), Some(true));
        assert_eq!(FieldValue::Long(1).as_bool(), None);

        let ts = FieldValue::Long(1_577_836_800_000).as_timestamp().unwrap();
        assert_eq!(ts.to_rfc3339(), "2020-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_field_value_untagged_serde() {
        let values: Vec<FieldValue> = serde_json::from_str(r#"[true, 42, "Smith"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                FieldValue::Boolean(true),
                FieldValue::Long(42),
                FieldValue::Text("Smith".into())
            ]
        );
    }

    #[test]
    fn test_record_id_display() {
        assert_eq!(RecordId::from(1234_i64).to_string(), "1234");
        assert_eq!(RecordId::from("s-1").as_str(), "s-1");
    }
}

//! In-memory record store loaded from fixtures.
//!
//! Supports per-record failure injection and artificial latency so the tree
//! builder's recovery and deadline paths can be driven deterministically.

use super::{FieldValue, RecordId, RecordStatus, RecordStore, StoreResult};
use crate::error::RecordStoreError;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// One record of a fixture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureRecord {
    pub id: RecordId,
    pub data_type: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub sample_type: String,
    #[serde(default)]
    pub fields: HashMap<String, FieldValue>,
    #[serde(default)]
    pub children: Vec<RecordId>,
}

impl FixtureRecord {
    pub fn new(id: impl Into<RecordId>, data_type: &str) -> Self {
        Self {
            id: id.into(),
            data_type: data_type.to_string(),
            status: String::new(),
            sample_type: String::new(),
            fields: HashMap::new(),
            children: Vec::new(),
        }
    }

    pub fn sample(id: impl Into<RecordId>, status: &str) -> Self {
        Self::new(id, crate::constants::data_types::SAMPLE).with_status(status)
    }

    pub fn with_status(mut self, status: &str) -> Self {
        self.status = status.to_string();
        self
    }

    pub fn with_sample_type(mut self, sample_type: &str) -> Self {
        self.sample_type = sample_type.to_string();
        self
    }

    pub fn with_field(mut self, name: &str, value: FieldValue) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    pub fn with_text(self, name: &str, value: &str) -> Self {
        self.with_field(name, FieldValue::Text(value.to_string()))
    }

    pub fn with_child(mut self, child: impl Into<RecordId>) -> Self {
        self.children.push(child.into());
        self
    }
}

/// Serializable set of records
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordFixture {
    pub records: Vec<FixtureRecord>,
}

/// Operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    GetStatus,
    GetChildren,
    GetField,
    FindRecords,
}

#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    records: HashMap<RecordId, FixtureRecord>,
    insertion_order: Vec<RecordId>,
    failures: HashMap<(RecordId, StoreOperation), RecordStoreError>,
    latency: Option<Duration>,
    calls: Mutex<HashMap<StoreOperation, usize>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fixture(fixture: RecordFixture) -> Self {
        let mut store = Self::new();
        for record in fixture.records {
            store.insert(record);
        }
        store
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let fixture: RecordFixture = serde_json::from_str(json)?;
        Ok(Self::from_fixture(fixture))
    }

    /// Insert or replace a record
    pub fn insert(&mut self, record: FixtureRecord) {
        if !self.records.contains_key(&record.id) {
            self.insertion_order.push(record.id.clone());
        }
        self.records.insert(record.id.clone(), record);
    }

    pub fn with_record(mut self, record: FixtureRecord) -> Self {
        self.insert(record);
        self
    }

    /// Make `operation` on `record` fail with `error`
    pub fn with_failure(
        mut self,
        record: impl Into<RecordId>,
        operation: StoreOperation,
        error: RecordStoreError,
    ) -> Self {
        self.failures.insert((record.into(), operation), error);
        self
    }

    /// Delay every operation by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of calls made for an operation so far
    pub fn call_count(&self, operation: StoreOperation) -> usize {
        self.calls.lock().get(&operation).copied().unwrap_or(0)
    }

    async fn enter(&self, record: &RecordId, operation: StoreOperation) -> StoreResult<()> {
        *self.calls.lock().entry(operation).or_insert(0) += 1;
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        match self.failures.get(&(record.clone(), operation)) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn record(&self, record: &RecordId) -> StoreResult<&FixtureRecord> {
        self.records
            .get(record)
            .ok_or_else(|| RecordStoreError::not_found(record.to_string()))
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn get_status(&self, record: &RecordId) -> StoreResult<RecordStatus> {
        self.enter(record, StoreOperation::GetStatus).await?;
        let found = self.record(record)?;
        Ok(RecordStatus::new(&found.status, &found.sample_type))
    }

    /// Children whose type is unknown to the store (dangling ids) are returned too.
    async fn get_children(
        &self,
        record: &RecordId,
        type_filter: &str,
    ) -> StoreResult<Vec<RecordId>> {
        self.enter(record, StoreOperation::GetChildren).await?;
        let found = self.record(record)?;
        Ok(found
            .children
            .iter()
            .filter(|child| {
                self.records
                    .get(*child)
                    .map_or(true, |c| c.data_type == type_filter)
            })
            .cloned()
            .collect())
    }

    async fn get_field(&self, record: &RecordId, field: &str) -> StoreResult<Option<FieldValue>> {
        self.enter(record, StoreOperation::GetField).await?;
        Ok(self.record(record)?.fields.get(field).cloned())
    }

    async fn find_records(
        &self,
        data_type: &str,
        field: &str,
        value: &str,
    ) -> StoreResult<Vec<RecordId>> {
        let query_key = Self::query_key(data_type, field, value);
        self.enter(&query_key, StoreOperation::FindRecords).await?;
        Ok(self
            .insertion_order
            .iter()
            .filter_map(|id| self.records.get(id))
            .filter(|r| r.data_type == data_type)
            .filter(|r| r.fields.get(field).is_some_and(|v| v.matches(value)))
            .map(|r| r.id.clone())
            .collect())
    }
}

impl InMemoryRecordStore {
    /// Key under which a `find_records` query can be made to fail
    pub fn query_key(data_type: &str, field: &str, value: &str) -> RecordId {
        RecordId::new(format!("{data_type}:{field}={value}"))
    }
}

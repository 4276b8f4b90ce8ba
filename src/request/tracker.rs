//! # Request Tracker
//!
//! Entry point of an evaluation. Resolves the request record, builds one lineage
//! tree per root sample on a bounded worker pool, aggregates their stage
//! trackers and assembles the [`RequestTrackingResult`].
//!
//! Every record store call shares one [`Deadline`]. Expiry before the request
//! record is resolved is an error; afterwards the result is returned partial and
//! flagged.

use crate::config::ConfigManager;
use crate::constants::{data_types, fields, request_metadata};
use crate::error::{Result, TrackerError};
use crate::logging::{log_error, log_tracking_operation};
use crate::record_store::{RecordId, RecordStore, StoreResult};
use crate::request::{ProjectSampleSummary, Request, RequestMetadata, RequestTrackingResult};
use crate::stage::Stage;
use crate::tracking::{
    Deadline, IncidentKind, LineageTreeBuilder, ProjectSampleTree, SampleStageTracker,
    StageAggregator, TrackingIncident, TreeStatusPropagator,
};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// One root sample, propagated
#[derive(Debug)]
struct EvaluatedTree {
    tree: ProjectSampleTree,
    sample_id: Option<String>,
    incidents: Vec<TrackingIncident>,
    timed_out: bool,
}

pub struct RequestTracker {
    store: Arc<dyn RecordStore>,
    config: Arc<ConfigManager>,
    builder: Arc<LineageTreeBuilder>,
    propagator: TreeStatusPropagator,
    aggregator: StageAggregator,
}

impl std::fmt::Debug for RequestTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestTracker")
            .field("environment", &self.config.environment())
            .field("builder", &self.builder)
            .finish()
    }
}

impl RequestTracker {
    pub fn new(store: Arc<dyn RecordStore>, config: Arc<ConfigManager>) -> Self {
        let builder = Arc::new(LineageTreeBuilder::from_config(Arc::clone(&store), &config));
        Self {
            store,
            config,
            builder,
            propagator: TreeStatusPropagator::new(),
            aggregator: StageAggregator::new(),
        }
    }

    pub fn config(&self) -> &Arc<ConfigManager> {
        &self.config
    }

    /// Evaluate one request end to end
    #[instrument(skip(self))]
    pub async fn compute_request_tracking(&self, request_id: &str) -> Result<RequestTrackingResult> {
        let evaluation_id = Uuid::new_v4();
        let deadline = Deadline::after(self.config.config().tracking.request_timeout());
        let evaluation = format!("evaluation_id={evaluation_id}");

        log_tracking_operation(
            "compute_request_tracking",
            request_id,
            "started",
            None,
            Some(&evaluation),
        );

        match self.evaluate(request_id, evaluation_id, &deadline).await {
            Ok(result) => {
                let status = if result.incomplete { "partial" } else { "completed" };
                log_tracking_operation(
                    "compute_request_tracking",
                    request_id,
                    status,
                    Some(deadline.elapsed_ms()),
                    Some(&format!(
                        "{evaluation} samples={} stages={} incidents={}",
                        result.summary.total,
                        result.stages.len(),
                        result.incidents.len()
                    )),
                );
                Ok(result)
            }
            Err(e) => {
                log_error(
                    "request_tracker",
                    "compute_request_tracking",
                    &e.to_string(),
                    Some(&evaluation),
                );
                Err(e)
            }
        }
    }

    async fn evaluate(
        &self,
        request_id: &str,
        evaluation_id: Uuid,
        deadline: &Deadline,
    ) -> Result<RequestTrackingResult> {
        let request_record = self.resolve_request(request_id, deadline).await?;

        let mut request = Request::new(request_id);
        let mut incidents = Vec::new();
        let mut timed_out = false;

        match deadline.run(self.resolve_service_id(request_id)).await {
            Some(Ok(service_id)) => request.service_id = service_id,
            Some(Err(e)) => incidents.push(Self::request_incident(&request_record, e.to_string())),
            None => timed_out = true,
        }

        if let Some(service_id) = request.service_id.clone() {
            match deadline.run(self.banked_submitted_stage(&service_id)).await {
                Some(Ok(Some(submitted))) => request.add_stage(submitted),
                Some(Ok(None)) => {}
                Some(Err(e)) => {
                    warn!(service_id = %service_id, error = %e, "Banked samples could not be read");
                    incidents.push(Self::request_incident(&request_record, e.to_string()));
                }
                None => timed_out = true,
            }
        }

        match deadline.run(self.load_metadata(&request_record)).await {
            Some(metadata) => request.metadata = metadata,
            None => timed_out = true,
        }

        let sample_type = &self.config.config().tracking.sample_record_type;
        let roots = match deadline
            .run(self.store.get_children(&request_record, sample_type))
            .await
        {
            Some(Ok(roots)) => roots,
            Some(Err(e)) => return Err(e.into()),
            None => {
                timed_out = true;
                Vec::new()
            }
        };

        let trees = self.evaluate_trees(roots, deadline).await?;

        let mut evaluated = Vec::with_capacity(trees.len());
        for outcome in trees {
            match outcome {
                Ok(tree) => {
                    timed_out |= tree.timed_out;
                    evaluated.push(tree);
                }
                Err(incident) => {
                    timed_out |= incident.kind == IncidentKind::Timeout;
                    incidents.push(incident);
                }
            }
        }

        let aggregated = self
            .aggregator
            .aggregate(evaluated.iter().map(|e| &e.tree.stage_trackers))?;
        for tracker in aggregated.into_values() {
            request.add_stage(tracker);
        }

        for tree in evaluated {
            request
                .samples
                .push(ProjectSampleSummary::from_tree(&tree.tree, tree.sample_id));
            incidents.extend(tree.incidents);
        }

        if timed_out && !incidents.iter().any(|i| i.kind == IncidentKind::Timeout) {
            incidents.push(TrackingIncident::new(
                IncidentKind::Timeout,
                request_record.clone(),
                format!("deadline expired after {}ms", deadline.elapsed_ms()),
            ));
        }

        info!(
            request_id = %request_id,
            evaluation_id = %evaluation_id,
            samples = request.samples.len(),
            incidents = incidents.len(),
            timed_out = timed_out,
            "Request tracking assembled"
        );

        Ok(RequestTrackingResult::from_request(
            request,
            evaluation_id,
            incidents,
            timed_out,
        ))
    }

    /// Exactly one request record must match
    async fn resolve_request(&self, request_id: &str, deadline: &Deadline) -> Result<RecordId> {
        let matches = deadline
            .run(
                self.store
                    .find_records(data_types::REQUEST, fields::REQUEST_ID, request_id),
            )
            .await
            .ok_or_else(|| TrackerError::Timeout {
                request_id: request_id.to_string(),
                elapsed_ms: deadline.elapsed_ms(),
            })??;

        match <[RecordId; 1]>::try_from(matches) {
            Ok([record]) => {
                debug!(request_id = %request_id, record = %record, "Resolved request record");
                Ok(record)
            }
            Err(matches) => {
                warn!(request_id = %request_id, matches = matches.len(), "Request record not resolved");
                Err(TrackerError::RecordNotFound {
                    record: format!("{}:{}", data_types::REQUEST, request_id),
                })
            }
        }
    }

    /// Build and propagate every root sample's tree, results in root order
    async fn evaluate_trees(
        &self,
        roots: Vec<RecordId>,
        deadline: &Deadline,
    ) -> Result<Vec<std::result::Result<EvaluatedTree, TrackingIncident>>> {
        let workers = self.config.config().tracking.max_concurrent_trees;
        let semaphore = Arc::new(Semaphore::new(workers));
        let mut pool = JoinSet::new();

        debug!(roots = roots.len(), workers = workers, "Dispatching lineage trees");

        for (index, root) in roots.iter().cloned().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let builder = Arc::clone(&self.builder);
            let store = Arc::clone(&self.store);
            let propagator = self.propagator;
            let deadline = *deadline;

            pool.spawn(async move {
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => {
                        Self::evaluate_tree(&builder, store.as_ref(), propagator, &root, &deadline)
                            .await
                    }
                    Err(e) => Err(TrackerError::Worker(format!("tree worker pool closed: {e}"))),
                };
                (index, root, outcome)
            });
        }

        let mut slots: Vec<Option<std::result::Result<EvaluatedTree, TrackingIncident>>> =
            roots.iter().map(|_| None).collect();

        while let Some(joined) = pool.join_next().await {
            let (index, root, outcome) =
                joined.map_err(|e| TrackerError::Worker(format!("tree worker failed: {e}")))?;
            let slot = match outcome {
                Ok(tree) => Ok(tree),
                Err(TrackerError::SampleTimeout { elapsed_ms, .. }) => {
                    Err(TrackingIncident::new(
                        IncidentKind::Timeout,
                        root,
                        format!("deadline expired after {elapsed_ms}ms"),
                    ))
                }
                Err(TrackerError::RecordNotFound { record }) => Err(TrackingIncident::new(
                    IncidentKind::RecordNotFound,
                    root,
                    format!("Record not found: {record}"),
                )),
                Err(TrackerError::RecordAccess { reason, .. }) => Err(TrackingIncident::new(
                    IncidentKind::RecordAccess,
                    root,
                    reason,
                )),
                Err(other) => return Err(other),
            };
            if let Some(entry) = slots.get_mut(index) {
                *entry = Some(slot);
            }
        }

        Ok(slots.into_iter().flatten().collect())
    }

    async fn evaluate_tree(
        builder: &LineageTreeBuilder,
        store: &dyn RecordStore,
        propagator: TreeStatusPropagator,
        root: &RecordId,
        deadline: &Deadline,
    ) -> Result<EvaluatedTree> {
        let built = builder.build(root, deadline).await?;
        let sample_id = deadline
            .run(store.text_field(root, fields::SAMPLE_ID))
            .await
            .flatten();
        let tree = propagator.propagate(built.tree);

        debug!(
            root = %root,
            failed = tree.is_failed(),
            complete = tree.is_complete(),
            stages = tree.stage_trackers.len(),
            "Lineage tree propagated"
        );

        Ok(EvaluatedTree {
            tree,
            sample_id,
            incidents: built.incidents,
            timed_out: built.timed_out,
        })
    }

    /// The ServiceId shared by every banked sample of the request. A blank or
    /// missing value counts as its own value, so mixed blank and set ids resolve
    /// to none.
    async fn resolve_service_id(&self, request_id: &str) -> StoreResult<Option<String>> {
        let banked = self
            .store
            .find_records(data_types::BANKED_SAMPLE, fields::REQUEST_ID, request_id)
            .await?;

        let mut service_ids = BTreeSet::new();
        for record in &banked {
            let service_id = self
                .store
                .text_field(record, fields::SERVICE_ID)
                .await
                .unwrap_or_default();
            service_ids.insert(service_id.trim().to_string());
        }

        if service_ids.len() > 1 {
            warn!(
                request_id = %request_id,
                service_ids = ?service_ids,
                "Banked samples disagree on service id"
            );
            return Ok(None);
        }
        Ok(service_ids.into_iter().next().filter(|id| !id.is_empty()))
    }

    /// Submitted stage from banked samples: every banked sample counts, promoted ones have ended
    async fn banked_submitted_stage(&self, service_id: &str) -> StoreResult<Option<SampleStageTracker>> {
        let banked = self
            .store
            .find_records(data_types::BANKED_SAMPLE, fields::SERVICE_ID, service_id)
            .await?;
        if banked.is_empty() {
            return Ok(None);
        }

        let mut promoted = 0u32;
        for record in &banked {
            if self.store.bool_field(record, fields::PROMOTED).await == Some(true) {
                promoted += 1;
            }
        }
        let total = u32::try_from(banked.len()).unwrap_or(u32::MAX);

        debug!(service_id = %service_id, total = total, promoted = promoted, "Banked samples counted");
        Ok(Some(SampleStageTracker::with_counts(
            Stage::Submitted,
            total,
            promoted,
            0,
        )))
    }

    async fn load_metadata(&self, request: &RecordId) -> RequestMetadata {
        let mut metadata = RequestMetadata::new();
        for field in request_metadata::STRING_FIELDS {
            let value = self.store.text_field(request, field).await;
            metadata.insert(field.to_string(), value.map_or(Value::Null, Value::String));
        }
        for field in request_metadata::LONG_FIELDS {
            let value = self.store.long_field(request, field).await;
            metadata.insert(field.to_string(), value.map_or(Value::Null, Value::from));
        }

        let delivered = self
            .store
            .long_field(request, fields::RECENT_DELIVERY_DATE)
            .await;
        metadata.insert(
            fields::RECENT_DELIVERY_DATE.to_string(),
            delivered.map_or(Value::Null, Value::from),
        );
        metadata.insert(
            request_metadata::IGO_COMPLETE_KEY.to_string(),
            Value::Bool(delivered.is_some()),
        );
        metadata
    }

    fn request_incident(request: &RecordId, detail: String) -> TrackingIncident {
        TrackingIncident::new(IncidentKind::RecordAccess, request.clone(), detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackerConfig;
    use crate::error::RecordStoreError;
    use crate::record_store::{FieldValue, FixtureRecord, InMemoryRecordStore, StoreOperation};

    fn request_record(id: &str, request_id: &str) -> FixtureRecord {
        FixtureRecord::new(id, data_types::REQUEST).with_text(fields::REQUEST_ID, request_id)
    }

    fn tracker(store: InMemoryRecordStore) -> RequestTracker {
        let config = ConfigManager::from_config(TrackerConfig::default()).unwrap();
        RequestTracker::new(Arc::new(store), config)
    }

    #[tokio::test]
    async fn test_missing_request_is_not_found() {
        let err = tracker(InMemoryRecordStore::new())
            .compute_request_tracking("00000")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            TrackerError::RecordNotFound {
                record: "Request:00000".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_duplicate_request_is_not_found() {
        let store = InMemoryRecordStore::new()
            .with_record(request_record("r1", "10795"))
            .with_record(request_record("r2", "10795"));
        let err = tracker(store).compute_request_tracking("10795").await.unwrap_err();
        assert!(matches!(err, TrackerError::RecordNotFound { .. }));
    }

    #[tokio::test]
    async fn test_request_lookup_failure_is_access_error() {
        let store = InMemoryRecordStore::new().with_failure(
            InMemoryRecordStore::query_key(data_types::REQUEST, fields::REQUEST_ID, "10795"),
            StoreOperation::FindRecords,
            RecordStoreError::communication("lims", "connection refused"),
        );
        let err = tracker(store).compute_request_tracking("10795").await.unwrap_err();
        assert!(matches!(err, TrackerError::RecordAccess { .. }));
    }

    #[tokio::test]
    async fn test_metadata_and_banked_submitted_stage() {
        let store = InMemoryRecordStore::new()
            .with_record(
                request_record("req", "10795")
                    .with_text("Investigator", "Smith")
                    .with_field(fields::RECEIVED_DATE, FieldValue::Long(1_577_836_800_000))
                    .with_child("s1"),
            )
            .with_record(FixtureRecord::sample("s1", "Received"))
            .with_record(
                FixtureRecord::new("b1", data_types::BANKED_SAMPLE)
                    .with_text(fields::REQUEST_ID, "10795")
                    .with_text(fields::SERVICE_ID, "IGO-001")
                    .with_field(fields::PROMOTED, FieldValue::Boolean(true)),
            )
            .with_record(
                FixtureRecord::new("b2", data_types::BANKED_SAMPLE)
                    .with_text(fields::REQUEST_ID, "10795")
                    .with_text(fields::SERVICE_ID, "IGO-001")
                    .with_field(fields::PROMOTED, FieldValue::Boolean(false)),
            );

        let result = tracker(store).compute_request_tracking("10795").await.unwrap();
        assert_eq!(result.service_id.as_deref(), Some("IGO-001"));
        assert_eq!(result.metadata["Investigator"], "Smith");
        assert_eq!(result.metadata["LaboratoryHead"], Value::Null);
        assert_eq!(result.metadata[fields::RECEIVED_DATE], 1_577_836_800_000_i64);
        assert_eq!(result.metadata[request_metadata::IGO_COMPLETE_KEY], false);

        // The lineage tree's own submitted stage replaces the banked one
        let submitted = result.stage(Stage::Submitted).unwrap();
        assert_eq!(submitted.size, 1);
        assert!(!submitted.complete);
        assert_eq!(result.summary.pending, 1);
    }

    #[tokio::test]
    async fn test_pooled_replicates_keep_result_complete() {
        const POOLING: &str = "Ready for - Pooling of Sample Libraries for Sequencing";
        let store = InMemoryRecordStore::new()
            .with_record(request_record("req", "09602_F").with_child("s1"))
            .with_record(
                FixtureRecord::sample("s1", "Completed - DNA Extraction")
                    .with_child("libA")
                    .with_child("libB"),
            )
            .with_record(FixtureRecord::sample("libA", POOLING).with_child("pool"))
            .with_record(FixtureRecord::sample("libB", POOLING).with_child("pool"))
            .with_record(FixtureRecord::sample("pool", "IGO-Complete"));

        let result = tracker(store).compute_request_tracking("09602_F").await.unwrap();
        assert!(!result.incomplete);
        assert!(result.incidents.is_empty());
        let sequencing = result.stage(Stage::Sequencing).unwrap();
        assert_eq!((sequencing.size, sequencing.ending_count), (1, 1));
        assert!(sequencing.complete);
        assert!(result.samples[0].complete);
    }

    #[tokio::test]
    async fn test_banked_stage_without_trees() {
        let store = InMemoryRecordStore::new()
            .with_record(request_record("req", "09546_T"))
            .with_record(
                FixtureRecord::new("b1", data_types::BANKED_SAMPLE)
                    .with_text(fields::REQUEST_ID, "09546_T")
                    .with_text(fields::SERVICE_ID, "IGO-002")
                    .with_field(fields::PROMOTED, FieldValue::Boolean(true)),
            );
        let result = tracker(store).compute_request_tracking("09546_T").await.unwrap();
        let submitted = result.stage(Stage::Submitted).unwrap();
        assert_eq!((submitted.size, submitted.ending_count), (1, 1));
        assert!(submitted.complete);
        assert!(result.samples.is_empty());
        assert!(!result.incomplete);
    }
}

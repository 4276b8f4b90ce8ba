//! # Request Assembly
//!
//! Request-level view of a tracking evaluation: aggregated stages, per-root-sample
//! summaries and request metadata, plus the [`RequestTracker`] that computes it.

pub mod tracker;

use crate::record_store::RecordId;
use crate::stage::Stage;
use crate::tracking::{ProjectSampleTree, SampleStageTracker, TrackingIncident, WorkflowNodeSummary};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;
use uuid::Uuid;

pub use tracker::RequestTracker;

/// Request-level metadata copied from the request record; absent fields are `null`
pub type RequestMetadata = BTreeMap<String, serde_json::Value>;

/// Summary of one root sample's lineage tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSampleSummary {
    pub record_id: RecordId,
    pub sample_id: Option<String>,
    pub complete: bool,
    pub failed: bool,
    pub stages: Vec<SampleStageTracker>,
    pub root: Option<WorkflowNodeSummary>,
}

impl ProjectSampleSummary {
    pub fn from_tree(tree: &ProjectSampleTree, sample_id: Option<String>) -> Self {
        Self {
            record_id: tree.root().record_id.clone(),
            sample_id,
            complete: tree.is_complete(),
            failed: tree.is_failed(),
            stages: tree.reportable_stages(),
            root: tree.summarize(),
        }
    }
}

/// Root sample counts by outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleSummary {
    pub total: usize,
    pub complete: usize,
    pub failed: usize,
    pub pending: usize,
}

impl SampleSummary {
    pub fn from_samples(samples: &[ProjectSampleSummary]) -> Self {
        let failed = samples.iter().filter(|s| s.failed).count();
        let complete = samples.iter().filter(|s| !s.failed && s.complete).count();
        Self {
            total: samples.len(),
            complete,
            failed,
            pending: samples.len() - complete - failed,
        }
    }
}

/// Request being assembled
#[derive(Debug, Clone, Default)]
pub struct Request {
    pub request_id: String,
    pub service_id: Option<String>,
    stages: BTreeMap<Stage, SampleStageTracker>,
    pub samples: Vec<ProjectSampleSummary>,
    pub metadata: RequestMetadata,
}

impl Request {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            ..Default::default()
        }
    }

    /// Set a stage, replacing any tracker already held for it
    pub fn add_stage(&mut self, tracker: SampleStageTracker) {
        let stage = tracker.stage;
        if let Some(previous) = self.stages.insert(stage, tracker) {
            warn!(
                request_id = %self.request_id,
                stage = %stage,
                previous_total = previous.size,
                "Overriding stage already set on request"
            );
        }
    }

    pub fn stages(&self) -> impl Iterator<Item = &SampleStageTracker> {
        self.stages.values()
    }

    pub fn stage(&self, stage: Stage) -> Option<&SampleStageTracker> {
        self.stages.get(&stage)
    }
}

/// Outcome of one `compute_request_tracking` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestTrackingResult {
    pub request_id: String,
    /// Correlates log lines of one evaluation
    pub evaluation_id: Uuid,
    pub service_id: Option<String>,
    /// Aggregated stages in canonical order
    pub stages: Vec<SampleStageTracker>,
    pub samples: Vec<ProjectSampleSummary>,
    pub metadata: RequestMetadata,
    pub summary: SampleSummary,
    /// Some lineage data is missing from the result
    pub incomplete: bool,
    pub timed_out: bool,
    pub incidents: Vec<TrackingIncident>,
}

impl RequestTrackingResult {
    pub fn from_request(
        request: Request,
        evaluation_id: Uuid,
        incidents: Vec<TrackingIncident>,
        timed_out: bool,
    ) -> Self {
        let incomplete = timed_out || incidents.iter().any(TrackingIncident::loses_data);
        let summary = SampleSummary::from_samples(&request.samples);
        Self {
            request_id: request.request_id,
            evaluation_id,
            service_id: request.service_id,
            stages: request.stages.into_values().collect(),
            samples: request.samples,
            metadata: request.metadata,
            summary,
            incomplete,
            timed_out,
            incidents,
        }
    }

    pub fn stage(&self, stage: Stage) -> Option<&SampleStageTracker> {
        self.stages.iter().find(|t| t.stage == stage)
    }
}

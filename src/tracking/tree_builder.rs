//! # Lineage Tree Builder
//!
//! Walks a root sample's descendants through the [`RecordStore`] and builds a
//! [`WorkflowTree`]. Failures below the root stay local: an unreadable branch
//! becomes a leaf, an unreadable child is left out, and both are recorded as
//! [`TrackingIncident`]s. Only the root record itself is required.
//!
//! A record reached through two parents (pooled replicates) is attached under
//! each of them. Only a record that is its own ancestor is cut.

use crate::classification::StageClassifier;
use crate::config::ConfigManager;
use crate::constants::{data_types, fields, system};
use crate::error::{RecordStoreError, Result, TrackerError};
use crate::logging::log_record_operation;
use crate::record_store::{RecordId, RecordStore, StoreResult};
use crate::stage::Stage;
use crate::tracking::deadline::Deadline;
use crate::tracking::incident::{IncidentKind, TrackingIncident};
use crate::tracking::workflow_tree::{NodeIndex, WorkflowNode, WorkflowTree};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// A built tree plus what went wrong while building it
#[derive(Debug, Clone)]
pub struct BuiltTree {
    pub tree: WorkflowTree,
    pub incidents: Vec<TrackingIncident>,
    /// The deadline expired and some branches were not expanded
    pub timed_out: bool,
}

pub struct LineageTreeBuilder {
    store: Arc<dyn RecordStore>,
    classifier: StageClassifier,
    sample_record_type: String,
    max_depth: usize,
}

impl std::fmt::Debug for LineageTreeBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineageTreeBuilder")
            .field("sample_record_type", &self.sample_record_type)
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

impl LineageTreeBuilder {
    pub fn new(store: Arc<dyn RecordStore>, classifier: StageClassifier) -> Self {
        Self {
            store,
            classifier,
            sample_record_type: data_types::SAMPLE.to_string(),
            max_depth: system::MAX_TREE_DEPTH,
        }
    }

    pub fn from_config(store: Arc<dyn RecordStore>, config: &ConfigManager) -> Self {
        let tracking = &config.config().tracking;
        Self::new(store, config.classifier())
            .with_sample_record_type(&tracking.sample_record_type)
            .with_max_depth(tracking.max_tree_depth)
    }

    pub fn with_sample_record_type(mut self, sample_record_type: &str) -> Self {
        self.sample_record_type = sample_record_type.to_string();
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Build the lineage tree below `root`.
    ///
    /// Errors only when the root record cannot be read in time.
    #[instrument(skip(self, deadline))]
    pub async fn build(&self, root: &RecordId, deadline: &Deadline) -> Result<BuiltTree> {
        let root_node = match self.fetch_node(root, deadline).await {
            Some(Ok(node)) => node,
            Some(Err(e)) => {
                warn!(root = %root, error = %e, "Root sample could not be read");
                return Err(e.into());
            }
            None => {
                return Err(TrackerError::SampleTimeout {
                    record: root.to_string(),
                    elapsed_ms: deadline.elapsed_ms(),
                })
            }
        };

        let mut tree = WorkflowTree::new(root_node);
        let mut incidents = Vec::new();
        let mut timed_out = false;
        let mut stack: Vec<NodeIndex> = vec![WorkflowTree::ROOT];

        while let Some(index) = stack.pop() {
            let Some(node) = tree.node(index) else {
                continue;
            };
            let record_id = node.record_id.clone();
            let depth = node.depth;

            if depth >= self.max_depth {
                incidents.push(
                    TrackingIncident::new(
                        IncidentKind::DepthLimit,
                        record_id,
                        format!("lineage deeper than {} levels", self.max_depth),
                    )
                    .in_tree(root, depth),
                );
                continue;
            }

            let children = match deadline
                .run(self.store.get_children(&record_id, &self.sample_record_type))
                .await
            {
                Some(Ok(children)) => children,
                Some(Err(e)) => {
                    incidents.push(Self::store_incident(&e, record_id, root, depth));
                    continue;
                }
                None => {
                    timed_out = true;
                    break;
                }
            };

            let mut added = Vec::with_capacity(children.len());
            for child_id in children {
                if tree.on_ancestor_chain(index, &child_id) {
                    incidents.push(
                        TrackingIncident::new(
                            IncidentKind::CycleDetected,
                            child_id,
                            format!("is an ancestor of {record_id}"),
                        )
                        .in_tree(root, depth + 1),
                    );
                    continue;
                }

                match self.fetch_node(&child_id, deadline).await {
                    Some(Ok(child)) => added.extend(tree.add_child(index, child)),
                    Some(Err(e)) => {
                        incidents.push(Self::store_incident(&e, child_id, root, depth + 1))
                    }
                    None => {
                        timed_out = true;
                        break;
                    }
                }
            }
            if timed_out {
                break;
            }

            // Reverse so siblings are expanded in record order
            stack.extend(added.into_iter().rev());
        }

        if timed_out {
            incidents.push(
                TrackingIncident::new(
                    IncidentKind::Timeout,
                    root.clone(),
                    format!("deadline expired after {}ms", deadline.elapsed_ms()),
                )
                .in_tree(root, 0),
            );
        }

        for node in tree.nodes() {
            if node.stage == Stage::Unknown {
                incidents.push(
                    TrackingIncident::new(
                        IncidentKind::UnrecognizedStatus,
                        node.record_id.clone(),
                        format!("status '{}' has no stage", node.status),
                    )
                    .in_tree(root, node.depth),
                );
            }
        }

        for incident in &incidents {
            warn!(
                kind = %incident.kind,
                record = %incident.record_id,
                root = %root,
                depth = incident.depth,
                detail = %incident.detail,
                "Recovered lineage incident"
            );
        }

        debug!(
            root = %root,
            nodes = tree.len(),
            incidents = incidents.len(),
            timed_out = timed_out,
            "Lineage tree built"
        );

        Ok(BuiltTree {
            tree,
            incidents,
            timed_out,
        })
    }

    /// Status and timestamps of one record; `None` when the deadline passed
    async fn fetch_node(
        &self,
        record: &RecordId,
        deadline: &Deadline,
    ) -> Option<StoreResult<WorkflowNode>> {
        deadline
            .run(async {
                let status = self.store.get_status(record).await?;
                let classification = self.classifier.classify_record(&status);
                let created = self.store.timestamp_field(record, fields::DATE_CREATED).await;
                let modified = self.store.timestamp_field(record, fields::DATE_MODIFIED).await;
                log_record_operation(
                    "get_status",
                    record.as_str(),
                    classification.stage.as_str(),
                    Some(&status.status),
                );
                Ok(WorkflowNode::new(record.clone(), status.status, classification)
                    .with_times(created, modified))
            })
            .await
    }

    fn store_incident(
        error: &RecordStoreError,
        record: RecordId,
        root: &RecordId,
        depth: usize,
    ) -> TrackingIncident {
        let kind = if error.is_not_found() {
            IncidentKind::RecordNotFound
        } else {
            IncidentKind::RecordAccess
        };
        TrackingIncident::new(kind, record, error.to_string()).in_tree(root, depth)
    }
}

use crate::record_store::RecordId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kinds of locally recovered problems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentKind {
    /// A record below the root could not be found
    RecordNotFound,
    /// A record or its children could not be read
    RecordAccess,
    /// The request deadline expired before the branch was walked
    Timeout,
    /// Status could not be classified and nothing could be inherited
    UnrecognizedStatus,
    /// A record was reached twice while walking one tree
    CycleDetected,
    /// Lineage deeper than the configured limit
    DepthLimit,
}

impl fmt::Display for IncidentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RecordNotFound => "record_not_found",
            Self::RecordAccess => "record_access",
            Self::Timeout => "timeout",
            Self::UnrecognizedStatus => "unrecognized_status",
            Self::CycleDetected => "cycle_detected",
            Self::DepthLimit => "depth_limit",
        };
        f.write_str(name)
    }
}

/// One recovered problem and where it happened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingIncident {
    pub kind: IncidentKind,
    pub record_id: RecordId,
    /// Root sample of the affected tree, when inside one
    pub root_record_id: Option<RecordId>,
    pub depth: usize,
    pub detail: String,
}

impl TrackingIncident {
    pub fn new(kind: IncidentKind, record_id: RecordId, detail: impl Into<String>) -> Self {
        Self {
            kind,
            record_id,
            root_record_id: None,
            depth: 0,
            detail: detail.into(),
        }
    }

    pub fn in_tree(mut self, root: &RecordId, depth: usize) -> Self {
        self.root_record_id = Some(root.clone());
        self.depth = depth;
        self
    }

    /// Whether the incident means part of the lineage is missing from the result
    pub fn loses_data(&self) -> bool {
        !matches!(self.kind, IncidentKind::UnrecognizedStatus)
    }
}

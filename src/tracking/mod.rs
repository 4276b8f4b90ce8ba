//! # Lineage Tracking
//!
//! Tree construction, status propagation and stage aggregation for one request.
//!
//! Data flows one way: [`LineageTreeBuilder`] produces a [`WorkflowTree`] per root
//! sample, [`TreeStatusPropagator`] turns it into a [`ProjectSampleTree`] with
//! per-stage trackers, and [`StageAggregator`] folds all trees of a request into
//! request-level [`SampleStageTracker`]s.

pub mod aggregator;
pub mod deadline;
pub mod incident;
pub mod propagator;
pub mod stage_tracker;
pub mod tree_builder;
pub mod workflow_tree;

pub use aggregator::StageAggregator;
pub use deadline::Deadline;
pub use incident::{IncidentKind, TrackingIncident};
pub use propagator::{NodeStatus, ProjectSampleTree, StageContribution, TreeStatusPropagator};
pub use stage_tracker::SampleStageTracker;
pub use tree_builder::{BuiltTree, LineageTreeBuilder};
pub use workflow_tree::{NodeIndex, WorkflowNode, WorkflowNodeSummary, WorkflowTree};

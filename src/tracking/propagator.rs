//! # Tree Status Propagation
//!
//! One post-order pass over a built [`WorkflowTree`] that fixes every node's
//! `complete` / `failed` flags, followed by one counting pass that produces the
//! tree's per-stage [`SampleStageTracker`]s.
//!
//! Node rules:
//! - leaf: `complete = terminal_complete || failed`, `failed = classified failed`
//! - non-leaf: always complete; failed iff every child is failed
//!
//! Counting rules, per node of stage `s`:
//! - every node adds one unit to `s`
//! - a non-leaf or terminal-complete leaf has ended `s`
//! - a failed leaf counts as failed when the whole tree failed, otherwise the
//!   failure is absorbed and the leaf has ended `s`
//! - a pending leaf leaves `s` unfinished for this tree

use crate::classification::Classification;
use crate::stage::Stage;
use crate::tracking::stage_tracker::SampleStageTracker;
use crate::tracking::workflow_tree::{WorkflowNode, WorkflowNodeSummary, WorkflowTree};
use std::collections::BTreeMap;

/// Derived flags of one node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeStatus {
    pub complete: bool,
    pub failed: bool,
}

/// How a node is counted in its stage tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageContribution {
    Ended,
    Failed,
    Pending,
}

pub fn leaf_status(classification: &Classification) -> NodeStatus {
    NodeStatus {
        complete: classification.is_complete(),
        failed: classification.failed,
    }
}

/// Flags of a node with at least one child
pub fn parent_status<I>(children_failed: I) -> NodeStatus
where
    I: IntoIterator<Item = bool>,
{
    let mut any = false;
    let mut all_failed = true;
    for failed in children_failed {
        any = true;
        all_failed &= failed;
    }
    NodeStatus {
        complete: true,
        failed: any && all_failed,
    }
}

pub fn stage_contribution(node: &WorkflowNode, tree_failed: bool) -> StageContribution {
    if !node.is_leaf() {
        return StageContribution::Ended;
    }
    if node.classification.failed {
        if tree_failed {
            StageContribution::Failed
        } else {
            StageContribution::Ended
        }
    } else if node.classification.terminal_complete {
        StageContribution::Ended
    } else {
        StageContribution::Pending
    }
}

/// A propagated lineage tree and its stage trackers
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectSampleTree {
    pub tree: WorkflowTree,
    pub stage_trackers: BTreeMap<Stage, SampleStageTracker>,
}

impl ProjectSampleTree {
    pub fn root(&self) -> &WorkflowNode {
        self.tree.root()
    }

    pub fn is_failed(&self) -> bool {
        self.tree.root().failed
    }

    /// Every stage this tree passed through is finished
    pub fn is_complete(&self) -> bool {
        self.stage_trackers.values().all(|t| t.complete)
    }

    /// Trackers for stages that appear in request output
    pub fn reportable_stages(&self) -> Vec<SampleStageTracker> {
        self.stage_trackers
            .values()
            .filter(|t| t.stage.is_reportable())
            .cloned()
            .collect()
    }

    pub fn summarize(&self) -> Option<WorkflowNodeSummary> {
        self.tree.summarize(WorkflowTree::ROOT)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TreeStatusPropagator;

impl TreeStatusPropagator {
    pub fn new() -> Self {
        Self
    }

    pub fn propagate(&self, mut tree: WorkflowTree) -> ProjectSampleTree {
        for index in tree.post_order() {
            let status = match tree.node(index) {
                Some(node) if node.is_leaf() => leaf_status(&node.classification),
                Some(node) => parent_status(
                    node.children
                        .iter()
                        .filter_map(|child| tree.node(*child))
                        .map(|child| child.failed),
                ),
                None => continue,
            };
            if let Some(node) = tree.node_mut(index) {
                node.complete = status.complete;
                node.failed = status.failed;
            }
        }

        let stage_trackers = Self::count_stages(&tree);
        ProjectSampleTree {
            tree,
            stage_trackers,
        }
    }

    fn count_stages(tree: &WorkflowTree) -> BTreeMap<Stage, SampleStageTracker> {
        let tree_failed = tree.root().failed;
        let mut trackers: BTreeMap<Stage, SampleStageTracker> = BTreeMap::new();

        for node in tree.nodes() {
            let tracker = trackers
                .entry(node.stage)
                .or_insert_with(|| SampleStageTracker::new(node.stage));
            tracker.add_unit();
            tracker.merge_times(node.created, node.modified);
            match stage_contribution(node, tree_failed) {
                StageContribution::Ended => tracker.add_ending(),
                StageContribution::Failed => tracker.add_failed(),
                StageContribution::Pending => tracker.mark_incomplete(),
            }
        }
        trackers
    }
}

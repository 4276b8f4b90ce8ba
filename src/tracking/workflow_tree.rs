//! # Workflow Tree
//!
//! Arena-backed lineage tree. Nodes refer to their parent and children by index,
//! so the tree stays acyclic and can be moved between tasks as one value.
//!
//! Arena invariant: a node is always pushed after its parent, so every child
//! index is greater than its parent's. Iterating indices in reverse therefore
//! visits every child before its parent.

use crate::classification::Classification;
use crate::record_store::RecordId;
use crate::stage::Stage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type NodeIndex = usize;

/// One sample record within a lineage tree
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowNode {
    pub record_id: RecordId,
    /// Raw LIMS status
    pub status: String,
    /// Verdict for the raw status, before stage inheritance
    pub classification: Classification,
    /// Effective stage after inheritance
    pub stage: Stage,
    pub parent: Option<NodeIndex>,
    pub children: Vec<NodeIndex>,
    pub depth: usize,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    /// Set by the propagation pass
    pub complete: bool,
    /// Set by the propagation pass
    pub failed: bool,
}

impl WorkflowNode {
    pub fn new(record_id: RecordId, status: impl Into<String>, classification: Classification) -> Self {
        Self {
            record_id,
            status: status.into(),
            classification,
            stage: classification.stage,
            parent: None,
            children: Vec::new(),
            depth: 0,
            created: None,
            modified: None,
            complete: false,
            failed: false,
        }
    }

    pub fn with_times(
        mut self,
        created: Option<DateTime<Utc>>,
        modified: Option<DateTime<Utc>>,
    ) -> Self {
        self.created = created;
        self.modified = modified;
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowTree {
    nodes: Vec<WorkflowNode>,
}

impl WorkflowTree {
    pub const ROOT: NodeIndex = 0;

    pub fn new(root: WorkflowNode) -> Self {
        let mut root = root;
        root.parent = None;
        root.depth = 0;
        root.children.clear();
        Self { nodes: vec![root] }
    }

    /// Attach `child` under `parent`, applying stage inheritance.
    ///
    /// A child whose stage is a sentinel adopts the parent's stage when the
    /// parent's stage is a real one. `None` when `parent` is not in the tree.
    pub fn add_child(&mut self, parent: NodeIndex, child: WorkflowNode) -> Option<NodeIndex> {
        let index = self.nodes.len();
        let parent_node = self.nodes.get(parent)?;
        let parent_stage = parent_node.stage;
        let depth = parent_node.depth + 1;

        let mut child = child;
        child.parent = Some(parent);
        child.depth = depth;
        child.children.clear();
        if child.stage.is_sentinel() && parent_stage.is_inheritable() {
            child.stage = parent_stage;
        }

        self.nodes.push(child);
        self.nodes[parent].children.push(index);
        Some(index)
    }

    /// Whether `record_id` is the node at `index` or one of its ancestors
    pub fn on_ancestor_chain(&self, index: NodeIndex, record_id: &RecordId) -> bool {
        let mut current = Some(index);
        while let Some(i) = current {
            match self.nodes.get(i) {
                Some(node) if &node.record_id == record_id => return true,
                Some(node) => current = node.parent,
                None => return false,
            }
        }
        false
    }

    pub fn root(&self) -> &WorkflowNode {
        &self.nodes[Self::ROOT]
    }

    pub fn node(&self, index: NodeIndex) -> Option<&WorkflowNode> {
        self.nodes.get(index)
    }

    pub(crate) fn node_mut(&mut self, index: NodeIndex) -> Option<&mut WorkflowNode> {
        self.nodes.get_mut(index)
    }

    pub fn nodes(&self) -> &[WorkflowNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn children(&self, index: NodeIndex) -> impl Iterator<Item = &WorkflowNode> {
        self.nodes
            .get(index)
            .map(|n| n.children.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|child| self.nodes.get(*child))
    }

    /// Stage of the node's parent, looked up by index
    pub fn parent_stage(&self, index: NodeIndex) -> Option<Stage> {
        self.nodes
            .get(index)
            .and_then(|n| n.parent)
            .and_then(|p| self.nodes.get(p))
            .map(|p| p.stage)
    }

    pub fn leaves(&self) -> impl Iterator<Item = &WorkflowNode> {
        self.nodes.iter().filter(|n| n.is_leaf())
    }

    /// Indices ordered so that children come before parents
    pub fn post_order(&self) -> impl Iterator<Item = NodeIndex> {
        (0..self.nodes.len()).rev()
    }

    /// Nested, serializable view rooted at `index`
    pub fn summarize(&self, index: NodeIndex) -> Option<WorkflowNodeSummary> {
        let node = self.nodes.get(index)?;
        Some(WorkflowNodeSummary {
            record_id: node.record_id.clone(),
            status: node.status.clone(),
            stage: node.stage,
            complete: node.complete,
            failed: node.failed,
            children: node
                .children
                .iter()
                .filter_map(|child| self.summarize(*child))
                .collect(),
        })
    }
}

/// Plain nested form of a propagated tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowNodeSummary {
    pub record_id: RecordId,
    pub status: String,
    pub stage: Stage,
    pub complete: bool,
    pub failed: bool,
    pub children: Vec<WorkflowNodeSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, stage: Stage) -> WorkflowNode {
        WorkflowNode::new(
            RecordId::from(id),
            "",
            Classification::unknown().with_stage(stage),
        )
    }

    #[test]
    fn test_sentinel_child_inherits_parent_stage() {
        let mut tree = WorkflowTree::new(node("root", Stage::Submitted));
        let awaiting = tree
            .add_child(WorkflowTree::ROOT, node("a", Stage::AwaitingProcessing))
            .unwrap();
        let unknown = tree.add_child(WorkflowTree::ROOT, node("u", Stage::Unknown)).unwrap();
        let real = tree.add_child(WorkflowTree::ROOT, node("r", Stage::Extraction)).unwrap();

        assert_eq!(tree.node(awaiting).unwrap().stage, Stage::Submitted);
        assert_eq!(tree.node(unknown).unwrap().stage, Stage::Submitted);
        assert_eq!(tree.node(real).unwrap().stage, Stage::Extraction);
        // The raw verdict is kept
        assert_eq!(
            tree.node(awaiting).unwrap().classification.stage,
            Stage::AwaitingProcessing
        );
        assert_eq!(tree.parent_stage(awaiting), Some(Stage::Submitted));
    }

    #[test]
    fn test_sentinel_parent_passes_nothing_down() {
        let mut tree = WorkflowTree::new(node("root", Stage::AwaitingProcessing));
        let child = tree.add_child(WorkflowTree::ROOT, node("u", Stage::Unknown)).unwrap();
        assert_eq!(tree.node(child).unwrap().stage, Stage::Unknown);
    }

    #[test]
    fn test_add_child_rejects_unknown_parent() {
        let mut tree = WorkflowTree::new(node("root", Stage::LibraryPrep));
        assert_eq!(tree.add_child(7, node("a", Stage::Sequencing)), None);
        assert_eq!(tree.len(), 1);
        assert!(tree.root().is_leaf());
    }

    #[test]
    fn test_ancestor_chain_lookup() {
        let mut tree = WorkflowTree::new(node("root", Stage::LibraryPrep));
        let a = tree.add_child(WorkflowTree::ROOT, node("a", Stage::Sequencing)).unwrap();
        let b = tree.add_child(WorkflowTree::ROOT, node("b", Stage::Sequencing)).unwrap();
        let pool = tree.add_child(a, node("pool", Stage::DataQc)).unwrap();

        assert!(tree.on_ancestor_chain(pool, &RecordId::from("root")));
        assert!(tree.on_ancestor_chain(pool, &RecordId::from("a")));
        assert!(tree.on_ancestor_chain(pool, &RecordId::from("pool")));
        // A sibling branch is not an ancestor
        assert!(!tree.on_ancestor_chain(pool, &RecordId::from("b")));
        assert!(!tree.on_ancestor_chain(b, &RecordId::from("pool")));
    }

    #[test]
    fn test_post_order_visits_children_first() {
        let mut tree = WorkflowTree::new(node("root", Stage::LibraryPrep));
        let a = tree.add_child(WorkflowTree::ROOT, node("a", Stage::Sequencing)).unwrap();
        let b = tree.add_child(a, node("b", Stage::DataQc)).unwrap();
        let order: Vec<_> = tree.post_order().collect();
        let pos = |i| order.iter().position(|x| *x == i).unwrap();
        assert!(pos(b) < pos(a));
        assert!(pos(a) < pos(WorkflowTree::ROOT));
        assert_eq!(tree.node(b).unwrap().depth, 2);
        assert_eq!(tree.leaves().count(), 1);
        let root_children: Vec<_> = tree.children(WorkflowTree::ROOT).collect();
        assert_eq!(root_children.len(), 1);
        assert_eq!(root_children[0].record_id, RecordId::from("a"));
    }

    #[test]
    fn test_summary_is_nested() {
        let mut tree = WorkflowTree::new(node("root", Stage::LibraryPrep));
        let a = tree.add_child(WorkflowTree::ROOT, node("a", Stage::Sequencing)).unwrap();
        tree.add_child(a, node("b", Stage::DataQc)).unwrap();
        let summary = tree.summarize(WorkflowTree::ROOT).unwrap();
        assert_eq!(summary.children.len(), 1);
        assert_eq!(summary.children[0].children[0].record_id, RecordId::from("b"));
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["recordId"], "root");
        assert_eq!(json["children"][0]["stage"], "sequencing");
    }
}

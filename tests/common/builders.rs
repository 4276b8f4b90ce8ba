//! Fixture builders that lay out requests and sample lineages in an
//! [`InMemoryRecordStore`].

#![allow(dead_code)]

use request_tracker::classification::StageClassifier;
use request_tracker::constants::{data_types, fields};
use request_tracker::record_store::{FieldValue, FixtureRecord, InMemoryRecordStore, RecordId};
use request_tracker::tracking::{WorkflowNode, WorkflowTree};

pub const LIBRARY_PREP_DONE: &str = "Completed - KAPA Library Preparation";
pub const LIBRARY_PREP_FAILED: &str = "Failed - KAPA Library Preparation";
pub const QC_DONE: &str = "Completed - Quality Control";
pub const SEQUENCING_DONE: &str = "Completed - Illumina Sequencing";
pub const SEQUENCING_FAILED: &str = "Failed - Illumina Sequencing";
pub const SEQUENCING_PENDING: &str = "In Processing - Illumina Sequencing";
pub const DELIVERED: &str = "IGO-Complete";
pub const RECEIVED: &str = "Received";
pub const AWAITING: &str = "Awaiting Processing";

/// Shape of one sample lineage: a status and derived child samples
#[derive(Debug, Clone, PartialEq)]
pub struct Lineage {
    pub status: String,
    pub sample_type: String,
    pub children: Vec<Lineage>,
}

impl Lineage {
    pub fn leaf(status: &str) -> Self {
        Self {
            status: status.to_string(),
            sample_type: String::new(),
            children: Vec::new(),
        }
    }

    pub fn node(status: &str, children: Vec<Lineage>) -> Self {
        Self {
            children,
            ..Self::leaf(status)
        }
    }

    /// Linear lineage, first status at the root
    pub fn chain(statuses: &[&str]) -> Self {
        let mut iter = statuses.iter().rev();
        let last = iter.next().copied().unwrap_or_default();
        iter.fold(Self::leaf(last), |child, status| {
            Self::node(status, vec![child])
        })
    }

    pub fn with_sample_type(mut self, sample_type: &str) -> Self {
        self.sample_type = sample_type.to_string();
        self
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Lineage::node_count).sum::<usize>()
    }

    /// Build the workflow tree directly, applying the same inheritance as the builder
    pub fn to_tree(&self, classifier: &StageClassifier) -> WorkflowTree {
        let mut counter = 0usize;
        let mut tree = WorkflowTree::new(self.to_node(classifier, &mut counter));
        let mut pending = vec![(WorkflowTree::ROOT, self)];
        while let Some((index, lineage)) = pending.pop() {
            for child in &lineage.children {
                let child_index = tree
                    .add_child(index, child.to_node(classifier, &mut counter))
                    .expect("parent was added before its children");
                pending.push((child_index, child));
            }
        }
        tree
    }

    fn to_node(&self, classifier: &StageClassifier, counter: &mut usize) -> WorkflowNode {
        *counter += 1;
        WorkflowNode::new(
            RecordId::new(format!("n{counter}")),
            self.status.clone(),
            classifier.classify(&self.status, &self.sample_type),
        )
    }
}

/// Lays out one request, its root samples and their lineages
pub struct RequestFixtureBuilder {
    request_id: String,
    request: FixtureRecord,
    records: Vec<FixtureRecord>,
    roots: Vec<RecordId>,
    next_id: usize,
}

impl RequestFixtureBuilder {
    pub fn new(request_id: &str) -> Self {
        Self {
            request_id: request_id.to_string(),
            request: FixtureRecord::new(format!("request-{request_id}"), data_types::REQUEST)
                .with_text(fields::REQUEST_ID, request_id),
            records: Vec::new(),
            roots: Vec::new(),
            next_id: 0,
        }
    }

    pub fn request_record_id(&self) -> RecordId {
        self.request.id.clone()
    }

    pub fn with_request_field(mut self, name: &str, value: FieldValue) -> Self {
        self.request = self.request.with_field(name, value);
        self
    }

    /// Add a root sample with its lineage
    pub fn with_tree(mut self, lineage: Lineage) -> Self {
        let root = self.add_lineage(&lineage);
        self.request = self.request.with_child(root.clone());
        self.roots.push(root);
        self
    }

    pub fn with_trees(mut self, count: usize, lineage: Lineage) -> Self {
        for _ in 0..count {
            self = self.with_tree(lineage.clone());
        }
        self
    }

    /// Add a banked sample record for the request
    pub fn with_banked_sample(mut self, service_id: &str, promoted: bool) -> Self {
        self.next_id += 1;
        let record = FixtureRecord::new(format!("banked-{}", self.next_id), data_types::BANKED_SAMPLE)
            .with_text(fields::REQUEST_ID, &self.request_id)
            .with_text(fields::SERVICE_ID, service_id)
            .with_field(fields::PROMOTED, FieldValue::Boolean(promoted));
        self.records.push(record);
        self
    }

    /// Root sample ids in the order they were added
    pub fn roots(&self) -> &[RecordId] {
        &self.roots
    }

    pub fn build(self) -> InMemoryRecordStore {
        let mut store = InMemoryRecordStore::new().with_record(self.request);
        for record in self.records {
            store.insert(record);
        }
        store
    }

    fn add_lineage(&mut self, lineage: &Lineage) -> RecordId {
        self.next_id += 1;
        let id = RecordId::new(format!("{}-s{}", self.request_id, self.next_id));
        let mut record = FixtureRecord::sample(id.clone(), &lineage.status)
            .with_sample_type(&lineage.sample_type)
            .with_text(fields::SAMPLE_ID, &format!("{}_{}", self.request_id, self.next_id))
            .with_field(
                fields::DATE_CREATED,
                FieldValue::Long(1_600_000_000_000 + self.next_id as i64 * 1_000),
            )
            .with_field(
                fields::DATE_MODIFIED,
                FieldValue::Long(1_600_000_000_000 + self.next_id as i64 * 2_000),
            );
        for child in &lineage.children {
            let child_id = self.add_lineage(child);
            record = record.with_child(child_id);
        }
        self.records.push(record);
        id
    }
}

/// A fully delivered lineage through library prep, QC and sequencing
pub fn delivered_lineage() -> Lineage {
    Lineage::chain(&[LIBRARY_PREP_DONE, QC_DONE, SEQUENCING_DONE, DELIVERED])
}

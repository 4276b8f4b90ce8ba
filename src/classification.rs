//! # Stage Classification
//!
//! Maps a sample's raw LIMS status (and sample type) to a [`Stage`] plus a
//! completion verdict.
//!
//! LIMS statuses mostly follow `"<Phase> - <Process>"`, e.g.
//! `"In Processing - KAPA Library Preparation"` or `"Failed - Illumina Sequencing"`.
//! The phase decides completion and failure, the process decides the stage.
//! A handful of statuses are matched exactly instead.
//!
//! The table is configuration data: built once from [`ClassificationConfig`] and
//! shared read-only behind an `Arc`.

use crate::config::ConfigurationError;
use crate::constants::system::STATUS_SEPARATOR;
use crate::record_store::RecordStatus;
use crate::stage::Stage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Exact status match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRule {
    pub status: String,
    pub stage: Stage,
    #[serde(default)]
    pub complete: bool,
    #[serde(default)]
    pub failed: bool,
}

/// Process half of a `"<Phase> - <Process>"` status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRule {
    pub process: String,
    pub stage: Stage,
}

/// Stage used when the status itself says nothing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleTypeRule {
    pub sample_type: String,
    pub stage: Stage,
}

/// Serializable form of the classification table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    pub statuses: Vec<StatusRule>,
    pub processes: Vec<ProcessRule>,
    pub pending_phases: Vec<String>,
    pub complete_phases: Vec<String>,
    pub failed_phases: Vec<String>,
    pub sample_types: Vec<SampleTypeRule>,
}

fn status(status: &str, stage: Stage, complete: bool, failed: bool) -> StatusRule {
    StatusRule {
        status: status.to_string(),
        stage,
        complete,
        failed,
    }
}

fn process(process: &str, stage: Stage) -> ProcessRule {
    ProcessRule {
        process: process.to_string(),
        stage,
    }
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            statuses: vec![
                status("Received", Stage::Submitted, false, false),
                status("Submitted", Stage::Submitted, false, false),
                status("Awaiting Processing", Stage::AwaitingProcessing, false, false),
                status("Under-Review", Stage::DataQc, false, false),
                status("IGO-Complete", Stage::DataQc, true, false),
                status("Data Delivered", Stage::DataQc, true, false),
                status("Returned to User", Stage::Submitted, true, true),
            ],
            processes: vec![
                process("DNA Extraction", Stage::Extraction),
                process("RNA Extraction", Stage::Extraction),
                process("DNA/RNA Extraction", Stage::Extraction),
                process("DNA/RNA Simultaneous Extraction", Stage::Extraction),
                process("cfDNA Extraction", Stage::Extraction),
                process("Library Preparation", Stage::LibraryPrep),
                process("KAPA Library Preparation", Stage::LibraryPrep),
                process("KAPA Hyper Prep", Stage::LibraryPrep),
                process("TruSeq RNA Library Preparation", Stage::LibraryPrep),
                process("10X Genomics Library Preparation", Stage::LibraryPrep),
                process("Capture - Hybridization", Stage::LibraryPrep),
                process("Library Capture", Stage::LibraryPrep),
                process("Quality Control", Stage::SampleQc),
                process("Library/Pool Quality Control", Stage::SampleQc),
                process("Generic Normalization Plate Setup", Stage::SampleQc),
                process("Normalization of Pooled Libraries", Stage::SampleQc),
                process("Pooling of Sample Libraries for Sequencing", Stage::Sequencing),
                process("Pooling of Sample Libraries by Volume", Stage::Sequencing),
                process("Illumina Sequencing Planning/Denaturing", Stage::Sequencing),
                process("Illumina Sequencing", Stage::Sequencing),
                process("Sequence Analysis QC", Stage::DataQc),
                process("Illumina Sequencing Analysis", Stage::DataQc),
                process("Data QC", Stage::DataQc),
            ],
            pending_phases: vec!["Ready for".to_string(), "In Processing".to_string()],
            complete_phases: vec!["Completed".to_string()],
            failed_phases: vec!["Failed".to_string()],
            sample_types: vec![SampleTypeRule {
                sample_type: "Pooled Library".to_string(),
                stage: Stage::Sequencing,
            }],
        }
    }
}

/// Outcome of classifying one status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub stage: Stage,
    /// The status itself says the stage is finished
    pub terminal_complete: bool,
    pub failed: bool,
}

impl Classification {
    pub fn unknown() -> Self {
        Self {
            stage: Stage::Unknown,
            terminal_complete: false,
            failed: false,
        }
    }

    /// Failed samples end their branch, so they count as complete
    pub fn is_complete(&self) -> bool {
        self.terminal_complete || self.failed
    }

    pub fn is_unrecognized(&self) -> bool {
        self.stage == Stage::Unknown && !self.failed
    }

    /// Same verdict under a different stage
    pub fn with_stage(self, stage: Stage) -> Self {
        Self { stage, ..self }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Pending,
    Complete,
    Failed,
}

fn normalize(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Lookup tables built from [`ClassificationConfig`]
#[derive(Debug, Clone)]
pub struct ClassificationTable {
    statuses: HashMap<String, Classification>,
    processes: HashMap<String, Stage>,
    phases: HashMap<String, Phase>,
    sample_types: HashMap<String, Stage>,
}

impl ClassificationTable {
    pub fn from_config(config: &ClassificationConfig) -> Result<Self, ConfigurationError> {
        let mut statuses = HashMap::new();
        for rule in &config.statuses {
            let key = Self::checked_key("classification.statuses", &rule.status)?;
            Self::checked_stage("classification.statuses", &rule.status, rule.stage)?;
            statuses.insert(
                key,
                Classification {
                    stage: rule.stage,
                    terminal_complete: rule.complete,
                    failed: rule.failed,
                },
            );
        }

        let mut processes = HashMap::new();
        for rule in &config.processes {
            let key = Self::checked_key("classification.processes", &rule.process)?;
            Self::checked_stage("classification.processes", &rule.process, rule.stage)?;
            processes.insert(key, rule.stage);
        }

        let mut phases = HashMap::new();
        for (names, phase) in [
            (&config.pending_phases, Phase::Pending),
            (&config.complete_phases, Phase::Complete),
            (&config.failed_phases, Phase::Failed),
        ] {
            for name in names {
                let key = Self::checked_key("classification.phases", name)?;
                if phases.insert(key, phase).is_some() {
                    return Err(ConfigurationError::invalid_value(
                        "classification.phases",
                        name.clone(),
                        "phase listed more than once",
                    ));
                }
            }
        }

        let mut sample_types = HashMap::new();
        for rule in &config.sample_types {
            let key = Self::checked_key("classification.sample_types", &rule.sample_type)?;
            Self::checked_stage("classification.sample_types", &rule.sample_type, rule.stage)?;
            sample_types.insert(key, rule.stage);
        }

        Ok(Self {
            statuses,
            processes,
            phases,
            sample_types,
        })
    }

    fn checked_key(field: &str, value: &str) -> Result<String, ConfigurationError> {
        let key = normalize(value);
        if key.is_empty() {
            return Err(ConfigurationError::invalid_value(
                field,
                value.to_string(),
                "empty key",
            ));
        }
        Ok(key)
    }

    fn checked_stage(field: &str, key: &str, stage: Stage) -> Result<(), ConfigurationError> {
        if stage == Stage::Unknown {
            return Err(ConfigurationError::invalid_value(
                field,
                key.to_string(),
                "entries must map to a known stage",
            ));
        }
        Ok(())
    }

    fn classify_status(&self, status: &str) -> Option<Classification> {
        let key = normalize(status);
        if key.is_empty() {
            return None;
        }
        if let Some(exact) = self.statuses.get(&key) {
            return Some(*exact);
        }

        let (phase, process) = key.split_once(STATUS_SEPARATOR)?;
        let phase = *self.phases.get(phase.trim())?;
        let stage = self.processes.get(process.trim()).copied();

        match (phase, stage) {
            (Phase::Failed, stage) => Some(Classification {
                stage: stage.unwrap_or(Stage::Unknown),
                terminal_complete: false,
                failed: true,
            }),
            (Phase::Complete, Some(stage)) => Some(Classification {
                stage,
                terminal_complete: true,
                failed: false,
            }),
            (Phase::Pending, Some(stage)) => Some(Classification {
                stage,
                terminal_complete: false,
                failed: false,
            }),
            (_, None) => None,
        }
    }

    fn classify_sample_type(&self, sample_type: &str) -> Option<Classification> {
        self.sample_types
            .get(&normalize(sample_type))
            .map(|stage| Classification::unknown().with_stage(*stage))
    }
}

impl Default for ClassificationTable {
    fn default() -> Self {
        // The built-in config contains no empty keys or unknown targets
        Self::from_config(&ClassificationConfig::default()).unwrap_or_else(|_| Self {
            statuses: HashMap::new(),
            processes: HashMap::new(),
            phases: HashMap::new(),
            sample_types: HashMap::new(),
        })
    }
}

/// Pure status → stage classifier
#[derive(Debug, Clone)]
pub struct StageClassifier {
    table: Arc<ClassificationTable>,
}

impl StageClassifier {
    pub fn new(table: Arc<ClassificationTable>) -> Self {
        Self { table }
    }

    pub fn from_config(config: &ClassificationConfig) -> Result<Self, ConfigurationError> {
        Ok(Self::new(Arc::new(ClassificationTable::from_config(config)?)))
    }

    /// Never fails: anything unrecognized is `(unknown, false, false)`.
    pub fn classify(&self, status: &str, sample_type: &str) -> Classification {
        self.table
            .classify_status(status)
            .or_else(|| self.table.classify_sample_type(sample_type))
            .unwrap_or_else(Classification::unknown)
    }

    pub fn classify_record(&self, record: &RecordStatus) -> Classification {
        self.classify(&record.status, &record.sample_type)
    }

    pub fn table(&self) -> &Arc<ClassificationTable> {
        &self.table
    }
}

impl Default for StageClassifier {
    fn default() -> Self {
        Self::new(Arc::new(ClassificationTable::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> StageClassifier {
        StageClassifier::default()
    }

    #[test]
    fn test_phase_process_statuses() {
        let c = classifier();
        let pending = c.classify("In Processing - KAPA Library Preparation", "DNA");
        assert_eq!(pending.stage, Stage::LibraryPrep);
        assert!(!pending.terminal_complete);
        assert!(!pending.failed);

        let done = c.classify("Completed - Illumina Sequencing", "Pooled Library");
        assert_eq!(done.stage, Stage::Sequencing);
        assert!(done.terminal_complete);

        let hybrid = c.classify("Completed - Capture - Hybridization", "DNA Library");
        assert_eq!(hybrid.stage, Stage::LibraryPrep);
    }

    #[test]
    fn test_failure_statuses_are_complete() {
        let c = classifier();
        let failed = c.classify("Failed - Library Preparation", "DNA");
        assert_eq!(failed.stage, Stage::LibraryPrep);
        assert!(failed.failed);
        assert!(failed.is_complete());

        let failed_unknown_process = c.classify("Failed - Something New", "DNA");
        assert_eq!(failed_unknown_process.stage, Stage::Unknown);
        assert!(failed_unknown_process.failed);
        assert!(!failed_unknown_process.is_unrecognized());
    }

    #[test]
    fn test_exact_statuses_and_normalization() {
        let c = classifier();
        assert_eq!(
            c.classify("  awaiting   processing ", "").stage,
            Stage::AwaitingProcessing
        );
        assert_eq!(c.classify("Received", "Tissue").stage, Stage::Submitted);
        let delivered = c.classify("IGO-Complete", "");
        assert_eq!(delivered.stage, Stage::DataQc);
        assert!(delivered.terminal_complete);
    }

    #[test]
    fn test_unrecognized_input() {
        let c = classifier();
        assert_eq!(c.classify("", ""), Classification::unknown());
        assert_eq!(c.classify("Something odd", "DNA"), Classification::unknown());
        assert_eq!(
            c.classify("In Processing - Unheard Of Protocol", ""),
            Classification::unknown()
        );
        assert!(c.classify("???", "").is_unrecognized());
    }

    #[test]
    fn test_sample_type_fallback() {
        let c = classifier();
        let pool = c.classify("", "Pooled Library");
        assert_eq!(pool.stage, Stage::Sequencing);
        assert!(!pool.is_complete());

        // A recognized status wins over the sample type
        let qc = c.classify("In Processing - Quality Control", "Pooled Library");
        assert_eq!(qc.stage, Stage::SampleQc);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = ClassificationConfig::default();
        config.statuses.push(status("  ", Stage::DataQc, false, false));
        assert!(ClassificationTable::from_config(&config).is_err());

        let mut config = ClassificationConfig::default();
        config.processes.push(process("Mystery", Stage::Unknown));
        assert!(ClassificationTable::from_config(&config).is_err());

        let mut config = ClassificationConfig::default();
        config.failed_phases.push("Completed".to_string());
        assert!(ClassificationTable::from_config(&config).is_err());
    }

    #[test]
    fn test_config_yaml_round_trip() {
        let yaml = r#"
statuses:
  - status: "On Hold"
    stage: submitted
processes:
  - process: "Whole Genome Prep"
    stage: libraryPrep
pending_phases: ["In Processing"]
complete_phases: ["Completed"]
failed_phases: ["Failed"]
"#;
        let config: ClassificationConfig = serde_yaml::from_str(yaml).unwrap();
        let c = StageClassifier::from_config(&config).unwrap();
        assert_eq!(c.classify("On Hold", "").stage, Stage::Submitted);
        let prep = c.classify("Completed - Whole Genome Prep", "");
        assert_eq!(prep.stage, Stage::LibraryPrep);
        assert!(prep.terminal_complete);
        // Omitted sections keep their built-in defaults
        assert_eq!(c.classify("", "Pooled Library").stage, Stage::Sequencing);
        assert_eq!(c.classify("Received", ""), Classification::unknown());
    }
}

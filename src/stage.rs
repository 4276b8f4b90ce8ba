use serde::{Deserialize, Serialize};
use std::fmt;

/// Workflow stages a sample moves through, in canonical reporting order.
///
/// The derived `Ord` is the canonical total order: aggregated output is always
/// sorted by it.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    /// Sample submitted to the lab, not yet received into a workflow
    Submitted,
    /// Sample received but not yet assigned to a workflow
    AwaitingProcessing,
    /// DNA/RNA extraction
    Extraction,
    /// Library preparation and capture
    LibraryPrep,
    /// Sample and library quality control
    SampleQc,
    /// Pooling and sequencing
    Sequencing,
    /// Sequence analysis QC and delivery
    DataQc,
    /// Status could not be classified
    #[default]
    Unknown,
}

impl Stage {
    pub const ALL: [Stage; 8] = [
        Stage::Submitted,
        Stage::AwaitingProcessing,
        Stage::Extraction,
        Stage::LibraryPrep,
        Stage::SampleQc,
        Stage::Sequencing,
        Stage::DataQc,
        Stage::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::AwaitingProcessing => "awaitingProcessing",
            Self::Extraction => "extraction",
            Self::LibraryPrep => "libraryPrep",
            Self::SampleQc => "sampleQc",
            Self::Sequencing => "sequencing",
            Self::DataQc => "dataQc",
            Self::Unknown => "unknown",
        }
    }

    /// Sentinel stages carry no workflow progress of their own
    pub fn is_sentinel(&self) -> bool {
        matches!(self, Self::Unknown | Self::AwaitingProcessing)
    }

    /// A stage a child may inherit from its parent
    pub fn is_inheritable(&self) -> bool {
        !self.is_sentinel()
    }

    /// Whether the stage is reported at request level
    pub fn is_reportable(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .iter()
            .find(|stage| stage.as_str().eq_ignore_ascii_case(s.trim()))
            .copied()
            .ok_or_else(|| format!("Invalid stage: {s}"))
    }
}

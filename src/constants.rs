//! # System Constants
//!
//! Record type names, field names and limits shared by the tree builder and the
//! request assembler. Names match the LIMS data model.

/// LIMS data types queried by the tracker
pub mod data_types {
    pub const REQUEST: &str = "Request";
    pub const SAMPLE: &str = "Sample";
    pub const BANKED_SAMPLE: &str = "BankedSample";
}

/// Record field names
pub mod fields {
    pub const REQUEST_ID: &str = "RequestId";
    pub const SERVICE_ID: &str = "ServiceId";
    pub const SAMPLE_ID: &str = "SampleId";
    pub const PROMOTED: &str = "Promoted";
    pub const DATE_CREATED: &str = "DateCreated";
    pub const DATE_MODIFIED: &str = "DateModified";
    pub const RECENT_DELIVERY_DATE: &str = "RecentDeliveryDate";
    pub const RECEIVED_DATE: &str = "ReceivedDate";
}

/// Request record fields copied into the response metadata
pub mod request_metadata {
    /// Text-valued request fields
    pub const STRING_FIELDS: &[&str] = &[
        "LaboratoryHead",
        "GroupLeader",
        "TATFromInProcessing",
        "TATFromReceiving",
        "ProjectManager",
        "LabHeadEmail",
        "Investigator",
    ];

    /// Epoch-millisecond request fields
    pub const LONG_FIELDS: &[&str] = &[super::fields::RECEIVED_DATE];

    /// Set when the request has a delivery date
    pub const IGO_COMPLETE_KEY: &str = "isIgoComplete";
}

pub mod system {
    /// Default maximum lineage depth walked below a root sample
    pub const MAX_TREE_DEPTH: usize = 50;

    /// Default number of root-sample trees built concurrently
    pub const MAX_CONCURRENT_TREES: usize = 8;

    /// Default per-request deadline
    pub const REQUEST_TIMEOUT_MS: u64 = 30_000;

    /// Separator between phase and process in LIMS statuses
    pub const STATUS_SEPARATOR: &str = " - ";
}

#![allow(clippy::doc_markdown)] // Allow technical terms like LIMS, QC in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Request Tracker Core
//!
//! Lineage-tree status propagation and stage aggregation for laboratory requests.
//!
//! ## Overview
//!
//! A request is a batch of samples moving through a multi-stage workflow
//! (submission, extraction, library preparation, QC, sequencing, data QC). Every
//! processing step derives child sample records, so each submitted sample grows a
//! lineage tree. This crate answers, per request: which stage each lineage is at,
//! whether that stage is finished, whether any branch failed, and how many samples
//! have passed each stage overall.
//!
//! ## Architecture
//!
//! ```text
//! RecordStore ─► LineageTreeBuilder ─► TreeStatusPropagator ─► StageAggregator ─► RequestTracker
//!                  (one per root sample, bounded worker pool)
//! ```
//!
//! - [`classification`] - Status → stage table and the pure classifier
//! - [`tracking`] - Tree building, propagation and aggregation
//! - [`request`] - Request assembly and the async entry point
//! - [`record_store`] - The only I/O boundary, plus an in-memory fixture store
//! - [`config`] - YAML configuration with environment overrides
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use request_tracker::config::ConfigManager;
//! use request_tracker::record_store::InMemoryRecordStore;
//! use request_tracker::request::RequestTracker;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigManager::load()?;
//! let store = InMemoryRecordStore::from_json(&std::fs::read_to_string("fixture.json")?)?;
//! let tracker = RequestTracker::new(Arc::new(store), config);
//!
//! let result = tracker.compute_request_tracking("06302_W").await?;
//! for stage in &result.stages {
//!     println!("{} {}/{} failed={}", stage.stage, stage.ending_count, stage.size, stage.failed_count);
//! }
//! # Ok(())
//! # }
//! ```

pub mod classification;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod record_store;
pub mod request;
pub mod stage;
pub mod tracking;

pub use classification::{Classification, ClassificationConfig, ClassificationTable, StageClassifier};
pub use config::{ConfigManager, TrackerConfig};
pub use error::{RecordStoreError, Result, TrackerError};
pub use record_store::{FieldValue, InMemoryRecordStore, RecordId, RecordStatus, RecordStore};
pub use request::{ProjectSampleSummary, Request, RequestTracker, RequestTrackingResult};
pub use stage::Stage;
pub use tracking::{
    Deadline, IncidentKind, LineageTreeBuilder, ProjectSampleTree, SampleStageTracker,
    StageAggregator, TrackingIncident, TreeStatusPropagator, WorkflowNode, WorkflowTree,
};

//! Batch Feature Extraction
//!
//! Turns registered clinical notes into typed, versioned feature records.
//!
//! ## Architecture
//!
//! ```text
//! NoteSource → NoteExtractor → normalize → validate → FeatureStore
//! ```
//!
//! - Work selection is feature-existence based: a document with zero records
//!   is unprocessed, so failed documents are retried on the next run.
//! - Feature ids are content hashes, so re-running never duplicates records.
//! - One document's failure never aborts the batch.

pub mod error;
pub mod identity;
pub mod normalizer;
pub mod runner;
pub mod store;
pub mod traits;
pub mod validation;

pub use error::{FeatureStoreError, PipelineError, SourceError};
pub use identity::{document_id_for_location, feature_id};
pub use normalizer::{normalize, normalize_symptom_name};
pub use runner::{BatchReport, DocumentOutcome, ExtractionRunner, RunnerConfig};
pub use store::SqliteFeatureStore;
pub use traits::*;
pub use validation::{validate_features, ValidationWarning};

//! Trait seams of the extraction pipeline.
//!
//! Three collaborators sit behind traits so the orchestrator can be driven by
//! mocks in tests:
//! - FeatureStore: existence checks, idempotent persistence, work selection
//! - NoteExtractor: raw note text to structured extraction result
//! - NoteSource: document location to raw note text

use crate::models::{DocumentRef, DocumentState, ExtractionProvenance, ExtractionResult, FeatureRecord};
use crate::pipeline::extractor::ExtractorError;

use super::error::{FeatureStoreError, SourceError};

/// Outcome of persisting one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Inserted,
    /// Same id and same content already stored; nothing written.
    AlreadyPresent,
}

/// Counts from persisting one document's records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PutSummary {
    pub inserted: u32,
    pub already_present: u32,
}

/// Narrow gateway over the relational store.
pub trait FeatureStore: Send + Sync {
    fn exists(&self, feature_id: &str) -> Result<bool, FeatureStoreError>;

    /// Insert a record. Same id with same content is a no-op; same id with
    /// differing content is `FeatureStoreError::Conflict`.
    fn put(&self, record: &FeatureRecord) -> Result<PutOutcome, FeatureStoreError>;

    /// Persist all records of one document atomically: either every record is
    /// stored (or already present) or none is.
    fn put_all(&self, records: &[FeatureRecord]) -> Result<PutSummary, FeatureStoreError>;

    /// Records of one document in insertion order.
    fn list_by_subject(&self, document_id: &str) -> Result<Vec<FeatureRecord>, FeatureStoreError>;

    /// Record a featureless terminal outcome (`Skipped`, or `Normalized`
    /// with an empty result) so the document is not selected again.
    fn mark_terminal(&self, document_id: &str, state: DocumentState) -> Result<(), FeatureStoreError>;

    /// Documents of `data_type` that own zero feature records and carry no
    /// terminal mark. Failed documents stay in this set.
    fn list_unfeatured_documents(
        &self,
        data_type: &str,
        limit: usize,
    ) -> Result<Vec<DocumentRef>, FeatureStoreError>;

    /// Ids of every document owning at least one record, sorted.
    fn list_featured_documents(&self) -> Result<Vec<String>, FeatureStoreError>;
}

/// The external extraction model, seen as a black box.
pub trait NoteExtractor: Send + Sync {
    fn extract(&self, note_text: &str) -> Result<ExtractionResult, ExtractorError>;

    /// Method name and model version stamped on every produced feature.
    fn provenance(&self) -> ExtractionProvenance;
}

/// Reads raw note text for a registered document.
pub trait NoteSource: Send + Sync {
    fn load_text(&self, document: &DocumentRef) -> Result<String, SourceError>;
}

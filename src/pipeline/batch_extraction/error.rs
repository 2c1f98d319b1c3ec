//! Error types for the extraction side of the pipeline.
//!
//! Kept apart from `ExtractorError` so the orchestrator, not the extractor,
//! decides which extractor failures are recoverable.

use thiserror::Error;

use crate::db::DatabaseError;
use crate::pipeline::extractor::ExtractorError;

/// Failures of the feature store gateway.
#[derive(Error, Debug)]
pub enum FeatureStoreError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// A record with the same id but different content is already stored.
    #[error("Conflicting feature record already stored under id {feature_id}")]
    Conflict { feature_id: String },

    #[error("Feature store connection lock poisoned")]
    LockPoisoned,
}

impl From<rusqlite::Error> for FeatureStoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(DatabaseError::Sqlite(e))
    }
}

/// Failures of the raw-note collaborator.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Cannot read note {location}: {source}")]
    Io {
        location: String,
        source: std::io::Error,
    },

    #[error("Invalid note payload in {location}: {reason}")]
    Payload { location: String, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Feature store error: {0}")]
    Store(#[from] FeatureStoreError),

    #[error("Extractor error: {0}")]
    Extractor(#[from] ExtractorError),

    #[error("Note source error: {0}")]
    Source(#[from] SourceError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

use std::path::PathBuf;

use thiserror::Error;

use crate::db::DatabaseError;
use crate::pipeline::batch_extraction::FeatureStoreError;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Feature store error: {0}")]
    Store(#[from] FeatureStoreError),

    #[error("Invalid clustering configuration: {0}")]
    Config(String),

    #[error("Cannot write report {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Report serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for AnalyticsError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(DatabaseError::Sqlite(e))
    }
}

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// One raw clinical note as registered in the store. Immutable once ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub document_id: String,
    pub subject_id: String,
    pub data_type: String,
    /// Where the raw note lives (a path for the filesystem source).
    pub location: String,
    pub collection_date: NaiveDate,
    pub ingested_at: NaiveDateTime,
}

/// The minimal handle the orchestrator needs to load a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub document_id: String,
    pub location: String,
}

impl From<&Document> for DocumentRef {
    fn from(doc: &Document) -> Self {
        Self {
            document_id: doc.document_id.clone(),
            location: doc.location.clone(),
        }
    }
}

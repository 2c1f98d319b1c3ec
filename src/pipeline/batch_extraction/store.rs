//! SQLite-backed feature store gateway.
//!
//! A single connection behind a mutex: the single-writer model of a pipeline
//! run. Existence check and insert for a feature id happen under the same
//! lock, and one document's records go through one transaction.

use std::sync::Mutex;

use rusqlite::Connection;

use super::error::FeatureStoreError;
use super::traits::{FeatureStore, PutOutcome, PutSummary};
use crate::db::repository;
use crate::models::{DocumentRef, DocumentState, FeatureRecord};

pub struct SqliteFeatureStore {
    conn: Mutex<Connection>,
}

impl SqliteFeatureStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Run `f` with exclusive access to the underlying connection.
    pub fn with_conn<T, E>(&self, f: impl FnOnce(&Connection) -> Result<T, E>) -> Result<T, E>
    where
        E: From<FeatureStoreError>,
    {
        let conn = self.conn.lock().map_err(|_| FeatureStoreError::LockPoisoned)?;
        f(&conn)
    }

    pub fn into_inner(self) -> Result<Connection, FeatureStoreError> {
        self.conn.into_inner().map_err(|_| FeatureStoreError::LockPoisoned)
    }
}

/// Check-then-insert on an already locked connection.
fn put_locked(conn: &Connection, record: &FeatureRecord) -> Result<PutOutcome, FeatureStoreError> {
    match repository::get_feature(conn, &record.feature_id)? {
        Some(existing) if existing.same_content(record) => Ok(PutOutcome::AlreadyPresent),
        Some(_) => Err(FeatureStoreError::Conflict {
            feature_id: record.feature_id.clone(),
        }),
        None => {
            repository::insert_feature(conn, record)?;
            Ok(PutOutcome::Inserted)
        }
    }
}

impl FeatureStore for SqliteFeatureStore {
    fn exists(&self, feature_id: &str) -> Result<bool, FeatureStoreError> {
        self.with_conn(|conn| Ok(repository::feature_exists(conn, feature_id)?))
    }

    fn put(&self, record: &FeatureRecord) -> Result<PutOutcome, FeatureStoreError> {
        self.with_conn(|conn| put_locked(conn, record))
    }

    fn put_all(&self, records: &[FeatureRecord]) -> Result<PutSummary, FeatureStoreError> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let mut summary = PutSummary::default();

            for record in records {
                match put_locked(&tx, record)? {
                    PutOutcome::Inserted => summary.inserted += 1,
                    PutOutcome::AlreadyPresent => summary.already_present += 1,
                }
            }

            tx.commit()?;
            Ok(summary)
        })
    }

    fn list_by_subject(&self, document_id: &str) -> Result<Vec<FeatureRecord>, FeatureStoreError> {
        self.with_conn(|conn| Ok(repository::list_features_by_document(conn, document_id)?))
    }

    fn mark_terminal(&self, document_id: &str, state: DocumentState) -> Result<(), FeatureStoreError> {
        self.with_conn(|conn| Ok(repository::set_extraction_state(conn, document_id, state)?))
    }

    fn list_unfeatured_documents(
        &self,
        data_type: &str,
        limit: usize,
    ) -> Result<Vec<DocumentRef>, FeatureStoreError> {
        self.with_conn(|conn| Ok(repository::list_unfeatured_documents(conn, data_type, limit)?))
    }

    fn list_featured_documents(&self) -> Result<Vec<String>, FeatureStoreError> {
        self.with_conn(|conn| Ok(repository::list_featured_document_ids(conn)?))
    }
}

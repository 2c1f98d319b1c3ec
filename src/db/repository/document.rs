use rusqlite::{params, Connection};

use super::{format_date, format_timestamp, parse_date, parse_timestamp};
use crate::db::DatabaseError;
use crate::models::{Document, DocumentRef, DocumentState};

pub fn insert_document(conn: &Connection, doc: &Document) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO documents (document_id, subject_id, data_type, location, collection_date, ingested_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            doc.document_id,
            doc.subject_id,
            doc.data_type,
            doc.location,
            format_date(&doc.collection_date),
            format_timestamp(&doc.ingested_at),
        ],
    )?;
    Ok(())
}

pub fn document_exists(conn: &Connection, document_id: &str) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM documents WHERE document_id = ?1",
        params![document_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn get_document(conn: &Connection, document_id: &str) -> Result<Option<Document>, DatabaseError> {
    let result = conn.query_row(
        "SELECT document_id, subject_id, data_type, location, collection_date, ingested_at
         FROM documents WHERE document_id = ?1",
        params![document_id],
        |row| {
            Ok(DocumentRow {
                document_id: row.get(0)?,
                subject_id: row.get(1)?,
                data_type: row.get(2)?,
                location: row.get(3)?,
                collection_date: row.get(4)?,
                ingested_at: row.get(5)?,
            })
        },
    );

    match result {
        Ok(row) => Ok(Some(document_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Documents of `data_type` with zero feature records and no terminal
/// extraction state, oldest registration first.
pub fn list_unfeatured_documents(
    conn: &Connection,
    data_type: &str,
    limit: usize,
) -> Result<Vec<DocumentRef>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT d.document_id, d.location
         FROM documents d
         WHERE d.data_type = ?1
           AND d.extraction_state IS NULL
           AND NOT EXISTS (SELECT 1 FROM health_features f WHERE f.document_id = d.document_id)
         ORDER BY d.ingested_at ASC, d.document_id ASC
         LIMIT ?2",
    )?;

    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let rows = stmt.query_map(params![data_type, limit], |row| {
        Ok(DocumentRef {
            document_id: row.get(0)?,
            location: row.get(1)?,
        })
    })?;

    let mut docs = Vec::new();
    for row in rows {
        docs.push(row?);
    }
    Ok(docs)
}

/// Ids of documents that own at least one feature record, sorted.
pub fn list_featured_document_ids(conn: &Connection) -> Result<Vec<String>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT document_id FROM health_features ORDER BY document_id ASC",
    )?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

    let mut ids = Vec::new();
    for row in rows {
        ids.push(row?);
    }
    Ok(ids)
}

/// Record that a document finished without features and must not be selected
/// again. Only `Skipped` and `Normalized` are terminal.
pub fn set_extraction_state(
    conn: &Connection,
    document_id: &str,
    state: DocumentState,
) -> Result<(), DatabaseError> {
    if !matches!(state, DocumentState::Skipped | DocumentState::Normalized) {
        return Err(DatabaseError::ConstraintViolation(format!(
            "{state} is not a terminal extraction state"
        )));
    }
    let updated = conn.execute(
        "UPDATE documents SET extraction_state = ?1 WHERE document_id = ?2",
        params![state.as_str(), document_id],
    )?;
    if updated == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "document".into(),
            id: document_id.into(),
        });
    }
    Ok(())
}

pub fn get_extraction_state(
    conn: &Connection,
    document_id: &str,
) -> Result<Option<DocumentState>, DatabaseError> {
    let raw: Option<String> = conn.query_row(
        "SELECT extraction_state FROM documents WHERE document_id = ?1",
        params![document_id],
        |row| row.get(0),
    )?;
    raw.map(|s| s.parse()).transpose()
}

/// Delete a document; its features and cluster assignments cascade.
pub fn delete_document(conn: &Connection, document_id: &str) -> Result<(), DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM documents WHERE document_id = ?1",
        params![document_id],
    )?;
    if deleted == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "document".into(),
            id: document_id.into(),
        });
    }
    Ok(())
}

struct DocumentRow {
    document_id: String,
    subject_id: String,
    data_type: String,
    location: String,
    collection_date: String,
    ingested_at: String,
}

fn document_from_row(row: DocumentRow) -> Result<Document, DatabaseError> {
    Ok(Document {
        document_id: row.document_id,
        subject_id: row.subject_id,
        data_type: row.data_type,
        location: row.location,
        collection_date: parse_date(&row.collection_date)?,
        ingested_at: parse_timestamp(&row.ingested_at)?,
    })
}

use std::str::FromStr;

use rusqlite::{params, Connection};

use super::{format_timestamp, parse_timestamp};
use crate::db::DatabaseError;
use crate::models::{FeatureRecord, FeatureType};

const FEATURE_COLUMNS: &str = "feature_id, document_id, feature_type, feature_name, feature_value,
     unit, extraction_method, model_version, created_at";

pub fn insert_feature(conn: &Connection, record: &FeatureRecord) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO health_features (feature_id, document_id, feature_type, feature_name,
         feature_value, unit, extraction_method, model_version, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            record.feature_id,
            record.document_id,
            record.feature_type.as_str(),
            record.feature_name,
            record.feature_value,
            record.unit,
            record.extraction_method,
            record.model_version,
            format_timestamp(&record.created_at),
        ],
    )?;
    Ok(())
}

pub fn feature_exists(conn: &Connection, feature_id: &str) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM health_features WHERE feature_id = ?1",
        params![feature_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn get_feature(conn: &Connection, feature_id: &str) -> Result<Option<FeatureRecord>, DatabaseError> {
    let sql = format!("SELECT {FEATURE_COLUMNS} FROM health_features WHERE feature_id = ?1");
    let result = conn.query_row(&sql, params![feature_id], read_feature_row);

    match result {
        Ok(row) => Ok(Some(feature_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// All features of one document in insertion order.
pub fn list_features_by_document(
    conn: &Connection,
    document_id: &str,
) -> Result<Vec<FeatureRecord>, DatabaseError> {
    let sql = format!(
        "SELECT {FEATURE_COLUMNS} FROM health_features WHERE document_id = ?1 ORDER BY seq ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![document_id], read_feature_row)?;

    let mut features = Vec::new();
    for row in rows {
        features.push(feature_from_row(row?)?);
    }
    Ok(features)
}

pub fn count_features(conn: &Connection, document_id: &str) -> Result<u32, DatabaseError> {
    let count: u32 = conn.query_row(
        "SELECT COUNT(*) FROM health_features WHERE document_id = ?1",
        params![document_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

struct FeatureRow {
    feature_id: String,
    document_id: String,
    feature_type: String,
    feature_name: String,
    feature_value: String,
    unit: Option<String>,
    extraction_method: String,
    model_version: String,
    created_at: String,
}

fn read_feature_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FeatureRow> {
    Ok(FeatureRow {
        feature_id: row.get(0)?,
        document_id: row.get(1)?,
        feature_type: row.get(2)?,
        feature_name: row.get(3)?,
        feature_value: row.get(4)?,
        unit: row.get(5)?,
        extraction_method: row.get(6)?,
        model_version: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn feature_from_row(row: FeatureRow) -> Result<FeatureRecord, DatabaseError> {
    Ok(FeatureRecord {
        feature_id: row.feature_id,
        document_id: row.document_id,
        feature_type: FeatureType::from_str(&row.feature_type)?,
        feature_name: row.feature_name,
        feature_value: row.feature_value,
        unit: row.unit,
        extraction_method: row.extraction_method,
        model_version: row.model_version,
        created_at: parse_timestamp(&row.created_at)?,
    })
}

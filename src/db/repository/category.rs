use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection};

use super::format_timestamp;
use crate::db::DatabaseError;

/// Load the persisted category → code dictionary.
pub fn load_category_codes(conn: &Connection) -> Result<BTreeMap<String, i64>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT category, code FROM category_codes ORDER BY code ASC")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;

    let mut codes = BTreeMap::new();
    for row in rows {
        let (category, code) = row?;
        codes.insert(category, code);
    }
    Ok(codes)
}

/// Append one dictionary entry. Existing categories and codes are never touched.
pub fn insert_category_code(
    conn: &Connection,
    category: &str,
    code: i64,
    created_at: &NaiveDateTime,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO category_codes (category, code, created_at) VALUES (?1, ?2, ?3)",
        params![category, code, format_timestamp(created_at)],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            DatabaseError::ConstraintViolation(format!(
                "category code {code} or category '{category}' already assigned"
            ))
        }
        other => DatabaseError::Sqlite(other),
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::test_support::ts;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn codes_round_trip() {
        let conn = open_memory_database().unwrap();
        insert_category_code(&conn, "Cardiology", 0, &ts(1)).unwrap();
        insert_category_code(&conn, "Neurology", 1, &ts(1)).unwrap();

        let codes = load_category_codes(&conn).unwrap();
        assert_eq!(codes.get("Cardiology"), Some(&0));
        assert_eq!(codes.get("Neurology"), Some(&1));
    }

    #[test]
    fn renumbering_rejected() {
        let conn = open_memory_database().unwrap();
        insert_category_code(&conn, "Cardiology", 0, &ts(1)).unwrap();
        let err = insert_category_code(&conn, "Cardiology", 5, &ts(2)).unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
        let err = insert_category_code(&conn, "Oncology", 0, &ts(2)).unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
    }
}

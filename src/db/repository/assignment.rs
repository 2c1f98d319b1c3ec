use rusqlite::{params, Connection};

use super::{format_timestamp, parse_timestamp};
use crate::db::DatabaseError;
use crate::models::{ClusterAssignment, ClusterScope};

/// Insert or overwrite the current assignment of one subject in one scope.
pub fn upsert_assignment(conn: &Connection, assignment: &ClusterAssignment) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO cluster_assignments (scope, document_id, cluster_id, model_version, computed_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(scope, document_id) DO UPDATE SET
             cluster_id = excluded.cluster_id,
             model_version = excluded.model_version,
             computed_at = excluded.computed_at",
        params![
            assignment.scope.key(),
            assignment.document_id,
            assignment.cluster_id,
            assignment.model_version,
            format_timestamp(&assignment.computed_at),
        ],
    )?;
    Ok(())
}

/// Remove every assignment of a scope. Returns the number of rows removed.
pub fn clear_scope_assignments(conn: &Connection, scope: &ClusterScope) -> Result<usize, DatabaseError> {
    let removed = conn.execute(
        "DELETE FROM cluster_assignments WHERE scope = ?1",
        params![scope.key()],
    )?;
    Ok(removed)
}

pub fn list_assignments(conn: &Connection, scope: &ClusterScope) -> Result<Vec<ClusterAssignment>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT document_id, cluster_id, model_version, computed_at
         FROM cluster_assignments WHERE scope = ?1 ORDER BY document_id ASC",
    )?;
    let rows = stmt.query_map(params![scope.key()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, u32>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;

    let mut assignments = Vec::new();
    for row in rows {
        let (document_id, cluster_id, model_version, computed_at) = row?;
        assignments.push(ClusterAssignment {
            document_id,
            scope: scope.clone(),
            cluster_id,
            model_version,
            computed_at: parse_timestamp(&computed_at)?,
        });
    }
    Ok(assignments)
}

//! Writes sweep results out: cluster assignments into the store, a JSON
//! summary report onto disk, and summary lines into the log.

use std::path::{Path, PathBuf};

use rusqlite::Connection;
use serde::Serialize;

use super::engine::{ScopeOutcome, ScopeResult, SweepReport};
use super::error::AnalyticsError;
use crate::config::{APP_NAME, APP_VERSION};
use crate::db::repository;
use crate::models::{ClusterAssignment, ClusterScope};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PublishReport {
    pub scopes_written: usize,
    pub assignments_written: usize,
    /// Scopes whose write failed, with the error.
    pub failed_scopes: Vec<(ClusterScope, String)>,
}

/// Replace the stored assignments of every clustered scope.
///
/// Each scope is written in its own transaction; skipped scopes keep their
/// previous assignments. A failing scope is reported, not fatal.
pub fn publish_assignments(conn: &Connection, report: &SweepReport) -> PublishReport {
    let mut published = PublishReport::default();

    for result in report.scopes().filter_map(ScopeOutcome::clustered) {
        match write_scope(conn, report, result) {
            Ok(count) => {
                published.scopes_written += 1;
                published.assignments_written += count;
            }
            Err(e) => {
                tracing::error!(scope = %result.scope, error = %e, "Failed to publish assignments");
                published.failed_scopes.push((result.scope.clone(), e.to_string()));
            }
        }
    }

    published
}

fn write_scope(conn: &Connection, report: &SweepReport, result: &ScopeResult) -> Result<usize, AnalyticsError> {
    let tx = conn.unchecked_transaction()?;
    let cleared = repository::clear_scope_assignments(&tx, &result.scope)?;

    for (document_id, cluster_id) in &result.assignments {
        repository::upsert_assignment(
            &tx,
            &ClusterAssignment {
                document_id: document_id.clone(),
                scope: result.scope.clone(),
                cluster_id: *cluster_id,
                model_version: report.model_version.clone(),
                computed_at: report.computed_at,
            },
        )?;
    }

    tx.commit()?;
    tracing::debug!(
        scope = %result.scope,
        cleared,
        written = result.assignments.len(),
        "Assignments replaced"
    );
    Ok(result.assignments.len())
}

#[derive(Serialize)]
struct SummaryArtifact<'a> {
    generator: String,
    #[serde(flatten)]
    report: &'a SweepReport,
}

/// Write the sweep as `cluster_summary_<YYYYMMDD_HHMMSS>.json` under `report_dir`.
pub fn write_summary_report(report_dir: &Path, report: &SweepReport) -> Result<PathBuf, AnalyticsError> {
    std::fs::create_dir_all(report_dir).map_err(|source| AnalyticsError::Io {
        path: report_dir.to_path_buf(),
        source,
    })?;

    let file_name = format!(
        "cluster_summary_{}.json",
        report.computed_at.format("%Y%m%d_%H%M%S")
    );
    let path = report_dir.join(file_name);

    let artifact = SummaryArtifact {
        generator: format!("{APP_NAME} {APP_VERSION}"),
        report,
    };
    let json = serde_json::to_string_pretty(&artifact)?;
    std::fs::write(&path, json).map_err(|source| AnalyticsError::Io {
        path: path.clone(),
        source,
    })?;

    tracing::info!(path = %path.display(), "Cluster summary written");
    Ok(path)
}

/// One log line per scope plus one per cluster.
pub fn log_sweep_summary(report: &SweepReport) {
    for outcome in report.scopes() {
        match outcome {
            ScopeOutcome::Clustered(result) => {
                tracing::info!(
                    scope = %result.scope,
                    rows = result.assignments.len(),
                    clusters = result.summaries.len(),
                    inertia = result.inertia,
                    "Scope summary"
                );
                for s in &result.summaries {
                    tracing::info!(
                        scope = %result.scope,
                        cluster = s.cluster_id,
                        count = s.count,
                        mean_age = s.mean_age,
                        mean_risk = s.mean_risk,
                        "Cluster summary"
                    );
                }
            }
            ScopeOutcome::Skipped { scope, rows, reason } => {
                tracing::info!(scope = %scope, rows, reason = ?reason, "Scope skipped");
            }
            ScopeOutcome::Failed { scope, error } => {
                tracing::info!(scope = %scope, error = %error, "Scope failed");
            }
        }
    }
}

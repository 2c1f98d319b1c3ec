//! Clustering sweep: one global partition plus one independent partition per
//! segment. Each scope gets its own matrix, scaler and effective K; cluster
//! ids of different scopes share nothing.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::category::SegmentEncoder;
use super::error::AnalyticsError;
use super::kmeans::{self, KMeansConfig};
use super::matrix::{build_matrix, BuildReport, FeatureMatrix, Population};
use super::scaler::StandardScaler;
use crate::config::ClusteringSettings;
use crate::models::ClusterScope;

/// Smallest population that can be clustered.
pub const MIN_POPULATION: usize = 2;

/// Per-cluster statistics on the unscaled values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub cluster_id: u32,
    pub count: usize,
    pub mean_age: f64,
    /// Sample standard deviation; `None` for a single-member cluster.
    pub std_age: Option<f64>,
    pub mean_risk: f64,
    pub std_risk: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeResult {
    pub scope: ClusterScope,
    pub requested_k: usize,
    pub effective_k: usize,
    /// (document_id, cluster_id) in matrix row order.
    pub assignments: Vec<(String, u32)>,
    pub summaries: Vec<ClusterSummary>,
    pub inertia: f64,
    pub iterations: usize,
    pub converged: bool,
    pub scaler: StandardScaler,
    pub build: BuildReport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    PopulationTooSmall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScopeOutcome {
    Clustered(ScopeResult),
    Skipped {
        scope: ClusterScope,
        rows: usize,
        reason: SkipReason,
    },
    Failed {
        scope: ClusterScope,
        error: String,
    },
}

impl ScopeOutcome {
    pub fn scope(&self) -> &ClusterScope {
        match self {
            Self::Clustered(result) => &result.scope,
            Self::Skipped { scope, .. } | Self::Failed { scope, .. } => scope,
        }
    }

    pub fn clustered(&self) -> Option<&ScopeResult> {
        match self {
            Self::Clustered(result) => Some(result),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    pub model_version: String,
    pub computed_at: NaiveDateTime,
    pub global: ScopeOutcome,
    /// One entry per segment value, sorted by label.
    pub segments: Vec<ScopeOutcome>,
}

impl SweepReport {
    pub fn scopes(&self) -> impl Iterator<Item = &ScopeOutcome> {
        std::iter::once(&self.global).chain(&self.segments)
    }

    pub fn segment(&self, label: &str) -> Option<&ScopeOutcome> {
        self.segments
            .iter()
            .find(|o| matches!(o.scope(), ClusterScope::Segment(l) if l == label))
    }
}

/// Cluster one already built matrix.
pub fn cluster_matrix(matrix: &FeatureMatrix, settings: &ClusteringSettings) -> ScopeOutcome {
    let scope = matrix.scope.clone();
    let n = matrix.len();

    if n < MIN_POPULATION {
        tracing::warn!(scope = %scope, rows = n, "Population too small to cluster, skipping");
        return ScopeOutcome::Skipped {
            scope,
            rows: n,
            reason: SkipReason::PopulationTooSmall,
        };
    }

    let effective_k = settings.n_clusters.min(n);
    let config = match KMeansConfig::new(
        effective_k,
        settings.max_iterations,
        settings.tolerance,
        settings.n_init,
        settings.seed,
    ) {
        Ok(config) => config,
        Err(e) => return fail(scope, e),
    };

    let fit = match kmeans::fit(&matrix.standardized(), &config) {
        Ok(fit) => fit,
        Err(e) => return fail(scope, e),
    };

    let summaries = summarize(matrix, &fit.labels, fit.n_clusters());
    let assignments = matrix
        .rows
        .iter()
        .zip(&fit.labels)
        .map(|(row, &label)| (row.document_id.clone(), label))
        .collect();

    tracing::info!(
        scope = %scope,
        rows = n,
        requested_k = settings.n_clusters,
        effective_k,
        clusters = summaries.len(),
        converged = fit.converged,
        "Scope clustered"
    );

    ScopeOutcome::Clustered(ScopeResult {
        scope,
        requested_k: settings.n_clusters,
        effective_k,
        assignments,
        summaries,
        inertia: fit.inertia,
        iterations: fit.iterations,
        converged: fit.converged,
        scaler: matrix.scaler.clone(),
        build: matrix.report.clone(),
    })
}

fn fail(scope: ClusterScope, e: AnalyticsError) -> ScopeOutcome {
    tracing::error!(scope = %scope, error = %e, "Clustering failed for scope");
    ScopeOutcome::Failed {
        scope,
        error: e.to_string(),
    }
}

/// Global scope first, then every segment in label order.
pub fn run_sweep(
    population: &Population,
    settings: &ClusteringSettings,
    encoder: &mut SegmentEncoder<'_>,
    computed_at: NaiveDateTime,
) -> SweepReport {
    let global_matrix = build_matrix(population, &ClusterScope::Global, encoder);
    let global = cluster_matrix(&global_matrix, settings);

    let segments = population
        .segments()
        .into_iter()
        .map(|label| {
            let matrix = build_matrix(population, &ClusterScope::Segment(label), encoder);
            cluster_matrix(&matrix, settings)
        })
        .collect();

    SweepReport {
        model_version: settings.model_version.clone(),
        computed_at,
        global,
        segments,
    }
}

fn summarize(matrix: &FeatureMatrix, labels: &[u32], k: usize) -> Vec<ClusterSummary> {
    (0..k as u32)
        .filter_map(|cluster_id| {
            let members: Vec<_> = matrix
                .rows
                .iter()
                .zip(labels)
                .filter(|(_, l)| **l == cluster_id)
                .map(|(row, _)| row)
                .collect();
            if members.is_empty() {
                return None;
            }
            let ages: Vec<f64> = members.iter().map(|r| r.age).collect();
            let risks: Vec<f64> = members.iter().map(|r| r.risk_score).collect();
            Some(ClusterSummary {
                cluster_id,
                count: members.len(),
                mean_age: mean(&ages),
                std_age: sample_std(&ages),
                mean_risk: mean(&risks),
                std_risk: sample_std(&risks),
            })
        })
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

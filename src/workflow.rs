//! End-to-end wiring: register → extract → cluster → publish.
//!
//! Each stage takes the settings and the store explicitly. The binary calls
//! these; tests drive them with an in-memory store and a scripted LLM.

use std::path::PathBuf;

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::analytics::{
    log_sweep_summary, publish_assignments, run_sweep, write_summary_report, AnalyticsError,
    CategoryDictionary, CategoryPolicy, Population, PublishReport, SegmentEncoder, SweepReport,
};
use crate::config::{ConfigError, Settings};
use crate::db::{self, DatabaseError};
use crate::pipeline::batch_extraction::{
    BatchReport, ExtractionRunner, NoteExtractor, NoteSource, PipelineError, RunnerConfig,
    SqliteFeatureStore,
};
use crate::pipeline::extractor::{ExtractorError, LlmNoteExtractor, OllamaClient};
use crate::pipeline::source::{register_notes, RegistrationReport};

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Extractor(#[from] ExtractorError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Analytics(#[from] AnalyticsError),
}

/// Open (and migrate) the store named by the settings.
pub fn open_store(settings: &Settings) -> Result<SqliteFeatureStore, WorkflowError> {
    if let Some(parent) = settings.database_path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let conn = db::open_database(&settings.database_path)?;
    Ok(SqliteFeatureStore::new(conn))
}

/// Ollama-backed extractor from the extraction settings.
pub fn build_extractor(settings: &Settings) -> Result<LlmNoteExtractor, ExtractorError> {
    let ext = &settings.extraction;
    let client = OllamaClient::new(&ext.base_url, ext.timeout_secs)?;
    Ok(LlmNoteExtractor::new(
        Box::new(client),
        &ext.model_name,
        &ext.extraction_method,
    ))
}

pub fn run_registration(
    settings: &Settings,
    store: &SqliteFeatureStore,
    now: NaiveDateTime,
) -> Result<RegistrationReport, PipelineError> {
    store.with_conn(|conn| {
        Ok(register_notes(
            conn,
            &settings.notes_dir,
            &settings.data_type,
            now.date(),
            now,
        )?)
    })
}

pub fn run_extraction(
    settings: &Settings,
    store: &SqliteFeatureStore,
    source: &dyn NoteSource,
    extractor: &dyn NoteExtractor,
) -> Result<BatchReport, PipelineError> {
    let config = RunnerConfig {
        data_type: settings.data_type.clone(),
        batch_size: settings.extraction.batch_size,
        workers: settings.extraction.workers,
    };
    ExtractionRunner::new(store, source, extractor, config).run_batch()
}

#[derive(Debug, Clone)]
pub struct ClusteringRun {
    pub sweep: SweepReport,
    pub published: PublishReport,
    /// Dictionary entries added by this run (always 0 under `PerBuild`).
    pub new_categories: usize,
    pub report_path: PathBuf,
}

/// Cluster every featured document, publish the assignments and write the
/// summary report.
pub fn run_clustering(
    settings: &Settings,
    store: &SqliteFeatureStore,
    now: NaiveDateTime,
) -> Result<ClusteringRun, AnalyticsError> {
    let population = Population::load(store)?;
    tracing::info!(
        subjects = population.len(),
        policy = ?settings.clustering.category_policy,
        "Starting clustering sweep"
    );

    let (sweep, new_categories) = match settings.clustering.category_policy {
        CategoryPolicy::PerBuild => (
            run_sweep(&population, &settings.clustering, &mut SegmentEncoder::PerBuild, now),
            0,
        ),
        CategoryPolicy::Persisted => {
            let mut dictionary =
                store.with_conn(|conn| Ok::<_, AnalyticsError>(CategoryDictionary::load(conn)?))?;
            let sweep = run_sweep(
                &population,
                &settings.clustering,
                &mut SegmentEncoder::Persisted(&mut dictionary),
                now,
            );
            let saved =
                store.with_conn(|conn| Ok::<_, AnalyticsError>(dictionary.save_new(conn, &now)?))?;
            (sweep, saved)
        }
    };

    log_sweep_summary(&sweep);
    let published = store.with_conn(|conn| Ok::<_, AnalyticsError>(publish_assignments(conn, &sweep)))?;
    let report_path = write_summary_report(&settings.report_dir, &sweep)?;

    Ok(ClusteringRun {
        sweep,
        published,
        new_categories,
        report_path,
    })
}

#[derive(Debug)]
pub struct RunSummary {
    pub registration: RegistrationReport,
    pub extraction: BatchReport,
    pub clustering: ClusteringRun,
}

/// All three stages in order.
pub fn run_all(
    settings: &Settings,
    store: &SqliteFeatureStore,
    source: &dyn NoteSource,
    extractor: &dyn NoteExtractor,
    now: NaiveDateTime,
) -> Result<RunSummary, WorkflowError> {
    let registration = run_registration(settings, store, now)?;
    let extraction = run_extraction(settings, store, source, extractor)?;
    let clustering = run_clustering(settings, store, now)?;
    Ok(RunSummary {
        registration,
        extraction,
        clustering,
    })
}

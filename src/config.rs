//! Process-wide settings.
//!
//! `Settings` is constructed once at startup (defaults, or a JSON file) and
//! handed to every component by reference. Nothing below this module reads
//! environment variables.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analytics::CategoryPolicy;

/// Application-level constants
pub const APP_NAME: &str = "CohortLens";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "info,cohortlens_lib=info"
}

/// Get the application data directory (~/CohortLens/), falling back to the
/// working directory when no home directory can be resolved.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid settings JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid setting: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// SQLite feature store.
    pub database_path: PathBuf,
    /// Directory holding raw `<subject>_note_<YYYYMMDD>.json` notes.
    pub notes_dir: PathBuf,
    /// Where sweep summary reports are written.
    pub report_dir: PathBuf,
    /// Document type the extraction batch selects.
    pub data_type: String,
    pub extraction: ExtractionSettings,
    pub clustering: ClusteringSettings,
}

impl Default for Settings {
    fn default() -> Self {
        let base = app_data_dir();
        Self {
            database_path: base.join("cohortlens.db"),
            notes_dir: base.join("clinical_notes"),
            report_dir: base.join("reports"),
            data_type: "clinical_note".to_string(),
            extraction: ExtractionSettings::default(),
            clustering: ClusteringSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    /// Ollama endpoint.
    pub base_url: String,
    /// Model used for extraction, also recorded as the features' model_version.
    pub model_name: String,
    pub timeout_secs: u64,
    /// Recorded on every feature as extraction_method.
    pub extraction_method: String,
    /// Maximum documents selected per run.
    pub batch_size: usize,
    /// Documents processed concurrently.
    pub workers: usize,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model_name: "medgemma:4b".to_string(),
            timeout_secs: 300,
            extraction_method: "llm-structured-extraction".to_string(),
            batch_size: 200,
            workers: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringSettings {
    /// Requested cluster count K, clamped per scope to the population size.
    pub n_clusters: usize,
    pub seed: u64,
    /// Hard cap on Lloyd iterations per restart.
    pub max_iterations: usize,
    /// Convergence threshold on the largest centroid shift.
    pub tolerance: f64,
    /// Seeded restarts; the lowest-inertia partition wins.
    pub n_init: usize,
    /// Tag written with every cluster assignment.
    pub model_version: String,
    pub category_policy: CategoryPolicy,
}

impl Default for ClusteringSettings {
    fn default() -> Self {
        Self {
            n_clusters: 4,
            seed: 42,
            max_iterations: 300,
            tolerance: 1e-4,
            n_init: 1,
            model_version: "kmeans_v1".to_string(),
            category_policy: CategoryPolicy::Persisted,
        }
    }
}

impl Settings {
    /// Load settings from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Settings = serde_json::from_str(&raw)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.extraction.batch_size == 0 {
            return Err(ConfigError::Invalid("extraction.batch_size must be > 0".into()));
        }
        if self.extraction.workers == 0 {
            return Err(ConfigError::Invalid("extraction.workers must be > 0".into()));
        }
        if self.clustering.n_clusters == 0 {
            return Err(ConfigError::Invalid("clustering.n_clusters must be > 0".into()));
        }
        if self.clustering.max_iterations == 0 {
            return Err(ConfigError::Invalid("clustering.max_iterations must be > 0".into()));
        }
        if self.clustering.n_init == 0 {
            return Err(ConfigError::Invalid("clustering.n_init must be > 0".into()));
        }
        if !(self.clustering.tolerance.is_finite() && self.clustering.tolerance > 0.0) {
            return Err(ConfigError::Invalid(
                "clustering.tolerance must be a finite positive number".into(),
            ));
        }
        Ok(())
    }
}

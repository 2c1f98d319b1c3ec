//! Cohort analytics: feature matrix construction, k-means clustering and
//! publication of the resulting assignments.
//!
//! ```text
//! FeatureStore → Population → build_matrix → cluster_matrix → publish
//! ```
//!
//! Every scope (global, then one per segment) builds its own matrix and fits
//! its own scaler. A scope that fails or is too small never stops the sweep.

pub mod category;
pub mod engine;
pub mod error;
pub mod kmeans;
pub mod matrix;
pub mod publisher;
pub mod scaler;

pub use category::{CategoryDictionary, CategoryPolicy, SegmentEncoder, UNKNOWN_SEGMENT};
pub use engine::{
    cluster_matrix, run_sweep, ClusterSummary, ScopeOutcome, ScopeResult, SkipReason, SweepReport,
    MIN_POPULATION,
};
pub use error::AnalyticsError;
pub use kmeans::{KMeansConfig, KMeansFit};
pub use matrix::{build_matrix, BuildReport, FeatureMatrix, FeatureMatrixRow, Population, SubjectFeatures};
pub use publisher::{log_sweep_summary, publish_assignments, write_summary_report, PublishReport};
pub use scaler::StandardScaler;

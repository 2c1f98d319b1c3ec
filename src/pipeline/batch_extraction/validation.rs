// Plausibility checks on normalized feature records.
// Applied between normalize() and persistence. Never drops or alters a record:
// out-of-contract values are persisted as-is and surfaced as warnings.

use crate::models::{FeatureRecord, FeatureType, MedicalDepartment};

use super::normalizer::MEDICAL_DEPARTMENT;

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationWarning {
    /// Severity or risk value outside [0, 1], or not a finite number.
    OutOfRange {
        feature_id: String,
        feature_name: String,
        value: String,
    },
    /// Department label not in the fixed enumeration.
    UnknownDepartment { feature_id: String, value: String },
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfRange { feature_name, value, .. } => {
                write!(f, "{feature_name}={value} outside [0, 1]")
            }
            Self::UnknownDepartment { value, .. } => {
                write!(f, "unknown medical department {value:?}")
            }
        }
    }
}

/// Validate one document's records and log every warning against it.
pub fn validate_features(document_id: &str, records: &[FeatureRecord]) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    for record in records {
        match record.feature_type {
            FeatureType::Symptom | FeatureType::Risk => {
                if !is_unit_interval(&record.feature_value) {
                    warnings.push(ValidationWarning::OutOfRange {
                        feature_id: record.feature_id.clone(),
                        feature_name: record.feature_name.clone(),
                        value: record.feature_value.clone(),
                    });
                }
            }
            FeatureType::Category if record.feature_name == MEDICAL_DEPARTMENT => {
                if MedicalDepartment::from_label(&record.feature_value).is_none() {
                    warnings.push(ValidationWarning::UnknownDepartment {
                        feature_id: record.feature_id.clone(),
                        value: record.feature_value.clone(),
                    });
                }
            }
            _ => {}
        }
    }

    for warning in &warnings {
        tracing::warn!(
            document_id,
            warning = %warning,
            "Feature persisted despite validation warning"
        );
    }

    warnings
}

fn is_unit_interval(raw: &str) -> bool {
    raw.parse::<f64>()
        .map(|v| v.is_finite() && (0.0..=1.0).contains(&v))
        .unwrap_or(false)
}

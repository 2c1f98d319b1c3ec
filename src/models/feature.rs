use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::enums::FeatureType;

/// Atomic fact derived from one document. Created once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    /// Content-derived identity, see `pipeline::batch_extraction::identity`.
    pub feature_id: String,
    pub document_id: String,
    pub feature_type: FeatureType,
    pub feature_name: String,
    pub feature_value: String,
    pub unit: Option<String>,
    pub extraction_method: String,
    pub model_version: String,
    pub created_at: NaiveDateTime,
}

impl FeatureRecord {
    /// Equality on everything except `created_at`.
    pub fn same_content(&self, other: &FeatureRecord) -> bool {
        self.feature_id == other.feature_id
            && self.document_id == other.document_id
            && self.feature_type == other.feature_type
            && self.feature_name == other.feature_name
            && self.feature_value == other.feature_value
            && self.unit == other.unit
            && self.extraction_method == other.extraction_method
            && self.model_version == other.model_version
    }
}

/// Who produced a set of features: extraction method name and model version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionProvenance {
    pub method: String,
    pub model_version: String,
}

impl ExtractionProvenance {
    pub fn new(method: impl Into<String>, model_version: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            model_version: model_version.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(value: &str) -> FeatureRecord {
        FeatureRecord {
            feature_id: "abc".into(),
            document_id: "doc-1".into(),
            feature_type: FeatureType::Risk,
            feature_name: "risk_score".into(),
            feature_value: value.into(),
            unit: Some("probability".into()),
            extraction_method: "llm".into(),
            model_version: "m1".into(),
            created_at: chrono::NaiveDate::from_ymd_opt(2026, 3, 1)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn same_content_ignores_timestamp() {
        let a = record("0.3");
        let mut b = a.clone();
        b.created_at = b.created_at + chrono::Duration::hours(5);
        assert!(a.same_content(&b));
    }

    #[test]
    fn differing_value_is_not_same_content() {
        assert!(!record("0.3").same_content(&record("0.4")));
    }
}

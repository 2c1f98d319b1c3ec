//! Feature normalizer: one extraction result in, atomic feature records out.
//!
//! Pure function of its inputs. Field policy:
//! - demographics: one record per present field, only age carries a unit
//! - symptoms: one record per normalized name, unit `severity_score`
//! - diagnosis: at most one `primary_diagnosis` record
//! - risk: at most one `risk_score` record, unit `probability`
//! - department: at most one `category/medical_department` record, value kept
//!   verbatim even when outside the known enumeration

use chrono::NaiveDateTime;

use crate::models::{ExtractionProvenance, ExtractionResult, FeatureRecord, FeatureType};

use super::identity::feature_id;

pub const AGE: &str = "age";
pub const GENDER: &str = "gender";
pub const HEIGHT: &str = "height";
pub const WEIGHT: &str = "weight";
pub const PRIMARY_DIAGNOSIS: &str = "primary_diagnosis";
pub const RISK_SCORE: &str = "risk_score";
pub const MEDICAL_DEPARTMENT: &str = "medical_department";

pub const UNIT_YEARS: &str = "years";
pub const UNIT_SEVERITY: &str = "severity_score";
pub const UNIT_PROBABILITY: &str = "probability";

/// Lower-case the name and replace every whitespace character with `_`.
/// Leading and trailing whitespace is replaced too, never trimmed.
pub fn normalize_symptom_name(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect::<String>()
        .to_lowercase()
}

/// String encoding of numeric feature values (shortest round-trip form).
pub fn encode_number(value: f64) -> String {
    value.to_string()
}

/// Build the feature records for one document.
///
/// Returns an empty list when nothing usable was extracted; the caller logs
/// the skip.
pub fn normalize(
    document_id: &str,
    result: &ExtractionResult,
    provenance: &ExtractionProvenance,
    created_at: NaiveDateTime,
) -> Vec<FeatureRecord> {
    let mut builder = RecordBuilder {
        document_id,
        provenance,
        created_at,
        records: Vec::new(),
    };

    builder.text(FeatureType::Demographic, AGE, result.age.as_deref(), Some(UNIT_YEARS));
    builder.text(FeatureType::Demographic, GENDER, result.gender.as_deref(), None);
    builder.text(FeatureType::Demographic, HEIGHT, result.height.as_deref(), None);
    builder.text(FeatureType::Demographic, WEIGHT, result.weight.as_deref(), None);

    // Spellings that normalize to the same name collapse; the later value wins.
    let mut symptoms: Vec<(String, f64)> = Vec::with_capacity(result.symptoms.len());
    for symptom in &result.symptoms {
        if symptom.name.trim().is_empty() {
            continue;
        }
        let name = normalize_symptom_name(&symptom.name);
        match symptoms.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => {
                tracing::debug!(
                    document_id,
                    symptom = %name,
                    "Duplicate symptom spelling, keeping later severity"
                );
                entry.1 = symptom.severity;
            }
            None => symptoms.push((name, symptom.severity)),
        }
    }
    for (name, severity) in &symptoms {
        builder.push(
            FeatureType::Symptom,
            name,
            encode_number(*severity),
            Some(UNIT_SEVERITY),
        );
    }

    builder.text(
        FeatureType::Diagnosis,
        PRIMARY_DIAGNOSIS,
        result.diagnosis.as_deref(),
        None,
    );

    if let Some(risk) = result.risk_score {
        builder.push(
            FeatureType::Risk,
            RISK_SCORE,
            encode_number(risk),
            Some(UNIT_PROBABILITY),
        );
    }

    builder.text(
        FeatureType::Category,
        MEDICAL_DEPARTMENT,
        result.medical_department.as_deref(),
        None,
    );

    builder.records
}

struct RecordBuilder<'a> {
    document_id: &'a str,
    provenance: &'a ExtractionProvenance,
    created_at: NaiveDateTime,
    records: Vec<FeatureRecord>,
}

impl RecordBuilder<'_> {
    /// Blank strings count as absent.
    fn text(&mut self, feature_type: FeatureType, name: &str, value: Option<&str>, unit: Option<&str>) {
        if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
            self.push(feature_type, name, value.to_string(), unit);
        }
    }

    fn push(&mut self, feature_type: FeatureType, name: &str, value: String, unit: Option<&str>) {
        self.records.push(FeatureRecord {
            feature_id: feature_id(self.document_id, feature_type, name, &value),
            document_id: self.document_id.to_string(),
            feature_type,
            feature_name: name.to_string(),
            feature_value: value,
            unit: unit.map(str::to_string),
            extraction_method: self.provenance.method.clone(),
            model_version: self.provenance.model_version.clone(),
            created_at: self.created_at,
        });
    }
}

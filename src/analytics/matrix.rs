//! Feature matrix builder.
//!
//! Build order for one population scope:
//! 1. pivot each subject's records to one value per (type, name), last wins
//! 2. drop rows without a plain numeric age or risk_score
//! 3. encode gender: male 1, female 0, anything else or missing -1
//! 4. encode the segment label through the chosen `SegmentEncoder`
//! 5. replace any non-finite value left with 0
//!
//! The fitted scaler travels with the rows.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::category::{CategoryPolicy, SegmentEncoder, UNKNOWN_SEGMENT};
use super::error::AnalyticsError;
use super::scaler::StandardScaler;
use crate::models::{ClusterScope, FeatureRecord, FeatureType};
use crate::pipeline::batch_extraction::normalizer::{AGE, GENDER, MEDICAL_DEPARTMENT, RISK_SCORE};
use crate::pipeline::batch_extraction::FeatureStore;

/// Number of numeric columns: age, risk_score, gender, segment.
pub const FEATURE_COLUMNS: usize = 4;

pub const GENDER_MALE: f64 = 1.0;
pub const GENDER_FEMALE: f64 = 0.0;
pub const GENDER_UNKNOWN: f64 = -1.0;

static PLAIN_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+\.?[0-9]*$").expect("valid regex"));

/// All feature records of one document.
#[derive(Debug, Clone)]
pub struct SubjectFeatures {
    pub document_id: String,
    pub records: Vec<FeatureRecord>,
}

impl SubjectFeatures {
    /// The subject's segment: its `category/medical_department` value.
    pub fn segment(&self) -> Option<&str> {
        self.records
            .iter()
            .rev()
            .find(|r| r.feature_type == FeatureType::Category && r.feature_name == MEDICAL_DEPARTMENT)
            .map(|r| r.feature_value.as_str())
    }
}

/// Every featured subject, read back through the feature store gateway.
#[derive(Debug, Clone, Default)]
pub struct Population {
    subjects: Vec<SubjectFeatures>,
}

impl Population {
    pub fn load(store: &dyn FeatureStore) -> Result<Self, AnalyticsError> {
        let mut subjects = Vec::new();
        for document_id in store.list_featured_documents()? {
            let records = store.list_by_subject(&document_id)?;
            subjects.push(SubjectFeatures {
                document_id,
                records,
            });
        }
        tracing::debug!(subjects = subjects.len(), "Population loaded");
        Ok(Self { subjects })
    }

    pub fn from_subjects(subjects: Vec<SubjectFeatures>) -> Self {
        Self { subjects }
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    /// Distinct segment values, sorted.
    pub fn segments(&self) -> Vec<String> {
        self.subjects
            .iter()
            .filter_map(SubjectFeatures::segment)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    fn in_scope<'a>(&'a self, scope: &'a ClusterScope) -> impl Iterator<Item = &'a SubjectFeatures> + 'a {
        self.subjects.iter().filter(move |s| match scope {
            ClusterScope::Global => true,
            ClusterScope::Segment(label) => s.segment() == Some(label.as_str()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrixRow {
    pub document_id: String,
    pub age: f64,
    pub risk_score: f64,
    pub gender_encoded: f64,
    pub segment_encoded: f64,
    pub segment_label: Option<String>,
}

impl FeatureMatrixRow {
    pub fn values(&self) -> [f64; FEATURE_COLUMNS] {
        [self.age, self.risk_score, self.gender_encoded, self.segment_encoded]
    }
}

/// Data-quality counters for one build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildReport {
    pub subjects: usize,
    pub rows: usize,
    pub missing_age: usize,
    pub missing_risk: usize,
    /// Same (type, name) seen with different values for one subject.
    pub pivot_conflicts: usize,
    /// Non-finite values replaced by 0.
    pub filled_values: usize,
    pub category_policy: Option<CategoryPolicy>,
    /// Segment code table used for this build.
    pub segment_codes: BTreeMap<String, i64>,
}

#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    pub scope: ClusterScope,
    pub rows: Vec<FeatureMatrixRow>,
    pub scaler: StandardScaler,
    pub report: BuildReport,
}

impl FeatureMatrix {
    pub fn raw(&self) -> Vec<[f64; FEATURE_COLUMNS]> {
        self.rows.iter().map(FeatureMatrixRow::values).collect()
    }

    pub fn standardized(&self) -> Vec<[f64; FEATURE_COLUMNS]> {
        self.scaler.transform(&self.raw())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Pivoted view of one subject.
struct Pivot<'a> {
    values: BTreeMap<(FeatureType, &'a str), &'a str>,
    conflicts: usize,
}

fn pivot(subject: &SubjectFeatures) -> Pivot<'_> {
    let mut values = BTreeMap::new();
    let mut conflicts = 0;
    for record in &subject.records {
        let key = (record.feature_type, record.feature_name.as_str());
        if let Some(previous) = values.insert(key, record.feature_value.as_str()) {
            if previous != record.feature_value {
                conflicts += 1;
                tracing::warn!(
                    document_id = %subject.document_id,
                    feature = %record.feature_name,
                    kept = %record.feature_value,
                    dropped = %previous,
                    "Conflicting feature values, keeping last written"
                );
            }
        }
    }
    Pivot { values, conflicts }
}

/// Plain unsigned decimal only; anything else counts as missing.
pub fn parse_plain_number(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if PLAIN_NUMBER_RE.is_match(raw) {
        raw.parse().ok()
    } else {
        None
    }
}

pub fn encode_gender(raw: Option<&str>) -> f64 {
    match raw.map(|g| g.trim().to_lowercase()).as_deref() {
        Some("male") => GENDER_MALE,
        Some("female") => GENDER_FEMALE,
        _ => GENDER_UNKNOWN,
    }
}

/// Build the matrix for one scope.
pub fn build_matrix(
    population: &Population,
    scope: &ClusterScope,
    encoder: &mut SegmentEncoder<'_>,
) -> FeatureMatrix {
    let mut report = BuildReport {
        category_policy: Some(encoder.policy()),
        ..Default::default()
    };

    struct Partial {
        document_id: String,
        age: f64,
        risk: f64,
        gender: f64,
        segment: Option<String>,
    }

    let mut partial = Vec::new();
    for subject in population.in_scope(scope) {
        report.subjects += 1;
        let pivoted = pivot(subject);
        report.pivot_conflicts += pivoted.conflicts;

        let lookup = |ty: FeatureType, name: &'static str| pivoted.values.get(&(ty, name)).copied();
        let age = lookup(FeatureType::Demographic, AGE).and_then(parse_plain_number);
        let risk = lookup(FeatureType::Risk, RISK_SCORE).and_then(parse_plain_number);

        let (Some(age), Some(risk)) = (age, risk) else {
            if age.is_none() {
                report.missing_age += 1;
            }
            if risk.is_none() {
                report.missing_risk += 1;
            }
            tracing::debug!(document_id = %subject.document_id, "Row dropped: missing age or risk_score");
            continue;
        };

        partial.push(Partial {
            document_id: subject.document_id.clone(),
            age,
            risk,
            gender: encode_gender(lookup(FeatureType::Demographic, GENDER)),
            segment: lookup(FeatureType::Category, MEDICAL_DEPARTMENT).map(str::to_string),
        });
    }

    let labels: BTreeSet<&str> = partial
        .iter()
        .map(|p| p.segment.as_deref().unwrap_or(UNKNOWN_SEGMENT))
        .collect();
    let codes = encoder.codes_for(&labels);

    let mut rows = Vec::with_capacity(partial.len());
    for p in partial {
        let label = p.segment.as_deref().unwrap_or(UNKNOWN_SEGMENT);
        let segment_code = codes.get(label).map_or(f64::NAN, |&c| c as f64);
        let mut row = FeatureMatrixRow {
            document_id: p.document_id,
            age: p.age,
            risk_score: p.risk,
            gender_encoded: p.gender,
            segment_encoded: segment_code,
            segment_label: p.segment,
        };
        for value in [
            &mut row.age,
            &mut row.risk_score,
            &mut row.gender_encoded,
            &mut row.segment_encoded,
        ] {
            if !value.is_finite() {
                *value = 0.0;
                report.filled_values += 1;
            }
        }
        rows.push(row);
    }

    report.rows = rows.len();
    report.segment_codes = codes;

    let raw: Vec<[f64; FEATURE_COLUMNS]> = rows.iter().map(FeatureMatrixRow::values).collect();
    let scaler = StandardScaler::fit(&raw);

    tracing::debug!(
        scope = %scope,
        subjects = report.subjects,
        rows = report.rows,
        missing_age = report.missing_age,
        missing_risk = report.missing_risk,
        pivot_conflicts = report.pivot_conflicts,
        "Feature matrix built"
    );

    FeatureMatrix {
        scope: scope.clone(),
        rows,
        scaler,
        report,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn record(doc: &str, ty: FeatureType, name: &str, value: &str) -> FeatureRecord {
        FeatureRecord {
            feature_id: crate::pipeline::batch_extraction::feature_id(doc, ty, name, value),
            document_id: doc.to_string(),
            feature_type: ty,
            feature_name: name.to_string(),
            feature_value: value.to_string(),
            unit: None,
            extraction_method: "test".to_string(),
            model_version: "v1".to_string(),
            created_at: chrono::NaiveDate::from_ymd_opt(2026, 3, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        }
    }

    /// Subject with optional age, risk, gender and department.
    pub fn subject(
        doc: &str,
        age: Option<&str>,
        risk: Option<&str>,
        gender: Option<&str>,
        dept: Option<&str>,
    ) -> SubjectFeatures {
        let mut records = Vec::new();
        if let Some(v) = age {
            records.push(record(doc, FeatureType::Demographic, AGE, v));
        }
        if let Some(v) = risk {
            records.push(record(doc, FeatureType::Risk, RISK_SCORE, v));
        }
        if let Some(v) = gender {
            records.push(record(doc, FeatureType::Demographic, GENDER, v));
        }
        if let Some(v) = dept {
            records.push(record(doc, FeatureType::Category, MEDICAL_DEPARTMENT, v));
        }
        SubjectFeatures {
            document_id: doc.to_string(),
            records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::analytics::category::CategoryDictionary;

    fn build(population: &Population) -> FeatureMatrix {
        build_matrix(population, &ClusterScope::Global, &mut SegmentEncoder::PerBuild)
    }

    #[test]
    fn fever_subject_row() {
        let population = Population::from_subjects(vec![subject(
            "D1",
            Some("45"),
            Some("0.3"),
            None,
            Some("Infectious Diseases"),
        )]);
        let matrix = build(&population);
        assert_eq!(matrix.len(), 1);
        let row = &matrix.rows[0];
        assert_eq!(row.age, 45.0);
        assert_eq!(row.risk_score, 0.3);
        assert_eq!(row.gender_encoded, GENDER_UNKNOWN);
        assert_eq!(row.segment_label.as_deref(), Some("Infectious Diseases"));
    }

    #[test]
    fn rows_missing_age_or_risk_are_dropped() {
        let population = Population::from_subjects(vec![
            subject("A", Some("40"), Some("0.5"), Some("male"), None),
            subject("B", None, Some("0.5"), Some("male"), None),
            subject("C", Some("40"), None, Some("female"), None),
            subject("D", Some("forty"), Some("0.5"), None, None),
        ]);
        let matrix = build(&population);
        let ids: Vec<_> = matrix.rows.iter().map(|r| r.document_id.as_str()).collect();
        assert_eq!(ids, vec!["A"]);
        assert_eq!(matrix.report.subjects, 4);
        assert_eq!(matrix.report.missing_age, 2);
        assert_eq!(matrix.report.missing_risk, 1);
    }

    #[test]
    fn gender_encoding() {
        assert_eq!(encode_gender(Some("male")), 1.0);
        assert_eq!(encode_gender(Some("Female")), 0.0);
        assert_eq!(encode_gender(Some("non-binary")), -1.0);
        assert_eq!(encode_gender(None), -1.0);
    }

    #[test]
    fn plain_number_rule() {
        assert_eq!(parse_plain_number("45"), Some(45.0));
        assert_eq!(parse_plain_number("0.3"), Some(0.3));
        assert_eq!(parse_plain_number("45."), Some(45.0));
        assert_eq!(parse_plain_number("-1"), None);
        assert_eq!(parse_plain_number("45 years"), None);
        assert_eq!(parse_plain_number("1e3"), None);
        assert_eq!(parse_plain_number(""), None);
    }

    #[test]
    fn last_value_wins_and_conflict_counted() {
        let mut s = subject("A", Some("40"), Some("0.2"), None, None);
        s.records.push(record("A", FeatureType::Risk, RISK_SCORE, "0.6"));
        let matrix = build(&Population::from_subjects(vec![s]));
        assert_eq!(matrix.rows[0].risk_score, 0.6);
        assert_eq!(matrix.report.pivot_conflicts, 1);
    }

    #[test]
    fn missing_segment_encoded_as_unknown() {
        let population = Population::from_subjects(vec![
            subject("A", Some("40"), Some("0.2"), None, Some("Neurology")),
            subject("B", Some("50"), Some("0.4"), None, None),
        ]);
        let matrix = build(&population);
        assert_eq!(matrix.report.segment_codes["Neurology"], 0);
        assert_eq!(matrix.report.segment_codes[UNKNOWN_SEGMENT], 1);
        assert_eq!(matrix.rows[1].segment_encoded, 1.0);
        assert_eq!(matrix.rows[1].segment_label, None);
    }

    #[test]
    fn per_build_codes_only_cover_surviving_rows() {
        let population = Population::from_subjects(vec![
            subject("A", None, Some("0.2"), None, Some("Cardiology")),
            subject("B", Some("50"), Some("0.4"), None, Some("Neurology")),
        ]);
        let matrix = build(&population);
        assert_eq!(matrix.rows[0].segment_encoded, 0.0);
        assert!(!matrix.report.segment_codes.contains_key("Cardiology"));
    }

    #[test]
    fn persisted_policy_uses_dictionary() {
        let mut dict = CategoryDictionary::default();
        dict.code_for("Radiology");
        dict.code_for("Neurology");
        let population = Population::from_subjects(vec![subject(
            "A",
            Some("40"),
            Some("0.2"),
            None,
            Some("Neurology"),
        )]);
        let matrix = build_matrix(
            &population,
            &ClusterScope::Global,
            &mut SegmentEncoder::Persisted(&mut dict),
        );
        assert_eq!(matrix.rows[0].segment_encoded, 1.0);
        assert_eq!(matrix.report.category_policy, Some(CategoryPolicy::Persisted));
    }

    #[test]
    fn overflowing_number_filled_with_zero() {
        let huge = "9".repeat(400);
        let population = Population::from_subjects(vec![subject(
            "A",
            Some(&huge),
            Some("0.2"),
            None,
            None,
        )]);
        let matrix = build(&population);
        assert_eq!(matrix.rows[0].age, 0.0);
        assert_eq!(matrix.report.filled_values, 1);
    }

    #[test]
    fn segment_scope_filters_subjects() {
        let population = Population::from_subjects(vec![
            subject("A", Some("40"), Some("0.2"), None, Some("Neurology")),
            subject("B", Some("50"), Some("0.4"), None, Some("Oncology")),
            subject("C", Some("60"), Some("0.6"), None, Some("Neurology")),
        ]);
        assert_eq!(population.segments(), vec!["Neurology", "Oncology"]);
        let matrix = build_matrix(
            &population,
            &ClusterScope::Segment("Neurology".into()),
            &mut SegmentEncoder::PerBuild,
        );
        let ids: Vec<_> = matrix.rows.iter().map(|r| r.document_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "C"]);
    }

    #[test]
    fn scaler_fitted_on_rows() {
        let population = Population::from_subjects(vec![
            subject("A", Some("40"), Some("0.2"), Some("male"), None),
            subject("B", Some("60"), Some("0.4"), Some("female"), None),
        ]);
        let matrix = build(&population);
        assert_eq!(matrix.scaler.mean[0], 50.0);
        assert_eq!(matrix.scaler.scale[0], 10.0);
        let scaled = matrix.standardized();
        assert_eq!(scaled[0][0], -1.0);
        assert_eq!(scaled[1][0], 1.0);
    }
}

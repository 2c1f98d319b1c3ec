use serde::{Deserialize, Serialize};

/// One symptom as reported by the extractor, raw spelling preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymptomScore {
    pub name: String,
    pub severity: f64,
}

/// Structured output of the extractor for one note.
///
/// Every field is optional: `None` means "not extractable", never a parse
/// failure. Demographics keep the scalar the extractor gave, string-encoded.
/// Symptoms keep the order in which the extractor listed them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub age: Option<String>,
    pub gender: Option<String>,
    pub height: Option<String>,
    pub weight: Option<String>,
    pub symptoms: Vec<SymptomScore>,
    pub diagnosis: Option<String>,
    pub risk_score: Option<f64>,
    pub medical_department: Option<String>,
}

impl ExtractionResult {
    /// The all-null result, used when the extractor output is unusable.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.age.is_none()
            && self.gender.is_none()
            && self.height.is_none()
            && self.weight.is_none()
            && self.symptoms.is_empty()
            && self.diagnosis.is_none()
            && self.risk_score.is_none()
            && self.medical_department.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_result_is_empty() {
        assert!(ExtractionResult::empty().is_empty());
    }

    #[test]
    fn single_field_is_not_empty() {
        let result = ExtractionResult {
            risk_score: Some(0.0),
            ..Default::default()
        };
        assert!(!result.is_empty());
    }
}

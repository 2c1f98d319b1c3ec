use serde_json::{Map, Value};

use super::sanitize::sanitize_llm_output;
use super::ExtractorError;
use crate::models::{ExtractionResult, SymptomScore};

/// Parse raw model output into an `ExtractionResult`.
///
/// Field parsing is lenient: a field of the wrong type reads as absent and a
/// symptom with a non-numeric severity is dropped. Only output that contains
/// no JSON object at all is `Malformed`.
pub fn parse_extraction(raw: &str) -> Result<ExtractionResult, ExtractorError> {
    let cleaned = sanitize_llm_output(raw);
    let json = locate_object(&cleaned)
        .ok_or_else(|| ExtractorError::Malformed("No JSON object found".into()))?;

    let value: Value =
        serde_json::from_str(json).map_err(|e| ExtractorError::Malformed(e.to_string()))?;
    let obj = value
        .as_object()
        .ok_or_else(|| ExtractorError::Malformed("Top-level JSON is not an object".into()))?;

    Ok(ExtractionResult {
        age: field(obj, "age").and_then(scalar_text),
        gender: field(obj, "gender").and_then(scalar_text),
        height: field(obj, "height").and_then(scalar_text),
        weight: field(obj, "weight").and_then(scalar_text),
        symptoms: field(obj, "symptoms").map(parse_symptoms).unwrap_or_default(),
        diagnosis: field(obj, "diagnosis").and_then(scalar_text),
        risk_score: field(obj, "risk_score").and_then(number),
        medical_department: field(obj, "medical_department").and_then(scalar_text),
    })
}

/// Slice from the first `{` to the last `}`.
fn locate_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Keys are matched case-insensitively (`Age` and `age` both accepted).
fn field<'a>(obj: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    obj.get(name).or_else(|| {
        obj.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    })
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => n.as_f64().map(|f| f.to_string()),
        _ => None,
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn parse_symptoms(value: &Value) -> Vec<SymptomScore> {
    let Some(map) = value.as_object() else {
        if !value.is_null() {
            tracing::warn!("Symptoms field is not an object, ignoring");
        }
        return Vec::new();
    };

    let mut symptoms = Vec::with_capacity(map.len());
    for (name, severity) in map {
        match number(severity) {
            Some(severity) => symptoms.push(SymptomScore {
                name: name.clone(),
                severity,
            }),
            None => {
                tracing::warn!(symptom = %name, "Dropping symptom with non-numeric severity");
            }
        }
    }
    symptoms
}

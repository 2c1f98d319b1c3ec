use crate::models::MedicalDepartment;

pub const EXTRACTION_SYSTEM_PROMPT: &str =
    "You are a clinical NLP model. You read clinical notes and answer with strict JSON only.";

/// Build the strict-JSON extraction prompt for one note.
pub fn build_extraction_prompt(note_text: &str) -> String {
    let departments = MedicalDepartment::all()
        .iter()
        .map(|d| d.label())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"Extract structured information from the clinical note below.

Answer with one JSON object in exactly this shape:
{{
  "Age": "string",
  "Gender": "string",
  "Height": "string",
  "Weight": "string",
  "symptoms": {{ "<symptom name>": <severity 0.0-1.0>, ... }},
  "diagnosis": "string",
  "risk_score": <number 0.0-1.0>,
  "medical_department": "string"
}}

Rules:
- List every symptom mentioned in the note.
- Every symptom severity is a number between 0.0 and 1.0.
- risk_score is a number between 0.0 and 1.0.
- medical_department is exactly one of: {departments}
- diagnosis is the single most probable diagnosis.
- Use null for anything the note does not state.
- Output nothing outside the JSON object.

Clinical Note:
{note_text}"#
    )
}

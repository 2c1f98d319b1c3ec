use super::parser::parse_extraction;
use super::prompt::{build_extraction_prompt, EXTRACTION_SYSTEM_PROMPT};
use super::{ExtractorError, LlmClient};
use crate::models::{ExtractionProvenance, ExtractionResult};
use crate::pipeline::batch_extraction::NoteExtractor;

/// `NoteExtractor` that prompts an LLM and parses its JSON answer.
pub struct LlmNoteExtractor {
    client: Box<dyn LlmClient>,
    model_name: String,
    extraction_method: String,
}

impl LlmNoteExtractor {
    pub fn new(client: Box<dyn LlmClient>, model_name: &str, extraction_method: &str) -> Self {
        Self {
            client,
            model_name: model_name.to_string(),
            extraction_method: extraction_method.to_string(),
        }
    }
}

impl NoteExtractor for LlmNoteExtractor {
    fn extract(&self, note_text: &str) -> Result<ExtractionResult, ExtractorError> {
        let prompt = build_extraction_prompt(note_text);
        let raw = self
            .client
            .generate(&self.model_name, &prompt, EXTRACTION_SYSTEM_PROMPT)?;
        parse_extraction(&raw)
    }

    fn provenance(&self) -> ExtractionProvenance {
        ExtractionProvenance::new(&self.extraction_method, &self.model_name)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Mock LLM client: returns a canned response and records the model used.
    struct MockLlmClient {
        response: Result<String, u16>,
        models: Mutex<Vec<String>>,
    }

    impl MockLlmClient {
        fn new(response: &str) -> Self {
            Self {
                response: Ok(response.to_string()),
                models: Mutex::new(Vec::new()),
            }
        }

        fn failing(status: u16) -> Self {
            Self {
                response: Err(status),
                models: Mutex::new(Vec::new()),
            }
        }
    }

    impl LlmClient for MockLlmClient {
        fn generate(&self, model: &str, prompt: &str, system: &str) -> Result<String, ExtractorError> {
            assert!(prompt.contains("Clinical Note:"));
            assert_eq!(system, EXTRACTION_SYSTEM_PROMPT);
            self.models.lock().unwrap().push(model.to_string());
            match &self.response {
                Ok(text) => Ok(text.clone()),
                Err(status) => Err(ExtractorError::Upstream {
                    status: *status,
                    body: "model not loaded".into(),
                }),
            }
        }
    }

    #[test]
    fn extracts_through_client() {
        let client = MockLlmClient::new(r#"{"Age": "45", "risk_score": 0.3}"#);
        let extractor = LlmNoteExtractor::new(Box::new(client), "medgemma:4b", "llm");
        let result = extractor.extract("patient has fever 0.8, age 45, risk 0.3").unwrap();
        assert_eq!(result.age.as_deref(), Some("45"));
        assert_eq!(result.risk_score, Some(0.3));
    }

    #[test]
    fn provenance_reports_method_and_model() {
        let extractor =
            LlmNoteExtractor::new(Box::new(MockLlmClient::new("{}")), "medgemma:4b", "llm-structured");
        assert_eq!(
            extractor.provenance(),
            ExtractionProvenance::new("llm-structured", "medgemma:4b")
        );
    }

    #[test]
    fn upstream_error_propagates() {
        let extractor = LlmNoteExtractor::new(Box::new(MockLlmClient::failing(500)), "m", "llm");
        assert!(matches!(
            extractor.extract("note"),
            Err(ExtractorError::Upstream { status: 500, .. })
        ));
    }

    #[test]
    fn unparseable_answer_is_malformed() {
        let extractor = LlmNoteExtractor::new(Box::new(MockLlmClient::new("no idea")), "m", "llm");
        assert!(matches!(extractor.extract("note"), Err(ExtractorError::Malformed(_))));
    }
}

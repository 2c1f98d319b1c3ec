//! Clinical-note extractor backed by a local LLM.
//!
//! The model is a black box with a fixed contract: note text in, an
//! `ExtractionResult` or a typed `ExtractorError` out. Whether an error is
//! recoverable is decided by the batch runner, never here.

pub mod llm;
pub mod ollama;
pub mod parser;
pub mod prompt;
pub mod sanitize;

pub use llm::LlmNoteExtractor;
pub use ollama::OllamaClient;
pub use parser::parse_extraction;
pub use prompt::{build_extraction_prompt, EXTRACTION_SYSTEM_PROMPT};
pub use sanitize::sanitize_llm_output;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractorError {
    #[error("Ollama is not running at {0}")]
    Connection(String),

    #[error("Ollama returned error (status {status}): {body}")]
    Upstream { status: u16, body: String },

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP client error: {0}")]
    Http(String),

    /// The model answered, but not with a usable JSON object.
    #[error("Malformed extractor output: {0}")]
    Malformed(String),
}

/// Text-generation backend.
pub trait LlmClient: Send + Sync {
    fn generate(&self, model: &str, prompt: &str, system: &str) -> Result<String, ExtractorError>;
}

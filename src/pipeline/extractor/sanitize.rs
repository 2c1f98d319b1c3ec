//! Post-LLM output sanitization.
//!
//! Strips model artifacts (thinking blocks, unused tokens, markdown fences)
//! so the parser only ever sees the JSON payload.

use std::sync::LazyLock;

use regex::Regex;

static UNUSED_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<unused\d+>").expect("valid regex"));

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)\s*```").expect("valid regex"));

/// Strip model-specific artifacts from raw LLM output.
///
/// Handles:
/// 1. Gemma thinking blocks (`<unusedN>thought\n...`)
/// 2. Stray `<unusedN>` tokens
/// 3. A fenced code block around the payload (keeps only its body)
pub fn sanitize_llm_output(raw: &str) -> String {
    let mut text = raw.to_string();

    if let Some(idx) = text.find("<unused") {
        if let Some(thought_offset) = text[idx..].find("thought\n") {
            text = text[idx + thought_offset + "thought\n".len()..].to_string();
        }
    }

    text = UNUSED_TOKEN_RE.replace_all(&text, "").to_string();

    if let Some(body) = FENCE_RE.captures(&text).and_then(|c| c.get(1)) {
        text = body.as_str().to_string();
    }

    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_json_untouched() {
        assert_eq!(sanitize_llm_output(r#" {"Age": "45"} "#), r#"{"Age": "45"}"#);
    }

    #[test]
    fn strips_thinking_block() {
        let raw = "<unused94>thought\n{\"risk_score\": 0.3}";
        assert_eq!(sanitize_llm_output(raw), "{\"risk_score\": 0.3}");
    }

    #[test]
    fn strips_stray_tokens() {
        assert_eq!(sanitize_llm_output("<unused3>{}<unused4>"), "{}");
    }

    #[test]
    fn unwraps_json_fence() {
        let raw = "Here you go:\n```json\n{\"diagnosis\": \"Flu\"}\n```\nDone.";
        assert_eq!(sanitize_llm_output(raw), "{\"diagnosis\": \"Flu\"}");
    }

    #[test]
    fn unwraps_bare_fence() {
        assert_eq!(sanitize_llm_output("```\n{}\n```"), "{}");
    }
}

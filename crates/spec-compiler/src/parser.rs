//! Prose-to-structure conversion through the completion service.

use std::collections::BTreeMap;
use std::sync::Arc;

use caseforge_core_types::Category;
use serde_json::Value;
use tracing::{debug, info};

use crate::errors::CompileError;
use crate::llm_provider::{CompletionRequest, CompletionService, TokenUsage, DEFAULT_MAX_TOKENS};

/// Raw records per category, in source order, exactly as the service produced them.
pub type RawCategories = BTreeMap<Category, Vec<Value>>;

/// Result of one parse call.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutcome {
    pub categories: RawCategories,
    pub usage: TokenUsage,
}

/// Build the instruction prompt asking for the two-category JSON layout.
pub fn build_parse_prompt(raw_cases: &str) -> String {
    let positive = Category::Positive.payload_key();
    let negative = Category::Negative.payload_key();
    format!(
        r#"You are given a set of test cases described in a structured format. Extract each test case's name, description, steps, and expected result.
Organize them into two categories: {positive} and {negative}.
Number each test case sequentially across both categories, starting from 1 for {positive} and continuing for {negative}.
Respond with a single JSON object and nothing else.

Input: {raw_cases}

Output:
{{
    "{positive}": [
        {{
            "sequence": 1,
            "name": "Test Case Name",
            "description": "Description",
            "steps": ["Step 1", "Step 2"],
            "expected_result": "Expected Result"
        }}
    ],
    "{negative}": [
        {{
            "sequence": 2,
            "name": "Test Case Name",
            "description": "Description",
            "steps": ["Step 1", "Step 2"],
            "expected_result": "Expected Result"
        }}
    ]
}}"#
    )
}

/// Slice from the first `{` to the last `}`, inclusive.
pub fn isolate_json_payload(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Parse a completion response into raw category records.
///
/// A category key that is absent yields an empty list. Keys are matched
/// case-insensitively and ignoring surrounding whitespace.
pub fn parse_categories(response: &str) -> Result<RawCategories, CompileError> {
    let payload = isolate_json_payload(response)
        .ok_or_else(|| CompileError::malformed("no JSON object delimiters in response", response))?;
    let value: Value = serde_json::from_str(payload)
        .map_err(|err| CompileError::malformed(format!("invalid JSON payload: {err}"), payload))?;
    let object = value
        .as_object()
        .ok_or_else(|| CompileError::malformed("payload is not a JSON object", payload))?;

    let mut categories = RawCategories::new();
    for category in Category::ALL {
        let wanted = category.payload_key().to_ascii_lowercase();
        let records = match object
            .iter()
            .find(|(key, _)| key.trim().to_ascii_lowercase() == wanted)
        {
            None => Vec::new(),
            Some((_, Value::Array(items))) => items.clone(),
            Some((key, _)) => {
                return Err(CompileError::malformed(
                    format!("category '{key}' is not an array"),
                    payload,
                ))
            }
        };
        debug!(category = %category, records = records.len(), "category payload located");
        categories.insert(category, records);
    }
    Ok(categories)
}

/// Converts raw test-case prose into category records via the service.
pub struct StructuredParser {
    service: Arc<dyn CompletionService>,
    max_tokens: u32,
}

impl StructuredParser {
    pub fn new(service: Arc<dyn CompletionService>) -> Self {
        Self {
            service,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// One completion call; any failure here is fatal to the run.
    pub async fn parse(&self, raw_cases: &str) -> Result<ParseOutcome, CompileError> {
        let request =
            CompletionRequest::deterministic(build_parse_prompt(raw_cases)).with_max_tokens(self.max_tokens);
        let completion = self.service.complete(&request).await?;
        info!(
            prompt_tokens = completion.usage.prompt_tokens,
            completion_tokens = completion.usage.completion_tokens,
            total_tokens = completion.usage.total_tokens,
            "test case parse completed"
        );
        let categories = parse_categories(&completion.text)?;
        Ok(ParseOutcome {
            categories,
            usage: completion.usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isolates_braces_and_ignores_prose() {
        let text = "Here is the result: {\"a\": {\"b\": 1}} Thanks";
        assert_eq!(isolate_json_payload(text), Some("{\"a\": {\"b\": 1}}"));
        assert_eq!(isolate_json_payload("no braces"), None);
        assert_eq!(isolate_json_payload("} backwards {"), None);
    }

    #[test]
    fn missing_category_is_empty() {
        let parsed = parse_categories(r#"{"Positive Test Cases": [{"name": "x"}]}"#).unwrap();
        assert_eq!(parsed[&Category::Positive].len(), 1);
        assert!(parsed[&Category::Negative].is_empty());
    }

    #[test]
    fn category_keys_match_leniently() {
        let parsed = parse_categories(r#"{" negative test cases ": [{}, {}]}"#).unwrap();
        assert_eq!(parsed[&Category::Negative].len(), 2);
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        for text in [
            "I could not do that.",
            "{ not json }",
            r#"{"Positive Test Cases": "oops"}"#,
        ] {
            assert!(
                matches!(parse_categories(text), Err(CompileError::MalformedResponse { .. })),
                "accepted {text}"
            );
        }
    }

    #[test]
    fn prompt_embeds_input_and_keys() {
        let prompt = build_parse_prompt("1. Login works");
        assert!(prompt.contains("Input: 1. Login works"));
        assert!(prompt.contains("\"Positive Test Cases\""));
        assert!(prompt.contains("\"expected_result\""));
    }
}

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use spec_compiler::{
    Completion, CompletionError, CompletionRequest, CompletionService, TokenUsage,
};
use tracing::debug;

use crate::config::LlmConfig;

/// Replies starting with this word are error reports, not completions.
const ERROR_SENTINEL: &str = "Unexpected";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub endpoint: String,
    pub model: String,
    /// Set for Azure OpenAI resources.
    pub api_version: Option<String>,
    /// Overrides the temperature carried by each request.
    pub temperature: Option<f32>,
    pub timeout: Duration,
}

impl OpenAiConfig {
    pub fn from_settings(settings: &LlmConfig, api_key: String) -> Self {
        Self {
            api_key,
            endpoint: settings.endpoint.trim().to_string(),
            model: settings.deployment.clone(),
            api_version: settings.api_version.clone(),
            temperature: Some(settings.temperature),
            timeout: settings.timeout(),
        }
    }

    fn url(&self) -> String {
        let base = self.endpoint.trim_end_matches('/');
        match &self.api_version {
            Some(version) => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                base, self.model, version
            ),
            None => format!("{}/chat/completions", base),
        }
    }
}

/// Chat-completions client for OpenAI and Azure OpenAI endpoints.
pub struct OpenAiCompletionService {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiCompletionService {
    pub fn new(config: OpenAiConfig) -> Result<Self, CompletionError> {
        if config.api_key.is_empty() {
            return Err(CompletionError::service("missing completion service API key"));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| {
                CompletionError::transport(format!("failed to build HTTP client: {err}"))
            })?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl CompletionService for OpenAiCompletionService {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, CompletionError> {
        let body = ChatCompletionRequest {
            model: self.config.model.clone(),
            temperature: self.config.temperature.unwrap_or(request.temperature),
            max_tokens: request.max_tokens,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: request.prompt.clone(),
            }],
        };

        let builder = self.client.post(self.config.url()).json(&body);
        let builder = if self.config.api_version.is_some() {
            builder.header("api-key", &self.config.api_key)
        } else {
            builder.bearer_auth(&self.config.api_key)
        };

        let response = builder
            .send()
            .await
            .map_err(|err| CompletionError::transport(format!("request failed: {err}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "<response unavailable>".to_string());
        if !status.is_success() {
            return Err(CompletionError::service(format!(
                "endpoint returned {}: {}",
                status, text
            )));
        }

        let completion = parse_completion_body(&text)?;
        debug!(
            model = %self.config.model,
            completion_tokens = completion.usage.completion_tokens,
            "completion received"
        );
        Ok(completion)
    }
}

/// Decode a chat-completions response body.
fn parse_completion_body(raw: &str) -> Result<Completion, CompletionError> {
    let response: ChatCompletionResponse = serde_json::from_str(raw)
        .map_err(|err| CompletionError::service(format!("response invalid: {err}")))?;

    let text = response
        .choices
        .first()
        .and_then(|choice| choice.message.content.as_ref())
        .and_then(ChatCompletionContent::as_text)
        .ok_or(CompletionError::Empty)?;
    if text.trim().is_empty() {
        return Err(CompletionError::Empty);
    }
    if text.trim_start().starts_with(ERROR_SENTINEL) {
        return Err(CompletionError::service(text));
    }

    let usage = response
        .usage
        .map(|usage| TokenUsage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: if usage.total_tokens == 0 {
                usage.prompt_tokens + usage.completion_tokens
            } else {
                usage.total_tokens
            },
        })
        .unwrap_or_default();

    Ok(Completion { text, usage })
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    temperature: f32,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
    #[serde(default)]
    usage: Option<ChatCompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    #[serde(default)]
    content: Option<ChatCompletionContent>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChatCompletionContent {
    Text(String),
    Parts(Vec<ChatCompletionPart>),
}

impl ChatCompletionContent {
    fn as_text(&self) -> Option<String> {
        match self {
            ChatCompletionContent::Text(value) => Some(value.clone()),
            ChatCompletionContent::Parts(parts) => {
                let text = parts
                    .iter()
                    .filter_map(|part| part.text.as_ref())
                    .cloned()
                    .collect::<Vec<_>>()
                    .join("");
                if text.is_empty() {
                    None
                } else {
                    Some(text)
                }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(api_version: Option<&str>) -> OpenAiConfig {
        OpenAiConfig {
            api_key: "key".to_string(),
            endpoint: "https://example.openai.azure.com/".to_string(),
            model: "gpt-4o".to_string(),
            api_version: api_version.map(str::to_string),
            temperature: None,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn azure_and_openai_urls() {
        assert_eq!(
            config(Some("2024-02-01")).url(),
            "https://example.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-02-01"
        );
        assert_eq!(
            config(None).url(),
            "https://example.openai.azure.com/chat/completions"
        );
    }

    #[test]
    fn missing_key_is_rejected() {
        let mut cfg = config(None);
        cfg.api_key.clear();
        assert!(OpenAiCompletionService::new(cfg).is_err());
    }

    #[test]
    fn parses_text_and_usage() {
        let body = r#"{
            "choices": [{"message": {"role": "assistant", "content": "{\"Positive Test Cases\": []}"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 5, "total_tokens": 17}
        }"#;
        let completion = parse_completion_body(body).unwrap();
        assert_eq!(completion.text, "{\"Positive Test Cases\": []}");
        assert_eq!(completion.usage.total_tokens, 17);
    }

    #[test]
    fn joins_content_parts_and_derives_total() {
        let body = r#"{
            "choices": [{"message": {"content": [{"type": "text", "text": "a"}, {"type": "text", "text": "b"}]}}],
            "usage": {"prompt_tokens": 3, "completion_tokens": 2}
        }"#;
        let completion = parse_completion_body(body).unwrap();
        assert_eq!(completion.text, "ab");
        assert_eq!(completion.usage.total_tokens, 5);
    }

    #[test]
    fn empty_and_sentinel_replies_are_errors() {
        let empty = r#"{"choices": [{"message": {"content": "  "}}]}"#;
        assert_eq!(parse_completion_body(empty), Err(CompletionError::Empty));

        let none = r#"{"choices": []}"#;
        assert_eq!(parse_completion_body(none), Err(CompletionError::Empty));

        let sentinel = r#"{"choices": [{"message": {"content": "Unexpected error: quota"}}]}"#;
        assert_eq!(
            parse_completion_body(sentinel),
            Err(CompletionError::service("Unexpected error: quota"))
        );

        assert!(matches!(
            parse_completion_body("<html>bad gateway</html>"),
            Err(CompletionError::Service(_))
        ));
    }
}

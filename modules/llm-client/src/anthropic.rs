use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ProviderError;
use crate::traits::{Completion, CompletionRequest, LlmProvider};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// USD per million input / output tokens for the default model.
const INPUT_COST_PER_MTOK: f64 = 3.0;
const OUTPUT_COST_PER_MTOK: f64 = 15.0;

pub struct AnthropicProvider {
    api_key: String,
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl AnthropicProvider {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            http: reqwest::Client::new(),
            base_url: ANTHROPIC_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<WireMessage>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    content: Vec<ContentBlock>,
    model: String,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ProviderError> {
        let url = format!("{}/messages", self.base_url);
        let body = ChatRequest {
            model: self.model.clone(),
            max_tokens: request.max_tokens,
            messages: vec![WireMessage {
                role: "user",
                content: request.prompt.clone(),
            }],
            temperature: request.temperature,
        };

        debug!(model = %self.model, "Anthropic completion request");

        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(self.provider_name(), e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(
                self.provider_name(),
                status.as_u16(),
                message,
            ));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::malformed(self.provider_name(), e.to_string()))?;

        let text = chat
            .content
            .into_iter()
            .map(|b| b.text)
            .collect::<Vec<_>>()
            .join("");
        if text.is_empty() {
            return Err(ProviderError::malformed(
                self.provider_name(),
                "empty completion content",
            ));
        }

        let cost_usd = chat.usage.input_tokens as f64 / 1_000_000.0 * INPUT_COST_PER_MTOK
            + chat.usage.output_tokens as f64 / 1_000_000.0 * OUTPUT_COST_PER_MTOK;

        Ok(Completion {
            text,
            model: chat.model,
            prompt_tokens: chat.usage.input_tokens,
            completion_tokens: chat.usage.output_tokens,
            cost_usd,
        })
    }

    fn provider_name(&self) -> &str {
        "anthropic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_decodes_usage_and_content() {
        let raw = r#"{
            "content": [{"type": "text", "text": "Summary here"}],
            "model": "claude-sonnet-4-20250514",
            "usage": {"input_tokens": 120, "output_tokens": 40}
        }"#;
        let resp: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.content[0].text, "Summary here");
        assert_eq!(resp.usage.input_tokens, 120);
        assert_eq!(resp.usage.output_tokens, 40);
    }
}

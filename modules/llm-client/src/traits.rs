use async_trait::async_trait;

use crate::error::ProviderError;

/// A single completion call. Prompt wording is the caller's business; the
/// provider only moves it over the wire.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens: 1024,
            temperature: 0.3,
        }
    }
}

/// Result of a completion call, with usage accounting for cost bounding.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub cost_usd: f64,
}

impl Completion {
    pub fn total_tokens(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// One LLM backend. The summarizer holds an ordered list of these and falls
/// back down the list when a provider fails.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ProviderError>;

    fn provider_name(&self) -> &str;
}

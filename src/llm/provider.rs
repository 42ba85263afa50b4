use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::types::{AppError, AppResult, LLMMessage, LLMProvider, LLMRequest, LLMResponse};

#[async_trait]
pub trait LLMAdapter: Send + Sync {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse>;
}

/// Configuration for one LLM provider
pub struct LLMProviderConfig {
    pub provider: LLMProvider,
    pub api_key: String,
    pub model: String,
}

/// Sampling parameters for a single invocation
#[derive(Debug, Clone)]
pub struct InvocationParams {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub system_instruction: Option<String>,
}

impl InvocationParams {
    pub fn new(system_instruction: impl Into<String>) -> Self {
        Self {
            max_tokens: Some(2048),
            temperature: None,
            system_instruction: Some(system_instruction.into()),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Language-model handle shared by every agent of a supervisor
#[derive(Clone)]
pub struct LLM {
    adapter: Arc<dyn LLMAdapter>,
    model: String,
    default_temperature: Option<f32>,
}

impl LLM {
    pub fn new(config: LLMProviderConfig) -> AppResult<Self> {
        if config.api_key.is_empty() {
            return Err(AppError::Configuration(format!(
                "No API key configured for LLM provider {}",
                config.provider
            )));
        }

        let adapter: Arc<dyn LLMAdapter> = match config.provider {
            LLMProvider::OpenAI => Arc::new(crate::llm::openai::OpenAIAdapter::new(&config.api_key)),
            LLMProvider::Anthropic => Arc::new(crate::llm::anthropic::AnthropicAdapter::new(&config.api_key)),
            LLMProvider::OpenRouter => Arc::new(crate::llm::openrouter::OpenRouterAdapter::new(&config.api_key)),
            LLMProvider::Groq => Arc::new(crate::llm::groq::GroqAdapter::new(&config.api_key)),
        };

        Ok(Self {
            adapter,
            model: config.model,
            default_temperature: None,
        })
    }

    /// Wraps an existing adapter, e.g. a local server or a test double
    pub fn from_adapter(adapter: Arc<dyn LLMAdapter>, model: impl Into<String>) -> Self {
        Self {
            adapter,
            model: model.into(),
            default_temperature: None,
        }
    }

    /// Temperature used when a call does not set one
    pub fn with_default_temperature(mut self, temperature: f32) -> Self {
        self.default_temperature = Some(temperature);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        self.adapter.create_chat_completion(request).await
    }

    /// Sends a single-prompt request and returns the completion text.
    /// Transport failures and empty completions are `ModelInvocation` errors.
    pub async fn invoke(&self, prompt: &str, params: &InvocationParams) -> AppResult<String> {
        let request = LLMRequest {
            model: self.model.clone(),
            messages: vec![LLMMessage::user(prompt)],
            max_tokens: params.max_tokens,
            temperature: params.temperature.or(self.default_temperature),
            system_instruction: params.system_instruction.clone(),
        };

        let response = self.adapter.create_chat_completion(&request).await.map_err(|e| match e {
            AppError::ModelInvocation(msg) => AppError::ModelInvocation(msg),
            other => AppError::ModelInvocation(other.to_string()),
        })?;

        debug!(
            model = %self.model,
            prompt_tokens = response.usage.prompt_tokens,
            completion_tokens = response.usage.completion_tokens,
            finish_reason = %response.finish_reason,
            "LLM invocation completed"
        );

        if response.content.trim().is_empty() {
            return Err(AppError::ModelInvocation("model returned empty content".to_string()));
        }
        Ok(response.content)
    }
}

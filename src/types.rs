// Type definitions and enums

use crate::search::ProviderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LLMProvider {
    OpenAI,
    Anthropic,
    OpenRouter,
    Groq,
}

impl std::fmt::Display for LLMProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LLMProvider::OpenAI => write!(f, "openai"),
            LLMProvider::Anthropic => write!(f, "anthropic"),
            LLMProvider::OpenRouter => write!(f, "openrouter"),
            LLMProvider::Groq => write!(f, "groq"),
        }
    }
}

impl std::str::FromStr for LLMProvider {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(LLMProvider::OpenAI),
            "anthropic" => Ok(LLMProvider::Anthropic),
            "openrouter" => Ok(LLMProvider::OpenRouter),
            "groq" => Ok(LLMProvider::Groq),
            other => Err(AppError::Configuration(format!("Unsupported LLM provider: {}", other))),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LLMRequest {
    pub model: String,
    pub messages: Vec<LLMMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub system_instruction: Option<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LLMMessage {
    pub role: String, // "user", "assistant", "system"
    pub content: String,
}

impl LLMMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LLMResponse {
    pub content: String,
    pub finish_reason: String,
    pub usage: TokenUsage,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{agent} agent invocation failed: {message}")]
    AgentInvocation { agent: String, message: String },

    #[error("Model invocation error: {0}")]
    ModelInvocation(String),

    #[error("Evidence provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Score '{dimension}' = {value} is outside the declared range [{min}, {max}]")]
    InvalidScore {
        dimension: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid run state: {0}")]
    InvalidState(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    pub fn agent(agent: impl std::fmt::Display, message: impl Into<String>) -> Self {
        AppError::AgentInvocation {
            agent: agent.to_string(),
            message: message.into(),
        }
    }

    /// Stable machine-readable kind, used in run records and HTTP responses
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::AgentInvocation { .. } => "agent_invocation",
            AppError::ModelInvocation(_) => "model_invocation",
            AppError::Provider(_) => "provider",
            AppError::InvalidScore { .. } => "invalid_score",
            AppError::Configuration(_) => "configuration",
            AppError::InvalidState(_) => "invalid_state",
            AppError::Io(_) => "io",
            AppError::Serialization(_) => "serialization",
        }
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;

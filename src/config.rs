use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use validator::Validate;

use crate::types::{AppError, AppResult, LLMProvider};

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LLMConfig,
    pub search: SearchConfig,
    pub run: RunConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct LLMConfig {
    pub openai_api_key: String,
    pub anthropic_api_key: String,
    pub openrouter_api_key: String,
    pub groq_api_key: String,
    pub default_provider: LLMProvider,
    pub default_model: String,
    pub temperature: f32,
}

impl LLMConfig {
    /// API key of the configured provider, if one is set
    pub fn active_api_key(&self) -> Option<String> {
        let key = match self.default_provider {
            LLMProvider::OpenAI => &self.openai_api_key,
            LLMProvider::Anthropic => &self.anthropic_api_key,
            LLMProvider::OpenRouter => &self.openrouter_api_key,
            LLMProvider::Groq => &self.groq_api_key,
        };
        if key.is_empty() {
            None
        } else {
            Some(key.clone())
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub serpapi_key: String,
    pub scholar_enabled: bool,
    pub light_enabled: bool,
    pub google_api_key: String,
    pub google_cx: String,
    pub nasa_api_key: String,
    pub arxiv_enabled: bool,
    /// Provider ids in merge priority order, highest first
    pub provider_priority: Vec<String>,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    /// Select evidence by keyword overlap instead of asking the model
    pub keyword_selection: bool,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub filter: Option<String>,
    pub log_dir: Option<String>,
}

/// How each iteration builds its evidence query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvidenceQueryStrategy {
    /// Every iteration searches for the topic text
    TopicOnly,
    /// Every iteration derives its query from the latest hypothesis
    #[default]
    HypothesisDerived,
}

impl std::str::FromStr for EvidenceQueryStrategy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "topic-only" | "topic_only" | "topic" => Ok(EvidenceQueryStrategy::TopicOnly),
            "hypothesis-derived" | "hypothesis_derived" | "hypothesis" => {
                Ok(EvidenceQueryStrategy::HypothesisDerived)
            }
            other => Err(AppError::Configuration(format!(
                "Unknown evidence query strategy: {}",
                other
            ))),
        }
    }
}

/// Per-run options accepted by the supervisor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct RunConfig {
    /// Hard cap on loop passes
    #[serde(default = "default_max_iterations")]
    #[validate(range(min = 1, max = 100, message = "max_iterations must be between 1 and 100"))]
    pub max_iterations: u32,

    /// Minimum aggregate improvement that keeps the run going
    #[serde(default)]
    #[validate(range(min = 0.0, message = "score_improvement_threshold must not be negative"))]
    pub score_improvement_threshold: Option<f64>,

    /// Defaults to re-deriving the query from each hypothesis
    #[serde(default)]
    pub evidence_query_strategy: EvidenceQueryStrategy,

    /// Consecutive non-improving iterations that count as a plateau
    #[serde(default = "default_plateau_window")]
    #[validate(range(min = 1, max = 10, message = "plateau_window must be between 1 and 10"))]
    pub plateau_window: usize,

    /// Timeout applied to every agent and provider call
    #[serde(default = "default_call_timeout_secs")]
    #[validate(range(min = 1, message = "call_timeout_secs must be at least 1"))]
    pub call_timeout_secs: u64,

    #[serde(default = "default_max_results")]
    #[validate(range(min = 1, max = 50, message = "max_results_per_provider must be between 1 and 50"))]
    pub max_results_per_provider: usize,
}

fn default_max_iterations() -> u32 {
    3
}

fn default_plateau_window() -> usize {
    2
}

fn default_call_timeout_secs() -> u64 {
    120
}

fn default_max_results() -> usize {
    5
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            score_improvement_threshold: None,
            evidence_query_strategy: EvidenceQueryStrategy::default(),
            plateau_window: default_plateau_window(),
            call_timeout_secs: default_call_timeout_secs(),
            max_results_per_provider: default_max_results(),
        }
    }
}

impl RunConfig {
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_threshold(mut self, threshold: Option<f64>) -> Self {
        self.score_improvement_threshold = threshold;
        self
    }

    pub fn with_strategy(mut self, strategy: EvidenceQueryStrategy) -> Self {
        self.evidence_query_strategy = strategy;
        self
    }

    pub fn with_call_timeout_secs(mut self, secs: u64) -> Self {
        self.call_timeout_secs = secs;
        self
    }

    /// Validates the options, mapping every failure to [`AppError::Configuration`]
    pub fn validate_run(&self) -> AppResult<()> {
        if let Some(threshold) = self.score_improvement_threshold {
            if !threshold.is_finite() {
                return Err(AppError::Configuration(
                    "score_improvement_threshold must be a finite number".to_string(),
                ));
            }
        }

        self.validate().map_err(|errors| {
            let mut messages: Vec<String> = errors
                .field_errors()
                .iter()
                .flat_map(|(field, errs)| {
                    errs.iter().map(move |e| match &e.message {
                        Some(msg) => msg.to_string(),
                        None => format!("{} is invalid", field),
                    })
                })
                .collect();
            messages.sort();
            AppError::Configuration(messages.join("; "))
        })
    }

    pub fn call_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.call_timeout_secs)
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let run = RunConfig {
            max_iterations: env::var("RUN_MAX_ITERATIONS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()?,
            score_improvement_threshold: match env::var("RUN_SCORE_IMPROVEMENT_THRESHOLD") {
                Ok(v) if !v.trim().is_empty() => Some(v.trim().parse()?),
                _ => None,
            },
            evidence_query_strategy: env::var("RUN_EVIDENCE_QUERY_STRATEGY")
                .unwrap_or_else(|_| "hypothesis-derived".to_string())
                .parse()?,
            plateau_window: env::var("RUN_PLATEAU_WINDOW")
                .unwrap_or_else(|_| "2".to_string())
                .parse()?,
            call_timeout_secs: env::var("RUN_CALL_TIMEOUT_SECS")
                .unwrap_or_else(|_| "120".to_string())
                .parse()?,
            max_results_per_provider: env::var("RUN_MAX_RESULTS_PER_PROVIDER")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
        };
        run.validate_run()?;

        Ok(Self {
            server: ServerConfig {
                port: env::var("PORT")
                    .unwrap_or_else(|_| "3000".to_string())
                    .parse()?,
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                cors_allowed_origins: env::var("ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| "http://localhost:3000,http://localhost:5173".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .collect(),
            },
            llm: LLMConfig {
                openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
                anthropic_api_key: env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
                openrouter_api_key: env::var("OPENROUTER_API_KEY").unwrap_or_default(),
                groq_api_key: env::var("GROQ_API_KEY").unwrap_or_default(),
                default_provider: env::var("LLM_PROVIDER")
                    .unwrap_or_else(|_| "openai".to_string())
                    .parse()?,
                default_model: env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
                temperature: env::var("LLM_TEMPERATURE")
                    .unwrap_or_else(|_| "0.7".to_string())
                    .parse()?,
            },
            search: SearchConfig {
                serpapi_key: env::var("SERPAPI_KEY").unwrap_or_default(),
                scholar_enabled: env::var("SEARCH_SCHOLAR_ENABLED")
                    .unwrap_or_else(|_| "true".to_string())
                    .parse()?,
                light_enabled: env::var("SEARCH_LIGHT_ENABLED")
                    .unwrap_or_else(|_| "true".to_string())
                    .parse()?,
                google_api_key: env::var("GOOGLE_API_KEY").unwrap_or_default(),
                google_cx: env::var("GOOGLE_CX").unwrap_or_default(),
                nasa_api_key: env::var("NASA_API_KEY").unwrap_or_default(),
                arxiv_enabled: env::var("SEARCH_ARXIV_ENABLED")
                    .unwrap_or_else(|_| "true".to_string())
                    .parse()?,
                provider_priority: env::var("SEARCH_PROVIDER_PRIORITY")
                    .unwrap_or_else(|_| "scholar,arxiv,nasa,google,light".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                max_retries: env::var("SEARCH_MAX_RETRIES")
                    .unwrap_or_else(|_| "2".to_string())
                    .parse()?,
                retry_delay_ms: env::var("SEARCH_RETRY_DELAY_MS")
                    .unwrap_or_else(|_| "1000".to_string())
                    .parse()?,
                keyword_selection: env::var("SEARCH_KEYWORD_SELECTION")
                    .unwrap_or_else(|_| "false".to_string())
                    .parse()?,
            },
            run,
            logging: LoggingConfig {
                filter: env::var("RUST_LOG").ok(),
                log_dir: env::var("LOG_DIR").ok().filter(|d| !d.trim().is_empty()),
            },
        })
    }
}

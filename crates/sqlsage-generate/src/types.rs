//! Types for LLM configuration and generation outcomes.

use serde::{Deserialize, Serialize};

/// LLM provider identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    OpenAI,
    Anthropic,
    Groq,
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmProvider::OpenAI => write!(f, "openai"),
            LlmProvider::Anthropic => write!(f, "anthropic"),
            LlmProvider::Groq => write!(f, "groq"),
        }
    }
}

/// Result of a successful generation call.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationOutcome {
    pub sql: String,
    pub chat_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback_enabled: Option<bool>,
}

/// Result of a feedback call. `sql` is present only when negative
/// feedback triggered a regeneration.
#[derive(Debug, Clone, Serialize)]
pub struct FeedbackOutcome {
    pub chat_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback_enabled: Option<bool>,
}

/// LLM config response (keys masked).
#[derive(Debug, Clone, Serialize)]
pub struct LlmConfigResponse {
    pub preferred_provider: String,
    pub openai_configured: bool,
    pub anthropic_configured: bool,
    pub groq_configured: bool,
    pub openai_model: String,
    pub anthropic_model: String,
    pub groq_model: String,
    pub active_provider: Option<String>,
}

/// LLM config update request.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfigUpdate {
    pub preferred_provider: Option<String>,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub groq_api_key: Option<String>,
    pub openai_model: Option<String>,
    pub anthropic_model: Option<String>,
    pub groq_model: Option<String>,
}

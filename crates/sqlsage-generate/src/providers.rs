//! External LLM provider implementations.
//!
//! OpenAI and Groq share a request format; Anthropic uses the Messages
//! API. Calls are non-streaming: one prompt in, one completion out. The
//! model is an opaque collaborator, retry policy belongs to callers.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use crate::config::LlmConfig;
use crate::types::LlmProvider;
use sqlsage_core::{Error, Result};

const MAX_COMPLETION_TOKENS: usize = 1024;

/// Opaque text-generation capability: prompt in, text out.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f64,
    ) -> Result<String>;
}

/// LLM client that resolves the active provider from shared config on
/// every call, so config updates take effect without a restart.
pub struct HttpLlmClient {
    client: Client,
    config: Arc<RwLock<LlmConfig>>,
}

impl HttpLlmClient {
    pub fn new(config: Arc<RwLock<LlmConfig>>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f64,
    ) -> Result<String> {
        // Resolve before awaiting; the lock must not be held across I/O.
        let resolved = { self.config.read().resolve_provider() };
        let (provider, model, api_key) =
            resolved.ok_or_else(|| Error::Provider("no LLM provider configured".into()))?;

        debug!("Generating with {} model {}", provider, model);

        match provider {
            LlmProvider::OpenAI => {
                complete_openai_compat(
                    &self.client,
                    "https://api.openai.com/v1/chat/completions",
                    &model,
                    &api_key,
                    system_prompt,
                    user_prompt,
                    temperature,
                )
                .await
            }
            LlmProvider::Groq => {
                complete_openai_compat(
                    &self.client,
                    "https://api.groq.com/openai/v1/chat/completions",
                    &model,
                    &api_key,
                    system_prompt,
                    user_prompt,
                    temperature,
                )
                .await
            }
            LlmProvider::Anthropic => {
                complete_anthropic(
                    &self.client,
                    &model,
                    &api_key,
                    system_prompt,
                    user_prompt,
                    temperature,
                )
                .await
            }
        }
    }
}

/// Call an OpenAI-compatible chat completion API (OpenAI, Groq).
async fn complete_openai_compat(
    client: &Client,
    url: &str,
    model: &str,
    api_key: &str,
    system_prompt: &str,
    user_prompt: &str,
    temperature: f64,
) -> Result<String> {
    let body = json!({
        "model": model,
        "messages": [
            {"role": "system", "content": system_prompt},
            {"role": "user", "content": user_prompt},
        ],
        "temperature": temperature,
        "max_tokens": MAX_COMPLETION_TOKENS,
    });

    let response = client
        .post(url)
        .header("Authorization", format!("Bearer {}", api_key))
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await
        .map_err(|e| Error::Provider(format!("request failed: {}", e)))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Provider(format!("API error {}: {}", status, body)));
    }

    let parsed: serde_json::Value = response
        .json()
        .await
        .map_err(|e| Error::Provider(format!("invalid response body: {}", e)))?;

    parsed["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.trim().to_string())
        .ok_or_else(|| Error::Provider("response contained no completion".into()))
}

/// Call Anthropic's Messages API.
async fn complete_anthropic(
    client: &Client,
    model: &str,
    api_key: &str,
    system_prompt: &str,
    user_prompt: &str,
    temperature: f64,
) -> Result<String> {
    let body = json!({
        "model": model,
        "system": system_prompt,
        "messages": [
            {"role": "user", "content": user_prompt},
        ],
        "temperature": temperature,
        "max_tokens": MAX_COMPLETION_TOKENS,
    });

    let response = client
        .post("https://api.anthropic.com/v1/messages")
        .header("x-api-key", api_key)
        .header("anthropic-version", "2023-06-01")
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await
        .map_err(|e| Error::Provider(format!("request failed: {}", e)))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Provider(format!("API error {}: {}", status, body)));
    }

    let parsed: serde_json::Value = response
        .json()
        .await
        .map_err(|e| Error::Provider(format!("invalid response body: {}", e)))?;

    parsed["content"][0]["text"]
        .as_str()
        .map(|s| s.trim().to_string())
        .ok_or_else(|| Error::Provider("response contained no completion".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_client_fails_with_provider_error() {
        let config = Arc::new(RwLock::new(LlmConfig {
            preferred_provider: "openai".into(),
            ..Default::default()
        }));
        let client = HttpLlmClient::new(config);
        let result = client.generate("system", "prompt", 0.3).await;
        assert!(matches!(result, Err(Error::Provider(_))));
    }
}

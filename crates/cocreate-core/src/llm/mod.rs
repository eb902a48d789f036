pub mod openai;

pub use openai::{Endpoint, OpenAIClient};

use anyhow::Result;
use async_trait::async_trait;
use cocreate_common::config::{LLMConfig, LLMProvider};
use cocreate_common::{ChatMessage, TokenUsage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Returns `None` when the provider is missing its key or endpoint.
pub fn create_llm_client(config: &LLMConfig) -> Option<Arc<dyn LLMClient>> {
    let api_key = config.api_key.clone().filter(|k| !k.trim().is_empty())?;
    let model = if config.model.is_empty() {
        config.deployment.clone()
    } else {
        config.model.clone()
    };

    let endpoint = match config.provider {
        LLMProvider::Azure => Endpoint::Azure {
            resource: config.endpoint.clone().filter(|e| !e.is_empty())?,
            deployment: config.deployment.clone(),
            api_version: config.api_version.clone(),
        },
        LLMProvider::OpenAI => Endpoint::OpenAI {
            base_url: config.endpoint.clone().unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
        },
    };

    Some(Arc::new(OpenAIClient::new(api_key, model, endpoint, config.temperature)))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LLMResponse<T> {
    pub data: T,
    pub usage: TokenUsage,
}

#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Run a chat completion over the given conversation and return the reply text.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<LLMResponse<String>>;

    async fn generate(&self, prompt: &str) -> Result<LLMResponse<String>> {
        self.complete(&[ChatMessage::user(prompt)]).await
    }
}

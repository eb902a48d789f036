use anyhow::{Result, anyhow};
use async_trait::async_trait;
use cocreate_common::{ChatMessage, TokenUsage};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use super::{LLMClient, LLMResponse};
use std::time::Duration;

#[derive(Debug, Clone, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest<'a> {
    #[serde(skip_serializing_if = "str::is_empty")]
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: Option<u32>,
    total_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Where chat completions are sent and how the request authenticates.
#[derive(Debug, Clone, PartialEq)]
pub enum Endpoint {
    /// `{resource}/openai/deployments/{deployment}/chat/completions?api-version=...`, `api-key` header.
    Azure {
        resource: String,
        deployment: String,
        api_version: String,
    },
    /// `{base_url}/chat/completions`, bearer token.
    OpenAI { base_url: String },
}

impl Endpoint {
    pub fn chat_completions_url(&self) -> String {
        match self {
            Endpoint::Azure { resource, deployment, api_version } => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                resource.trim_end_matches('/'),
                deployment,
                api_version
            ),
            Endpoint::OpenAI { base_url } => format!("{}/chat/completions", base_url.trim_end_matches('/')),
        }
    }

    fn authorize(&self, req: RequestBuilder, api_key: &str) -> RequestBuilder {
        match self {
            Endpoint::Azure { .. } => req.header("api-key", api_key),
            Endpoint::OpenAI { .. } => req.header("Authorization", format!("Bearer {}", api_key)),
        }
    }

    fn provider_name(&self) -> &'static str {
        match self {
            Endpoint::Azure { .. } => "Azure OpenAI",
            Endpoint::OpenAI { .. } => "OpenAI",
        }
    }
}

pub struct OpenAIClient {
    client: Client,
    api_key: String,
    endpoint: Endpoint,
    model: String,
    temperature: f32,
}

impl OpenAIClient {
    pub fn new(api_key: String, model: String, endpoint: Endpoint, temperature: f32) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_default();

        tracing::debug!(
            "{} client initialized: model={}, url={}",
            endpoint.provider_name(),
            model,
            endpoint.chat_completions_url()
        );

        Self {
            client,
            api_key: api_key.trim().to_string(),
            endpoint,
            model,
            temperature,
        }
    }
}

#[async_trait]
impl LLMClient for OpenAIClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<LLMResponse<String>> {
        let url = self.endpoint.chat_completions_url();

        let req = ChatRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| Message { role: m.role.as_str(), content: &m.content })
                .collect(),
            temperature: self.temperature,
        };

        let res = self
            .endpoint
            .authorize(self.client.post(&url), &self.api_key)
            .header("Content-Type", "application/json")
            .json(&req)
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            return Err(anyhow!("{} API error ({}): {}", self.endpoint.provider_name(), status, body));
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| anyhow!("Failed to parse {} response: {} - body: {}", self.endpoint.provider_name(), e, body))?;

        let content = parsed.choices.first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| anyhow!("No content in {} response", self.endpoint.provider_name()))?;

        let usage = parsed.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens.unwrap_or(0),
            total_tokens: u.total_tokens,
        }).unwrap_or_default();

        Ok(LLMResponse { data: content, usage })
    }
}

#[cfg(test)]
#[path = "openai_tests.rs"]
mod openai_tests;

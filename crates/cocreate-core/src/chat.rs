use crate::llm::LLMClient;
use crate::storage::ChatHistory;
use anyhow::{Result, anyhow};
use cocreate_common::{ChatMessage, ChatRole, ChatTurn, Properties};
use serde_json::Value;
use std::sync::Arc;

pub const DEFAULT_HISTORY_LIMIT: usize = 10;
pub const MAX_HISTORY_LIMIT: usize = 1000;

pub const SYSTEM_INSTRUCTIONS: &str = "You are CoCreateAI's assistant. You have access to a knowledge graph \
of the user's documents, conversations and entities. Answer clearly and concisely. \
When graph context is provided, use it where it is relevant to the question. \
Format your answers in markdown.";

/// Forwards user messages to the configured LLM, optionally with graph
/// context and replayed session history.
pub struct ChatRelay {
    llm: Option<Arc<dyn LLMClient>>,
    history: Option<ChatHistory>,
    history_turns: usize,
}

impl ChatRelay {
    pub fn new(llm: Option<Arc<dyn LLMClient>>) -> Self {
        Self {
            llm,
            history: None,
            history_turns: cocreate_common::config::DEFAULT_CHAT_HISTORY_TURNS,
        }
    }

    /// `turns` counts user/assistant exchanges replayed before each new message.
    pub fn with_history(mut self, history: ChatHistory, turns: usize) -> Self {
        self.history = Some(history);
        self.history_turns = turns;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.llm.is_some()
    }

    pub async fn chat(
        &self,
        message: &str,
        session_id: Option<&str>,
        context: Option<&Properties>,
    ) -> Result<String> {
        let llm = self
            .llm
            .as_ref()
            .ok_or_else(|| anyhow!("LLM client is not configured"))?;

        let session = match (session_id, &self.history) {
            (Some(id), Some(history)) => Some((id, history)),
            _ => None,
        };

        let mut messages = vec![ChatMessage::system(SYSTEM_INSTRUCTIONS)];
        if let Some((id, history)) = session {
            let previous = history.recent(id, self.history_turns * 2)?;
            messages.extend(previous.iter().map(ChatMessage::from));
        }
        messages.push(ChatMessage::user(with_context(message, context)));

        let response = llm.complete(&messages).await?;
        tracing::debug!(
            "Chat completion used {} tokens ({} prompt, {} completion)",
            response.usage.total_tokens,
            response.usage.prompt_tokens,
            response.usage.completion_tokens
        );

        if let Some((id, history)) = session {
            let turns = [
                ChatTurn::new(ChatRole::User, message),
                ChatTurn::new(ChatRole::Assistant, response.data.clone()),
            ];
            if let Err(e) = history.append_all(id, &turns) {
                tracing::warn!("Failed to persist chat history for session {}: {:?}", id, e);
            }
        }

        Ok(response.data)
    }

    /// Most recent turns of a session, oldest first, at most `MAX_HISTORY_LIMIT`.
    /// Empty when history is disabled.
    pub fn history(&self, session_id: &str, limit: usize) -> Result<Vec<ChatTurn>> {
        match &self.history {
            Some(history) => history.recent(session_id, limit.min(MAX_HISTORY_LIMIT)),
            None => Ok(Vec::new()),
        }
    }
}

/// Prefix `message` with the rendered context map; unchanged when there is none.
pub fn with_context(message: &str, context: Option<&Properties>) -> String {
    match context {
        Some(ctx) if !ctx.is_empty() => {
            let rendered = ctx
                .iter()
                .map(|(key, value)| format!("{}: {}", key, render_value(value)))
                .collect::<Vec<_>>()
                .join("\n");
            format!("Graph context:\n{}\n\nUser message:\n{}", rendered, message)
        }
        _ => message.to_string(),
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

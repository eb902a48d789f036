use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

pub mod config;
pub mod error;
pub mod ident;

pub use error::{ErrorKind, GraphError};
pub use ident::Identifier;

/// Property map attached to nodes and relationships.
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// One result row of a raw query: column name -> value.
pub type Record = serde_json::Map<String, serde_json::Value>;

pub const DEFAULT_DOCUMENT_LABEL: &str = "Document";
pub const CONVERSATION_LABEL: &str = "Conversation";
pub const MESSAGE_LABEL: &str = "Message";
pub const HAS_MESSAGE: &str = "HAS_MESSAGE";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub label: String,
    pub properties: Properties,
}

impl Node {
    pub fn new(label: impl Into<String>, properties: Properties) -> Self {
        Self {
            label: label.into(),
            properties,
        }
    }

    /// The application-chosen `id` property, if it is a string.
    pub fn id(&self) -> Option<&str> {
        self.properties.get("id").and_then(|v| v.as_str())
    }
}

/// Addresses an existing node by `(label, id)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeRef {
    pub label: Identifier,
    pub id: String,
}

impl NodeRef {
    pub fn new(label: Identifier, id: impl Into<String>) -> Self {
        Self { label, id: id.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Relationship {
    pub rel_type: String,
    pub from: NodeRef,
    pub to: NodeRef,
    pub properties: Properties,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: ChatRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }
}

/// A persisted chat message belonging to a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatTurn {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

impl From<&ChatTurn> for ChatMessage {
    fn from(turn: &ChatTurn) -> Self {
        Self {
            role: turn.role,
            content: turn.content.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

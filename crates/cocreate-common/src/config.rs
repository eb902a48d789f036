use serde::{Deserialize, Serialize};
use std::env;
use config::{builder::DefaultState, Config, ConfigBuilder, ConfigError, Environment, File};

// --- Constants for Default Configuration ---
pub const DEFAULT_NEO4J_URI: &str = "bolt://localhost:7687";
pub const DEFAULT_NEO4J_DATABASE: &str = "neo4j";

pub const DEFAULT_AZURE_API_VERSION: &str = "2024-07-18";
pub const DEFAULT_LLM_TEMPERATURE: f32 = 0.7;

pub const DEFAULT_SERVER_HOST: &str = "0.0.0.0";
pub const DEFAULT_SERVER_PORT: u16 = 8000;
pub const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000,http://localhost:3001";

pub const DEFAULT_CHAT_HISTORY_DIR: &str = "./data/chat_history";
pub const DEFAULT_CHAT_HISTORY_TURNS: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GraphBackendKind {
    Neo4j,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    pub backend: GraphBackendKind,
    pub uri: String,
    pub username: String,
    pub password: String,
    pub database: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LLMProvider {
    Azure,
    OpenAI,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    pub provider: LLMProvider,
    /// Azure resource endpoint, or an OpenAI-compatible base URL.
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    /// Azure deployment name.
    pub deployment: String,
    pub api_version: String,
    /// Model id sent in the request body. Falls back to the deployment name.
    #[serde(default)]
    pub model: String,
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Comma-separated list of allowed origins.
    pub cors_origins: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Directory of the local chat history store. Empty disables history.
    pub history_dir: String,
    pub history_turns: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub graph: GraphConfig,
    pub llm: LLMConfig,
    pub server: ServerConfig,
    pub chat: ChatConfig,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            backend: GraphBackendKind::Neo4j,
            uri: DEFAULT_NEO4J_URI.into(),
            username: "neo4j".into(),
            password: String::new(),
            database: DEFAULT_NEO4J_DATABASE.into(),
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::Azure,
            endpoint: None,
            api_key: None,
            deployment: String::new(),
            api_version: DEFAULT_AZURE_API_VERSION.into(),
            model: String::new(),
            temperature: DEFAULT_LLM_TEMPERATURE,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SERVER_HOST.into(),
            port: DEFAULT_SERVER_PORT,
            cors_origins: DEFAULT_CORS_ORIGINS.into(),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_dir: DEFAULT_CHAT_HISTORY_DIR.into(),
            history_turns: DEFAULT_CHAT_HISTORY_TURNS,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            graph: GraphConfig::default(),
            llm: LLMConfig::default(),
            server: ServerConfig::default(),
            chat: ChatConfig::default(),
        }
    }
}

fn with_defaults(builder: ConfigBuilder<DefaultState>) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    builder
        .set_default("graph.backend", "neo4j")?
        .set_default("graph.uri", DEFAULT_NEO4J_URI)?
        .set_default("graph.username", "neo4j")?
        .set_default("graph.password", "")?
        .set_default("graph.database", DEFAULT_NEO4J_DATABASE)?
        .set_default("llm.provider", "azure")?
        .set_default("llm.deployment", "")?
        .set_default("llm.api_version", DEFAULT_AZURE_API_VERSION)?
        .set_default("llm.model", "")?
        .set_default("llm.temperature", DEFAULT_LLM_TEMPERATURE as f64)?
        .set_default("server.host", DEFAULT_SERVER_HOST)?
        .set_default("server.port", DEFAULT_SERVER_PORT as i64)?
        .set_default("server.cors_origins", DEFAULT_CORS_ORIGINS)?
        .set_default("chat.history_dir", DEFAULT_CHAT_HISTORY_DIR)?
        .set_default("chat.history_turns", DEFAULT_CHAT_HISTORY_TURNS as i64)
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let s = with_defaults(Config::builder())?
            // File: config.toml
            .add_source(File::with_name("config").required(false))

            // Environment: COCREATE__GRAPH__URI=bolt://db:7687 -> graph.uri
            .add_source(Environment::with_prefix("COCREATE").separator("__"))

            // Flat variable names used by existing deployments (.env files)
            .set_override_option("graph.uri", env::var("NEO4J_URI").ok())?
            .set_override_option("graph.username", env::var("NEO4J_USERNAME").ok())?
            .set_override_option("graph.password", env::var("NEO4J_PASSWORD").ok())?
            .set_override_option("graph.database", env::var("NEO4J_DATABASE").ok())?
            .set_override_option("llm.endpoint", env::var("AZURE_OPENAI_ENDPOINT").ok())?
            .set_override_option("llm.api_key", env::var("AZURE_OPENAI_KEY").ok())?
            .set_override_option("llm.deployment", env::var("AZURE_OPENAI_DEPLOYMENT_NAME").ok())?
            .set_override_option("llm.api_version", env::var("AZURE_OPENAI_API_VERSION").ok())?
            .set_override_option("server.host", env::var("HOST").ok())?
            .set_override_option("server.port", env::var("PORT").ok().and_then(|v| v.parse::<i64>().ok()))?
            .set_override_option("server.cors_origins", env::var("CORS_ORIGINS").ok())?

            .build()?;

        s.try_deserialize()
    }

    /// Allowed CORS origins, trimmed, empty entries dropped.
    pub fn cors_origins_list(&self) -> Vec<String> {
        self.server
            .cors_origins
            .split(',')
            .map(|origin| origin.trim())
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn get_model_name(&self) -> String {
        if self.llm.model.is_empty() {
            self.llm.deployment.clone()
        } else {
            self.llm.model.clone()
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn history_enabled(&self) -> bool {
        !self.chat.history_dir.trim().is_empty()
    }
}

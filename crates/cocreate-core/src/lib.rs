pub mod chat;
pub mod graph;
pub mod ingest;
pub mod llm;
pub mod storage;

pub use chat::ChatRelay;
pub use graph::{create_graph_store, GraphStore, MemoryGraphStore, Neo4jGraphStore};
pub use ingest::{ConversationMessage, Envelope, IngestionPipeline};
pub use llm::{create_llm_client, LLMClient, OpenAIClient};
pub use storage::ChatHistory;

// Re-export common types for convenience
pub use cocreate_common::{GraphError, Identifier, Node, NodeRef, Properties, Relationship};

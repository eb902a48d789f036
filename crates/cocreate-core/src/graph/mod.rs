// Property-graph access layer.
//
// Labels, relationship types and filter keys are spliced into query text and
// must pass `Identifier::parse` first; every value travels as a bound parameter.

pub mod cypher;
pub mod memory;
pub mod neo4j;

pub use memory::MemoryGraphStore;
pub use neo4j::Neo4jGraphStore;

use async_trait::async_trait;
use cocreate_common::{GraphError, Identifier, Node, NodeRef, Properties, Record, Relationship};
use serde_json::Value;
use std::sync::Arc;

use cocreate_common::config::{GraphBackendKind, GraphConfig};

pub type GraphResult<T> = Result<T, GraphError>;

#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Execute a parameterized query and return each row as column -> value.
    async fn run_query(&self, query: &str, params: Properties) -> GraphResult<Vec<Record>>;

    async fn create_node(&self, label: &Identifier, properties: Properties) -> GraphResult<Node>;

    /// Equality conjunction over `filters`. No pagination, no ordering guarantee.
    async fn find_nodes(&self, label: &Identifier, filters: &Properties) -> GraphResult<Vec<Node>>;

    /// Returns `Ok(None)` when either endpoint does not exist.
    async fn create_relationship(
        &self,
        from: &NodeRef,
        to: &NodeRef,
        rel_type: &Identifier,
        properties: Properties,
    ) -> GraphResult<Option<Relationship>>;
}

pub async fn create_graph_store(config: &GraphConfig) -> GraphResult<Arc<dyn GraphStore>> {
    match config.backend {
        GraphBackendKind::Neo4j => {
            let store = Neo4jGraphStore::connect(
                &config.uri,
                &config.username,
                &config.password,
                &config.database,
            )
            .await?;
            Ok(Arc::new(store))
        }
        GraphBackendKind::Memory => {
            tracing::warn!("Using in-memory graph backend; data is lost on restart");
            Ok(Arc::new(MemoryGraphStore::new()))
        }
    }
}

/// Rejects values the graph cannot hold as properties: nested maps, lists
/// containing maps or lists, and integers outside the signed 64-bit range.
pub fn validate_properties(properties: &Properties) -> GraphResult<()> {
    for (key, value) in properties {
        if key.is_empty() {
            return Err(GraphError::invalid_property(key, "property keys must not be empty"));
        }
        match value {
            Value::Object(_) => {
                return Err(GraphError::invalid_property(key, "nested maps cannot be stored as properties"));
            }
            Value::Array(items) => {
                if items.iter().any(|v| v.is_object() || v.is_array()) {
                    return Err(GraphError::invalid_property(key, "lists may only contain scalar values"));
                }
                if items.iter().any(exceeds_i64) {
                    return Err(GraphError::invalid_property(key, "integer does not fit in 64 signed bits"));
                }
            }
            v if exceeds_i64(v) => {
                return Err(GraphError::invalid_property(key, "integer does not fit in 64 signed bits"));
            }
            _ => {}
        }
    }
    Ok(())
}

fn exceeds_i64(value: &Value) -> bool {
    matches!(value, Value::Number(n) if n.is_u64() && n.as_i64().is_none())
}

/// Drops `null` entries; the graph treats a null property as absent.
pub(crate) fn strip_nulls(mut properties: Properties) -> Properties {
    properties.retain(|_, v| !v.is_null());
    properties
}

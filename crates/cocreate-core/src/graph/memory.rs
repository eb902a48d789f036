use async_trait::async_trait;
use cocreate_common::{GraphError, Identifier, Node, NodeRef, Properties, Record, Relationship};
use serde_json::Value;
use tokio::sync::RwLock;

use super::{strip_nulls, validate_properties, GraphResult, GraphStore};

#[derive(Default)]
struct MemoryGraph {
    nodes: Vec<Node>,
    relationships: Vec<Relationship>,
}

/// In-process property graph with the same create/match semantics as the
/// Cypher issued by `Neo4jGraphStore`: nothing is deduplicated, a missing
/// endpoint creates no edge, and several nodes sharing an `id` produce one
/// edge per matching pair.
#[derive(Default)]
pub struct MemoryGraphStore {
    inner: RwLock<MemoryGraph>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn node_count(&self) -> usize {
        self.inner.read().await.nodes.len()
    }

    pub async fn relationships(&self) -> Vec<Relationship> {
        self.inner.read().await.relationships.clone()
    }
}

/// Cypher equality: numbers compare by value, `null` never matches.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(i), Some(j)) => i == j,
            _ => x.as_f64() == y.as_f64(),
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        _ => a == b,
    }
}

fn matches_filters(node: &Node, filters: &Properties) -> bool {
    filters.iter().all(|(key, expected)| {
        node.properties
            .get(key)
            .map_or(false, |actual| values_equal(actual, expected))
    })
}

fn matches_ref(node: &Node, node_ref: &NodeRef) -> bool {
    node.label == node_ref.label.as_str() && node.id() == Some(node_ref.id.as_str())
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn run_query(&self, _query: &str, _params: Properties) -> GraphResult<Vec<Record>> {
        Err(GraphError::Unsupported("raw queries require the neo4j backend".into()))
    }

    async fn create_node(&self, label: &Identifier, properties: Properties) -> GraphResult<Node> {
        validate_properties(&properties)?;
        let node = Node::new(label.as_str(), strip_nulls(properties));
        self.inner.write().await.nodes.push(node.clone());
        Ok(node)
    }

    async fn find_nodes(&self, label: &Identifier, filters: &Properties) -> GraphResult<Vec<Node>> {
        for key in filters.keys() {
            Identifier::parse(key)?;
        }
        validate_properties(filters)?;
        let graph = self.inner.read().await;
        Ok(graph
            .nodes
            .iter()
            .filter(|n| n.label == label.as_str() && matches_filters(n, filters))
            .cloned()
            .collect())
    }

    async fn create_relationship(
        &self,
        from: &NodeRef,
        to: &NodeRef,
        rel_type: &Identifier,
        properties: Properties,
    ) -> GraphResult<Option<Relationship>> {
        validate_properties(&properties)?;
        let properties = strip_nulls(properties);

        let mut graph = self.inner.write().await;
        let sources = graph.nodes.iter().filter(|n| matches_ref(n, from)).count();
        let targets = graph.nodes.iter().filter(|n| matches_ref(n, to)).count();

        let mut first = None;
        for _ in 0..sources * targets {
            let rel = Relationship {
                rel_type: rel_type.to_string(),
                from: from.clone(),
                to: to.clone(),
                properties: properties.clone(),
            };
            if first.is_none() {
                first = Some(rel.clone());
            }
            graph.relationships.push(rel);
        }
        Ok(first)
    }
}

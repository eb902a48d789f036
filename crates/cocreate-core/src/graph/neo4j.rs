use async_trait::async_trait;
use cocreate_common::{GraphError, Identifier, Node, NodeRef, Properties, Record, Relationship};
use neo4rs::{query, BoltList, BoltMap, BoltNull, BoltString, BoltType, ConfigBuilder, Graph, Query};
use serde_json::Value;
use std::sync::Arc;

use super::cypher::{self, CypherQuery, PROPERTIES_COLUMN};
use super::{strip_nulls, validate_properties, GraphResult, GraphStore};

/// Neo4j-backed store. The driver keeps its own connection pool; every query
/// borrows a session for its duration.
#[derive(Clone)]
pub struct Neo4jGraphStore {
    graph: Arc<Graph>,
}

impl Neo4jGraphStore {
    pub async fn connect(uri: &str, user: &str, password: &str, database: &str) -> GraphResult<Self> {
        let config = ConfigBuilder::default()
            .uri(uri)
            .user(user)
            .password(password)
            .db(database)
            .build()
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        let graph = Graph::connect(config)
            .await
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        // The pool connects lazily; probe so bad credentials fail at start-up.
        graph
            .run(query("RETURN 1"))
            .await
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        tracing::info!("Connected to Neo4j at {} (database: {})", uri, database);

        Ok(Self {
            graph: Arc::new(graph),
        })
    }

    async fn fetch_properties(&self, q: CypherQuery) -> GraphResult<Vec<Properties>> {
        let mut stream = self
            .graph
            .execute(bind(q))
            .await
            .map_err(|e| GraphError::Query(e.to_string()))?;

        let mut rows = Vec::new();
        while let Some(row) = stream.next().await.map_err(|e| GraphError::Query(e.to_string()))? {
            let props: Properties = row
                .get(PROPERTIES_COLUMN)
                .map_err(|e| GraphError::Query(format!("failed to decode properties: {}", e)))?;
            rows.push(props);
        }
        Ok(rows)
    }
}

fn bind(q: CypherQuery) -> Query {
    q.params
        .iter()
        .fold(query(&q.text), |acc, (key, value)| acc.param(key, to_bolt(value)))
}

fn to_bolt(value: &Value) -> BoltType {
    match value {
        Value::Null => BoltType::Null(BoltNull),
        Value::Bool(b) => BoltType::from(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => BoltType::from(i),
            None => BoltType::from(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => BoltType::from(s.as_str()),
        Value::Array(items) => {
            let mut list = BoltList::with_capacity(items.len());
            for item in items {
                list.push(to_bolt(item));
            }
            BoltType::List(list)
        }
        Value::Object(map) => {
            let mut bolt = BoltMap::with_capacity(map.len());
            for (k, v) in map {
                bolt.put(BoltString::from(k.as_str()), to_bolt(v));
            }
            BoltType::Map(bolt)
        }
    }
}

#[async_trait]
impl GraphStore for Neo4jGraphStore {
    async fn run_query(&self, query_text: &str, params: Properties) -> GraphResult<Vec<Record>> {
        let q = CypherQuery {
            text: query_text.to_string(),
            params,
        };
        let mut stream = self
            .graph
            .execute(bind(q))
            .await
            .map_err(|e| GraphError::Query(e.to_string()))?;

        let mut records = Vec::new();
        while let Some(row) = stream.next().await.map_err(|e| GraphError::Query(e.to_string()))? {
            let record: Record = row
                .to()
                .map_err(|e| GraphError::Query(format!("failed to decode row: {}", e)))?;
            records.push(record);
        }
        Ok(records)
    }

    async fn create_node(&self, label: &Identifier, properties: Properties) -> GraphResult<Node> {
        validate_properties(&properties)?;
        let q = cypher::create_node(label, strip_nulls(properties));
        let props = self
            .fetch_properties(q)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| GraphError::EmptyResult(format!("CREATE (:{})", label)))?;
        Ok(Node::new(label.as_str(), props))
    }

    async fn find_nodes(&self, label: &Identifier, filters: &Properties) -> GraphResult<Vec<Node>> {
        validate_properties(filters)?;
        let q = cypher::find_nodes(label, filters)?;
        let rows = self.fetch_properties(q).await?;
        Ok(rows.into_iter().map(|props| Node::new(label.as_str(), props)).collect())
    }

    async fn create_relationship(
        &self,
        from: &NodeRef,
        to: &NodeRef,
        rel_type: &Identifier,
        properties: Properties,
    ) -> GraphResult<Option<Relationship>> {
        validate_properties(&properties)?;
        let q = cypher::create_relationship(from, to, rel_type, strip_nulls(properties));
        let created = self.fetch_properties(q).await?.into_iter().next();
        Ok(created.map(|props| Relationship {
            rel_type: rel_type.to_string(),
            from: from.clone(),
            to: to.clone(),
            properties: props,
        }))
    }
}

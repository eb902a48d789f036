use cocreate_common::{Identifier, NodeRef, Properties};
use serde_json::Value;

use super::GraphResult;

/// Column every node/relationship query returns its property map under.
pub const PROPERTIES_COLUMN: &str = "properties";

#[derive(Debug, Clone, PartialEq)]
pub struct CypherQuery {
    pub text: String,
    pub params: Properties,
}

pub fn create_node(label: &Identifier, properties: Properties) -> CypherQuery {
    let mut params = Properties::new();
    params.insert("properties".into(), Value::Object(properties));
    CypherQuery {
        text: format!("CREATE (n:{label} $properties) RETURN properties(n) AS {PROPERTIES_COLUMN}"),
        params,
    }
}

/// Filter keys become `$f0`, `$f1`, ... so a key can never clash with
/// another parameter name.
pub fn find_nodes(label: &Identifier, filters: &Properties) -> GraphResult<CypherQuery> {
    let mut params = Properties::new();
    let mut conditions = Vec::with_capacity(filters.len());

    for (idx, (key, value)) in filters.iter().enumerate() {
        let key = Identifier::parse(key)?;
        let param = format!("f{idx}");
        conditions.push(format!("n.{key} = ${param}"));
        params.insert(param, value.clone());
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };

    Ok(CypherQuery {
        text: format!("MATCH (n:{label}){where_clause} RETURN properties(n) AS {PROPERTIES_COLUMN}"),
        params,
    })
}

pub fn create_relationship(
    from: &NodeRef,
    to: &NodeRef,
    rel_type: &Identifier,
    properties: Properties,
) -> CypherQuery {
    let mut params = Properties::new();
    params.insert("from_id".into(), Value::String(from.id.clone()));
    params.insert("to_id".into(), Value::String(to.id.clone()));
    params.insert("properties".into(), Value::Object(properties));
    CypherQuery {
        text: format!(
            "MATCH (a:{} {{id: $from_id}}) MATCH (b:{} {{id: $to_id}}) \
             CREATE (a)-[r:{rel_type} $properties]->(b) RETURN properties(r) AS {PROPERTIES_COLUMN}",
            from.label, to.label
        ),
        params,
    }
}

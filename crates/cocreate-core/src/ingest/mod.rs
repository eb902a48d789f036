pub mod envelope;

pub use envelope::{ConversationIngested, DocumentIngested, EntitiesLinked, EntityCreated, Envelope, Failure};

use cocreate_common::{
    GraphError, Identifier, NodeRef, Properties, CONVERSATION_LABEL, HAS_MESSAGE, MESSAGE_LABEL,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::graph::{validate_properties, GraphStore};

/// One message of a conversation as submitted by clients. Fields hold any
/// scalar the client sends; an absent key defaults to an empty content, the
/// `user` role and an empty timestamp.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConversationMessage {
    #[serde(default, deserialize_with = "present")]
    pub role: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub content: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub timestamp: Option<Value>,
}

/// Keeps an explicit `null` as `Some(Value::Null)` so only a missing key falls back to the default.
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

impl ConversationMessage {
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            role: Some(Value::from(role)),
            content: Some(Value::from(content)),
            timestamp: None,
        }
    }

    fn to_properties(&self, id: &str, order: usize) -> Properties {
        let mut props = Properties::new();
        props.insert("id".into(), Value::from(id));
        props.insert("content".into(), self.content.clone().unwrap_or_else(|| Value::from("")));
        props.insert("role".into(), self.role.clone().unwrap_or_else(|| Value::from("user")));
        props.insert("timestamp".into(), self.timestamp.clone().unwrap_or_else(|| Value::from("")));
        props.insert("order".into(), Value::from(order as u64));
        props
    }
}

pub fn message_id(conversation_id: &str, index: usize) -> String {
    format!("{}_msg_{}", conversation_id, index)
}

fn order_property(index: usize) -> Properties {
    let mut props = Properties::new();
    props.insert("order".into(), Value::from(index as u64));
    props
}

/// Translates application-level write intents into graph operations.
///
/// This is the recovery boundary for graph errors: every call returns an
/// [`Envelope`] and never propagates a failure. Multi-step writes are not
/// transactional; a failure part-way through a conversation leaves the nodes
/// already written in place.
#[derive(Clone)]
pub struct IngestionPipeline {
    graph: Arc<dyn GraphStore>,
}

impl IngestionPipeline {
    pub fn new(graph: Arc<dyn GraphStore>) -> Self {
        Self { graph }
    }

    pub async fn ingest_document(&self, document: Properties, document_type: &str) -> Envelope<DocumentIngested> {
        let result = async {
            let label = Identifier::parse(document_type)?;
            let node = self.graph.create_node(&label, document).await?;
            Ok::<_, GraphError>(DocumentIngested { node })
        }
        .await;

        match &result {
            Ok(doc) => tracing::info!("Document ingested: {} (id: {:?})", doc.node.label, doc.node.id()),
            Err(e) => tracing::error!("Failed to ingest document: {}", e),
        }
        result.into()
    }

    pub async fn ingest_conversation(
        &self,
        conversation_id: &str,
        messages: &[ConversationMessage],
        metadata: Option<Properties>,
    ) -> Envelope<ConversationIngested> {
        let mut written = 0usize;
        let result = self.write_conversation(conversation_id, messages, metadata, &mut written).await;

        match &result {
            Ok(_) => tracing::info!("Conversation ingested: {} ({} messages)", conversation_id, messages.len()),
            Err(e) => tracing::error!(
                "Failed to ingest conversation {} after {} of {} messages: {}",
                conversation_id,
                written,
                messages.len(),
                e
            ),
        }
        result.into()
    }

    async fn write_conversation(
        &self,
        conversation_id: &str,
        messages: &[ConversationMessage],
        metadata: Option<Properties>,
        written: &mut usize,
    ) -> Result<ConversationIngested, GraphError> {
        let conversation_label = Identifier::parse(CONVERSATION_LABEL)?;
        let message_label = Identifier::parse(MESSAGE_LABEL)?;
        let has_message = Identifier::parse(HAS_MESSAGE)?;

        // Reject malformed messages before the first write.
        let message_props = messages
            .iter()
            .enumerate()
            .map(|(idx, message)| {
                let props = message.to_properties(&message_id(conversation_id, idx), idx);
                validate_properties(&props)?;
                Ok(props)
            })
            .collect::<Result<Vec<_>, GraphError>>()?;

        // The conversation id must win over a metadata key of the same name,
        // otherwise the HAS_MESSAGE matches below would miss the node.
        let mut conversation_props = metadata.unwrap_or_default();
        conversation_props.insert("id".into(), Value::String(conversation_id.to_string()));
        let conversation = self.graph.create_node(&conversation_label, conversation_props).await?;
        let conversation_ref = NodeRef::new(conversation_label, conversation_id);

        for (idx, msg_props) in message_props.into_iter().enumerate() {
            let id = message_id(conversation_id, idx);
            self.graph.create_node(&message_label, msg_props).await?;
            let linked = self
                .graph
                .create_relationship(
                    &conversation_ref,
                    &NodeRef::new(message_label.clone(), id.clone()),
                    &has_message,
                    order_property(idx),
                )
                .await?;
            if linked.is_none() {
                tracing::warn!("HAS_MESSAGE not created for {}: endpoint not found", id);
            }
            *written += 1;
        }

        Ok(ConversationIngested {
            conversation,
            message_count: messages.len(),
        })
    }

    pub async fn create_entity(&self, entity_type: &str, properties: Properties) -> Envelope<EntityCreated> {
        let result = async {
            let label = Identifier::parse(entity_type)?;
            let entity = self.graph.create_node(&label, properties).await?;
            Ok::<_, GraphError>(EntityCreated { entity })
        }
        .await;

        match &result {
            Ok(created) => tracing::info!("Entity created: {} - {:?}", created.entity.label, created.entity.id()),
            Err(e) => tracing::error!("Failed to create entity: {}", e),
        }
        result.into()
    }

    pub async fn link_entities(
        &self,
        from_type: &str,
        from_id: &str,
        to_type: &str,
        to_id: &str,
        relationship_type: &str,
        properties: Option<Properties>,
    ) -> Envelope<EntitiesLinked> {
        let result = async {
            let from = NodeRef::new(Identifier::parse(from_type)?, from_id);
            let to = NodeRef::new(Identifier::parse(to_type)?, to_id);
            let rel_type = Identifier::parse(relationship_type)?;
            let relationship = self
                .graph
                .create_relationship(&from, &to, &rel_type, properties.unwrap_or_default())
                .await?;
            Ok::<_, GraphError>(EntitiesLinked { relationship })
        }
        .await;

        match &result {
            Ok(EntitiesLinked { relationship: Some(_) }) => {
                tracing::info!("Relationship created: {} -[{}]-> {}", from_id, relationship_type, to_id)
            }
            Ok(EntitiesLinked { relationship: None }) => tracing::warn!(
                "Relationship {} -[{}]-> {} not created: endpoint not found",
                from_id,
                relationship_type,
                to_id
            ),
            Err(e) => tracing::error!("Failed to create relationship: {}", e),
        }
        result.into()
    }
}

use cocreate_common::{ErrorKind, GraphError, Node, Relationship};
use serde::{Serialize, Serializer};

/// Why an ingestion call failed.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<GraphError> for Failure {
    fn from(err: GraphError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Result of an ingestion call. Serializes as `{"success": true, ...payload}`
/// or `{"success": false, "error": "...", "error_kind": "..."}`.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope<T> {
    Success(T),
    Failure(Failure),
}

impl<T> Envelope<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Envelope::Success(_))
    }

    pub fn into_result(self) -> Result<T, Failure> {
        match self {
            Envelope::Success(payload) => Ok(payload),
            Envelope::Failure(failure) => Err(failure),
        }
    }
}

impl<T> From<Result<T, GraphError>> for Envelope<T> {
    fn from(result: Result<T, GraphError>) -> Self {
        match result {
            Ok(payload) => Envelope::Success(payload),
            Err(err) => Envelope::Failure(err.into()),
        }
    }
}

#[derive(Serialize)]
struct SuccessBody<'a, T> {
    success: bool,
    #[serde(flatten)]
    payload: &'a T,
}

#[derive(Serialize)]
struct FailureBody<'a> {
    success: bool,
    error: &'a str,
    error_kind: ErrorKind,
}

impl<T: Serialize> Serialize for Envelope<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Envelope::Success(payload) => SuccessBody { success: true, payload }.serialize(serializer),
            Envelope::Failure(failure) => FailureBody {
                success: false,
                error: &failure.message,
                error_kind: failure.kind,
            }
            .serialize(serializer),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DocumentIngested {
    pub node: Node,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ConversationIngested {
    pub conversation: Node,
    pub message_count: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EntityCreated {
    pub entity: Node,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EntitiesLinked {
    /// `None` when either endpoint was missing and nothing was created.
    pub relationship: Option<Relationship>,
}

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("graph backend connection failed: {0}")]
    Connection(String),
    #[error("query failed: {0}")]
    Query(String),
    #[error("invalid identifier {0:?}: expected [A-Za-z_][A-Za-z0-9_]*, at most 64 characters")]
    InvalidIdentifier(String),
    #[error("invalid property {key:?}: {reason}")]
    InvalidProperty { key: String, reason: String },
    #[error("backend returned no rows for {0}")]
    EmptyResult(String),
    #[error("operation not supported by this backend: {0}")]
    Unsupported(String),
}

/// Coarse failure class reported in ingestion envelopes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Connection,
    Query,
    Validation,
}

impl GraphError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GraphError::Connection(_) => ErrorKind::Connection,
            GraphError::InvalidIdentifier(_) | GraphError::InvalidProperty { .. } => ErrorKind::Validation,
            GraphError::Query(_) | GraphError::EmptyResult(_) | GraphError::Unsupported(_) => ErrorKind::Query,
        }
    }

    pub fn invalid_property(key: impl Into<String>, reason: impl Into<String>) -> Self {
        GraphError::InvalidProperty {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

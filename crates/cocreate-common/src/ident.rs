use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

use crate::error::GraphError;

pub const MAX_IDENTIFIER_LEN: usize = 64;

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,63}$").expect("identifier pattern is valid")
    })
}

/// A label, relationship type or property key that is safe to splice into
/// Cypher text. Cypher cannot bind schema identifiers as parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    pub fn parse(raw: &str) -> Result<Self, GraphError> {
        if identifier_pattern().is_match(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(GraphError::InvalidIdentifier(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Identifier {
    type Error = GraphError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Identifier> for String {
    fn from(value: Identifier) -> Self {
        value.0
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_plain_identifiers() {
        for raw in ["Document", "HAS_MESSAGE", "_internal", "Project2", "a"] {
            assert_eq!(Identifier::parse(raw).unwrap().as_str(), raw);
        }
        let longest = "A".repeat(MAX_IDENTIFIER_LEN);
        assert!(Identifier::parse(&longest).is_ok());
    }

    #[test]
    fn test_rejects_injection_attempts() {
        let rejected = [
            "",
            "2Fast",
            "Doc ument",
            "Doc`ument",
            "Person) DETACH DELETE (n",
            "KNOWS]->(b) WITH b MATCH (x",
            "Label:Other",
            "Ünicode",
        ];
        for raw in rejected {
            let err = Identifier::parse(raw).unwrap_err();
            assert!(matches!(err, GraphError::InvalidIdentifier(_)), "{raw:?} should be rejected");
        }
        assert!(Identifier::parse(&"A".repeat(MAX_IDENTIFIER_LEN + 1)).is_err());
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Identifier = serde_json::from_str("\"Person\"").unwrap();
        assert_eq!(ok.to_string(), "Person");
        assert!(serde_json::from_str::<Identifier>("\"Person {x:1}\"").is_err());
    }
}

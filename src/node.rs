//! Annotated configuration tree
//!
//! The parser hands us a tree of [`Node`]s: scalars, ordered mappings and
//! sequences, each optionally tagged with the file and line it came from.
//! Schema validation produces trees of the same shape, additionally carrying
//! [`Identifier`] and [`Lambda`] payloads.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::identifier::{Identifier, Lambda};

/// Ordered mapping from key to child node
pub type Mapping = IndexMap<String, Node>;

/// Key used to spell a lambda in JSON documents: `{"!lambda": "return id(x).state;"}`
pub const LAMBDA_TAG: &str = "!lambda";

/// Source provenance of a node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub line: Option<usize>,
}

impl Location {
    pub fn new(file: impl Into<String>, line: Option<usize>) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}", self.file, line),
            None => write!(f, "{}:?", self.file),
        }
    }
}

/// Payload of a node
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Mapping(Mapping),
    Sequence(Vec<Node>),
    Id(Identifier),
    Lambda(Lambda),
}

impl Value {
    /// Short human name of the value kind, used in violation messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Mapping(_) => "dictionary",
            Value::Sequence(_) => "list",
            Value::Id(_) => "ID",
            Value::Lambda(_) => "lambda",
        }
    }
}

/// A configuration tree node with optional provenance
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub value: Value,
    pub location: Option<Location>,
}

impl Node {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            location: None,
        }
    }

    pub fn null() -> Self {
        Self::new(Value::Null)
    }

    pub fn mapping<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Node)>,
    {
        Self::new(Value::Mapping(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    pub fn sequence<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Node>,
    {
        Self::new(Value::Sequence(items.into_iter().collect()))
    }

    /// Attach provenance
    pub fn at(mut self, file: impl Into<String>, line: Option<usize>) -> Self {
        self.location = Some(Location::new(file, line));
        self
    }

    /// Replace the payload while keeping provenance
    pub fn with_value(&self, value: Value) -> Self {
        Self {
            value,
            location: self.location.clone(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.value, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match &self.value {
            Value::Mapping(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Node]> {
        match &self.value {
            Value::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_identifier(&self) -> Option<&Identifier> {
        match &self.value {
            Value::Id(id) => Some(id),
            _ => None,
        }
    }

    /// Look up a key when this node is a mapping
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.as_mapping().and_then(|map| map.get(key))
    }

    /// Render a scalar as plain text; `None` for containers
    pub fn scalar_text(&self) -> Option<String> {
        match &self.value {
            Value::Bool(b) => Some(b.to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(x) => Some(x.to_string()),
            Value::String(s) => Some(s.clone()),
            Value::Id(id) => id.name().map(str::to_string),
            Value::Null | Value::Mapping(_) | Value::Sequence(_) | Value::Lambda(_) => None,
        }
    }

    /// Build a tree from a decoded JSON document, tagging every node with `file`
    pub fn from_json(value: serde_json::Value, file: Option<&str>) -> Self {
        let payload = match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::Sequence(
                items.into_iter().map(|v| Self::from_json(v, file)).collect(),
            ),
            serde_json::Value::Object(obj) => {
                if obj.len() == 1 {
                    if let Some(serde_json::Value::String(src)) = obj.get(LAMBDA_TAG) {
                        let mut node = Self::new(Value::Lambda(Lambda::new(src.clone())));
                        node.location = file.map(|f| Location::new(f, None));
                        return node;
                    }
                }
                Value::Mapping(
                    obj.into_iter()
                        .map(|(k, v)| (k, Self::from_json(v, file)))
                        .collect(),
                )
            }
        };
        let mut node = Self::new(payload);
        node.location = file.map(|f| Location::new(f, None));
        node
    }

    /// Lower to JSON for consumers that only understand plain data.
    /// Identifiers become their name (or null), lambdas their tagged source.
    pub fn to_json(&self) -> serde_json::Value {
        match &self.value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(x) => serde_json::Number::from_f64(*x)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Mapping(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Value::Sequence(items) => {
                serde_json::Value::Array(items.iter().map(Node::to_json).collect())
            }
            Value::Id(id) => id
                .name()
                .map(|n| serde_json::Value::String(n.to_string()))
                .unwrap_or(serde_json::Value::Null),
            Value::Lambda(lambda) => serde_json::json!({ LAMBDA_TAG: lambda.source() }),
        }
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Self::new(Value::String(s.to_string()))
    }
}

impl From<String> for Node {
    fn from(s: String) -> Self {
        Self::new(Value::String(s))
    }
}

impl From<bool> for Node {
    fn from(b: bool) -> Self {
        Self::new(Value::Bool(b))
    }
}

impl From<i64> for Node {
    fn from(i: i64) -> Self {
        Self::new(Value::Int(i))
    }
}

impl From<f64> for Node {
    fn from(x: f64) -> Self {
        Self::new(Value::Float(x))
    }
}

impl From<Identifier> for Node {
    fn from(id: Identifier) -> Self {
        Self::new(Value::Id(id))
    }
}

impl From<Lambda> for Node {
    fn from(lambda: Lambda) -> Self {
        Self::new(Value::Lambda(lambda))
    }
}

impl From<Vec<Node>> for Node {
    fn from(items: Vec<Node>) -> Self {
        Self::new(Value::Sequence(items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_preserves_key_order() {
        let doc = json!({ "zeta": 1, "alpha": 2, "mid": 3 });
        let node = Node::from_json(doc, Some("device.json"));
        let keys: Vec<_> = node.as_mapping().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
        assert_eq!(
            node.get("alpha").unwrap().location,
            Some(Location::new("device.json", None))
        );
    }

    #[test]
    fn test_lambda_tag_becomes_lambda() {
        let doc = json!({ "value": { "!lambda": "return id(temp).state;" } });
        let node = Node::from_json(doc, None);
        match &node.get("value").unwrap().value {
            Value::Lambda(lambda) => assert_eq!(lambda.requires().len(), 1),
            other => panic!("Expected lambda, got {:?}", other),
        }
    }

    #[test]
    fn test_location_display() {
        assert_eq!(Location::new("a.yaml", Some(12)).to_string(), "a.yaml:12");
        assert_eq!(Location::new("a.yaml", None).to_string(), "a.yaml:?");
    }

    #[test]
    fn test_to_json_lowers_identifiers() {
        let node = Node::mapping([
            ("id", Node::from(Identifier::declaration(Some("led"), "Light"))),
            ("other", Node::from(Identifier::reference(None, Some("Light")))),
        ]);
        assert_eq!(node.to_json(), json!({ "id": "led", "other": null }));
    }
}

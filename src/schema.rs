//! Schema types and combinators
//!
//! A schema turns a raw node into a validated node or a structured
//! [`Invalid`] violation. Components supply their schemas through the
//! registry; [`MapSchema`] covers the common dictionary-of-fields shape and is
//! what the core metadata schema is built from.

use std::fmt;
use std::sync::Arc;

use crate::identifier::{Identifier, Lambda, RESERVED_NAMES};
use crate::node::{Mapping, Node, Value};

/// Shared handle to a schema, as stored in component descriptors
pub type SchemaRef = Arc<dyn ConfigSchema + Send + Sync>;

/// Something that can validate (and normalize) a configuration node
pub trait ConfigSchema: fmt::Debug {
    fn validate(&self, node: &Node) -> Result<Node, Invalid>;
}

/// Category of a violation, used to pick the message format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViolationKind {
    /// Key not declared by the schema
    ExtraKey,
    /// Required key absent
    MissingKey,
    /// Present but unacceptable value
    BadValue,
}

/// A schema violation at `path` inside the validated node
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct Invalid {
    pub kind: ViolationKind,
    pub path: Vec<String>,
    pub message: String,
}

impl Invalid {
    pub fn new(kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            path: Vec::new(),
            message: message.into(),
        }
    }

    pub fn bad_value(message: impl Into<String>) -> Self {
        Self::new(ViolationKind::BadValue, message)
    }

    /// Prefix the path with the segment of the enclosing container
    pub fn within(mut self, segment: impl Into<String>) -> Self {
        self.path.insert(0, segment.into());
        self
    }

    /// `['key'][0]` style rendering of the path
    pub fn data_path(&self) -> String {
        self.path
            .iter()
            .map(|seg| match seg.parse::<usize>() {
                Ok(index) => format!("[{}]", index),
                Err(_) => format!("['{}']", seg),
            })
            .collect()
    }
}

/// Validation applied to a single field value
#[derive(Debug, Clone)]
pub enum FieldKind {
    /// Anything, passed through untouched
    Any,
    /// Any scalar, coerced to a string
    String,
    Bool,
    /// Integers, floats and numeric strings, coerced to a float
    Float,
    /// Lower-case letters, digits and underscores
    ValidName,
    /// Lower-cased, then one of the listed options
    OneOf(Vec<String>),
    /// A list of items; a lone item or null is promoted to a list
    List(Box<FieldKind>),
    Map(MapSchema),
    /// Declares an identifier of the given type
    DeclareId(String),
    /// References an identifier of the given type
    UseId(String),
    Lambda,
}

impl FieldKind {
    pub fn one_of<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::OneOf(options.into_iter().map(Into::into).collect())
    }

    pub fn list(item: FieldKind) -> Self {
        Self::List(Box::new(item))
    }

    pub fn validate(&self, node: &Node) -> Result<Node, Invalid> {
        match self {
            FieldKind::Any => Ok(node.clone()),
            FieldKind::String => coerce_string(node).map(|s| node.with_value(Value::String(s))),
            FieldKind::Bool => coerce_bool(node).map(|b| node.with_value(Value::Bool(b))),
            FieldKind::Float => coerce_float(node).map(|x| node.with_value(Value::Float(x))),
            FieldKind::ValidName => {
                let value = strict_string(node)?;
                if let Some(bad) = value
                    .chars()
                    .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_'))
                {
                    return Err(Invalid::bad_value(format!(
                        "'{}' is an invalid character for names. Valid characters are: \
                         a-z, 0-9 and _ (lowercase only)",
                        bad
                    )));
                }
                Ok(node.with_value(Value::String(value)))
            }
            FieldKind::OneOf(options) => {
                let value = coerce_string(node)?.to_lowercase();
                if options.iter().any(|o| *o == value) {
                    Ok(node.with_value(Value::String(value)))
                } else {
                    Err(Invalid::bad_value(format!(
                        "Unknown value '{}', must be one of {}",
                        value,
                        options.join(", ")
                    )))
                }
            }
            FieldKind::List(item) => {
                let items: Vec<Node> = match &node.value {
                    Value::Null => Vec::new(),
                    Value::Sequence(items) => items.clone(),
                    _ => vec![node.clone()],
                };
                let validated = items
                    .iter()
                    .enumerate()
                    .map(|(i, it)| item.validate(it).map_err(|e| e.within(i.to_string())))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(node.with_value(Value::Sequence(validated)))
            }
            FieldKind::Map(schema) => schema.validate(node),
            FieldKind::DeclareId(type_tag) => match &node.value {
                Value::Id(id) if id.is_declaration() => Ok(node.clone()),
                _ => {
                    let name = id_name(node)?;
                    let id = Identifier::declaration(Some(name.as_str()), type_tag);
                    Ok(node.with_value(Value::Id(id)))
                }
            },
            FieldKind::UseId(type_tag) => match &node.value {
                Value::Id(id) if !id.is_declaration() => Ok(node.clone()),
                _ => {
                    let name = id_name(node)?;
                    Ok(node.with_value(Value::Id(Identifier::reference(
                        Some(name.as_str()),
                        Some(type_tag.as_str()),
                    ))))
                }
            },
            FieldKind::Lambda => match &node.value {
                Value::Lambda(_) => Ok(node.clone()),
                Value::String(src) => Ok(node.with_value(Value::Lambda(Lambda::new(src.clone())))),
                other => Err(Invalid::bad_value(format!(
                    "Expected a lambda, got {}",
                    other.kind_name()
                ))),
            },
        }
    }

    /// Default inserted for a generated-id field that the user left out
    fn generated_default(&self) -> Option<Value> {
        match self {
            FieldKind::DeclareId(tag) => Some(Value::Id(Identifier::declaration(None, tag))),
            FieldKind::UseId(tag) => {
                Some(Value::Id(Identifier::reference(None, Some(tag.as_str()))))
            }
            _ => None,
        }
    }
}

fn coerce_string(node: &Node) -> Result<String, Invalid> {
    match &node.value {
        Value::Null => Err(Invalid::bad_value("string value is None")),
        Value::Mapping(_) | Value::Sequence(_) | Value::Lambda(_) => Err(Invalid::bad_value(
            format!("string value cannot be a {}", node.value.kind_name()),
        )),
        _ => node
            .scalar_text()
            .ok_or_else(|| Invalid::bad_value("string value is None")),
    }
}

fn strict_string(node: &Node) -> Result<String, Invalid> {
    node.as_str().map(str::to_string).ok_or_else(|| {
        Invalid::bad_value(format!(
            "Must be a string, got {}. did you forget putting quotes around the value?",
            node.value.kind_name()
        ))
    })
}

fn coerce_bool(node: &Node) -> Result<bool, Invalid> {
    match &node.value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) => match s.to_lowercase().as_str() {
            "true" | "yes" | "on" | "enable" => Ok(true),
            "false" | "no" | "off" | "disable" => Ok(false),
            _ => Err(Invalid::bad_value(format!("Expected boolean value, got '{}'", s))),
        },
        other => Err(Invalid::bad_value(format!(
            "Expected boolean value, got {}",
            other.kind_name()
        ))),
    }
}

fn coerce_float(node: &Node) -> Result<f64, Invalid> {
    match &node.value {
        Value::Int(i) => Ok(*i as f64),
        Value::Float(x) => Ok(*x),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| Invalid::bad_value(format!("expected float, got '{}'", s))),
        other => Err(Invalid::bad_value(format!(
            "expected float, got {}",
            other.kind_name()
        ))),
    }
}

fn id_name(node: &Node) -> Result<String, Invalid> {
    let name = strict_string(node)?;
    let mut chars = name.chars();
    match chars.next() {
        None => return Err(Invalid::bad_value("ID must not be empty")),
        Some(c) if c.is_ascii_digit() => {
            return Err(Invalid::bad_value("First character in ID cannot be a digit."))
        }
        _ => {}
    }
    if let Some(bad) = name.chars().find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
        return Err(Invalid::bad_value(format!(
            "IDs must only consist of upper/lowercase characters, the underscore and numbers. \
             '{}' cannot be used",
            bad
        )));
    }
    if RESERVED_NAMES.contains(&name.as_str()) {
        return Err(Invalid::bad_value(format!("ID {} is reserved, please choose another", name)));
    }
    Ok(name)
}

/// Whether a field must, may, or defaults when absent
#[derive(Debug, Clone)]
enum Presence {
    Required,
    Optional,
    Default(Node),
    /// Absent id fields get an unnamed identifier of the field's type
    Generated,
}

#[derive(Debug, Clone)]
struct FieldSpec {
    key: String,
    presence: Presence,
    kind: FieldKind,
}

/// Dictionary schema: a fixed set of keys, each with its own validation
#[derive(Debug, Clone, Default)]
pub struct MapSchema {
    fields: Vec<FieldSpec>,
    allow_extra: bool,
}

impl MapSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Base schema of every platform entry: just the `platform` discriminator
    pub fn platform() -> Self {
        Self::new().required("platform", FieldKind::String)
    }

    fn field(mut self, key: &str, presence: Presence, kind: FieldKind) -> Self {
        self.fields.retain(|f| f.key != key);
        self.fields.push(FieldSpec {
            key: key.to_string(),
            presence,
            kind,
        });
        self
    }

    pub fn required(self, key: &str, kind: FieldKind) -> Self {
        self.field(key, Presence::Required, kind)
    }

    pub fn optional(self, key: &str, kind: FieldKind) -> Self {
        self.field(key, Presence::Optional, kind)
    }

    pub fn with_default(self, key: &str, kind: FieldKind, default: impl Into<Node>) -> Self {
        self.field(key, Presence::Default(default.into()), kind)
    }

    /// An id field that is generated when absent
    pub fn generate_id(self, key: &str, kind: FieldKind) -> Self {
        self.field(key, Presence::Generated, kind)
    }

    /// Accept keys the schema does not declare, passing them through
    pub fn allow_extra_keys(mut self) -> Self {
        self.allow_extra = true;
        self
    }

}

impl ConfigSchema for MapSchema {
    fn validate(&self, node: &Node) -> Result<Node, Invalid> {
        let input = match &node.value {
            Value::Mapping(map) => map,
            other => {
                return Err(Invalid::bad_value(format!(
                    "expected a dictionary, got {}",
                    other.kind_name()
                )))
            }
        };

        let mut output = Mapping::with_capacity(input.len());

        // Present keys in input order, so discovery order follows the document
        for (key, value) in input {
            match self.fields.iter().find(|f| &f.key == key) {
                Some(spec) => {
                    let validated = spec.kind.validate(value).map_err(|e| e.within(key.clone()))?;
                    output.insert(key.clone(), validated);
                }
                None if self.allow_extra => {
                    output.insert(key.clone(), value.clone());
                }
                None => {
                    return Err(Invalid::new(ViolationKind::ExtraKey, "extra keys not allowed")
                        .within(key.clone()))
                }
            }
        }

        for spec in &self.fields {
            if input.contains_key(&spec.key) {
                continue;
            }
            match &spec.presence {
                Presence::Required => {
                    return Err(Invalid::new(
                        ViolationKind::MissingKey,
                        "required key not provided",
                    )
                    .within(spec.key.clone()))
                }
                Presence::Optional => {}
                Presence::Default(default) => {
                    let validated = spec
                        .kind
                        .validate(default)
                        .map_err(|e| e.within(spec.key.clone()))?;
                    output.insert(spec.key.clone(), validated);
                }
                Presence::Generated => {
                    if let Some(value) = spec.kind.generated_default() {
                        output.insert(spec.key.clone(), Node::new(value));
                    }
                }
            }
        }

        Ok(node.with_value(Value::Mapping(output)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pin_schema() -> MapSchema {
        MapSchema::platform().required("pin", FieldKind::String)
    }

    #[test]
    fn test_map_schema_accepts_declared_keys() {
        let node = Node::mapping([("platform", Node::from("dht")), ("pin", Node::from("D2"))]);
        let validated = pin_schema().validate(&node).unwrap();
        assert_eq!(validated, node);
    }

    #[test]
    fn test_map_schema_rejects_extra_key() {
        let node = Node::mapping([
            ("platform", Node::from("dht")),
            ("pin", Node::from("D2")),
            ("colour", Node::from("red")),
        ]);
        let err = pin_schema().validate(&node).unwrap_err();
        assert_eq!(err.kind, ViolationKind::ExtraKey);
        assert_eq!(err.path, vec!["colour"]);
    }

    #[test]
    fn test_map_schema_missing_required() {
        let node = Node::mapping([("platform", Node::from("dht"))]);
        let err = pin_schema().validate(&node).unwrap_err();
        assert_eq!(err.kind, ViolationKind::MissingKey);
        assert_eq!(err.data_path(), "['pin']");
    }

    #[test]
    fn test_defaults_and_generated_ids() {
        let schema = MapSchema::new()
            .with_default("simplify", FieldKind::Bool, true)
            .generate_id("trigger_id", FieldKind::DeclareId("Trigger".into()));
        let validated = schema.validate(&Node::mapping(Vec::<(String, Node)>::new())).unwrap();
        assert_eq!(validated.get("simplify"), Some(&Node::from(true)));
        let id = validated.get("trigger_id").and_then(Node::as_identifier).unwrap();
        assert!(id.is_declaration());
        assert_eq!(id.name(), None);
        assert_eq!(id.type_tag(), Some("Trigger"));
    }

    #[test]
    fn test_nested_list_path() {
        let schema = MapSchema::new().optional(
            "on_boot",
            FieldKind::list(FieldKind::Map(MapSchema::new().optional("priority", FieldKind::Float))),
        );
        let node = Node::mapping([(
            "on_boot",
            Node::sequence([
                Node::mapping([("priority", Node::from(5i64))]),
                Node::mapping([("priority", Node::from("high"))]),
            ]),
        )]);
        let err = schema.validate(&node).unwrap_err();
        assert_eq!(err.path, vec!["on_boot", "1", "priority"]);
        assert_eq!(err.data_path(), "['on_boot'][1]['priority']");
    }

    #[test]
    fn test_lone_item_promoted_to_list() {
        let kind = FieldKind::list(FieldKind::String);
        let validated = kind.validate(&Node::from("x")).unwrap();
        assert_eq!(validated, Node::sequence([Node::from("x")]));
    }

    #[test]
    fn test_valid_name_rejects_uppercase() {
        assert!(FieldKind::ValidName.validate(&Node::from("living_room")).is_ok());
        assert!(FieldKind::ValidName.validate(&Node::from("Living")).is_err());
    }

    #[test]
    fn test_one_of_lowercases() {
        let kind = FieldKind::one_of(["qio", "dout"]);
        assert_eq!(kind.validate(&Node::from("QIO")).unwrap(), Node::from("qio"));
        assert!(kind.validate(&Node::from("fast")).is_err());
    }

    #[test]
    fn test_declare_id_rejects_reserved_and_digits() {
        let kind = FieldKind::DeclareId("Switch".into());
        assert!(kind.validate(&Node::from("relay_1")).is_ok());
        assert!(kind.validate(&Node::from("1relay")).is_err());
        assert!(kind.validate(&Node::from("delete")).is_err());
    }
}

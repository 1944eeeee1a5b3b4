//! Rendering of validation results
//!
//! Text output groups records by label under a `Failed config` banner and can
//! dump the node each error is about. JSON output is one object per record.

use serde_json::json;

use crate::diagnostics::{ErrorCollector, ErrorRecord};
use crate::node::{Mapping, Node, Value};
use crate::validate::ValidationResult;

const PLATFORM_KEY: &str = "platform";

/// Grouped, human-readable report. `with_origin` appends a dump of each
/// record's originating node.
pub fn render_text(errors: &ErrorCollector, with_origin: bool) -> String {
    let mut output = String::from("Failed config\n");

    for group in errors.grouped() {
        output.push_str(&format!("  {}:\n", group.label));
        for record in group.records {
            output.push_str(&format!("    {}\n", record_line(record)));
            if with_origin {
                if let Some(origin) = &record.origin {
                    output.push_str(&dump_node(origin, 6));
                }
            }
        }
    }

    output.push_str(&format!("\n{} error(s)\n", errors.len()));
    output
}

fn record_line(record: &ErrorRecord) -> String {
    match record.location() {
        Some(location) => format!("[{}] {} [source {}]", record.kind, record.message, location),
        None => format!("[{}] {}", record.kind, record.message),
    }
}

/// Machine-readable report
pub fn render_json(errors: &ErrorCollector) -> serde_json::Value {
    let records: Vec<_> = errors
        .iter()
        .map(|record| {
            json!({
                "code": record.kind.as_str(),
                "kind": format!("{:?}", record.kind),
                "stage": stage(record),
                "label": record.label(),
                "message": record.message,
                "location": record.location().map(ToString::to_string),
            })
        })
        .collect();
    serde_json::Value::Array(records)
}

/// Pipeline stage that produced a record
fn stage(record: &ErrorRecord) -> &'static str {
    if record.kind.is_identifier_error() {
        "identifiers"
    } else {
        "components"
    }
}

/// Validated tree and accepted symbols, for downstream code generation
pub fn render_emit(result: &ValidationResult) -> serde_json::Value {
    let target = result.context();
    json!({
        "target": {
            "platform": target.platform.as_ref().map(ToString::to_string),
            "board": target.board,
            "simplify": target.simplify,
        },
        "config": config_json(result.config()),
        "symbols": result.symbols(),
    })
}

/// Plain-data view of a domain mapping
pub fn config_json(config: &Mapping) -> serde_json::Value {
    serde_json::Value::Object(
        config
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect(),
    )
}

/// Indented dump of a node. Mapping keys are sorted case-insensitively with
/// `platform` first.
pub fn dump_node(node: &Node, indent: usize) -> String {
    let mut output = String::new();
    dump_into(&mut output, node, indent);
    output
}

fn dump_into(output: &mut String, node: &Node, indent: usize) {
    let pad = " ".repeat(indent);
    match &node.value {
        Value::Mapping(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by_key(|(key, _)| sort_key(key));
            for (key, value) in entries {
                if is_container(value) {
                    output.push_str(&format!("{}{}:\n", pad, key));
                    dump_into(output, value, indent + 2);
                } else {
                    output.push_str(&format!("{}{}: {}\n", pad, key, scalar(value)));
                }
            }
        }
        Value::Sequence(items) => {
            for item in items {
                if is_container(item) {
                    output.push_str(&format!("{}-\n", pad));
                    dump_into(output, item, indent + 2);
                } else {
                    output.push_str(&format!("{}- {}\n", pad, scalar(item)));
                }
            }
        }
        _ => output.push_str(&format!("{}{}\n", pad, scalar(node))),
    }
}

fn sort_key(key: &str) -> (bool, String) {
    let lower = key.to_lowercase();
    (lower != PLATFORM_KEY, lower)
}

fn is_container(node: &Node) -> bool {
    matches!(node.value, Value::Mapping(_) | Value::Sequence(_))
}

fn scalar(node: &Node) -> String {
    match &node.value {
        Value::Null => "null".to_string(),
        Value::Lambda(lambda) => format!("!lambda {}", lambda.source()),
        Value::Id(id) if id.name().is_none() => "<unassigned id>".to_string(),
        _ => node.scalar_text().unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::ErrorKind;

    fn sample_errors() -> ErrorCollector {
        let mut errors = ErrorCollector::new();
        errors.general(ErrorKind::ComponentNotFound, "Component not found: foo");
        errors.in_domain(
            ErrorKind::UnresolvedIdentifier,
            "Couldn't find ID ghost",
            "display.lambda",
            None,
        );
        let origin = Node::mapping([
            ("pin", Node::from("D2")),
            ("Name", Node::from("t")),
            ("platform", Node::from("dht")),
        ])
        .at("device.json", Some(12));
        errors.in_domain(
            ErrorKind::SchemaViolation,
            "Invalid config for [sensor.dht]: bad",
            "sensor.dht",
            Some(&origin),
        );
        errors
    }

    #[test]
    fn test_render_text_groups() {
        let text = render_text(&sample_errors(), false);
        assert!(text.starts_with("Failed config\n"));
        assert!(text.contains("  General Error:\n    [E001] Component not found: foo\n"));
        assert!(text.contains("  sensor.dht:\n"));
        assert!(text.contains("[source device.json:12]"));
        assert!(text.contains("  display.lambda:\n    [E102] Couldn't find ID ghost\n"));
        assert!(text.ends_with("3 error(s)\n"));
    }

    #[test]
    fn test_dump_sorts_platform_first() {
        let text = render_text(&sample_errors(), true);
        let platform = text.find("platform: dht").unwrap();
        let name = text.find("Name: t").unwrap();
        let pin = text.find("pin: D2").unwrap();
        assert!(platform < name && name < pin);
    }

    #[test]
    fn test_dump_nested_sequence() {
        let node = Node::mapping([(
            "then",
            Node::sequence([Node::from("a"), Node::mapping([("delay", Node::from(5i64))])]),
        )]);
        assert_eq!(dump_node(&node, 0), "then:\n  - a\n  -\n    delay: 5\n");
    }

    #[test]
    fn test_render_json_records() {
        let json = render_json(&sample_errors());
        let records = json.as_array().unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0]["code"], "E001");
        assert_eq!(records[0]["label"], "General Error");
        assert_eq!(records[0]["stage"], "components");
        assert!(records[0]["location"].is_null());
        assert_eq!(records[1]["code"], "E102");
        assert_eq!(records[1]["stage"], "identifiers");
        assert_eq!(records[2]["kind"], "SchemaViolation");
        assert_eq!(records[2]["stage"], "components");
        assert_eq!(records[2]["location"], "device.json:12");
    }
}

//! Configuration loading
//!
//! Reads a configuration document into a [`Mapping`] of domains. Failure to
//! read or decode the source is fatal: nothing can be validated without it.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::error::{FatalError, Result};
use crate::node::{Mapping, Node, Value};
use crate::registry::ComponentRegistry;
use crate::validate::{validate_config, ValidationResult};

/// Load a JSON configuration document, annotating every node with the file name
pub fn load_config(path: impl AsRef<Path>) -> Result<Mapping> {
    let path = path.as_ref();
    info!(path = %path.display(), "reading configuration");

    let content = fs::read_to_string(path).map_err(|source| FatalError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content, path)
}

/// Decode configuration text that came from `path`
pub fn parse_config(content: &str, path: &Path) -> Result<Mapping> {
    let document: serde_json::Value =
        serde_json::from_str(content).map_err(|e| FatalError::Undecodable {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let file = path.display().to_string();
    match Node::from_json(document, Some(&file)).value {
        Value::Mapping(domains) => Ok(domains),
        other => Err(FatalError::Undecodable {
            path: path.to_path_buf(),
            message: format!("top level must be a dictionary, got {}", other.kind_name()),
        }),
    }
}

/// Load and validate a configuration file in one step
pub fn check_file<R: ComponentRegistry>(
    path: impl AsRef<Path>,
    registry: R,
) -> Result<ValidationResult> {
    let raw = load_config(path)?;
    validate_config(&raw, registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_missing_file_is_fatal() {
        let err = load_config("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, FatalError::Unreadable { .. }));
        assert!(err.is_source_error());
    }

    #[test]
    fn test_non_mapping_root_is_fatal() {
        let err = parse_config("[1, 2, 3]", Path::new("list.json")).unwrap_err();
        assert!(err.to_string().contains("top level must be a dictionary"));
    }

    #[test]
    fn test_load_config_tags_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"esphomeyaml": {{"name": "d1"}}, "wifi": null}}"#).unwrap();

        let domains = load_config(file.path()).unwrap();
        let keys: Vec<_> = domains.keys().cloned().collect();
        assert_eq!(keys, vec!["esphomeyaml", "wifi"]);
        let name = domains["esphomeyaml"].get("name").unwrap();
        assert_eq!(
            name.location.as_ref().map(|l| l.file.clone()),
            Some(file.path().display().to_string())
        );
    }
}

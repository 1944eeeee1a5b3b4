//! Manifest-backed registry
//!
//! Loads component descriptors from a directory of JSON manifests, one file
//! per component or platform:
//!
//! ```json
//! {
//!   "domain": "sensor",
//!   "platform": "dht",
//!   "dependencies": [],
//!   "supported_platforms": ["ESP32", "ESP8266"],
//!   "platform_schema": {
//!     "type": "object",
//!     "properties": { "platform": { "type": "string" }, "pin": { "type": "string" } },
//!     "required": ["platform", "pin"],
//!     "additionalProperties": false
//!   }
//! }
//! ```
//!
//! Schemas are JSON Schema documents, compiled once at load time.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use jsonschema::error::ValidationErrorKind;
use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::component::{ComponentDescriptor, PlatformSupport, TargetPlatform};
use crate::node::Node;
use crate::registry::{platform_key, ComponentRegistry, InMemoryRegistry};
use crate::schema::{ConfigSchema, Invalid, SchemaRef, ViolationKind};

/// Errors while loading manifests
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("IO error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid manifest {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid schema in {}: {message}", path.display())]
    Schema { path: PathBuf, message: String },

    #[error("Component {key} defined twice (again in {})", path.display())]
    Duplicate { key: String, path: PathBuf },

    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
}

/// On-disk form of a component descriptor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentManifest {
    pub domain: String,
    /// Present for platform descriptors (`sensor.dht`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Omitted means every platform
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supported_platforms: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_schema: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_schema: Option<serde_json::Value>,
}

impl ComponentManifest {
    /// Registry key: `domain` or `domain.platform`
    pub fn key(&self) -> String {
        match &self.platform {
            Some(platform) => platform_key(&self.domain, platform),
            None => self.domain.clone(),
        }
    }

    /// Compile schemas and build the descriptor
    pub fn into_descriptor(self) -> Result<ComponentDescriptor, String> {
        let compile = |schema: Option<serde_json::Value>| -> Result<Option<SchemaRef>, String> {
            schema
                .map(|s| JsonSchemaValidator::compile(s).map(|v| Arc::new(v) as SchemaRef))
                .transpose()
        };

        Ok(ComponentDescriptor {
            config_schema: compile(self.config_schema)?,
            platform_schema: compile(self.platform_schema)?,
            dependencies: self.dependencies,
            platforms: match self.supported_platforms {
                Some(list) => PlatformSupport::Only(
                    list.iter().map(|p| TargetPlatform::normalize(p)).collect(),
                ),
                None => PlatformSupport::All,
            },
        })
    }
}

/// A [`ConfigSchema`] backed by a compiled JSON Schema
pub struct JsonSchemaValidator {
    source: serde_json::Value,
    compiled: JSONSchema,
}

impl JsonSchemaValidator {
    pub fn compile(source: serde_json::Value) -> Result<Self, String> {
        let compiled = JSONSchema::compile(&source).map_err(|e| e.to_string())?;
        Ok(Self { source, compiled })
    }

    pub fn source(&self) -> &serde_json::Value {
        &self.source
    }
}

impl fmt::Debug for JsonSchemaValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonSchemaValidator")
            .field("source", &self.source)
            .finish()
    }
}

impl ConfigSchema for JsonSchemaValidator {
    fn validate(&self, node: &Node) -> Result<Node, Invalid> {
        let instance = node.to_json();
        let first = match self.compiled.validate(&instance) {
            Ok(()) => return Ok(node.clone()),
            Err(mut errors) => errors.next(),
        };
        let Some(error) = first else {
            return Ok(node.clone());
        };

        let mut path: Vec<String> = error
            .instance_path
            .to_string()
            .split('/')
            .filter(|seg| !seg.is_empty())
            .map(str::to_string)
            .collect();

        let kind = match &error.kind {
            ValidationErrorKind::AdditionalProperties { unexpected } => {
                if let Some(key) = unexpected.first() {
                    path.push(key.clone());
                }
                ViolationKind::ExtraKey
            }
            ValidationErrorKind::Required { .. } => ViolationKind::MissingKey,
            _ => ViolationKind::BadValue,
        };

        Err(Invalid {
            kind,
            path,
            message: error.to_string(),
        })
    }
}

/// Registry populated from a manifest directory
#[derive(Debug, Default)]
pub struct ManifestRegistry {
    registry: InMemoryRegistry,
    sources: HashMap<String, PathBuf>,
}

impl ManifestRegistry {
    /// Load every `*.json` file under `dir`
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let dir = dir.as_ref();
        let mut loaded = Self::default();

        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() || path.extension().map(|e| e != "json").unwrap_or(true) {
                continue;
            }

            let content = fs::read_to_string(path).map_err(|source| ManifestError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let manifest: ComponentManifest =
                serde_json::from_str(&content).map_err(|source| ManifestError::Json {
                    path: path.to_path_buf(),
                    source,
                })?;
            loaded.add(manifest, path)?;
        }

        info!(
            dir = %dir.display(),
            components = loaded.len(),
            "loaded component manifests"
        );
        Ok(loaded)
    }

    /// Add one manifest, as if it had been read from `path`
    pub fn add(&mut self, manifest: ComponentManifest, path: &Path) -> Result<(), ManifestError> {
        let key = manifest.key();
        if self.sources.contains_key(&key) {
            return Err(ManifestError::Duplicate {
                key,
                path: path.to_path_buf(),
            });
        }

        let domain = manifest.domain.clone();
        let platform = manifest.platform.clone();
        let descriptor = manifest
            .into_descriptor()
            .map_err(|message| ManifestError::Schema {
                path: path.to_path_buf(),
                message,
            })?;

        match platform {
            Some(platform) => self.registry.register_platform(&domain, &platform, descriptor),
            None => self.registry.register(domain, descriptor),
        }
        debug!(component = %key, path = %path.display(), "registered manifest");
        self.sources.insert(key, path.to_path_buf());
        Ok(())
    }

    /// File a component was loaded from
    pub fn source_of(&self, key: &str) -> Option<&Path> {
        self.sources.get(key).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl ComponentRegistry for ManifestRegistry {
    fn lookup(&self, domain: &str) -> Option<Arc<ComponentDescriptor>> {
        self.registry.lookup(domain)
    }

    fn lookup_platform(&self, domain: &str, platform: &str) -> Option<Arc<ComponentDescriptor>> {
        self.registry.lookup_platform(domain, platform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn dht_schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "platform": { "type": "string" },
                "pin": { "type": "string" }
            },
            "required": ["platform", "pin"],
            "additionalProperties": false
        })
    }

    #[test]
    fn test_json_schema_accepts_valid_entry() {
        let validator = JsonSchemaValidator::compile(dht_schema()).unwrap();
        let node = Node::mapping([("platform", Node::from("dht")), ("pin", Node::from("D2"))]);
        assert_eq!(validator.validate(&node).unwrap(), node);
    }

    #[test]
    fn test_json_schema_extra_key() {
        let validator = JsonSchemaValidator::compile(dht_schema()).unwrap();
        let node = Node::mapping([
            ("platform", Node::from("dht")),
            ("pin", Node::from("D2")),
            ("model", Node::from("dht22")),
        ]);
        let err = validator.validate(&node).unwrap_err();
        assert_eq!(err.kind, ViolationKind::ExtraKey);
        assert_eq!(err.path, vec!["model"]);
    }

    #[test]
    fn test_json_schema_bad_value_path() {
        let validator = JsonSchemaValidator::compile(dht_schema()).unwrap();
        let node = Node::mapping([("platform", Node::from("dht")), ("pin", Node::from(4i64))]);
        let err = validator.validate(&node).unwrap_err();
        assert_eq!(err.kind, ViolationKind::BadValue);
        assert_eq!(err.path, vec!["pin"]);
    }

    #[test]
    fn test_load_directory() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("sensor.json"),
            json!({ "domain": "sensor", "platform_schema": true }).to_string(),
        )
        .unwrap();
        fs::write(
            dir.path().join("sensor.dht.json"),
            json!({
                "domain": "sensor",
                "platform": "dht",
                "supported_platforms": ["esp32"],
                "platform_schema": dht_schema()
            })
            .to_string(),
        )
        .unwrap();
        fs::write(dir.path().join("README.md"), "not a manifest").unwrap();

        let registry = ManifestRegistry::load(dir.path()).unwrap();
        assert_eq!(registry.len(), 2);

        let sensor = registry.lookup("sensor").unwrap();
        assert!(sensor.is_platform_component());

        let dht = registry.lookup_platform("sensor", "dht").unwrap();
        assert_eq!(dht.platforms, PlatformSupport::Only(vec![TargetPlatform::Esp32]));
        assert!(registry.source_of("sensor.dht").is_some());
    }

    #[test]
    fn test_duplicate_manifest_rejected() {
        let mut registry = ManifestRegistry::default();
        let manifest = ComponentManifest {
            domain: "wifi".into(),
            platform: None,
            dependencies: vec![],
            supported_platforms: None,
            config_schema: None,
            platform_schema: None,
        };
        registry.add(manifest.clone(), Path::new("a.json")).unwrap();
        let err = registry.add(manifest, Path::new("b.json")).unwrap_err();
        assert!(matches!(err, ManifestError::Duplicate { ref key, .. } if key == "wifi"));
    }

    #[test]
    fn test_bad_schema_rejected() {
        let mut registry = ManifestRegistry::default();
        let manifest: ComponentManifest = serde_json::from_value(json!({
            "domain": "logger",
            "config_schema": { "type": 12 }
        }))
        .unwrap();
        let err = registry.add(manifest, Path::new("logger.json")).unwrap_err();
        assert!(matches!(err, ManifestError::Schema { .. }));
    }
}

//! Firmware Configuration Checker
//!
//! Validates a device configuration (a mapping of component domains) against a
//! registry of component descriptors, then resolves the identifiers that tie
//! components together.
//!
//! ## Features
//!
//! - **Schema Validation**: every domain and platform entry is checked and normalized
//! - **Compatibility Checks**: target platform support and inter-component dependencies
//! - **Identifier Resolution**: duplicate detection, name generation, by-type binding
//! - **Accumulated Errors**: one run reports every problem, grouped by owning component
//!
//! ## Pipeline
//!
//! ```text
//! config.json ──► loader ──► Validator ──┬─► core domain (core_schema)
//!                                        ├─► component domains (registry)
//!                                        └─► resolve_identifiers ──► ValidationResult
//! ```

pub mod component;
pub mod config;
pub mod context;
pub mod core_schema;
pub mod diagnostics;
pub mod error;
pub mod identifier;
pub mod loader;
pub mod manifest;
pub mod node;
pub mod registry;
pub mod report;
pub mod resolve;
pub mod schema;
pub mod validate;

pub use component::{ComponentDescriptor, PlatformSupport, TargetPlatform};
pub use diagnostics::{ErrorCollector, ErrorKind, ErrorRecord};
pub use error::{FatalError, Result};
pub use identifier::{Identifier, Lambda};
pub use loader::{check_file, load_config};
pub use manifest::ManifestRegistry;
pub use node::{Mapping, Node, Value};
pub use registry::{ComponentRegistry, InMemoryRegistry, MemoizedRegistry};
pub use resolve::{resolve_identifiers, Symbol};
pub use schema::{ConfigSchema, FieldKind, Invalid, MapSchema};
pub use validate::{validate_config, ValidationResult, Validator};

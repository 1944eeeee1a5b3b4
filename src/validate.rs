//! Configuration validation pipeline
//!
//! ```text
//! raw tree ─▶ required domains (fatal) ─▶ core schema ─▶ per domain:
//!     lookup ─▶ platform support ─▶ dependencies ─▶ config schema
//!            ─▶ per platform entry: lookup ─▶ support ─▶ deps ─▶ schema
//! ─▶ identifier pass ─▶ ValidationResult
//! ```
//!
//! Every check except the required-domain gate records into the shared
//! [`ErrorCollector`] and moves on, so one run reports as many independent
//! problems as possible.

use std::sync::Arc;

use tracing::{debug, info};

use crate::component::ComponentDescriptor;
use crate::context::RunContext;
use crate::core_schema::{core_schema, CONF_PLATFORM, CORE_DOMAIN, REQUIRED_DOMAINS};
use crate::diagnostics::{ErrorCollector, ErrorKind, ErrorRecord};
use crate::error::{FatalError, Result};
use crate::node::{Mapping, Node, Value};
use crate::registry::ComponentRegistry;
use crate::resolve::{resolve_identifiers, Symbol};
use crate::schema::{ConfigSchema, Invalid, MapSchema, ViolationKind};

/// Outcome of a validation run
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    config: Mapping,
    errors: ErrorCollector,
    symbols: Vec<Symbol>,
    context: RunContext,
}

impl ValidationResult {
    /// Validated value of a domain, absent when it failed
    pub fn get(&self, domain: &str) -> Option<&Node> {
        self.config.get(domain)
    }

    pub fn config(&self) -> &Mapping {
        &self.config
    }

    pub fn errors(&self) -> &ErrorCollector {
        &self.errors
    }

    /// Accepted declarations with their final names
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Target platform, board and simplify flag the run was checked against
    pub fn context(&self) -> &RunContext {
        &self.context
    }
}

/// Validates configuration trees against a component registry
pub struct Validator<R> {
    registry: R,
    core_schema: MapSchema,
}

impl<R: ComponentRegistry> Validator<R> {
    pub fn new(registry: R) -> Self {
        Self {
            registry,
            core_schema: core_schema(),
        }
    }

    /// Run the full pipeline. Only a missing required domain is an `Err`.
    pub fn validate(&self, raw: &Mapping) -> Result<ValidationResult> {
        for required in REQUIRED_DOMAINS {
            if !raw.contains_key(required) {
                return Err(FatalError::MissingRequiredDomain(required.to_string()));
            }
        }

        let ctx = RunContext::from_raw(raw);
        info!(
            platform = %ctx.platform_name(),
            domains = raw.len(),
            "validating configuration"
        );

        let mut config = Mapping::with_capacity(raw.len());
        let mut errors = ErrorCollector::new();

        if let Some(core) = raw.get(CORE_DOMAIN) {
            let core = empty_if_null(core);
            match self.core_schema.validate(&core) {
                Ok(validated) => {
                    config.insert(CORE_DOMAIN.to_string(), validated);
                }
                Err(invalid) => errors.push(schema_error(&invalid, CORE_DOMAIN, &core)),
            }
        }

        for (domain, value) in raw {
            if domain == CORE_DOMAIN {
                continue;
            }
            self.validate_domain(domain, &empty_if_null(value), &ctx, &mut config, &mut errors);
        }

        let symbols = resolve_identifiers(&mut config, &mut errors);

        info!(
            domains = config.len(),
            errors = errors.len(),
            "validation finished"
        );

        Ok(ValidationResult {
            config,
            errors,
            symbols,
            context: ctx,
        })
    }

    fn validate_domain(
        &self,
        domain: &str,
        value: &Node,
        ctx: &RunContext,
        config: &mut Mapping,
        errors: &mut ErrorCollector,
    ) {
        let Some(component) = self.registry.lookup(domain) else {
            errors.general(
                ErrorKind::ComponentNotFound,
                format!("Component not found: {}", domain),
            );
            return;
        };

        if !check_component(&component, &format!("Component {}", domain), ctx, errors) {
            debug!(domain, "skipping domain");
            return;
        }

        if let Some(schema) = &component.config_schema {
            match schema.validate(value) {
                Ok(validated) => {
                    config.insert(domain.to_string(), validated);
                }
                Err(invalid) => {
                    errors.push(schema_error(&invalid, domain, value));
                    return;
                }
            }
        }

        if !component.is_platform_component() {
            return;
        }

        let entries: Vec<Node> = match &value.value {
            Value::Sequence(items) => items.clone(),
            Value::Mapping(map) if map.is_empty() => Vec::new(),
            _ => vec![value.clone()],
        };

        let platforms: Vec<Node> = entries
            .iter()
            .filter_map(|entry| self.validate_platform_entry(domain, entry, ctx, errors))
            .collect();

        debug!(domain, entries = platforms.len(), "validated platform entries");
        config.insert(domain.to_string(), value.with_value(Value::Sequence(platforms)));
    }

    /// Validate one entry of a platform-style domain. `None` drops the entry.
    fn validate_platform_entry(
        &self,
        domain: &str,
        entry: &Node,
        ctx: &RunContext,
        errors: &mut ErrorCollector,
    ) -> Option<Node> {
        let Some(map) = entry.as_mapping() else {
            errors.push(
                ErrorRecord::new(
                    ErrorKind::MalformedPlatformEntry,
                    "Platform schemas must have 'platform:' key",
                )
                .with_origin(entry),
            );
            return None;
        };

        let Some(platform) = map.get(CONF_PLATFORM).and_then(Node::scalar_text) else {
            errors.push(
                ErrorRecord::new(
                    ErrorKind::MalformedPlatformEntry,
                    format!("No platform specified for {}", domain),
                )
                .with_origin(entry),
            );
            return None;
        };

        let label = format!("{}.{}", domain, platform);
        let Some(descriptor) = self.registry.lookup_platform(domain, &platform) else {
            errors.general(
                ErrorKind::ComponentNotFound,
                format!("Platform not found: {}", label),
            );
            return None;
        };

        if !check_component(&descriptor, &format!("Platform {}", label), ctx, errors) {
            debug!(platform = %label, "skipping platform entry");
            return None;
        }

        let Some(schema) = &descriptor.platform_schema else {
            debug!(platform = %label, "platform has no schema, entry dropped");
            return None;
        };

        match schema.validate(entry) {
            Ok(validated) => Some(validated),
            Err(invalid) => {
                errors.push(schema_error(&invalid, &label, entry));
                None
            }
        }
    }
}

/// Convenience wrapper: validate `raw` against `registry` in one call
pub fn validate_config<R>(raw: &Mapping, registry: R) -> Result<ValidationResult>
where
    R: ComponentRegistry,
{
    Validator::new(registry).validate(raw)
}

/// Platform support, then dependencies. Returns false when the component must be skipped.
fn check_component(
    descriptor: &Arc<ComponentDescriptor>,
    what: &str,
    ctx: &RunContext,
    errors: &mut ErrorCollector,
) -> bool {
    if !descriptor.platforms.supports(ctx.platform.as_ref()) {
        errors.general(
            ErrorKind::UnsupportedPlatform,
            format!("{} doesn't support {}.", what, ctx.platform_name()),
        );
        return false;
    }

    let mut satisfied = true;
    for dependency in &descriptor.dependencies {
        if !ctx.has_domain(dependency) {
            errors.general(
                ErrorKind::MissingDependency,
                format!("{} requires component {}", what, dependency),
            );
            satisfied = false;
        }
    }
    satisfied
}

fn empty_if_null(node: &Node) -> Node {
    if node.is_null() {
        node.with_value(Value::Mapping(Mapping::new()))
    } else {
        node.clone()
    }
}

/// Build the schema-violation record for `label`
fn schema_error(invalid: &Invalid, label: &str, value: &Node) -> ErrorRecord {
    ErrorRecord::new(ErrorKind::SchemaViolation, format_violation(invalid, label, value))
        .in_domain(label)
        .with_origin(value)
}

/// Human-readable message for a schema violation
pub fn format_violation(invalid: &Invalid, label: &str, value: &Node) -> String {
    let mut message = format!("Invalid config for [{}]: ", label);

    if invalid.kind == ViolationKind::ExtraKey {
        let key = invalid.path.last().map(String::as_str).unwrap_or("?");
        let trail: Vec<&str> = std::iter::once(label)
            .chain(invalid.path.iter().map(String::as_str))
            .collect();
        message.push_str(&format!(
            "[{}] is an invalid option for [{}]. Check: {}.",
            key,
            label,
            trail.join("->")
        ));
    } else if invalid.path.is_empty() {
        message.push_str(&format!("{}.", invalid.message));
    } else {
        message.push_str(&format!("{} @ data{}.", invalid.message, invalid.data_path()));
    }

    if value.as_sequence().is_some() {
        return message;
    }

    let (file, line) = match &value.location {
        Some(location) => (
            location.file.clone(),
            location
                .line
                .map(|l| l.to_string())
                .unwrap_or_else(|| "?".to_string()),
        ),
        None => ("?".to_string(), "?".to_string()),
    };
    message.push_str(&format!(" (See {}, line {}).", file, line));
    message
}

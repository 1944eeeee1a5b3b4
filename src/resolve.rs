//! Identifier resolution pass
//!
//! Runs over the validated tree after every domain has its final value.
//!
//! 1. **Classify**: walk the tree depth-first (mapping keys in insertion
//!    order, sequence items by index) and file every identifier, including
//!    the implicit references of lambdas, as a declaration or a reference.
//! 2. **Declare**: accept declarations in discovery order, rejecting explicit
//!    names seen before, then generate names for the unnamed ones.
//! 3. **Resolve**: check named references against the accepted names and bind
//!    typed, unnamed references to the first declaration of their type.
//!
//! Generated and bound names are written back into the tree.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

use tracing::debug;

use crate::diagnostics::{ErrorCollector, ErrorKind, ErrorRecord};
use crate::identifier::Identifier;
use crate::node::{Mapping, Node, Value};

/// One step of a structural path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(key) => write!(f, "{}", key),
            Segment::Index(index) => write!(f, "{}", index),
        }
    }
}

/// An accepted declaration, as handed to code generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Symbol {
    pub name: String,
    pub type_tag: Option<String>,
    /// Dotted path of the declaring node
    pub path: String,
    /// Name was generated rather than written in the configuration
    pub generated: bool,
}

/// Where an identifier was found
#[derive(Debug, Clone)]
struct Site {
    path: Vec<Segment>,
    /// Index into a lambda's requires list, when the identifier came from one
    lambda_slot: Option<usize>,
    id: Identifier,
}

impl Site {
    fn label(&self) -> String {
        self.path
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Path of the container holding the identifier (or lambda). A top-level
    /// identifier is its own container.
    fn container(&self) -> &[Segment] {
        match self.path.len() {
            0 | 1 => &self.path,
            n => &self.path[..n - 1],
        }
    }
}

/// Resolve every identifier in `config`, recording problems in `errors`.
/// Returns the accepted declarations in discovery order.
pub fn resolve_identifiers(config: &mut Mapping, errors: &mut ErrorCollector) -> Vec<Symbol> {
    let sites = discover(config);
    let (declarations, references): (Vec<Site>, Vec<Site>) =
        sites.into_iter().partition(|site| site.id.is_declaration());

    // Declare
    let mut accepted: Vec<Site> = Vec::with_capacity(declarations.len());
    let mut names: HashSet<String> = HashSet::new();
    for site in declarations {
        if let Some(name) = site.id.name() {
            if names.contains(name) {
                errors.push(site_error(
                    config,
                    &site,
                    ErrorKind::DuplicateIdentifier,
                    format!("ID {} redefined!", name),
                ));
                continue;
            }
            names.insert(name.to_string());
        }
        accepted.push(site);
    }

    for site in accepted.iter_mut().filter(|site| site.id.name().is_none()) {
        let name = site.id.resolve(&names).to_string();
        names.insert(name.clone());
        if let Some(id) = identifier_at_mut(config, site) {
            id.bind(name);
        }
    }

    // Resolve
    let mut bound = 0usize;
    for site in &references {
        match (site.id.name(), site.id.type_tag()) {
            (Some(name), _) => {
                if !names.contains(name) {
                    errors.push(site_error(
                        config,
                        site,
                        ErrorKind::UnresolvedIdentifier,
                        format!("Couldn't find ID {}", name),
                    ));
                }
            }
            (None, Some(type_tag)) => {
                let target = accepted
                    .iter()
                    .find(|decl| decl.id.type_tag() == Some(type_tag))
                    .and_then(|decl| decl.id.name())
                    .map(str::to_string);
                match target {
                    Some(name) => {
                        if let Some(id) = identifier_at_mut(config, site) {
                            id.bind(name);
                            bound += 1;
                        }
                    }
                    None => errors.push(site_error(
                        config,
                        site,
                        ErrorKind::UnresolvableByType,
                        format!("Couldn't resolve ID for type {}", type_tag),
                    )),
                }
            }
            (None, None) => {}
        }
    }

    debug!(
        declarations = accepted.len(),
        references = references.len(),
        bound_by_type = bound,
        "identifier pass finished"
    );

    accepted
        .into_iter()
        .map(|site| Symbol {
            name: site.id.name().unwrap_or_default().to_string(),
            type_tag: site.id.type_tag().map(str::to_string),
            path: site.label(),
            generated: !site.id.is_manual(),
        })
        .collect()
}

/// Depth-first discovery of identifiers, in document order
fn discover(config: &Mapping) -> Vec<Site> {
    let mut sites = Vec::new();
    let mut path = Vec::new();
    for (key, node) in config {
        path.push(Segment::Key(key.clone()));
        walk(node, &mut path, &mut sites);
        path.pop();
    }
    sites
}

fn walk(node: &Node, path: &mut Vec<Segment>, sites: &mut Vec<Site>) {
    match &node.value {
        Value::Id(id) => sites.push(Site {
            path: path.clone(),
            lambda_slot: None,
            id: id.clone(),
        }),
        Value::Lambda(lambda) => {
            for (slot, id) in lambda.requires().iter().enumerate() {
                sites.push(Site {
                    path: path.clone(),
                    lambda_slot: Some(slot),
                    id: id.clone(),
                });
            }
        }
        Value::Mapping(map) => {
            for (key, child) in map {
                path.push(Segment::Key(key.clone()));
                walk(child, path, sites);
                path.pop();
            }
        }
        Value::Sequence(items) => {
            for (index, child) in items.iter().enumerate() {
                path.push(Segment::Index(index));
                walk(child, path, sites);
                path.pop();
            }
        }
        Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::String(_) => {}
    }
}

fn site_error(config: &Mapping, site: &Site, kind: ErrorKind, message: String) -> ErrorRecord {
    let record = ErrorRecord::new(kind, message).in_domain(site.label());
    match node_at(config, site.container()) {
        Some(container) => record.with_origin(container),
        None => record,
    }
}

/// Node at `path`; `None` for the empty path (the root is not a node)
pub fn node_at<'a>(config: &'a Mapping, path: &[Segment]) -> Option<&'a Node> {
    let (Segment::Key(first), rest) = path.split_first()? else {
        return None;
    };
    rest.iter().try_fold(config.get(first)?, |node, segment| match (segment, &node.value) {
        (Segment::Key(key), Value::Mapping(map)) => map.get(key),
        (Segment::Index(index), Value::Sequence(items)) => items.get(*index),
        _ => None,
    })
}

fn node_at_mut<'a>(config: &'a mut Mapping, path: &[Segment]) -> Option<&'a mut Node> {
    let (Segment::Key(first), rest) = path.split_first()? else {
        return None;
    };
    let mut node = config.get_mut(first)?;
    for segment in rest {
        node = match (segment, &mut node.value) {
            (Segment::Key(key), Value::Mapping(map)) => map.get_mut(key)?,
            (Segment::Index(index), Value::Sequence(items)) => items.get_mut(*index)?,
            _ => return None,
        };
    }
    Some(node)
}

fn identifier_at_mut<'a>(config: &'a mut Mapping, site: &Site) -> Option<&'a mut Identifier> {
    let node = node_at_mut(config, &site.path)?;
    match (&mut node.value, site.lambda_slot) {
        (Value::Id(id), None) => Some(id),
        (Value::Lambda(lambda), Some(slot)) => lambda.requires_mut().get_mut(slot),
        _ => None,
    }
}

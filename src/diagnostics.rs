//! Diagnostics
//!
//! Append-only collection of non-fatal problems found while validating.
//! Every stage pushes into the same [`ErrorCollector`]; nothing in here ever
//! aborts a run.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::node::{Location, Node};

/// Label used for records that do not belong to a domain
pub const GENERAL_LABEL: &str = "General Error";

// =============================================================================
// Error Kinds
// =============================================================================

/// Kind of accumulated error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    // === Components ===
    /// Domain or platform unknown to the registry
    ComponentNotFound,
    /// Component does not run on the active target platform
    UnsupportedPlatform,
    /// A required domain is not in the configuration
    MissingDependency,
    /// Schema rejected the value
    SchemaViolation,
    /// Platform entry is not a mapping or lacks `platform:`
    MalformedPlatformEntry,

    // === Identifiers ===
    /// Explicit id declared twice
    DuplicateIdentifier,
    /// Reference names an id nobody declared
    UnresolvedIdentifier,
    /// Reference by type found no declaration of that type
    UnresolvableByType,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ComponentNotFound => "E001",
            Self::UnsupportedPlatform => "E002",
            Self::MissingDependency => "E003",
            Self::SchemaViolation => "E004",
            Self::MalformedPlatformEntry => "E005",
            Self::DuplicateIdentifier => "E101",
            Self::UnresolvedIdentifier => "E102",
            Self::UnresolvableByType => "E103",
        }
    }

    /// Whether the error came from the identifier pass
    pub fn is_identifier_error(&self) -> bool {
        matches!(
            self,
            Self::DuplicateIdentifier | Self::UnresolvedIdentifier | Self::UnresolvableByType
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Error Record
// =============================================================================

/// A single accumulated error
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub message: String,
    /// Owning domain, or the dotted path of an identifier
    pub domain: Option<String>,
    /// Node the error is about, for location display
    pub origin: Option<Node>,
}

impl ErrorRecord {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            domain: None,
            origin: None,
        }
    }

    pub fn in_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_origin(mut self, origin: &Node) -> Self {
        self.origin = Some(origin.clone());
        self
    }

    /// Grouping label
    pub fn label(&self) -> &str {
        self.domain.as_deref().unwrap_or(GENERAL_LABEL)
    }

    pub fn location(&self) -> Option<&Location> {
        self.origin.as_ref().and_then(|n| n.location.as_ref())
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.label(), self.message)?;
        if let Some(location) = self.location() {
            write!(f, " [source {}]", location)?;
        }
        Ok(())
    }
}

// =============================================================================
// Collector
// =============================================================================

/// Records sharing a label, in first-seen order
#[derive(Debug)]
pub struct ErrorGroup<'a> {
    pub label: &'a str,
    pub records: Vec<&'a ErrorRecord>,
}

/// Append-only error sequence shared by all stages of a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorCollector {
    records: Vec<ErrorRecord>,
}

impl ErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: ErrorRecord) {
        self.records.push(record);
    }

    /// Add an error without an owning domain
    pub fn general(&mut self, kind: ErrorKind, message: impl Into<String>) {
        self.push(ErrorRecord::new(kind, message));
    }

    /// Add an error owned by `domain`
    pub fn in_domain(
        &mut self,
        kind: ErrorKind,
        message: impl Into<String>,
        domain: impl Into<String>,
        origin: Option<&Node>,
    ) {
        let mut record = ErrorRecord::new(kind, message).in_domain(domain);
        if let Some(node) = origin {
            record = record.with_origin(node);
        }
        self.push(record);
    }

    pub fn records(&self) -> &[ErrorRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ErrorRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Count records of one kind
    pub fn count(&self, kind: ErrorKind) -> usize {
        self.records.iter().filter(|r| r.kind == kind).count()
    }

    /// Group records by label, keeping first-seen order of labels and records
    pub fn grouped(&self) -> Vec<ErrorGroup<'_>> {
        let mut groups: IndexMap<&str, Vec<&ErrorRecord>> = IndexMap::new();
        for record in &self.records {
            groups.entry(record.label()).or_default().push(record);
        }
        groups
            .into_iter()
            .map(|(label, records)| ErrorGroup { label, records })
            .collect()
    }
}

impl fmt::Display for ErrorCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for record in &self.records {
            writeln!(f, "{}", record)?;
        }
        Ok(())
    }
}

impl IntoIterator for ErrorCollector {
    type Item = ErrorRecord;
    type IntoIter = std::vec::IntoIter<ErrorRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a ErrorCollector {
    type Item = &'a ErrorRecord;
    type IntoIter = std::slice::Iter<'a, ErrorRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grouping_preserves_first_seen_order() {
        let mut errors = ErrorCollector::new();
        errors.in_domain(ErrorKind::SchemaViolation, "bad pin", "sensor", None);
        errors.general(ErrorKind::ComponentNotFound, "Component not found: foo");
        errors.in_domain(ErrorKind::SchemaViolation, "bad name", "esphomeyaml", None);
        errors.in_domain(ErrorKind::SchemaViolation, "bad unit", "sensor", None);

        let groups = errors.grouped();
        let labels: Vec<_> = groups.iter().map(|g| g.label).collect();
        assert_eq!(labels, vec!["sensor", GENERAL_LABEL, "esphomeyaml"]);

        let sensor: Vec<_> = groups[0].records.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(sensor, vec!["bad pin", "bad unit"]);
    }

    #[test]
    fn test_record_location_comes_from_origin() {
        let node = Node::from("D2").at("device.yaml", Some(14));
        let record = ErrorRecord::new(ErrorKind::SchemaViolation, "oops")
            .in_domain("sensor")
            .with_origin(&node);
        assert_eq!(record.location().map(|l| l.to_string()), Some("device.yaml:14".into()));
        assert_eq!(record.to_string(), "[E004] sensor: oops [source device.yaml:14]");
    }

    #[test]
    fn test_count_by_kind() {
        let mut errors = ErrorCollector::new();
        errors.general(ErrorKind::MissingDependency, "a");
        errors.general(ErrorKind::MissingDependency, "b");
        errors.general(ErrorKind::ComponentNotFound, "c");
        assert_eq!(errors.count(ErrorKind::MissingDependency), 2);
        assert!(ErrorKind::DuplicateIdentifier.is_identifier_error());
    }
}

//! Identifiers and lambdas
//!
//! An [`Identifier`] is either a declaration (a component instance that code
//! generation will materialize as a variable) or a reference to one. Both carry
//! an optional explicit name and an optional type tag such as
//! `esphomelib::StartupTrigger`.

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Names generated code may never use for a variable
pub const RESERVED_NAMES: &[&str] = &[
    "alignas", "alignof", "and", "asm", "auto", "bool", "break", "case", "catch", "char", "class",
    "const", "constexpr", "continue", "default", "delete", "do", "double", "else", "enum",
    "explicit", "extern", "false", "float", "for", "friend", "goto", "if", "inline", "int", "long",
    "namespace", "new", "not", "nullptr", "operator", "or", "private", "protected", "public",
    "return", "short", "signed", "sizeof", "static", "struct", "switch", "template", "this",
    "throw", "true", "try", "typedef", "union", "unsigned", "using", "virtual", "void", "volatile",
    "while", "xor", "App", "pinMode", "delay", "delayMicroseconds", "digitalRead",
    "digitalWrite", "millis", "micros",
];

/// A symbolic name in the configuration tree
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    name: Option<String>,
    type_tag: Option<String>,
    is_declaration: bool,
    is_manual: bool,
}

impl Identifier {
    /// A declaration of `type_tag`, optionally with a user-chosen name
    pub fn declaration(name: Option<&str>, type_tag: &str) -> Self {
        Self {
            name: name.map(str::to_string),
            type_tag: Some(type_tag.to_string()),
            is_declaration: true,
            is_manual: name.is_some(),
        }
    }

    /// A reference by explicit name, by type, or both
    pub fn reference(name: Option<&str>, type_tag: Option<&str>) -> Self {
        Self {
            name: name.map(str::to_string),
            type_tag: type_tag.map(str::to_string),
            is_declaration: false,
            is_manual: name.is_some(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn type_tag(&self) -> Option<&str> {
        self.type_tag.as_deref()
    }

    pub fn is_declaration(&self) -> bool {
        self.is_declaration
    }

    /// Whether the name was written by the user rather than generated or bound
    pub fn is_manual(&self) -> bool {
        self.is_manual
    }

    /// Bind a reference (or name a declaration) after resolution
    pub fn bind(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    /// Ensure this identifier has a name, generating one that avoids `taken`
    /// and every reserved word. Returns the final name.
    pub fn resolve(&mut self, taken: &HashSet<String>) -> &str {
        if self.name.is_none() {
            let base = self.generated_base();
            self.name = Some(unique_name(&base, taken));
        }
        self.name.as_deref().unwrap_or_default()
    }

    fn generated_base(&self) -> String {
        let Some(tag) = &self.type_tag else {
            return "id".to_string();
        };
        let base: String = tag
            .replace("::", "_")
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect();
        if base.is_empty() {
            "id".to_string()
        } else {
            base
        }
    }
}

fn unique_name(base: &str, taken: &HashSet<String>) -> String {
    let free = |candidate: &str| !taken.contains(candidate) && !RESERVED_NAMES.contains(&candidate);
    if free(base) {
        return base.to_string();
    }
    (2..)
        .map(|i| format!("{}_{}", base, i))
        .find(|candidate| free(candidate))
        .unwrap_or_else(|| base.to_string())
}

fn id_call_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"id\(\s*([a-zA-Z_][a-zA-Z0-9_]*)\s*\)").expect("id() pattern is valid")
    })
}

/// An inline code fragment. Every `id(name)` it mentions is an implicit reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Lambda {
    source: String,
    requires: Vec<Identifier>,
}

impl Lambda {
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let requires = id_call_pattern()
            .captures_iter(&source)
            .filter_map(|caps| caps.get(1))
            .map(|m| Identifier::reference(Some(m.as_str()), None))
            .collect();
        Self { source, requires }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn requires(&self) -> &[Identifier] {
        &self.requires
    }

    pub fn requires_mut(&mut self) -> &mut [Identifier] {
        &mut self.requires
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_name_from_type() {
        let mut id = Identifier::declaration(None, "esphomelib::StartupTrigger");
        assert_eq!(id.resolve(&HashSet::new()), "esphomelib_startuptrigger");
        assert!(!id.is_manual());
    }

    #[test]
    fn test_generated_name_avoids_taken() {
        let taken: HashSet<String> = ["sensor_dht".to_string(), "sensor_dht_2".to_string()]
            .into_iter()
            .collect();
        let mut id = Identifier::declaration(None, "sensor::DHT");
        assert_eq!(id.resolve(&taken), "sensor_dht_3");
    }

    #[test]
    fn test_generated_name_avoids_reserved() {
        let mut id = Identifier::declaration(None, "switch");
        assert_eq!(id.resolve(&HashSet::new()), "switch_2");
    }

    #[test]
    fn test_resolve_keeps_manual_name() {
        let mut id = Identifier::declaration(Some("relay"), "Switch");
        let taken: HashSet<String> = ["relay".to_string()].into_iter().collect();
        assert_eq!(id.resolve(&taken), "relay");
    }

    #[test]
    fn test_lambda_requires() {
        let lambda = Lambda::new("return id(temp).value + id( hum ).value;");
        let names: Vec<_> = lambda.requires().iter().filter_map(|r| r.name()).collect();
        assert_eq!(names, vec!["temp", "hum"]);
        assert!(lambda.requires().iter().all(|r| !r.is_declaration() && r.type_tag().is_none()));
    }
}

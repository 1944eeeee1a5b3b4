//! Run-scoped facts
//!
//! Fixed once from the raw configuration before any domain is validated and
//! shared read-only by every later check.

use std::collections::HashSet;

use crate::component::TargetPlatform;
use crate::core_schema::{CONF_BOARD, CONF_PLATFORM, CONF_SIMPLIFY, CORE_DOMAIN};
use crate::node::{Mapping, Node, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    /// Active target platform; `None` when the core domain does not name one
    pub platform: Option<TargetPlatform>,
    pub board: Option<String>,
    pub simplify: bool,
    domains: HashSet<String>,
}

impl RunContext {
    /// Derive the context from the raw (unvalidated) top-level mapping
    pub fn from_raw(raw: &Mapping) -> Self {
        let core = raw.get(CORE_DOMAIN);
        let field = |key: &str| core.and_then(|c| c.get(key));

        let platform = field(CONF_PLATFORM)
            .and_then(Node::scalar_text)
            .map(|p| TargetPlatform::normalize(&p));
        let board = field(CONF_BOARD).and_then(Node::scalar_text);
        let simplify = match field(CONF_SIMPLIFY).map(|n| &n.value) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => !matches!(s.to_lowercase().as_str(), "false" | "no" | "off"),
            _ => true,
        };

        Self {
            platform,
            board,
            simplify,
            domains: raw.keys().cloned().collect(),
        }
    }

    /// Whether `domain` is a top-level key of the raw configuration
    pub fn has_domain(&self, domain: &str) -> bool {
        self.domains.contains(domain)
    }

    /// Platform name for messages
    pub fn platform_name(&self) -> String {
        self.platform
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "an unknown platform".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_from_raw() {
        let raw = Node::mapping([
            (
                CORE_DOMAIN,
                Node::mapping([
                    ("name", Node::from("d1")),
                    ("platform", Node::from("esp8266")),
                    ("board", Node::from("nodemcuv2")),
                    ("simplify", Node::from(false)),
                ]),
            ),
            ("wifi", Node::null()),
        ]);
        let ctx = RunContext::from_raw(raw.as_mapping().unwrap());
        assert_eq!(ctx.platform, Some(TargetPlatform::Esp8266));
        assert_eq!(ctx.board.as_deref(), Some("nodemcuv2"));
        assert!(!ctx.simplify);
        assert!(ctx.has_domain("wifi"));
        assert!(!ctx.has_domain("sensor"));
    }

    #[test]
    fn test_context_without_platform() {
        let raw = Node::mapping([(CORE_DOMAIN, Node::null())]);
        let ctx = RunContext::from_raw(raw.as_mapping().unwrap());
        assert_eq!(ctx.platform, None);
        assert_eq!(ctx.platform_name(), "an unknown platform");
        assert!(ctx.simplify);
    }
}

//! Component descriptors
//!
//! What the registry knows about a domain (`sensor`) or a platform within a
//! domain (`sensor.dht`): which schemas apply, which other domains it needs,
//! and which target chips it runs on.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::schema::{ConfigSchema, SchemaRef};

/// Target chip family a firmware is built for
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetPlatform {
    Esp8266,
    Esp32,
    /// Anything that does not normalize to a known family, upper-cased
    Other(String),
}

impl TargetPlatform {
    /// Normalize a user-supplied platform string (`esp32`, `ESP8266`, `esp32dev`, ...)
    pub fn normalize(raw: &str) -> Self {
        let upper = raw.trim().to_uppercase();
        if upper.contains("32") {
            Self::Esp32
        } else if upper.contains("8266") {
            Self::Esp8266
        } else {
            Self::Other(upper)
        }
    }
}

impl fmt::Display for TargetPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Esp8266 => write!(f, "ESP8266"),
            Self::Esp32 => write!(f, "ESP32"),
            Self::Other(name) => write!(f, "{}", name),
        }
    }
}

/// Which target platforms a component supports
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PlatformSupport {
    #[default]
    All,
    Only(Vec<TargetPlatform>),
}

impl PlatformSupport {
    /// Whether the active platform is acceptable. An unknown platform only
    /// passes components that support everything.
    pub fn supports(&self, platform: Option<&TargetPlatform>) -> bool {
        match (self, platform) {
            (Self::All, _) => true,
            (Self::Only(list), Some(p)) => list.contains(p),
            (Self::Only(_), None) => false,
        }
    }
}

/// Registry entry for a component or platform
#[derive(Debug, Clone, Default)]
pub struct ComponentDescriptor {
    /// Validates the whole domain value
    pub config_schema: Option<SchemaRef>,
    /// For a domain: marks it platform-style. For a platform: validates each entry.
    pub platform_schema: Option<SchemaRef>,
    /// Top-level domains that must be present in the same configuration
    pub dependencies: Vec<String>,
    pub platforms: PlatformSupport,
}

impl ComponentDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config_schema<S>(mut self, schema: S) -> Self
    where
        S: ConfigSchema + Send + Sync + 'static,
    {
        self.config_schema = Some(Arc::new(schema));
        self
    }

    pub fn with_platform_schema<S>(mut self, schema: S) -> Self
    where
        S: ConfigSchema + Send + Sync + 'static,
    {
        self.platform_schema = Some(Arc::new(schema));
        self
    }

    pub fn depends_on(mut self, domain: impl Into<String>) -> Self {
        self.dependencies.push(domain.into());
        self
    }

    pub fn only_on<I>(mut self, platforms: I) -> Self
    where
        I: IntoIterator<Item = TargetPlatform>,
    {
        self.platforms = PlatformSupport::Only(platforms.into_iter().collect());
        self
    }

    /// Domain whose value is a list of platform entries
    pub fn is_platform_component(&self) -> bool {
        self.platform_schema.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::MapSchema;

    #[test]
    fn test_platform_normalization() {
        assert_eq!(TargetPlatform::normalize("esp32"), TargetPlatform::Esp32);
        assert_eq!(TargetPlatform::normalize("ESP32DEV"), TargetPlatform::Esp32);
        assert_eq!(TargetPlatform::normalize("esp8266"), TargetPlatform::Esp8266);
        assert_eq!(
            TargetPlatform::normalize("rp2040"),
            TargetPlatform::Other("RP2040".to_string())
        );
    }

    #[test]
    fn test_platform_support() {
        let only = PlatformSupport::Only(vec![TargetPlatform::Esp32]);
        assert!(only.supports(Some(&TargetPlatform::Esp32)));
        assert!(!only.supports(Some(&TargetPlatform::Esp8266)));
        assert!(!only.supports(None));
        assert!(PlatformSupport::All.supports(None));
    }

    #[test]
    fn test_platform_style_flag() {
        let plain = ComponentDescriptor::new().with_config_schema(MapSchema::new());
        let platformed = ComponentDescriptor::new().with_platform_schema(MapSchema::platform());
        assert!(!plain.is_platform_component());
        assert!(platformed.is_platform_component());
    }
}

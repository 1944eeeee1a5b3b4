//! Settings for the checker
//!
//! Supports loading settings from:
//! - Default values
//! - Settings file (fwconf.toml)
//! - Environment variables (FWCONF__*)
//!
//! ## Example settings file (fwconf.toml):
//! ```toml
//! [registry]
//! path = "./components"
//! memoize = true
//!
//! [output]
//! format = "text"
//! show_config = false
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Checker settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckConfig {
    #[serde(default)]
    pub registry: RegistrySettings,

    #[serde(default)]
    pub output: OutputSettings,
}

/// Where component manifests come from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySettings {
    /// Directory of component manifests
    #[serde(default = "default_registry_path")]
    pub path: PathBuf,

    /// Cache descriptor lookups for the duration of a run
    #[serde(default = "default_true")]
    pub memoize: bool,
}

/// How results are reported
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutputSettings {
    #[serde(default)]
    pub format: ReportFormat,

    /// Print the validated configuration after a clean run
    #[serde(default)]
    pub show_config: bool,
}

/// Report format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

fn default_registry_path() -> PathBuf {
    PathBuf::from("components")
}

fn default_true() -> bool {
    true
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            path: default_registry_path(),
            memoize: true,
        }
    }
}

impl CheckConfig {
    /// Load settings, layering an explicit file over the default locations
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        for location in ["fwconf.toml", ".fwconf.toml", "config/fwconf.toml"] {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(dirs) = directories::ProjectDirs::from("dev", "fwconf", "fwconf") {
            let xdg_config = dirs.config_dir().join("fwconf.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("FWCONF")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Save settings to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Manifest directory, resolved against the working directory
    pub fn registry_path(&self) -> PathBuf {
        if self.registry.path.is_absolute() {
            self.registry.path.clone()
        } else {
            std::env::current_dir()
                .unwrap_or_default()
                .join(&self.registry.path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = CheckConfig::default();
        assert!(config.registry.memoize);
        assert_eq!(config.output.format, ReportFormat::Text);
        assert!(!config.output.show_config);
    }

    #[test]
    fn test_serialize_config() {
        let config = CheckConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[registry]"));
        assert!(toml_str.contains("[output]"));
        assert!(toml_str.contains("format = \"text\""));
    }

    #[test]
    fn test_save_and_load_explicit_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        let path_str = path.to_str().unwrap();

        let mut config = CheckConfig::default();
        config.registry.path = PathBuf::from("/opt/components");
        config.output.format = ReportFormat::Json;
        config.save(path_str).unwrap();

        let loaded = CheckConfig::load_from(Some(path_str)).unwrap();
        assert_eq!(loaded.registry.path, PathBuf::from("/opt/components"));
        assert_eq!(loaded.output.format, ReportFormat::Json);
        assert_eq!(loaded.registry_path(), PathBuf::from("/opt/components"));
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        assert!(CheckConfig::load_from(Some("/no/such/settings.toml")).is_err());
    }
}

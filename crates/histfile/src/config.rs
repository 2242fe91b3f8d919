//! Configuration for versioned access.
//!
//! Loaded from `$XDG_CONFIG_HOME/histfile/config.toml`:
//!
//! ```toml
//! [access]
//! tag = "2012.11.02"
//! layout = "nested"
//! fallback_glob = "[0-9][0-9][0-9][0-9].[0-9][0-9].[0-9][0-9]/"
//!
//! [selector]
//! layout = "flat"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::Deserialize;

use crate::rewrite::LayoutMode;

/// Top-level config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HistfileConfig {
    /// Settings for a fixed-tag `VersionedFileAccess`.
    pub access: AccessConfig,
    /// Settings for date-keyed `VersionSelector`s.
    pub selector: SelectorConfig,
}

/// Parameters of one `VersionedFileAccess`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AccessConfig {
    /// Version tag. Left unset here, it must be supplied before building.
    pub tag: Option<String>,
    pub layout: LayoutMode,
    /// Fallback pattern; unset disables fallback.
    pub fallback_glob: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SelectorConfig {
    pub layout: LayoutMode,
}

impl HistfileConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse histfile config")
    }

    /// Load configuration from a specific path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, returns default configuration.
    pub fn load_default() -> Result<Self> {
        let path = Self::default_path()?;

        if !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        Self::load(&path)
    }

    /// `$XDG_CONFIG_HOME/histfile/config.toml`.
    pub fn default_path() -> Result<PathBuf> {
        let dirs = BaseDirs::new().context("Could not determine config directory")?;
        Ok(dirs.config_dir().join("histfile").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_is_default() {
        let config = HistfileConfig::from_toml_str("").unwrap();
        assert_eq!(config, HistfileConfig::default());
        assert_eq!(config.access.layout, LayoutMode::Flat);
        assert!(config.access.tag.is_none());
        assert!(config.access.fallback_glob.is_none());
    }

    #[test]
    fn parses_full_config() {
        let config = HistfileConfig::from_toml_str(
            r#"
[access]
tag = "2012.11.02"
layout = "subdir"
fallback_glob = "[0-9]*/"

[selector]
layout = "nested"
"#,
        )
        .unwrap();

        assert_eq!(config.access.tag.as_deref(), Some("2012.11.02"));
        assert_eq!(config.access.layout, LayoutMode::Nested);
        assert_eq!(config.access.fallback_glob.as_deref(), Some("[0-9]*/"));
        assert_eq!(config.selector.layout, LayoutMode::Nested);
    }

    #[test]
    fn bad_layout_names_the_value() {
        let err = HistfileConfig::from_toml_str("[access]\nlayout = \"sideways\"\n").unwrap_err();
        assert!(format!("{err:#}").contains("sideways"), "{err:#}");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(HistfileConfig::from_toml_str("[access]\ntga = \"x\"\n").is_err());
    }

    #[test]
    fn load_reads_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[selector]\nlayout = \"nested\"\n").unwrap();

        let config = HistfileConfig::load(&path).unwrap();
        assert_eq!(config.selector.layout, LayoutMode::Nested);

        let err = HistfileConfig::load(&dir.path().join("missing.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config"));
    }

    #[test]
    fn default_path_is_under_histfile() {
        if let Ok(path) = HistfileConfig::default_path() {
            assert!(path.ends_with("histfile/config.toml"));
        }
    }
}

//! Application configuration
//! Optional JSON file naming the input files, the alias table and view
//! tunables. Every field has a default; relative paths are resolved against
//! the directory of the config file.

use crate::data::{AliasMap, Dimension, ViewSettings, DEFAULT_TOP_N};
use crate::stats::DEFAULT_LOESS_BANDWIDTH;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub records_path: Option<PathBuf>,
    pub coordinates_path: Option<PathBuf>,
    /// JSON object mapping record-table country names to coordinate-table
    /// names. The built-in table is used when absent.
    pub aliases_path: Option<PathBuf>,
    pub top_n: usize,
    pub default_country: Option<String>,
    pub default_dimension: Dimension,
    pub loess_bandwidth: f64,
    pub export_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            records_path: None,
            coordinates_path: None,
            aliases_path: None,
            top_n: DEFAULT_TOP_N,
            default_country: None,
            default_dimension: Dimension::default(),
            loess_bandwidth: DEFAULT_LOESS_BANDWIDTH,
            export_dir: None,
        }
    }
}

impl AppConfig {
    /// Read a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = read(path)?;
        let mut config: AppConfig = serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;

        if let Some(base) = path.parent() {
            config.resolve_relative(base);
        }
        info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    fn resolve_relative(&mut self, base: &Path) {
        for slot in [
            &mut self.records_path,
            &mut self.coordinates_path,
            &mut self.aliases_path,
            &mut self.export_dir,
        ] {
            if let Some(p) = slot.as_mut() {
                if p.is_relative() {
                    *p = base.join(&*p);
                }
            }
        }
    }

    pub fn view_settings(&self) -> ViewSettings {
        ViewSettings {
            top_n: self.top_n,
            loess_bandwidth: self.loess_bandwidth,
        }
    }

    /// The alias table named by `aliases_path`, or the built-in one.
    pub fn aliases(&self) -> Result<AliasMap, ConfigError> {
        let Some(path) = &self.aliases_path else {
            return Ok(AliasMap::default());
        };
        let text = read(path)?;
        let aliases: AliasMap = serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), entries = aliases.len(), "loaded country aliases");
        Ok(aliases)
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("data")
            .join(name)
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: AppConfig = serde_json::from_str(r#"{"top_n": 5}"#).unwrap();
        assert_eq!(config.top_n, 5);
        assert_eq!(config.loess_bandwidth, DEFAULT_LOESS_BANDWIDTH);
        assert_eq!(config.default_dimension, Dimension::Sex);
        assert!(config.records_path.is_none());
    }

    #[test]
    fn test_load_resolves_relative_paths() {
        let config = AppConfig::load(&fixture("dashboard.json")).unwrap();
        assert_eq!(config.records_path, Some(fixture("records_sample.csv")));
        assert_eq!(config.coordinates_path, Some(fixture("coordinates_sample.csv")));
        assert_eq!(config.default_dimension, Dimension::AgeBracket);
        assert_eq!(config.default_country.as_deref(), Some("Russian Federation"));
        assert_eq!(config.view_settings().top_n, 15);
    }

    #[test]
    fn test_aliases_from_file() {
        let config = AppConfig::load(&fixture("dashboard.json")).unwrap();
        let aliases = config.aliases().unwrap();
        assert_eq!(aliases.resolve("Russian Federation"), "Russia");
        assert_eq!(aliases.resolve("Czech Republic"), "Czechia");

        assert_eq!(AppConfig::default().aliases().unwrap(), AliasMap::default());
    }

    #[test]
    fn test_missing_config_file() {
        let err = AppConfig::load(&fixture("no_such_config.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}

use super::NetworkMetricsConfig;
use crate::error::{MetricsError, Result};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
    Json,
}

impl ConfigFormat {
    /// Detect the format from a file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("toml") => Ok(Self::Toml),
            Some("yaml") | Some("yml") => Ok(Self::Yaml),
            Some("json") => Ok(Self::Json),
            _ => Err(MetricsError::config(format!(
                "unsupported config file extension: {}",
                path.display()
            ))),
        }
    }
}

impl NetworkMetricsConfig {
    /// Parse configuration text in the given format
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self> {
        let config = match format {
            ConfigFormat::Toml => toml::from_str(content)?,
            ConfigFormat::Yaml => serde_yaml::from_str(content)?,
            ConfigFormat::Json => serde_json::from_str(content)?,
        };
        Ok(config)
    }

    /// Read and parse a configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let format = ConfigFormat::from_path(path)?;
        let content = fs::read_to_string(path)?;
        let config = Self::parse(&content, format)?;
        debug!("Loaded {:?} config from {}", format, path.display());
        Ok(config)
    }
}

/// Load configuration from an optional file, apply environment overrides and validate
pub fn load_config(path: Option<&Path>) -> Result<NetworkMetricsConfig> {
    let mut config = match path {
        Some(path) => NetworkMetricsConfig::from_file(path)?,
        None => NetworkMetricsConfig::default(),
    };
    config.merge_env_vars()?;
    config.validate()?;
    Ok(config)
}

//! Vertical cache configuration
//!
//! Read from TOML. [`VerticalCacheConfig::load`] looks in order at:
//! 1. the file named by the `VCACHE_CONFIG` environment variable
//! 2. `./vcache.toml`
//! 3. built-in defaults

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{Error, Result};

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "VCACHE_CONFIG";

/// Configuration file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "vcache.toml";

/// Configuration for the vertical cache and its flusher
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VerticalCacheConfig {
    /// Segments flushed concurrently before waiting for the wave to finish
    #[serde(default = "default_max_concurrent_flushes")]
    pub max_concurrent_flushes: usize,

    /// Seconds between periodic flushes
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
}

fn default_max_concurrent_flushes() -> usize {
    64
}

fn default_flush_interval_secs() -> u64 {
    30
}

impl Default for VerticalCacheConfig {
    fn default() -> Self {
        Self {
            max_concurrent_flushes: default_max_concurrent_flushes(),
            flush_interval_secs: default_flush_interval_secs(),
        }
    }
}

impl VerticalCacheConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| Error::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Reject values the flusher cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_flushes == 0 {
            return Err(Error::Configuration(
                "max_concurrent_flushes must be at least 1".to_string(),
            ));
        }
        if self.flush_interval_secs == 0 {
            return Err(Error::Configuration(
                "flush_interval_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Load from the environment, the working directory or defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            match Self::from_file(&path) {
                Ok(config) => {
                    info!(path = %path, "Loaded configuration from file");
                    return config;
                }
                Err(e) => {
                    warn!(path = %path, error = %e, "Failed to load configuration, trying defaults");
                }
            }
        }

        if Path::new(DEFAULT_CONFIG_FILE).exists() {
            match Self::from_file(DEFAULT_CONFIG_FILE) {
                Ok(config) => {
                    info!("Loaded configuration from {}", DEFAULT_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Ignoring invalid {}", DEFAULT_CONFIG_FILE);
                }
            }
        }

        info!("Using default configuration");
        Self::default()
    }

    /// Interval between periodic flushes
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = VerticalCacheConfig::default();
        assert_eq!(config.max_concurrent_flushes, 64);
        assert_eq!(config.flush_interval(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = VerticalCacheConfig::from_toml_str("max_concurrent_flushes = 8").unwrap();
        assert_eq!(config.max_concurrent_flushes, 8);
        assert_eq!(config.flush_interval_secs, 30);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let err = VerticalCacheConfig::from_toml_str("max_concurrent_flushes = 0").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_malformed_toml_rejected() {
        let err = VerticalCacheConfig::from_toml_str("max_concurrent_flushes = \"many\"").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("vcache.toml");
        std::fs::write(&path, "max_concurrent_flushes = 4\nflush_interval_secs = 5\n").unwrap();

        let config = VerticalCacheConfig::from_file(&path).unwrap();
        assert_eq!(config.max_concurrent_flushes, 4);
        assert_eq!(config.flush_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = VerticalCacheConfig::from_file(temp_dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}

//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.trendscope.toml` files.

use crate::client::HttpTransportConfig;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".trendscope.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Provider connection settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Periodic refresh settings.
    #[serde(default)]
    pub refresh: RefreshConfig,

    /// Ranking and default query settings.
    #[serde(default)]
    pub display: DisplayConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

/// Trends provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL every endpoint path is appended to.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// User agent sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_base_url() -> String {
    "https://pytrends-app.onrender.com/api".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("trendscope/{}", env!("CARGO_PKG_VERSION"))
}

/// Periodic refresh settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Seconds between automatic refreshes in watch mode.
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval(),
        }
    }
}

fn default_interval() -> u64 {
    300
}

/// Ranking and default query settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Regions shown in a keyword's full ranking.
    #[serde(default = "default_region_limit")]
    pub region_limit: usize,

    /// Regions shown per keyword in the comparison summary.
    #[serde(default = "default_top_regions")]
    pub top_regions_per_keyword: usize,

    /// Timeframe used when none is given.
    #[serde(default = "default_timeframe")]
    pub timeframe: String,

    /// Region name used for trending searches when none is given.
    #[serde(default = "default_trending_geo")]
    pub trending_geo: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            region_limit: default_region_limit(),
            top_regions_per_keyword: default_top_regions(),
            timeframe: default_timeframe(),
            trending_geo: default_trending_geo(),
        }
    }
}

fn default_region_limit() -> usize {
    20
}

fn default_top_regions() -> usize {
    5
}

fn default_timeframe() -> String {
    "today 12-m".to_string()
}

fn default_trending_geo() -> String {
    "united_states".to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.trendscope.toml` from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Reject values the rest of the program cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://") {
            bail!("api.base_url must start with 'http://' or 'https://'");
        }
        if self.api.timeout_seconds == 0 {
            bail!("api.timeout_seconds must be at least 1");
        }
        if self.refresh.interval_seconds == 0 {
            bail!("refresh.interval_seconds must be at least 1");
        }
        if self.display.region_limit == 0 {
            bail!("display.region_limit must be at least 1");
        }
        Ok(())
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref base_url) = args.base_url {
            self.api.base_url = base_url.clone();
        }
        if let Some(timeout) = args.timeout {
            self.api.timeout_seconds = timeout;
        }
        if let Some(interval) = args.refresh_interval {
            self.refresh.interval_seconds = interval;
        }
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Transport settings derived from the `[api]` section.
    pub fn transport_config(&self) -> HttpTransportConfig {
        HttpTransportConfig::from(&self.api)
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api.base_url, "https://pytrends-app.onrender.com/api");
        assert_eq!(config.refresh.interval_seconds, 300);
        assert_eq!(config.display.region_limit, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
verbose = true

[api]
base_url = "http://localhost:5000/api"
timeout_seconds = 10

[display]
region_limit = 10
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert!(config.general.verbose);
        assert_eq!(config.api.base_url, "http://localhost:5000/api");
        assert_eq!(config.api.timeout_seconds, 10);
        assert_eq!(config.display.region_limit, 10);
        assert_eq!(config.display.top_regions_per_keyword, 5);
        assert_eq!(config.refresh.interval_seconds, 300);
    }

    #[test]
    fn test_load_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load_from_dir(dir.path()).unwrap().is_none());

        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[refresh]\ninterval_seconds = 60\n",
        )
        .unwrap();
        let config = Config::load_from_dir(dir.path()).unwrap().unwrap();
        assert_eq!(config.refresh.interval_seconds, 60);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[api]\nbase_url = \"ftp://example.com\"\n").unwrap();
        assert!(Config::load(&path).is_err());

        std::fs::write(&path, "[refresh]\ninterval_seconds = 0\n").unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[api]"));
        assert!(toml_str.contains("[refresh]"));
        assert!(toml_str.contains("[display]"));

        let reparsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(reparsed.api.timeout_seconds, 30);
    }
}

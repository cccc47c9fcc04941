use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub governor: GovernorConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub web: WebConfig,
}

/// External market-data API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    pub base_url: String,
    /// Demo-tier API key, sent as the x-cg-demo-api-key header when set
    #[serde(default)]
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
    /// Number of tokens fetched per market sweep
    pub market_page_size: u32,
}

/// Upstream call pacing. These are policy defaults observed against the free
/// CoinGecko tier; adjust them to the published limits of the plan in use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernorConfig {
    /// Minimum spacing between any two upstream calls
    pub min_spacing_seconds: u64,
    /// Extended backoff entered after an HTTP 429
    pub backoff_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum age of a cached record before a refresh is attempted
    pub staleness_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub enabled: bool,
    /// Cadence of the background market sweep
    pub interval_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    pub enabled: bool,
    pub bind_address: String,
    pub port: u16,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.coingecko.com/api/v3".to_string(),
            api_key: None,
            timeout_seconds: 15,
            market_page_size: 100,
        }
    }
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            min_spacing_seconds: 2,
            backoff_seconds: 60,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            staleness_seconds: 60,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: 60,
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            upstream: UpstreamConfig::default(),
            governor: GovernorConfig::default(),
            cache: CacheConfig::default(),
            monitor: MonitorConfig::default(),
            web: WebConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, writing the defaults on first run
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Config::default();
            config.save(path)?;
            return Ok(config);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Write the configuration back to disk
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_policy() {
        let config = Config::default();
        assert_eq!(config.governor.min_spacing_seconds, 2);
        assert_eq!(config.governor.backoff_seconds, 60);
        assert_eq!(config.cache.staleness_seconds, 60);
        assert_eq!(config.monitor.interval_seconds, 60);
        assert_eq!(config.upstream.market_page_size, 100);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            [governor]
            min_spacing_seconds = 5
            backoff_seconds = 120
            "#,
        )
        .expect("partial config should parse");

        assert_eq!(parsed.governor.min_spacing_seconds, 5);
        assert_eq!(parsed.governor.backoff_seconds, 120);
        assert_eq!(parsed.cache.staleness_seconds, 60);
        assert_eq!(parsed.upstream.timeout_seconds, 15);
    }

    #[test]
    fn load_writes_defaults_on_first_run() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");

        let config = Config::load(&path).expect("first load");
        assert!(path.exists());
        assert_eq!(config.upstream.market_page_size, 100);

        let reloaded = Config::load(&path).expect("second load");
        assert_eq!(
            reloaded.governor.min_spacing_seconds,
            config.governor.min_spacing_seconds
        );
    }
}

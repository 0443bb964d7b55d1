use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::clients::anilist::ANILIST_API;
use crate::clients::jikan::JIKAN_API;
use crate::clients::kitsu::KITSU_API;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub providers: ProvidersConfig,

    pub cache: CacheConfig,

    pub server: ServerConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_level: String,

    pub suppress_connection_errors: bool,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            suppress_connection_errors: false,
            worker_threads: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Per-request timeout applied to every upstream call (default: 15)
    pub request_timeout_seconds: u64,

    pub user_agent: String,

    /// Page requests in flight per provider fetch stage (default: 4)
    pub max_concurrent_requests: usize,

    /// Jikan allows about 60 requests per minute, so it gets its own bound (default: 1)
    pub jikan_max_concurrent_requests: usize,

    pub anilist_enabled: bool,

    pub jikan_enabled: bool,

    pub kitsu_enabled: bool,

    pub anilist_url: String,

    pub jikan_url: String,

    pub kitsu_url: String,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: 15,
            user_agent: format!("Gachadex/{}", env!("CARGO_PKG_VERSION")),
            max_concurrent_requests: 4,
            jikan_max_concurrent_requests: 1,
            anilist_enabled: true,
            jikan_enabled: true,
            kitsu_enabled: true,
            anilist_url: ANILIST_API.to_string(),
            jikan_url: JIKAN_API.to_string(),
            kitsu_url: KITSU_API.to_string(),
        }
    }
}

impl ProvidersConfig {
    #[must_use]
    pub const fn any_enabled(&self) -> bool {
        self.anilist_enabled || self.jikan_enabled || self.kitsu_enabled
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub scheduler_enabled: bool,

    /// Full rebuild interval in hours (default: 12)
    pub refresh_interval_hours: u32,

    /// Overrides the interval when set, e.g. "0 0 */6 * * *"
    pub cron_expression: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            scheduler_enabled: true,
            refresh_interval_hours: 12,
            cron_expression: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,

    pub port: u16,

    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 6790,
            cors_allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,

    pub loki_labels: std::collections::HashMap<String, String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        let mut labels = std::collections::HashMap::new();
        labels.insert("app".to_string(), "gachadex".to_string());

        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
            loki_labels: labels,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("gachadex").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".gachadex").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            Self::default().save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache.scheduler_enabled
            && self.cache.refresh_interval_hours == 0
            && self.cache.cron_expression.is_none()
        {
            anyhow::bail!("Cache refresh interval must be > 0 or cron expression must be set");
        }

        if self.providers.request_timeout_seconds == 0 {
            anyhow::bail!("Provider request timeout must be > 0");
        }

        if self.providers.max_concurrent_requests == 0 {
            anyhow::bail!("Provider max_concurrent_requests must be > 0");
        }

        if self.providers.jikan_max_concurrent_requests == 0 {
            anyhow::bail!("Provider jikan_max_concurrent_requests must be > 0");
        }

        if !self.providers.any_enabled() {
            warn!("All providers are disabled, the cache will always be empty");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.cache.refresh_interval_hours, 12);
        assert_eq!(config.providers.request_timeout_seconds, 15);
        assert!(config.providers.any_enabled());
        assert_eq!(config.providers.anilist_url, "https://graphql.anilist.co");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[providers]"));
        assert!(toml_str.contains("[cache]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"

            [cache]
            refresh_interval_hours = 6

            [providers]
            kitsu_enabled = false
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.cache.refresh_interval_hours, 6);
        assert!(!config.providers.kitsu_enabled);
        assert!(config.providers.jikan_enabled);
        assert_eq!(config.server.port, 6790);
    }

    #[test]
    fn test_validate_rejects_zero_interval_without_cron() {
        let mut config = Config::default();
        config.cache.refresh_interval_hours = 0;
        assert!(config.validate().is_err());

        config.cache.cron_expression = Some("0 0 */6 * * *".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.providers.request_timeout_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_jikan_gets_its_own_concurrency_bound() {
        let mut config = Config::default();
        assert_eq!(config.providers.max_concurrent_requests, 4);
        assert_eq!(config.providers.jikan_max_concurrent_requests, 1);

        config.providers.jikan_max_concurrent_requests = 0;
        assert!(config.validate().is_err());
    }
}

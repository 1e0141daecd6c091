use crate::core::provider::{ProviderId, Timeframe};
use crate::core::registry::Route;
use crate::core::request::Field;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::{fs, path::PathBuf};
use tracing::debug;

const DEFAULT_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct ProviderConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub yahoo: ProviderConfig,
    #[serde(default)]
    pub fmp: ProviderConfig,
    #[serde(default)]
    pub alphavantage: ProviderConfig,
    #[serde(default)]
    pub eodhd: ProviderConfig,
}

impl ProvidersConfig {
    pub fn get(&self, id: ProviderId) -> &ProviderConfig {
        match id {
            ProviderId::Yahoo => &self.yahoo,
            ProviderId::Fmp => &self.fmp,
            ProviderId::AlphaVantage => &self.alphavantage,
            ProviderId::Eodhd => &self.eodhd,
        }
    }

    fn get_mut(&mut self, id: ProviderId) -> &mut ProviderConfig {
        match id {
            ProviderId::Yahoo => &mut self.yahoo,
            ProviderId::Fmp => &mut self.fmp,
            ProviderId::AlphaVantage => &mut self.alphavantage,
            ProviderId::Eodhd => &mut self.eodhd,
        }
    }
}

pub fn default_base_url(id: ProviderId) -> &'static str {
    match id {
        ProviderId::Yahoo => "https://query1.finance.yahoo.com",
        ProviderId::Fmp => "https://financialmodelingprep.com",
        ProviderId::AlphaVantage => "https://www.alphavantage.co",
        ProviderId::Eodhd => "https://eodhd.com",
    }
}

/// Environment variable holding the API key of a provider, if it takes one.
pub fn api_key_env(id: ProviderId) -> Option<&'static str> {
    match id {
        ProviderId::Yahoo => None,
        ProviderId::Fmp => Some("FMP_API_KEY"),
        ProviderId::AlphaVantage => Some("ALPHAVANTAGE_API_KEY"),
        ProviderId::Eodhd => Some("EODHD_API_KEY"),
    }
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub history_range: Timeframe,
    /// Per-field route overrides.
    #[serde(default)]
    pub routes: BTreeMap<Field, Route>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            providers: ProvidersConfig::default(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            history_range: Timeframe::default(),
            routes: BTreeMap::new(),
        }
    }
}

impl AppConfig {
    /// Loads `config_path`, or the default location when none is given. A
    /// missing default file falls back to built-in defaults. API keys from
    /// the environment override the file.
    pub fn resolve(config_path: Option<&str>) -> Result<Self> {
        let config = match config_path {
            Some(path) => Self::load_from_path(path)?,
            None => Self::load()?,
        };
        Ok(config.with_env_overrides(|name| std::env::var(name).ok()))
    }

    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(
                "No config at {}, using built-in defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "fundscope", "fundscope")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    /// Replaces API keys with non-empty values returned by `lookup` for each
    /// provider's environment variable.
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        for id in ProviderId::ALL {
            let Some(var) = api_key_env(id) else {
                continue;
            };
            if let Some(key) = lookup(var).filter(|k| !k.trim().is_empty()) {
                debug!("Using {} from environment", var);
                self.providers.get_mut(id).api_key = Some(key);
            }
        }
        self
    }

    pub fn base_url(&self, id: ProviderId) -> String {
        self.providers
            .get(id)
            .base_url
            .as_deref()
            .unwrap_or(default_base_url(id))
            .trim_end_matches('/')
            .to_string()
    }

    pub fn api_key(&self, id: ProviderId) -> Option<String> {
        self.providers.get(id).api_key.clone()
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
providers:
  yahoo:
    base_url: "http://example.com/yahoo/"
  fmp:
    api_key: "file-key"
request_timeout_secs: 3
history_range: 5y
routes:
  categorySector:
    primary: eodhd
    backup: yahoo
  commissions:
    primary: fmp
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.base_url(ProviderId::Yahoo), "http://example.com/yahoo");
        assert_eq!(
            config.base_url(ProviderId::Eodhd),
            "https://eodhd.com".to_string()
        );
        assert_eq!(config.api_key(ProviderId::Fmp).as_deref(), Some("file-key"));
        assert_eq!(config.request_timeout_secs, 3);
        assert_eq!(config.history_range, Timeframe::FiveYears);
        assert_eq!(
            config.routes[&Field::CategorySector],
            Route::new(ProviderId::Eodhd, Some(ProviderId::Yahoo))
        );
        assert_eq!(config.routes[&Field::Commissions].backup, None);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.request_timeout().as_secs(), 5);
        assert_eq!(config.history_range, Timeframe::TenYears);
        assert!(config.api_key(ProviderId::AlphaVantage).is_none());
    }

    #[test]
    fn test_env_overrides_file_keys() {
        let config: AppConfig = serde_yaml::from_str(
            r#"
providers:
  fmp:
    api_key: "file-key"
  eodhd:
    api_key: "eod-file"
"#,
        )
        .unwrap();

        let config = config.with_env_overrides(|name| match name {
            "FMP_API_KEY" => Some("env-key".to_string()),
            "EODHD_API_KEY" => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(config.api_key(ProviderId::Fmp).as_deref(), Some("env-key"));
        assert_eq!(config.api_key(ProviderId::Eodhd).as_deref(), Some("eod-file"));
        assert_eq!(config.api_key(ProviderId::AlphaVantage), None);
    }

    #[test]
    fn test_unknown_route_field_is_rejected() {
        let result: std::result::Result<AppConfig, _> = serde_yaml::from_str(
            r#"
routes:
  dividendYield:
    primary: yahoo
"#,
        );
        assert!(result.is_err());
    }
}

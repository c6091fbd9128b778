//! Configuration loader for the LayerEdge runner

use anyhow::{Context, Result};
use core_logic::{ConfigError, RetryConfig};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Top-level configuration, read from `config/config.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LayerEdgeConfig {
    /// Referral code sent with every registration
    pub referral_code: String,
    /// Referral API root, without trailing slash
    pub api_base_url: String,
    /// Value for the `Origin` header; `Referer` is derived from it
    pub origin: String,
    /// Browser `User-Agent` sent with every API call
    pub user_agent: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Attempts per remote call
    pub retry_attempts: u32,
    /// Delay before the second attempt
    pub retry_base_delay_ms: u64,
    /// Pause between account steps
    pub step_delay_ms: u64,
    pub log_dir: String,
    pub proxy: ProxyPoolSettings,
    pub storage: StorageSettings,
    pub telegram: Option<TelegramSettings>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProxyPoolSettings {
    /// Newline separated `host:port` list
    pub source_url: String,
    /// Must answer 200 through a live proxy
    pub liveness_url: String,
    pub batch_size: usize,
    pub liveness_timeout_secs: u64,
    pub batch_pause_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub wallets: PathBuf,
    pub proxies: PathBuf,
    pub results: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramSettings {
    pub bot_token: String,
    pub chat_id: String,
}

impl Default for LayerEdgeConfig {
    fn default() -> Self {
        Self {
            referral_code: String::new(),
            api_base_url: "https://referralapi.layeredge.io".to_string(),
            origin: "https://layeredge.io".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout_secs: 10,
            retry_attempts: 2,
            retry_base_delay_ms: 2000,
            step_delay_ms: 2000,
            log_dir: "logs".to_string(),
            proxy: ProxyPoolSettings::default(),
            storage: StorageSettings::default(),
            telegram: None,
        }
    }
}

impl Default for ProxyPoolSettings {
    fn default() -> Self {
        Self {
            source_url: "https://api.proxyscrape.com/v2/?request=displayproxies&protocol=http&timeout=10000&country=all&ssl=all&anonymity=all".to_string(),
            liveness_url: "https://www.google.com".to_string(),
            batch_size: 50,
            liveness_timeout_secs: 5,
            batch_pause_ms: 1000,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            wallets: PathBuf::from(core_logic::WalletManager::WALLETS_FILE),
            proxies: PathBuf::from(core_logic::ProxyManager::PROXY_FILE),
            results: PathBuf::from("walletInfo.json"),
        }
    }
}

impl LayerEdgeConfig {
    /// Load configuration from a TOML file
    ///
    /// # Example
    /// ```ignore
    /// let config = LayerEdgeConfig::from_path("config/config.toml")?;
    /// ```
    pub fn from_path(path: &str) -> Result<Self> {
        let content =
            fs::read_to_string(path).context(format!("Failed to read config from {}", path))?;
        Self::from_toml_str(&content).map_err(|e| {
            anyhow::Error::new(ConfigError::ParseError {
                path: path.to_string(),
                reason: e.to_string(),
            })
        })
    }

    pub fn from_toml_str(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Like [`from_path`](Self::from_path), but a missing file yields defaults.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::from_path(path)
        } else {
            warn!("{} not found, using default configuration", path);
            Ok(Self::default())
        }
    }

    /// Applies `REF_CODE`, `TELEGRAM_BOT_TOKEN` and `TELEGRAM_CHAT_ID`.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) {
        if let Some(code) = lookup("REF_CODE").filter(|s| !s.trim().is_empty()) {
            self.referral_code = code.trim().to_string();
        }

        let token = lookup("TELEGRAM_BOT_TOKEN").filter(|s| !s.is_empty());
        let chat_id = lookup("TELEGRAM_CHAT_ID").filter(|s| !s.is_empty());
        match (token, chat_id) {
            (Some(bot_token), Some(chat_id)) => {
                self.telegram = Some(TelegramSettings { bot_token, chat_id });
            }
            (Some(bot_token), None) => {
                if let Some(existing) = self.telegram.as_mut() {
                    existing.bot_token = bot_token;
                }
            }
            (None, Some(chat_id)) => {
                if let Some(existing) = self.telegram.as_mut() {
                    existing.chat_id = chat_id;
                }
            }
            (None, None) => {}
        }
    }

    /// Checks the fields the referral API cannot work without.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.referral_code.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "referral_code".to_string(),
            });
        }
        if !self.api_base_url.starts_with("http") {
            return Err(ConfigError::InvalidValue {
                field: "api_base_url".to_string(),
                reason: format!("'{}' is not an http(s) URL", self.api_base_url),
            });
        }
        if self.proxy.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "proxy.batch_size".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new(self.retry_attempts, self.retry_base_delay_ms).with_exponential_base(1.5)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = LayerEdgeConfig::from_toml_str("").unwrap();
        assert_eq!(config.api_base_url, "https://referralapi.layeredge.io");
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(config.retry_attempts, 2);
        assert_eq!(config.proxy.batch_size, 50);
        assert_eq!(config.proxy.liveness_timeout_secs, 5);
        assert_eq!(config.storage.results, PathBuf::from("walletInfo.json"));
        assert!(config.telegram.is_none());
    }

    #[test]
    fn test_partial_sections() {
        let config = LayerEdgeConfig::from_toml_str(
            r#"
            referral_code = "abc123"
            step_delay_ms = 0

            [proxy]
            batch_size = 10

            [telegram]
            bot_token = "t"
            chat_id = "42"
            "#,
        )
        .unwrap();

        assert_eq!(config.referral_code, "abc123");
        assert_eq!(config.step_delay(), Duration::ZERO);
        assert_eq!(config.proxy.batch_size, 10);
        assert_eq!(config.proxy.liveness_url, "https://www.google.com");
        assert_eq!(config.telegram.unwrap().chat_id, "42");
    }

    #[test]
    fn test_validate_requires_referral_code() {
        let config = LayerEdgeConfig::default();
        assert_eq!(
            config.validate(),
            Err(ConfigError::MissingField {
                field: "referral_code".to_string()
            })
        );
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("REF_CODE", " XYZ "),
            ("TELEGRAM_BOT_TOKEN", "token"),
            ("TELEGRAM_CHAT_ID", "99"),
        ]
        .into_iter()
        .collect();

        let mut config = LayerEdgeConfig::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.referral_code, "XYZ");
        let telegram = config.telegram.unwrap();
        assert_eq!(telegram.bot_token, "token");
        assert_eq!(telegram.chat_id, "99");
        assert!(LayerEdgeConfig {
            referral_code: "XYZ".into(),
            ..LayerEdgeConfig::default()
        }
        .validate()
        .is_ok());
    }

    #[test]
    fn test_retry_config_curve() {
        let retry = LayerEdgeConfig::default().retry_config();
        assert_eq!(retry.max_attempts, 2);
        assert_eq!(retry.calculate_delay(1), Duration::from_millis(3000));
    }
}

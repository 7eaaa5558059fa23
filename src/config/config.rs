// src/config/config.rs
use crate::{
    miner::MinerSettings,
    network::{LedgerConfig, RetryPolicy},
    types::{DEFAULT_CORE_LIMIT, MAX_CORE_LIMIT},
    utils::error::MinerError,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for the mining application
///
/// Contains the core limit, pool tuning, retry behaviour and the sync
/// node connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Maximum number of cores (worker threads) the miner may use, 1..=8
    /// (default: 1)
    #[serde(default = "default_core_limit")]
    pub core_limit: usize,

    /// Nonces each worker searches before the pool re-checks the block
    /// (default: 10,000,000)
    #[serde(default = "default_range_size")]
    pub range_size: u64,

    /// Hash-rate sampling period in milliseconds (default: 1000)
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,

    /// Retry behaviour for ledger requests
    #[serde(default)]
    pub retry: RetryConfig,

    /// Sync node connection
    #[serde(default)]
    pub ledger: LedgerConfig,
}

/// Retry behaviour for ledger requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Pause between attempts in milliseconds (default: 1000)
    #[serde(default = "default_retry_delay_ms")]
    pub delay_ms: u64,

    /// Give up after this many failures; unset retries forever
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

fn default_core_limit() -> usize {
    DEFAULT_CORE_LIMIT
}

fn default_range_size() -> u64 {
    10_000_000
}

fn default_sample_interval_ms() -> u64 {
    1000
}

fn default_retry_delay_ms() -> u64 {
    1000
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            delay_ms: default_retry_delay_ms(),
            max_attempts: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            core_limit: default_core_limit(),
            range_size: default_range_size(),
            sample_interval_ms: default_sample_interval_ms(),
            retry: RetryConfig::default(),
            ledger: LedgerConfig::default(),
        }
    }
}

const TEMPLATE_HEADER: &str = "\
# Krist Miner Configuration
#
# core_limit is the maximum number of cores the miner may use. The default is 1,
# the maximum is 8. Using more cores than your cooling can handle risks thermal
# shutdown or damage from overheating.
#
# Leave retry.max_attempts unset to retry ledger requests forever.

";

impl Config {
    /// Loads configuration from a file
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file (TOML format)
    ///
    /// # Returns
    /// * `Ok(Config)` - Successfully loaded and validated configuration
    /// * `Err(MinerError)` - If file couldn't be read or parsed
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, MinerError> {
        let path = path.into();
        let config_str = std::fs::read_to_string(&path).map_err(|e| {
            MinerError::ConfigError(format!(
                "Failed to read config at {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::parse(&config_str)
    }

    /// Parses and validates a TOML document
    pub fn parse(config_str: &str) -> Result<Self, MinerError> {
        let config: Config = toml::from_str(config_str)?;
        Ok(config.validated())
    }

    /// Loads the configuration, writing a default file first if none exists
    pub fn load_or_create(path: impl Into<PathBuf>) -> Result<Self, MinerError> {
        let path = path.into();
        if path.exists() {
            return Self::load(path);
        }

        log::info!("Creating default configuration at {}", path.display());
        std::fs::write(&path, Self::generate_template()?)?;
        Ok(Config::default())
    }

    /// Replaces out-of-range values with their defaults
    pub fn validated(mut self) -> Self {
        if !(DEFAULT_CORE_LIMIT..=MAX_CORE_LIMIT).contains(&self.core_limit) {
            log::warn!(
                "core_limit {} is outside {}..={}; using {}",
                self.core_limit,
                DEFAULT_CORE_LIMIT,
                MAX_CORE_LIMIT,
                DEFAULT_CORE_LIMIT
            );
            self.core_limit = DEFAULT_CORE_LIMIT;
        }
        if self.range_size == 0 {
            log::warn!("range_size must be positive; using {}", default_range_size());
            self.range_size = default_range_size();
        }
        if self.sample_interval_ms == 0 {
            self.sample_interval_ms = default_sample_interval_ms();
        }
        self
    }

    /// Engine settings described by this configuration
    pub fn settings(&self) -> MinerSettings {
        MinerSettings {
            core_limit: self.core_limit,
            range_size: self.range_size,
            sample_interval: Duration::from_millis(self.sample_interval_ms),
            retry: RetryPolicy {
                delay: Duration::from_millis(self.retry.delay_ms),
                max_attempts: self.retry.max_attempts,
            },
        }
    }

    /// Generates a commented configuration file with default values
    pub fn generate_template() -> Result<String, MinerError> {
        let body = toml::to_string_pretty(&Config::default())
            .map_err(|e| MinerError::ConfigError(format!("Cannot render template: {}", e)))?;
        Ok(format!("{}{}", TEMPLATE_HEADER, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        assert_eq!(Config::parse("").unwrap(), Config::default());
    }

    #[test]
    fn out_of_range_core_limit_falls_back() {
        assert_eq!(Config::parse("core_limit = 9").unwrap().core_limit, 1);
        assert_eq!(Config::parse("core_limit = 0").unwrap().core_limit, 1);
        assert_eq!(Config::parse("core_limit = 4").unwrap().core_limit, 4);
    }

    #[test]
    fn template_parses_back_to_defaults() {
        let template = Config::generate_template().unwrap();
        assert!(template.starts_with("# Krist Miner Configuration"));
        assert_eq!(Config::parse(&template).unwrap(), Config::default());
    }

    #[test]
    fn settings_carry_retry_policy() {
        let config = Config::parse(
            "range_size = 1000\n[retry]\ndelay_ms = 250\nmax_attempts = 3\n",
        )
        .unwrap();
        let settings = config.settings();
        assert_eq!(settings.range_size, 1000);
        assert_eq!(settings.retry.delay, Duration::from_millis(250));
        assert_eq!(settings.retry.max_attempts, Some(3));
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        assert!(matches!(
            Config::parse("core_limit = \"many\""),
            Err(MinerError::ConfigError(_))
        ));
    }

    #[test]
    fn missing_file_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = Config::load_or_create(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());

        std::fs::write(&path, "core_limit = 3\n").unwrap();
        assert_eq!(Config::load_or_create(&path).unwrap().core_limit, 3);
    }
}

//! Configuration module for betsettle-server.
//!
//! Handles loading configuration from TOML files, CLI arguments,
//! and environment variables.

pub mod file;
pub mod runtime;

use crate::config::file::FileConfig;
use crate::config::runtime::{
    BrokerConfig, MatcherConfig, OddsConfig, OutboxConfig, ServerConfig, SettlementConfig,
};
use rust_decimal::Decimal;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Overrides `broker.use_real_broker`.
pub const USE_REAL_BROKER_ENV: &str = "BETSETTLE_USE_REAL_BROKER";

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("invalid value {value:?} for environment variable {name}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

/// Loaded configuration result containing all parts.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub server: ServerConfig,
    pub settlement: SettlementConfig,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: std::path::PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file
    /// 2. Apply CLI and environment overrides
    /// 3. Validate the configuration
    /// 4. Build the loaded configuration
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        let file_config: FileConfig = toml::from_str(&config_content)?;
        self.finish(file_config, |name| std::env::var(name).ok())
    }

    fn finish(
        &self,
        mut file_config: FileConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<LoadedConfig, ConfigError> {
        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }
        apply_env_overrides(&mut file_config, env)?;
        validate(&file_config)?;
        Ok(build_loaded_config(file_config))
    }
}

fn apply_env_overrides(
    config: &mut FileConfig,
    env: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    if let Some(value) = env(USE_REAL_BROKER_ENV) {
        config.broker.use_real_broker = parse_bool(&value).ok_or(ConfigError::InvalidEnv {
            name: USE_REAL_BROKER_ENV,
            value,
        })?;
    }
    Ok(())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    if config.broker.settlement_topic.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "broker.settlement_topic must not be empty".to_string(),
        ));
    }
    if config.matcher.store_timeout_ms == 0 || config.matcher.publish_timeout_ms == 0 {
        return Err(ConfigError::ValidationError(
            "matcher timeouts must be positive".to_string(),
        ));
    }
    if config.outbox.poll_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "outbox.poll_interval_ms must be positive".to_string(),
        ));
    }
    if config.outbox.batch_size <= 0 || config.outbox.max_attempts <= 0 {
        return Err(ConfigError::ValidationError(
            "outbox.batch_size and outbox.max_attempts must be positive".to_string(),
        ));
    }
    if config.odds.default < Decimal::ONE {
        return Err(ConfigError::ValidationError(format!(
            "odds.default must be at least 1, got {}",
            config.odds.default
        )));
    }
    for (market, odds) in &config.odds.markets {
        if *odds < Decimal::ONE {
            return Err(ConfigError::ValidationError(format!(
                "odds for market {market} must be at least 1, got {odds}"
            )));
        }
    }
    Ok(())
}

fn build_loaded_config(file_config: FileConfig) -> LoadedConfig {
    let FileConfig {
        server,
        broker,
        matcher,
        outbox,
        odds,
    } = file_config;

    LoadedConfig {
        server: ServerConfig {
            listen: server.listen,
        },
        settlement: SettlementConfig {
            broker: BrokerConfig {
                use_real_broker: broker.use_real_broker,
                settlement_topic: broker.settlement_topic,
            },
            matcher: MatcherConfig {
                store_timeout: Duration::from_millis(matcher.store_timeout_ms),
                publish_timeout: Duration::from_millis(matcher.publish_timeout_ms),
                max_redeliveries: matcher.max_redeliveries,
            },
            outbox: OutboxConfig {
                poll_interval: Duration::from_millis(outbox.poll_interval_ms),
                batch_size: outbox.batch_size,
                max_attempts: outbox.max_attempts,
            },
            odds: OddsConfig {
                default_odds: odds.default,
                overrides: odds.markets,
            },
        },
    }
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loader() -> ConfigLoader {
        ConfigLoader::new("betsettle-config.toml", None)
    }

    fn parse(toml_str: &str) -> FileConfig {
        toml::from_str(toml_str).unwrap()
    }

    #[test]
    fn test_env_overrides_broker_toggle() {
        let loaded = loader()
            .finish(parse(""), |name| {
                (name == USE_REAL_BROKER_ENV).then(|| "true".to_string())
            })
            .unwrap();
        assert!(loaded.settlement.broker.use_real_broker);

        let loaded = loader()
            .finish(parse("[broker]\nuse_real_broker = true\n"), |_| {
                Some("0".to_string())
            })
            .unwrap();
        assert!(!loaded.settlement.broker.use_real_broker);
    }

    #[test]
    fn test_invalid_env_value_is_rejected() {
        let result = loader().finish(parse(""), |_| Some("maybe".to_string()));
        assert!(matches!(result, Err(ConfigError::InvalidEnv { .. })));
    }

    #[test]
    fn test_listen_override_wins() {
        let addr: SocketAddr = "127.0.0.1:9999".parse().unwrap();
        let loaded = ConfigLoader::new("unused.toml", Some(addr))
            .finish(parse("[server]\nlisten = \"0.0.0.0:1\"\n"), |_| None)
            .unwrap();
        assert_eq!(loaded.server.listen, addr);
    }

    #[test]
    fn test_odds_below_one_are_rejected() {
        let result = loader().finish(parse("[odds]\ndefault = \"0.5\"\n"), |_| None);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));

        let result = loader().finish(
            parse("[odds.markets]\n\"match-winner\" = \"0.9\"\n"),
            |_| None,
        );
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_durations_are_converted() {
        let loaded = loader()
            .finish(
                parse("[matcher]\nstore_timeout_ms = 250\n[outbox]\npoll_interval_ms = 100\n"),
                |_| None,
            )
            .unwrap();
        assert_eq!(
            loaded.settlement.matcher.store_timeout,
            Duration::from_millis(250)
        );
        assert_eq!(
            loaded.settlement.outbox.poll_interval,
            Duration::from_millis(100)
        );
        assert_eq!(loaded.settlement.odds.default_odds, Decimal::TWO);
    }
}

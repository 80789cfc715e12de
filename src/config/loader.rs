//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::TreasuryConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Overrides the configured payout address.
pub const PAYOUT_WALLET_ENV_VAR: &str = "PAYOUT_WALLET";
/// Overrides the listener port.
pub const PORT_ENV_VAR: &str = "PORT";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<TreasuryConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let mut config: TreasuryConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Load from `path` when it exists, otherwise start from defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<TreasuryConfig, ConfigError> {
    match path {
        Some(path) if path.exists() => load_config(path),
        _ => {
            let mut config = TreasuryConfig::default();
            apply_env_overrides(&mut config, |key| std::env::var(key).ok());
            validate_config(&config).map_err(ConfigError::Validation)?;
            Ok(config)
        }
    }
}

/// Apply environment overrides. Blank values are ignored.
pub fn apply_env_overrides<F>(config: &mut TreasuryConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(payout) = lookup(PAYOUT_WALLET_ENV_VAR) {
        config.wallets.payout_address = Some(payout.trim().to_string());
    }
    if let Some(port) = lookup(PORT_ENV_VAR) {
        config.listener.bind_address = format!("0.0.0.0:{}", port.trim());
    }
}

//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, prices > 0)
//! - Check addresses and URLs parse
//!
//! Returns every error found, not just the first. Runs before the config is
//! accepted into the system.

use alloy::primitives::Address;
use rust_decimal::Decimal;
use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::TreasuryConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a parsed configuration.
pub fn validate_config(config: &TreasuryConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new("listener.bind_address", "not a socket address"));
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::new("listener.request_timeout_secs", "must be > 0"));
    }

    let chain = &config.blockchain;
    if chain.endpoints.is_empty() {
        errors.push(ValidationError::new("blockchain.endpoints", "at least one endpoint required"));
    }
    for (i, endpoint) in chain.endpoints.iter().enumerate() {
        if Url::parse(endpoint).is_err() {
            errors.push(ValidationError::new(
                format!("blockchain.endpoints[{}]", i),
                format!("invalid URL '{}'", endpoint),
            ));
        }
    }
    for (field, value) in [
        ("blockchain.probe_timeout_secs", chain.probe_timeout_secs),
        ("blockchain.rpc_timeout_secs", chain.rpc_timeout_secs),
        ("blockchain.confirmation_timeout_secs", chain.confirmation_timeout_secs),
        ("blockchain.confirmation_poll_ms", chain.confirmation_poll_ms),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be > 0"));
        }
    }
    let budget = chain.withdrawal_budget_secs();
    if config.listener.request_timeout_secs <= budget {
        errors.push(ValidationError::new(
            "listener.request_timeout_secs",
            format!(
                "must exceed the withdrawal budget of {}s (4 x rpc_timeout_secs + confirmation_timeout_secs)",
                budget
            ),
        ));
    }
    if chain.confirmation_blocks == 0 {
        errors.push(ValidationError::new("blockchain.confirmation_blocks", "must be >= 1"));
    }

    let economics = &config.economics;
    if economics.price_usd <= Decimal::ZERO {
        errors.push(ValidationError::new("economics.price_usd", "must be > 0"));
    }
    if economics.gas_reserve_native <= Decimal::ZERO {
        errors.push(ValidationError::new("economics.gas_reserve_native", "must be > 0"));
    }
    if economics.gas_buffer_native < Decimal::ZERO {
        errors.push(ValidationError::new("economics.gas_buffer_native", "must be >= 0"));
    }

    if config.scheduler.interval_secs == 0 {
        errors.push(ValidationError::new("scheduler.interval_secs", "must be > 0"));
    }
    if config.scheduler.threshold_usd < Decimal::ZERO {
        errors.push(ValidationError::new("scheduler.threshold_usd", "must be >= 0"));
    }

    let ledger = &config.ledger;
    for (field, value) in [
        ("ledger.recycle_min_earnings_usd", ledger.recycle_min_earnings_usd),
        ("ledger.accounting_withdrawal_usd", ledger.accounting_withdrawal_usd),
        ("ledger.backend_allocation_native", ledger.backend_allocation_native),
    ] {
        if value < Decimal::ZERO {
            errors.push(ValidationError::new(field, "must be >= 0"));
        }
    }

    for (field, value) in [
        ("wallets.payout_address", &config.wallets.payout_address),
        ("wallets.treasury_address", &config.wallets.treasury_address),
    ] {
        if let Some(address) = value {
            if address.parse::<Address>().is_err() {
                errors.push(ValidationError::new(field, format!("invalid address '{}'", address)));
            }
        }
    }

    if !LOG_LEVELS.contains(&config.observability.log_level.as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("expected one of {:?}", LOG_LEVELS),
        ));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new("observability.metrics_address", "not a socket address"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&TreasuryConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = TreasuryConfig::default();
        config.blockchain.endpoints = vec!["::nope".to_string()];
        config.economics.price_usd = Decimal::ZERO;
        config.scheduler.interval_secs = 0;
        config.wallets.payout_address = Some("0x1234".to_string());

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "blockchain.endpoints[0]",
                "economics.price_usd",
                "scheduler.interval_secs",
                "wallets.payout_address",
            ]
        );
    }

    #[test]
    fn test_request_timeout_must_cover_withdrawal() {
        let mut config = TreasuryConfig::default();
        config.listener.request_timeout_secs = 30;
        config.blockchain.confirmation_timeout_secs = 120;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "listener.request_timeout_secs");

        // 4 x 10 + 120 = 160
        config.listener.request_timeout_secs = 160;
        assert!(validate_config(&config).is_err());
        config.listener.request_timeout_secs = 161;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_negative_buffer_rejected() {
        let mut config = TreasuryConfig::default();
        config.economics.gas_buffer_native = dec!(-0.001);
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].to_string(), "economics.gas_buffer_native: must be >= 0");
    }
}

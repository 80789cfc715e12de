//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Root configuration for the treasury service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TreasuryConfig {
    /// HTTP listener.
    pub listener: ListenerConfig,

    /// Chain endpoints and RPC timing.
    pub blockchain: BlockchainConfig,

    /// Fixed economic constants.
    pub economics: EconomicsConfig,

    /// Auto-withdrawal cadence and threshold.
    pub scheduler: SchedulerConfig,

    /// Earnings ledger rules.
    pub ledger: LedgerConfig,

    /// Treasury and payout addresses.
    pub wallets: WalletConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Per-request timeout in seconds. Must exceed the withdrawal budget
    /// (`BlockchainConfig::withdrawal_budget_secs`) for on-chain withdrawals
    /// to report their result.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 180,
        }
    }
}

/// Blockchain integration configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BlockchainConfig {
    /// Ordered JSON-RPC endpoints; rotation starts at the last one that worked.
    pub endpoints: Vec<String>,

    /// Chain ID (1 for Ethereum mainnet, 31337 for local Anvil).
    pub chain_id: u64,

    /// Liveness probe timeout in seconds.
    pub probe_timeout_secs: u64,

    /// Ordinary RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// Maximum time to wait for a receipt, in seconds.
    pub confirmation_timeout_secs: u64,

    /// Receipt polling interval in milliseconds.
    pub confirmation_poll_ms: u64,

    /// Blocks required for a transfer to count as confirmed (1 = included).
    pub confirmation_blocks: u32,

    /// Safety margin added on top of the gas estimate, in percent.
    pub gas_limit_margin_percent: u64,
}

impl BlockchainConfig {
    /// Upper bound on one withdrawal: balance read, gas estimate, fee read and
    /// submission at the RPC timeout each, then the confirmation wait.
    pub fn withdrawal_budget_secs(&self) -> u64 {
        self.rpc_timeout_secs
            .saturating_mul(4)
            .saturating_add(self.confirmation_timeout_secs)
    }
}

impl Default for BlockchainConfig {
    fn default() -> Self {
        Self {
            endpoints: [
                "https://ethereum-rpc.publicnode.com",
                "https://eth.drpc.org",
                "https://rpc.ankr.com/eth",
                "https://eth.llamarpc.com",
                "https://1rpc.io/eth",
                "https://eth-mainnet.public.blastapi.io",
                "https://cloudflare-eth.com",
                "https://rpc.builder0x69.io",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            chain_id: 1,
            probe_timeout_secs: 5,
            rpc_timeout_secs: 10,
            confirmation_timeout_secs: 120,
            confirmation_poll_ms: 2000,
            confirmation_blocks: 1,
            gas_limit_margin_percent: 5,
        }
    }
}

/// Fixed economic constants. Prices are configuration, not a market feed.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EconomicsConfig {
    /// USD value of one native unit.
    pub price_usd: Decimal,

    /// Treasury balance below which the treasury is considered out of gas.
    pub gas_reserve_native: Decimal,

    /// Amount withheld from every withdrawal to pay its own fee.
    pub gas_buffer_native: Decimal,
}

impl Default for EconomicsConfig {
    fn default() -> Self {
        Self {
            price_usd: dec!(3450),
            gas_reserve_native: dec!(0.003),
            gas_buffer_native: dec!(0.003),
        }
    }
}

/// Auto-withdrawal scheduler configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,

    /// Seconds between ticks. The first tick fires at startup.
    pub interval_secs: u64,

    /// Treasury value (USD) at or above which a sweep is attempted.
    pub threshold_usd: Decimal,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 60 * 60,
            threshold_usd: dec!(1000),
        }
    }
}

/// Earnings ledger configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Convert earnings into gas reserve when the treasury runs dry.
    pub auto_recycle_enabled: bool,

    /// Earnings (USD) that must be on hand before a recycle.
    pub recycle_min_earnings_usd: Decimal,

    /// Default amount for accounting-only withdrawals.
    pub accounting_withdrawal_usd: Decimal,

    /// Default native amount allocated to the treasury by a backend transfer.
    pub backend_allocation_native: Decimal,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            auto_recycle_enabled: true,
            recycle_min_earnings_usd: dec!(35),
            accounting_withdrawal_usd: dec!(100),
            backend_allocation_native: dec!(0.01),
        }
    }
}

/// Account addresses. The treasury key itself comes from the environment.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct WalletConfig {
    /// Destination for all withdrawals. Overridden by `PAYOUT_WALLET`.
    pub payout_address: Option<String>,

    /// Treasury address to report when no key is loaded.
    pub treasury_address: Option<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TreasuryConfig::default();
        assert_eq!(config.blockchain.endpoints.len(), 8);
        assert_eq!(config.blockchain.probe_timeout_secs, 5);
        assert_eq!(config.economics.price_usd, dec!(3450));
        assert_eq!(config.scheduler.interval_secs, 3600);
        assert!(config.wallets.payout_address.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: TreasuryConfig = toml::from_str(
            r#"
            [scheduler]
            threshold_usd = 250.5

            [economics]
            price_usd = 3000
            "#,
        )
        .unwrap();
        assert_eq!(config.scheduler.threshold_usd, dec!(250.5));
        assert_eq!(config.scheduler.interval_secs, 3600);
        assert_eq!(config.economics.price_usd, dec!(3000));
        assert_eq!(config.economics.gas_buffer_native, dec!(0.003));
    }
}

//! Chain-specific types and error definitions.

use alloy::primitives::utils::{format_ether, parse_ether};
use alloy::primitives::{Address, TxHash, U256};
use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

// Re-export BlockchainConfig from config module to avoid duplication
pub use crate::config::schema::BlockchainConfig;

/// Gas consumed by a plain value transfer; the floor for any estimate.
pub const MIN_TRANSFER_GAS: u64 = 21_000;

/// Errors that can occur during blockchain operations.
#[derive(Debug, Error)]
pub enum BlockchainError {
    /// RPC connection or request failed.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// RPC request timed out.
    #[error("RPC timeout after {0} seconds")]
    Timeout(u64),

    /// Every endpoint in the pool failed its liveness probe.
    #[error("no reachable endpoint ({attempted} tried)")]
    NoReachableEndpoint { attempted: usize },

    /// Transaction was not confirmed within expected time.
    #[error("Transaction not confirmed after {0} seconds")]
    ConfirmationTimeout(u64),

    /// Invalid private key format or derivation error.
    #[error("Wallet error: {0}")]
    Wallet(String),

    /// Transaction rejected by the node before inclusion.
    #[error("Submission rejected: {0}")]
    Submission(String),

    /// Configured address is not a valid hex address.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Amount could not be converted between wei and decimal units.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

impl BlockchainError {
    /// True for failures that say something about the endpoint rather than the request.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            BlockchainError::Rpc(_)
                | BlockchainError::Timeout(_)
                | BlockchainError::NoReachableEndpoint { .. }
        )
    }
}

/// Result type for blockchain operations.
pub type BlockchainResult<T> = Result<T, BlockchainError>;

/// A plain native-currency transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub from: Address,
    pub to: Address,
    pub value: U256,
}

/// EIP-1559 fee parameters, in wei per gas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeData {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

/// Everything needed to price a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeEstimate {
    pub gas_limit: u64,
    pub fees: FeeData,
}

/// The parts of a receipt the withdrawal path cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptSummary {
    pub tx_hash: TxHash,
    pub success: bool,
    pub block_number: Option<u64>,
}

/// Transaction confirmation status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationStatus {
    /// Transaction is included with a success status.
    Confirmed { block_number: u64 },
    /// Transaction was mined but reverted.
    Reverted { block_number: Option<u64> },
}

/// Parse an optional configured address.
pub fn parse_address(value: Option<&str>) -> BlockchainResult<Option<Address>> {
    value
        .map(|v| {
            Address::from_str(v.trim())
                .map_err(|e| BlockchainError::InvalidAddress(format!("{v}: {e}")))
        })
        .transpose()
}

/// Convert wei to a decimal amount of the native unit.
pub fn wei_to_native(wei: U256) -> BlockchainResult<Decimal> {
    let formatted = format_ether(wei);
    Decimal::from_str(&formatted)
        .map(|d| d.normalize())
        .map_err(|e| BlockchainError::InvalidAmount(format!("{formatted}: {e}")))
}

/// Convert a decimal native amount to wei, truncating below 1 wei.
pub fn native_to_wei(amount: Decimal) -> BlockchainResult<U256> {
    if amount.is_sign_negative() {
        return Err(BlockchainError::InvalidAmount(format!("negative amount {amount}")));
    }
    let text = amount.trunc_with_scale(18).normalize().to_string();
    parse_ether(&text).map_err(|e| BlockchainError::InvalidAmount(format!("{text}: {e}")))
}

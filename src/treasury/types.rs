//! Treasury result and error types.

use alloy::primitives::TxHash;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::blockchain::BlockchainError;

/// A treasury balance as far as the chain could tell us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BalanceReading {
    /// Confirmed on-chain balance in native units.
    Known(Decimal),
    /// The balance could not be read.
    Unavailable(String),
}

impl BalanceReading {
    pub fn known(&self) -> Option<Decimal> {
        match self {
            BalanceReading::Known(amount) => Some(*amount),
            BalanceReading::Unavailable(_) => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, BalanceReading::Known(_))
    }

    /// Zero when unavailable. Display only; never decide on this.
    pub fn amount_or_zero(&self) -> Decimal {
        self.known().unwrap_or(Decimal::ZERO)
    }
}

/// Why a withdrawal failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WithdrawalError {
    #[error("no reliable connection: {0}")]
    Connectivity(String),

    #[error("insufficient balance or amount too low (balance {balance}, max sendable {max_sendable})")]
    InsufficientFunds { balance: Decimal, max_sendable: Decimal },

    #[error("no destination address configured")]
    NoDestination,

    #[error("transaction rejected: {0}")]
    Submission(String),

    #[error("transaction {tx_hash} reverted")]
    Reverted { tx_hash: TxHash, block_number: Option<u64> },

    /// Sent, or possibly sent, with no verdict. Funds may have moved.
    #[error("outcome unknown: {reason}")]
    ConfirmationAmbiguous { tx_hash: Option<TxHash>, reason: String },
}

impl WithdrawalError {
    /// Stable label for metrics and API payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            WithdrawalError::Connectivity(_) => "connectivity",
            WithdrawalError::InsufficientFunds { .. } => "insufficient_funds",
            WithdrawalError::NoDestination => "no_destination",
            WithdrawalError::Submission(_) => "submission",
            WithdrawalError::Reverted { .. } => "reverted",
            WithdrawalError::ConfirmationAmbiguous { .. } => "confirmation_ambiguous",
        }
    }

    pub fn tx_hash(&self) -> Option<TxHash> {
        match self {
            WithdrawalError::Reverted { tx_hash, .. } => Some(*tx_hash),
            WithdrawalError::ConfirmationAmbiguous { tx_hash, .. } => *tx_hash,
            _ => None,
        }
    }

    /// Map a chain error raised before anything was sent.
    pub(crate) fn before_submission(err: BlockchainError) -> Self {
        if err.is_connectivity() {
            WithdrawalError::Connectivity(err.to_string())
        } else {
            WithdrawalError::Submission(err.to_string())
        }
    }
}

/// Serializable outcome of one on-chain withdrawal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<TxHash>,
    /// Native units moved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    #[serde(rename = "amountUSD", skip_serializing_if = "Option::is_none")]
    pub amount_usd: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub treasury_balance: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_sendable: Option<Decimal>,
}

impl WithdrawalResult {
    pub fn confirmed(tx_hash: TxHash, amount: Decimal, amount_usd: Decimal, block_number: u64) -> Self {
        Self {
            success: true,
            tx_hash: Some(tx_hash),
            amount: Some(amount),
            amount_usd: Some(amount_usd),
            block_number: Some(block_number),
            error_kind: None,
            error: None,
            treasury_balance: None,
            max_sendable: None,
        }
    }

    pub fn failed(err: &WithdrawalError) -> Self {
        let (treasury_balance, max_sendable) = match err {
            WithdrawalError::InsufficientFunds { balance, max_sendable } => {
                (Some(*balance), Some(*max_sendable))
            }
            _ => (None, None),
        };
        Self {
            success: false,
            tx_hash: err.tx_hash(),
            amount: None,
            amount_usd: None,
            block_number: None,
            error_kind: Some(err.kind()),
            error: Some(err.to_string()),
            treasury_balance,
            max_sendable,
        }
    }
}

impl From<Result<WithdrawalResult, WithdrawalError>> for WithdrawalResult {
    fn from(result: Result<WithdrawalResult, WithdrawalError>) -> Self {
        match result {
            Ok(done) => done,
            Err(err) => WithdrawalResult::failed(&err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_unavailable_is_not_zero() {
        let unknown = BalanceReading::Unavailable("timeout".into());
        assert_ne!(unknown, BalanceReading::Known(Decimal::ZERO));
        assert_eq!(unknown.known(), None);
        assert_eq!(unknown.amount_or_zero(), Decimal::ZERO);
    }

    #[test]
    fn test_insufficient_funds_payload() {
        let err = WithdrawalError::InsufficientFunds {
            balance: dec!(0.002),
            max_sendable: dec!(-0.001),
        };
        let json = serde_json::to_value(WithdrawalResult::failed(&err)).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["errorKind"], "insufficient_funds");
        assert_eq!(json["treasuryBalance"], "0.002");
        assert_eq!(json["maxSendable"], "-0.001");
        assert!(json.get("txHash").is_none());
    }

    #[test]
    fn test_ambiguous_keeps_hash() {
        let hash = TxHash::repeat_byte(0xab);
        let err = WithdrawalError::ConfirmationAmbiguous {
            tx_hash: Some(hash),
            reason: "receipt poll timed out".into(),
        };
        let result = WithdrawalResult::failed(&err);
        assert_eq!(result.tx_hash, Some(hash));
        assert_eq!(result.error_kind, Some("confirmation_ambiguous"));
    }

    #[test]
    fn test_before_submission_mapping() {
        let err = WithdrawalError::before_submission(BlockchainError::Timeout(10));
        assert_eq!(err.kind(), "connectivity");
        let err = WithdrawalError::before_submission(BlockchainError::InvalidAmount("x".into()));
        assert_eq!(err.kind(), "submission");
    }
}

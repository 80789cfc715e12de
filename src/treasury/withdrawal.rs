//! On-chain withdrawals from the treasury.
//!
//! # Flow
//! ```text
//! acquire signer → [lock] read balance → size amount → estimate fees
//!     → submit → await receipt [unlock] → WithdrawalResult
//! ```
//!
//! The read-then-act section runs under one mutex: two concurrent sweeps can
//! never both pass the balance check. No ledger side effects.

use alloy::primitives::Address;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::Instrument;
use uuid::Uuid;

use crate::blockchain::transaction::{estimate_transfer_fees, wait_for_confirmation};
use crate::blockchain::types::{
    native_to_wei, wei_to_native, BlockchainError, ConfirmationStatus, TransferRequest,
};
use crate::blockchain::{BlockchainConfig, ConnectionManager};
use crate::config::EconomicsConfig;
use crate::observability::metrics;
use crate::treasury::balance::fiat_value;
use crate::treasury::types::{WithdrawalError, WithdrawalResult};

/// Executes treasury withdrawals one at a time.
#[derive(Debug)]
pub struct WithdrawalExecutor {
    connections: Arc<ConnectionManager>,
    gas_buffer: Decimal,
    price_usd: Decimal,
    gas_margin_percent: u64,
    confirmation_blocks: u32,
    confirmation_poll: Duration,
    confirmation_timeout: Duration,
    in_flight: Mutex<()>,
}

impl WithdrawalExecutor {
    pub fn new(
        connections: Arc<ConnectionManager>,
        economics: &EconomicsConfig,
        chain: &BlockchainConfig,
    ) -> Self {
        Self {
            connections,
            gas_buffer: economics.gas_buffer_native,
            price_usd: economics.price_usd,
            gas_margin_percent: chain.gas_limit_margin_percent,
            confirmation_blocks: chain.confirmation_blocks,
            confirmation_poll: Duration::from_millis(chain.confirmation_poll_ms),
            confirmation_timeout: Duration::from_secs(chain.confirmation_timeout_secs),
            in_flight: Mutex::new(()),
        }
    }

    /// Move `requested` native units to `destination`.
    ///
    /// A `requested` of zero (or less) sweeps everything above the gas buffer.
    pub async fn execute_withdrawal(&self, requested: Decimal, destination: Address) -> WithdrawalResult {
        let attempt_id = Uuid::new_v4();
        let span = tracing::info_span!("withdrawal", %attempt_id, destination = %destination);

        let result = self.withdraw(requested, destination).instrument(span.clone()).await;

        match &result {
            Ok(done) => {
                metrics::record_withdrawal("success");
                tracing::info!(
                    parent: &span,
                    tx_hash = ?done.tx_hash,
                    amount = ?done.amount,
                    block = ?done.block_number,
                    "Withdrawal confirmed"
                );
            }
            Err(e) => {
                metrics::record_withdrawal(e.kind());
                tracing::error!(parent: &span, kind = e.kind(), error = %e, "Withdrawal failed");
            }
        }
        result.into()
    }

    async fn withdraw(
        &self,
        requested: Decimal,
        destination: Address,
    ) -> Result<WithdrawalResult, WithdrawalError> {
        let signer = self
            .connections
            .acquire_fresh_connection()
            .await
            .ok_or_else(|| WithdrawalError::Connectivity("no reliable connection".to_string()))?;

        let _guard = self.in_flight.lock().await;

        let rpc = signer.rpc();
        let from = signer.address();

        let balance_wei = match rpc.balance(from).await {
            Ok(wei) => wei,
            Err(e) => return Err(self.failed_before_submission(e).await),
        };
        let balance = wei_to_native(balance_wei).map_err(WithdrawalError::before_submission)?;
        let max_sendable = balance - self.gas_buffer;

        let amount = if requested <= Decimal::ZERO {
            max_sendable
        } else {
            requested
        };
        if amount <= Decimal::ZERO || amount > max_sendable {
            return Err(WithdrawalError::InsufficientFunds {
                balance,
                max_sendable,
            });
        }

        let transfer = TransferRequest {
            from,
            to: destination,
            value: native_to_wei(amount).map_err(WithdrawalError::before_submission)?,
        };

        let estimate = match estimate_transfer_fees(rpc, &transfer, self.gas_margin_percent).await {
            Ok(estimate) => estimate,
            Err(e) => return Err(self.failed_before_submission(e).await),
        };

        tracing::info!(
            amount = %amount,
            balance = %balance,
            gas_limit = estimate.gas_limit,
            max_fee_per_gas = estimate.fees.max_fee_per_gas,
            endpoint = %signer.endpoint(),
            "Submitting withdrawal"
        );

        let tx_hash = match rpc.send_transfer(signer.wallet(), &transfer, &estimate).await {
            Ok(hash) => hash,
            Err(BlockchainError::Submission(reason)) => {
                return Err(WithdrawalError::Submission(reason));
            }
            Err(e) if e.is_connectivity() => {
                // The raw transaction may have reached the node before the failure
                self.connections.invalidate("transfer submission failed").await;
                return Err(WithdrawalError::ConfirmationAmbiguous {
                    tx_hash: None,
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(WithdrawalError::Submission(e.to_string())),
        };

        tracing::info!(tx_hash = %tx_hash, "Withdrawal submitted, awaiting receipt");

        let status = wait_for_confirmation(
            rpc,
            tx_hash,
            self.confirmation_blocks,
            self.confirmation_poll,
            self.confirmation_timeout,
        )
        .await;

        match status {
            Ok(ConfirmationStatus::Confirmed { block_number }) => Ok(WithdrawalResult::confirmed(
                tx_hash,
                amount,
                fiat_value(amount, self.price_usd),
                block_number,
            )),
            Ok(ConfirmationStatus::Reverted { block_number }) => {
                Err(WithdrawalError::Reverted { tx_hash, block_number })
            }
            Err(e) => Err(WithdrawalError::ConfirmationAmbiguous {
                tx_hash: Some(tx_hash),
                reason: e.to_string(),
            }),
        }
    }

    async fn failed_before_submission(&self, err: BlockchainError) -> WithdrawalError {
        if err.is_connectivity() {
            self.connections.invalidate("pre-submission RPC failed").await;
        }
        WithdrawalError::before_submission(err)
    }
}

//! Transfer pricing and confirmation monitoring.
//!
//! # Responsibilities
//! - Estimate gas with a safety margin, falling back to the transfer minimum
//! - Read EIP-1559 fee parameters
//! - Poll for the receipt until included or the deadline passes

use alloy::primitives::TxHash;
use std::time::Duration;
use tokio::time::{interval, timeout, MissedTickBehavior};

use crate::blockchain::client::ChainRpc;
use crate::blockchain::types::{
    BlockchainError, BlockchainResult, ConfirmationStatus, FeeEstimate, TransferRequest,
    MIN_TRANSFER_GAS,
};

/// Price a transfer.
///
/// A failed gas estimate is not fatal: the protocol minimum for a plain
/// transfer is used instead. A failed fee read is.
pub async fn estimate_transfer_fees(
    rpc: &dyn ChainRpc,
    transfer: &TransferRequest,
    gas_margin_percent: u64,
) -> BlockchainResult<FeeEstimate> {
    let gas_limit = match rpc.estimate_gas(transfer).await {
        Ok(estimated) => {
            let padded = estimated.saturating_add(estimated.saturating_mul(gas_margin_percent) / 100);
            padded.max(MIN_TRANSFER_GAS)
        }
        Err(e) => {
            tracing::warn!(error = %e, fallback = MIN_TRANSFER_GAS, "Gas estimation failed, using transfer minimum");
            MIN_TRANSFER_GAS
        }
    };

    let fees = rpc.fee_data().await?;

    Ok(FeeEstimate { gas_limit, fees })
}

/// Wait for a transaction to be included with `required_confirmations` blocks.
///
/// Poll errors are tolerated until the deadline; if the deadline passes the
/// last poll error (or `ConfirmationTimeout`) is returned. Either way the
/// transaction may still land.
pub async fn wait_for_confirmation(
    rpc: &dyn ChainRpc,
    tx_hash: TxHash,
    required_confirmations: u32,
    poll_interval: Duration,
    timeout_duration: Duration,
) -> BlockchainResult<ConfirmationStatus> {
    let mut last_error: Option<BlockchainError> = None;

    let result = timeout(timeout_duration, async {
        let mut ticker = interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let receipt = match rpc.transaction_receipt(tx_hash).await {
                Ok(Some(r)) => r,
                Ok(None) => {
                    tracing::debug!(tx_hash = %tx_hash, "Transaction pending");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(tx_hash = %tx_hash, error = %e, "Receipt poll failed");
                    last_error = Some(e);
                    continue;
                }
            };

            if !receipt.success {
                return ConfirmationStatus::Reverted {
                    block_number: receipt.block_number,
                };
            }

            let Some(tx_block) = receipt.block_number else {
                continue;
            };

            if required_confirmations <= 1 {
                return ConfirmationStatus::Confirmed { block_number: tx_block };
            }

            let current_block = match rpc.block_number().await {
                Ok(block) => block,
                Err(e) => {
                    last_error = Some(e);
                    continue;
                }
            };
            let confirmations = current_block.saturating_sub(tx_block).saturating_add(1);

            if confirmations >= required_confirmations as u64 {
                return ConfirmationStatus::Confirmed { block_number: tx_block };
            }

            tracing::debug!(
                tx_hash = %tx_hash,
                confirmations = confirmations,
                required = required_confirmations,
                "Waiting for confirmations"
            );
        }
    })
    .await;

    match result {
        Ok(status) => Ok(status),
        Err(_) => Err(last_error
            .unwrap_or(BlockchainError::ConfirmationTimeout(timeout_duration.as_secs()))),
    }
}

//! Chain RPC access with per-call timeouts.
//!
//! # Responsibilities
//! - Define the `ChainRpc` seam the treasury core talks through
//! - Implement it over an alloy HTTP provider (`AlloyRpc`)
//! - Open sessions to pool endpoints (`RpcConnector`)
//!
//! Every call carries its own deadline; a hung endpoint surfaces as
//! `BlockchainError::Timeout`, never as a stalled task.

use alloy::eips::eip2718::Encodable2718;
use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::blockchain::endpoints::Endpoint;
use crate::blockchain::types::{
    BlockchainError, BlockchainResult, FeeData, FeeEstimate, ReceiptSummary, TransferRequest,
};
use crate::blockchain::wallet::Wallet;

/// The JSON-RPC calls the treasury needs from one endpoint.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Liveness probe and confirmation-depth reference.
    async fn block_number(&self) -> BlockchainResult<u64>;

    async fn balance(&self, address: Address) -> BlockchainResult<U256>;

    /// Raw `eth_estimateGas` for the transfer, without any margin applied.
    async fn estimate_gas(&self, transfer: &TransferRequest) -> BlockchainResult<u64>;

    async fn fee_data(&self) -> BlockchainResult<FeeData>;

    /// Sign with `wallet` and broadcast. Node-side rejection is
    /// `BlockchainError::Submission`; transport failure leaves the outcome unknown.
    async fn send_transfer(
        &self,
        wallet: &Wallet,
        transfer: &TransferRequest,
        estimate: &FeeEstimate,
    ) -> BlockchainResult<TxHash>;

    async fn transaction_receipt(&self, tx_hash: TxHash) -> BlockchainResult<Option<ReceiptSummary>>;
}

/// Opens an RPC session to an endpoint. Opening is cheap; the caller probes.
pub trait RpcConnector: Send + Sync {
    fn connect(&self, endpoint: &Endpoint) -> BlockchainResult<Arc<dyn ChainRpc>>;
}

/// `ChainRpc` over an alloy HTTP provider.
pub struct AlloyRpc {
    provider: Arc<dyn Provider + Send + Sync>,
    endpoint: Endpoint,
    timeout_duration: Duration,
}

impl AlloyRpc {
    pub fn new(endpoint: Endpoint, timeout_duration: Duration) -> Self {
        let provider = ProviderBuilder::new().connect_http(endpoint.url().clone());
        Self {
            provider: Arc::new(provider),
            endpoint,
            timeout_duration,
        }
    }

    async fn call<T, E, F>(&self, method: &'static str, fut: F) -> BlockchainResult<T>
    where
        E: std::fmt::Display,
        F: IntoFuture<Output = Result<T, E>>,
    {
        match timeout(self.timeout_duration, fut).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => {
                tracing::debug!(endpoint = %self.endpoint, method, error = %e, "RPC error");
                Err(BlockchainError::Rpc(format!("{}: {}", method, e)))
            }
            Err(_) => {
                tracing::debug!(endpoint = %self.endpoint, method, "RPC timeout");
                Err(BlockchainError::Timeout(self.timeout_duration.as_secs()))
            }
        }
    }
}

#[async_trait]
impl ChainRpc for AlloyRpc {
    async fn block_number(&self) -> BlockchainResult<u64> {
        self.call("eth_blockNumber", self.provider.get_block_number()).await
    }

    async fn balance(&self, address: Address) -> BlockchainResult<U256> {
        self.call("eth_getBalance", self.provider.get_balance(address)).await
    }

    async fn estimate_gas(&self, transfer: &TransferRequest) -> BlockchainResult<u64> {
        let tx = TransactionRequest::default()
            .with_from(transfer.from)
            .with_to(transfer.to)
            .with_value(transfer.value);
        self.call("eth_estimateGas", self.provider.estimate_gas(tx)).await
    }

    async fn fee_data(&self) -> BlockchainResult<FeeData> {
        let estimation = self
            .call("eth_feeHistory", self.provider.estimate_eip1559_fees())
            .await?;
        Ok(FeeData {
            max_fee_per_gas: estimation.max_fee_per_gas,
            max_priority_fee_per_gas: estimation.max_priority_fee_per_gas,
        })
    }

    async fn send_transfer(
        &self,
        wallet: &Wallet,
        transfer: &TransferRequest,
        estimate: &FeeEstimate,
    ) -> BlockchainResult<TxHash> {
        let chain_nonce = self
            .call(
                "eth_getTransactionCount",
                self.provider.get_transaction_count(wallet.address()).pending(),
            )
            .await?;
        wallet.set_nonce(chain_nonce);

        let tx = TransactionRequest::default()
            .with_from(wallet.address())
            .with_to(transfer.to)
            .with_value(transfer.value)
            .with_nonce(wallet.get_and_increment_nonce())
            .with_chain_id(wallet.chain_id())
            .with_gas_limit(estimate.gas_limit)
            .with_max_fee_per_gas(estimate.fees.max_fee_per_gas)
            .with_max_priority_fee_per_gas(estimate.fees.max_priority_fee_per_gas);

        let envelope = tx
            .build(&wallet.ethereum_wallet())
            .await
            .map_err(|e| BlockchainError::Wallet(format!("Signing failed: {}", e)))?;
        let encoded = envelope.encoded_2718();

        match timeout(self.timeout_duration, self.provider.send_raw_transaction(&encoded)).await {
            Ok(Ok(pending)) => Ok(*pending.tx_hash()),
            Ok(Err(e)) if e.as_error_resp().is_some() => {
                Err(BlockchainError::Submission(e.to_string()))
            }
            Ok(Err(e)) => Err(BlockchainError::Rpc(format!("eth_sendRawTransaction: {}", e))),
            Err(_) => Err(BlockchainError::Timeout(self.timeout_duration.as_secs())),
        }
    }

    async fn transaction_receipt(&self, tx_hash: TxHash) -> BlockchainResult<Option<ReceiptSummary>> {
        let receipt = self
            .call(
                "eth_getTransactionReceipt",
                self.provider.get_transaction_receipt(tx_hash),
            )
            .await?;
        Ok(receipt.map(|r| ReceiptSummary {
            tx_hash: r.transaction_hash,
            success: r.status(),
            block_number: r.block_number,
        }))
    }
}

impl std::fmt::Debug for AlloyRpc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlloyRpc")
            .field("endpoint", &self.endpoint.to_string())
            .field("timeout_secs", &self.timeout_duration.as_secs())
            .finish()
    }
}

/// Connects pool endpoints over HTTP.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    rpc_timeout: Duration,
}

impl HttpConnector {
    pub fn new(rpc_timeout: Duration) -> Self {
        Self { rpc_timeout }
    }
}

impl RpcConnector for HttpConnector {
    fn connect(&self, endpoint: &Endpoint) -> BlockchainResult<Arc<dyn ChainRpc>> {
        Ok(Arc::new(AlloyRpc::new(endpoint.clone(), self.rpc_timeout)))
    }
}

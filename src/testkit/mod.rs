//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! - [`MockChain`]: scripted in-memory `ChainRpc` that records calls
//! - [`MockConnector`]: maps endpoint URLs to mock chains; unknown URLs are unreachable

use alloy::primitives::{keccak256, Address, TxHash, U256};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::blockchain::client::{ChainRpc, RpcConnector};
use crate::blockchain::endpoints::Endpoint;
use crate::blockchain::types::{
    native_to_wei, BlockchainError, BlockchainResult, FeeData, FeeEstimate, ReceiptSummary,
    TransferRequest,
};
use crate::blockchain::wallet::Wallet;

/// Anvil's first account. Publicly known; never fund it.
pub const TEST_PRIVATE_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

pub fn test_wallet() -> Wallet {
    Wallet::from_private_key(TEST_PRIVATE_KEY, 1).expect("test key is valid")
}

/// How `send_transfer` responds.
#[derive(Debug, Clone)]
pub enum SubmitBehavior {
    Accept,
    /// Node rejects the transaction (nonce too low, underpriced, ...).
    Reject(String),
    /// Transport drops before the node answers.
    Drop,
}

/// How `transaction_receipt` responds.
#[derive(Debug, Clone)]
pub enum ReceiptScript {
    /// `None` for the first `polls` polls, then a receipt.
    PendingThen { polls: usize, success: bool, block: u64 },
    /// Every poll errors.
    Failing,
    /// Never mined.
    NeverMined,
}

#[derive(Debug)]
struct MockState {
    reachable: bool,
    block_number: u64,
    balance: Result<U256, String>,
    gas_estimate: Result<u64, String>,
    fee_data: Result<FeeData, String>,
    submit: SubmitBehavior,
    submit_delay: Option<Duration>,
    receipt_script: ReceiptScript,
    probes: usize,
    balance_reads: usize,
    receipt_polls: usize,
    submissions: Vec<(TransferRequest, FeeEstimate)>,
}

/// Scripted in-memory chain endpoint.
#[derive(Debug)]
pub struct MockChain {
    state: Mutex<MockState>,
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                reachable: true,
                block_number: 100,
                balance: Ok(U256::ZERO),
                gas_estimate: Ok(21_000),
                fee_data: Ok(FeeData {
                    max_fee_per_gas: 30_000_000_000,
                    max_priority_fee_per_gas: 1_000_000_000,
                }),
                submit: SubmitBehavior::Accept,
                submit_delay: None,
                receipt_script: ReceiptScript::PendingThen { polls: 0, success: true, block: 101 },
                probes: 0,
                balance_reads: 0,
                receipt_polls: 0,
                submissions: Vec::new(),
            }),
        }
    }

    pub fn unreachable() -> Self {
        let chain = Self::new();
        chain.set_reachable(false);
        chain
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.state.lock().unwrap().reachable = reachable;
    }

    pub fn set_balance_native(&self, amount: Decimal) {
        self.state.lock().unwrap().balance = Ok(native_to_wei(amount).unwrap());
    }

    pub fn fail_balance(&self, message: &str) {
        self.state.lock().unwrap().balance = Err(message.to_string());
    }

    pub fn set_gas_estimate(&self, estimate: Result<u64, String>) {
        self.state.lock().unwrap().gas_estimate = estimate;
    }

    pub fn set_fee_data(&self, fees: Result<FeeData, String>) {
        self.state.lock().unwrap().fee_data = fees;
    }

    pub fn set_submit(&self, behavior: SubmitBehavior) {
        self.state.lock().unwrap().submit = behavior;
    }

    pub fn set_submit_delay(&self, delay: Duration) {
        self.state.lock().unwrap().submit_delay = Some(delay);
    }

    pub fn set_receipt_script(&self, script: ReceiptScript) {
        self.state.lock().unwrap().receipt_script = script;
    }

    pub fn probes(&self) -> usize {
        self.state.lock().unwrap().probes
    }

    pub fn balance_reads(&self) -> usize {
        self.state.lock().unwrap().balance_reads
    }

    pub fn submissions(&self) -> Vec<(TransferRequest, FeeEstimate)> {
        self.state.lock().unwrap().submissions.clone()
    }

    fn check_reachable(state: &MockState) -> BlockchainResult<()> {
        if state.reachable {
            Ok(())
        } else {
            Err(BlockchainError::Rpc("connection refused".to_string()))
        }
    }
}

#[async_trait]
impl ChainRpc for MockChain {
    async fn block_number(&self) -> BlockchainResult<u64> {
        let mut state = self.state.lock().unwrap();
        state.probes += 1;
        Self::check_reachable(&state)?;
        Ok(state.block_number)
    }

    async fn balance(&self, _address: Address) -> BlockchainResult<U256> {
        let mut state = self.state.lock().unwrap();
        state.balance_reads += 1;
        Self::check_reachable(&state)?;
        state.balance.clone().map_err(BlockchainError::Rpc)
    }

    async fn estimate_gas(&self, _transfer: &TransferRequest) -> BlockchainResult<u64> {
        let state = self.state.lock().unwrap();
        Self::check_reachable(&state)?;
        state.gas_estimate.clone().map_err(BlockchainError::Rpc)
    }

    async fn fee_data(&self) -> BlockchainResult<FeeData> {
        let state = self.state.lock().unwrap();
        Self::check_reachable(&state)?;
        state.fee_data.clone().map_err(BlockchainError::Rpc)
    }

    async fn send_transfer(
        &self,
        _wallet: &Wallet,
        transfer: &TransferRequest,
        estimate: &FeeEstimate,
    ) -> BlockchainResult<TxHash> {
        let delay = self.state.lock().unwrap().submit_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        Self::check_reachable(&state)?;
        match state.submit.clone() {
            SubmitBehavior::Accept => {
                state.submissions.push((transfer.clone(), *estimate));
                if let Ok(balance) = state.balance {
                    state.balance = Ok(balance.saturating_sub(transfer.value));
                }
                let sequence = state.submissions.len() as u64;
                Ok(keccak256(sequence.to_be_bytes()))
            }
            SubmitBehavior::Reject(reason) => Err(BlockchainError::Submission(reason)),
            SubmitBehavior::Drop => Err(BlockchainError::Rpc("connection reset".to_string())),
        }
    }

    async fn transaction_receipt(&self, tx_hash: TxHash) -> BlockchainResult<Option<ReceiptSummary>> {
        let mut state = self.state.lock().unwrap();
        state.receipt_polls += 1;
        match state.receipt_script.clone() {
            ReceiptScript::PendingThen { polls, success, block } => {
                if state.receipt_polls <= polls {
                    Ok(None)
                } else {
                    Ok(Some(ReceiptSummary {
                        tx_hash,
                        success,
                        block_number: Some(block),
                    }))
                }
            }
            ReceiptScript::Failing => Err(BlockchainError::Rpc("connection reset".to_string())),
            ReceiptScript::NeverMined => Ok(None),
        }
    }
}

/// Connector resolving endpoints to registered mock chains.
#[derive(Debug, Default)]
pub struct MockConnector {
    chains: Mutex<HashMap<String, Arc<MockChain>>>,
    connects: Mutex<usize>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a chain under `url` and return a handle for scripting it.
    pub fn register(&self, url: &str, chain: MockChain) -> Arc<MockChain> {
        let endpoint = Endpoint::parse(url).expect("test URL is valid");
        let chain = Arc::new(chain);
        self.chains
            .lock()
            .unwrap()
            .insert(endpoint.to_string(), chain.clone());
        chain
    }

    pub fn connects(&self) -> usize {
        *self.connects.lock().unwrap()
    }
}

impl RpcConnector for MockConnector {
    fn connect(&self, endpoint: &Endpoint) -> BlockchainResult<Arc<dyn ChainRpc>> {
        *self.connects.lock().unwrap() += 1;
        let chain: Arc<dyn ChainRpc> = match self.chains.lock().unwrap().get(&endpoint.to_string()) {
            Some(chain) => chain.clone(),
            None => Arc::new(MockChain::unreachable()),
        };
        Ok(chain)
    }
}

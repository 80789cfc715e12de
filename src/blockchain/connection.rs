//! Process-wide chain connection with endpoint failover.
//!
//! # Responsibilities
//! - Own the single live `Connection` and its bound `Signer`
//! - Find a working endpoint by probing the pool in rotation order
//! - Hand out cheap clones to callers for the duration of one operation
//!
//! # Two-tier acquisition
//! ```text
//! acquire_connection()        cached connection (with signer) → return, no probe
//!                             otherwise rotate + probe from last-known-good index
//! acquire_fresh_connection()  cached signer → return, no probe
//!                             otherwise rotate + probe, None if nothing answers
//! invalidate()                drop the live connection; next acquire rotates
//! ```
//!
//! All state transitions happen under one async mutex, so concurrent callers
//! never race to replace the connection.

use alloy::primitives::Address;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;

use crate::blockchain::client::{ChainRpc, RpcConnector};
use crate::blockchain::endpoints::{Endpoint, EndpointPool};
use crate::blockchain::types::{BlockchainError, BlockchainResult};
use crate::blockchain::wallet::Wallet;
use crate::observability::metrics;

/// The treasury key bound to one live connection.
#[derive(Clone)]
pub struct Signer {
    wallet: Wallet,
    rpc: Arc<dyn ChainRpc>,
    endpoint: Endpoint,
}

impl Signer {
    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    pub fn rpc(&self) -> &dyn ChainRpc {
        self.rpc.as_ref()
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("address", &self.address())
            .field("endpoint", &self.endpoint.to_string())
            .finish()
    }
}

/// An active link to one endpoint.
#[derive(Clone)]
pub struct Connection {
    index: usize,
    endpoint: Endpoint,
    rpc: Arc<dyn ChainRpc>,
    signer: Option<Signer>,
}

impl Connection {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn rpc(&self) -> &dyn ChainRpc {
        self.rpc.as_ref()
    }

    pub fn signer(&self) -> Option<&Signer> {
        self.signer.as_ref()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("index", &self.index)
            .field("endpoint", &self.endpoint.to_string())
            .field("signer", &self.signer)
            .finish()
    }
}

#[derive(Default)]
struct ConnectionState {
    active: Option<Connection>,
    /// Rotation start: the last endpoint that answered a probe.
    start_index: usize,
}

/// Owner of the process-wide connection.
pub struct ConnectionManager {
    pool: EndpointPool,
    connector: Arc<dyn RpcConnector>,
    wallet: Option<Wallet>,
    /// Shown when no key is configured.
    fallback_address: Option<Address>,
    probe_timeout: Duration,
    state: Mutex<ConnectionState>,
}

impl ConnectionManager {
    pub fn new(
        pool: EndpointPool,
        connector: Arc<dyn RpcConnector>,
        wallet: Option<Wallet>,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            pool,
            connector,
            wallet,
            fallback_address: None,
            probe_timeout,
            state: Mutex::new(ConnectionState::default()),
        }
    }

    /// Address reported as the treasury when running without a key.
    pub fn with_fallback_address(mut self, address: Option<Address>) -> Self {
        self.fallback_address = address;
        self
    }

    pub fn has_signing_key(&self) -> bool {
        self.wallet.is_some()
    }

    /// The treasury address: the key's address, else the configured fallback.
    pub fn treasury_address(&self) -> Option<Address> {
        self.wallet
            .as_ref()
            .map(Wallet::address)
            .or(self.fallback_address)
    }

    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.active.is_some()
    }

    pub async fn current_endpoint(&self) -> Option<Endpoint> {
        self.state
            .lock()
            .await
            .active
            .as_ref()
            .map(|c| c.endpoint.clone())
    }

    /// Return the live connection, establishing one if needed.
    ///
    /// A cached connection is reused without probing when it carries a signer
    /// (or when no key is configured, since it never could).
    pub async fn acquire_connection(&self) -> BlockchainResult<Connection> {
        let mut state = self.state.lock().await;

        if let Some(active) = &state.active {
            if active.signer.is_some() || self.wallet.is_none() {
                return Ok(active.clone());
            }
        }

        match self.establish(&mut state).await {
            Some(connection) => Ok(connection),
            None => {
                state.active = None;
                Err(BlockchainError::NoReachableEndpoint {
                    attempted: self.pool.len(),
                })
            }
        }
    }

    /// Return a signer for committing funds.
    ///
    /// A cached signer is returned directly. Otherwise the pool is rotated from
    /// the current index; `None` when no key is configured or no endpoint answers.
    pub async fn acquire_fresh_connection(&self) -> Option<Signer> {
        if self.wallet.is_none() {
            tracing::warn!("No treasury key configured; signer unavailable");
            return None;
        }

        let mut state = self.state.lock().await;

        if let Some(signer) = state.active.as_ref().and_then(|c| c.signer.clone()) {
            return Some(signer);
        }

        let signer = self.establish(&mut state).await.and_then(|c| c.signer);
        if signer.is_none() {
            state.active = None;
        }
        signer
    }

    /// Drop the live connection so the next acquisition probes the pool.
    ///
    /// The rotation start moves past the failed endpoint.
    pub async fn invalidate(&self, reason: &str) {
        let mut state = self.state.lock().await;
        if let Some(active) = state.active.take() {
            tracing::warn!(
                endpoint = %active.endpoint,
                reason = reason,
                "Dropping chain connection"
            );
            if !self.pool.is_empty() {
                state.start_index = (active.index + 1) % self.pool.len();
            }
        }
    }

    /// Rotate through the pool, probing each endpoint, and install the first
    /// that answers. Caller holds the state lock.
    async fn establish(&self, state: &mut ConnectionState) -> Option<Connection> {
        let previous = state.active.as_ref().map(|c| c.index);

        for (index, endpoint) in self.pool.rotation(state.start_index) {
            tracing::debug!(endpoint = %endpoint, index, "Probing RPC endpoint");

            let rpc = match self.connector.connect(endpoint) {
                Ok(rpc) => rpc,
                Err(e) => {
                    tracing::warn!(endpoint = %endpoint, error = %e, "Failed to open RPC session");
                    metrics::record_endpoint_probe(false);
                    continue;
                }
            };

            let block = match timeout(self.probe_timeout, rpc.block_number()).await {
                Ok(Ok(block)) => block,
                Ok(Err(e)) => {
                    tracing::warn!(endpoint = %endpoint, error = %e, "Endpoint probe failed");
                    metrics::record_endpoint_probe(false);
                    continue;
                }
                Err(_) => {
                    tracing::warn!(
                        endpoint = %endpoint,
                        timeout_secs = self.probe_timeout.as_secs(),
                        "Endpoint probe timed out"
                    );
                    metrics::record_endpoint_probe(false);
                    continue;
                }
            };
            metrics::record_endpoint_probe(true);

            let signer = self.wallet.as_ref().map(|wallet| Signer {
                wallet: wallet.clone(),
                rpc: rpc.clone(),
                endpoint: endpoint.clone(),
            });

            let connection = Connection {
                index,
                endpoint: endpoint.clone(),
                rpc,
                signer,
            };

            if previous.is_some_and(|p| p != index) {
                metrics::record_failover();
            }
            tracing::info!(
                endpoint = %endpoint,
                index,
                block,
                treasury = ?self.treasury_address(),
                "Connected to chain"
            );

            state.start_index = index;
            state.active = Some(connection.clone());
            return Some(connection);
        }

        tracing::error!(attempted = self.pool.len(), "All RPC endpoints failed");
        None
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoints", &self.pool.len())
            .field("has_signing_key", &self.wallet.is_some())
            .field("probe_timeout_secs", &self.probe_timeout.as_secs())
            .finish()
    }
}

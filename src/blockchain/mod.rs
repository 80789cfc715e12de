//! Blockchain integration subsystem.
//!
//! # Data Flow
//! ```text
//! Environment (TREASURY_PRIVATE_KEY) + config (endpoint list)
//!     → wallet.rs (key loading, nonce)
//!     → endpoints.rs (ordered endpoint pool)
//!     → connection.rs (probe, failover, signer binding)
//!     → client.rs (JSON-RPC calls with timeouts)
//!     → transaction.rs (fee estimation, confirmation wait)
//! ```
//!
//! # Security Constraints
//! - Private keys ONLY from environment variables
//! - Never log private keys or sensitive data
//! - All RPC calls have timeouts
//! - Graceful degradation when the chain is unreachable

pub mod client;
pub mod connection;
pub mod endpoints;
pub mod transaction;
pub mod types;
pub mod wallet;

pub use client::{ChainRpc, HttpConnector, RpcConnector};
pub use connection::{Connection, ConnectionManager, Signer};
pub use endpoints::{Endpoint, EndpointPool};
pub use types::{BlockchainConfig, BlockchainError, BlockchainResult};
pub use wallet::Wallet;

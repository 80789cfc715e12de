//! Treasury core.
//!
//! # Data Flow
//! ```text
//! adapters (HTTP)
//!     → service.rs (facade, status views, ledger coupling)
//!     → balance.rs (balance reads over the shared connection)
//!     → withdrawal.rs (serialized on-chain transfers)
//!     → types.rs (results and error taxonomy)
//! ```

pub mod balance;
pub mod service;
pub mod types;
pub mod withdrawal;

pub use balance::BalanceService;
pub use service::{
    AccountingWithdrawal, BackendAllocation, BalanceView, HealthReport, ServiceStatus,
    TreasuryService,
};
pub use types::{BalanceReading, WithdrawalError, WithdrawalResult};
pub use withdrawal::WithdrawalExecutor;

//! Periodic auto-withdrawal.
//!
//! # Data Flow
//! ```text
//! interval tick ──▶ try_lock ──busy──▶ skip + count
//!                      │
//!                      ▼
//!              BalanceService ──below threshold──▶ AwaitingThreshold
//!                      │
//!                      ▼
//!              WithdrawalExecutor (sweep to payout) ──▶ Succeeded / Failed
//! ```

pub mod auto_withdrawal;

pub use auto_withdrawal::{AutoWithdrawalScheduler, SchedulerState, SchedulerStatus, SchedulerView, TickOutcome};

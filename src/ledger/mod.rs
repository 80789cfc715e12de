//! Earnings ledger.
//!
//! Volatile, process-lifetime accounting in USD. Nothing here moves funds.

pub mod earnings;

pub use earnings::{EarningsLedger, LedgerError, LedgerState, RecycleOutcome, RecycleSkip};

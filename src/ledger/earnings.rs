//! Accrued-earnings counters.
//!
//! # Invariants
//! - All four counters are non-negative
//! - Earnings are decremented with a floor at zero
//! - Only the operations below touch the counters

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Mutex;
use thiserror::Error;

use crate::config::{EconomicsConfig, LedgerConfig};
use crate::observability::metrics;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("amount must be greater than zero (got {0})")]
    NonPositiveAmount(Decimal),
}

/// Snapshot of the ledger counters, all in USD.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerState {
    pub earnings: Decimal,
    pub total_withdrawn: Decimal,
    pub total_sent_to_backend: Decimal,
    pub total_recycled: Decimal,
}

/// Why a recycle did not happen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum RecycleSkip {
    Disabled,
    /// Treasury still holds at least the gas reserve.
    SufficientGas,
    /// Balance could not be read; never recycle on a guess.
    BalanceUnknown,
    InsufficientEarnings { earnings: Decimal, required: Decimal },
}

/// Result of an auto-recycle check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum RecycleOutcome {
    Recycled {
        native: Decimal,
        usd: Decimal,
        remaining_earnings: Decimal,
    },
    Skipped(RecycleSkip),
}

/// In-memory earnings ledger.
#[derive(Debug)]
pub struct EarningsLedger {
    state: Mutex<LedgerState>,
    config: LedgerConfig,
    economics: EconomicsConfig,
}

impl EarningsLedger {
    pub fn new(config: LedgerConfig, economics: EconomicsConfig) -> Self {
        Self {
            state: Mutex::new(LedgerState::default()),
            config,
            economics,
        }
    }

    pub fn snapshot(&self) -> LedgerState {
        self.lock().clone()
    }

    /// Add to accrued earnings. Non-positive amounts are rejected and nothing changes.
    pub fn credit_earnings(&self, amount: Decimal) -> Result<Decimal, LedgerError> {
        ensure_positive(amount)?;
        let mut state = self.lock();
        state.earnings += amount;
        publish(&state);
        tracing::debug!(credited = %amount, earnings = %state.earnings, "Earnings credited");
        Ok(state.earnings)
    }

    /// Account for a withdrawal to the payout account. Accounting only.
    pub fn record_withdrawal(&self, usd: Decimal) -> Result<LedgerState, LedgerError> {
        ensure_positive(usd)?;
        let mut state = self.lock();
        state.earnings = (state.earnings - usd).max(Decimal::ZERO);
        state.total_withdrawn += usd;
        publish(&state);
        tracing::info!(amount_usd = %usd, earnings = %state.earnings, "Withdrawal recorded");
        Ok(state.clone())
    }

    /// Account for funds allocated back to the treasury.
    pub fn record_backend_transfer(&self, usd: Decimal) -> Result<LedgerState, LedgerError> {
        ensure_positive(usd)?;
        let mut state = self.lock();
        state.earnings = (state.earnings - usd).max(Decimal::ZERO);
        state.total_sent_to_backend += usd;
        publish(&state);
        tracing::info!(amount_usd = %usd, earnings = %state.earnings, "Backend transfer recorded");
        Ok(state.clone())
    }

    /// Convert one gas reserve worth of earnings into the recycled counter when
    /// the treasury is below its gas reserve.
    ///
    /// `treasury_balance` is `None` when the balance could not be read.
    pub fn auto_recycle(&self, treasury_balance: Option<Decimal>) -> RecycleOutcome {
        if !self.config.auto_recycle_enabled {
            return RecycleOutcome::Skipped(RecycleSkip::Disabled);
        }
        let Some(balance) = treasury_balance else {
            return RecycleOutcome::Skipped(RecycleSkip::BalanceUnknown);
        };
        if balance >= self.economics.gas_reserve_native {
            return RecycleOutcome::Skipped(RecycleSkip::SufficientGas);
        }

        let native = self.economics.gas_reserve_native;
        let usd = native * self.economics.price_usd;
        let required = self.config.recycle_min_earnings_usd.max(usd);

        let mut state = self.lock();
        if state.earnings < required {
            return RecycleOutcome::Skipped(RecycleSkip::InsufficientEarnings {
                earnings: state.earnings,
                required,
            });
        }

        state.earnings -= usd;
        state.total_recycled += usd;
        publish(&state);
        tracing::info!(
            recycled_usd = %usd,
            recycled_native = %native,
            earnings = %state.earnings,
            "Auto-recycled earnings into gas reserve"
        );

        RecycleOutcome::Recycled {
            native,
            usd,
            remaining_earnings: state.earnings,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LedgerState> {
        // Counters stay consistent even if a holder panicked mid-update
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn ensure_positive(amount: Decimal) -> Result<(), LedgerError> {
    if amount > Decimal::ZERO {
        Ok(())
    } else {
        Err(LedgerError::NonPositiveAmount(amount))
    }
}

fn publish(state: &LedgerState) {
    metrics::record_ledger_earnings(state.earnings.to_f64().unwrap_or_default());
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ledger() -> EarningsLedger {
        EarningsLedger::new(LedgerConfig::default(), EconomicsConfig::default())
    }

    #[test]
    fn test_negative_credit_ignored() {
        let ledger = ledger();
        assert_eq!(ledger.credit_earnings(dec!(50)).unwrap(), dec!(50));
        assert_eq!(
            ledger.credit_earnings(dec!(-5)),
            Err(LedgerError::NonPositiveAmount(dec!(-5)))
        );
        assert!(ledger.credit_earnings(Decimal::ZERO).is_err());
        assert_eq!(ledger.snapshot().earnings, dec!(50));
    }

    #[test]
    fn test_backend_transfers_clamp_at_zero() {
        let ledger = ledger();
        ledger.credit_earnings(dec!(40)).unwrap();
        for amount in [dec!(34.5), dec!(34.5), dec!(1000), dec!(0.01)] {
            let state = ledger.record_backend_transfer(amount).unwrap();
            assert!(state.earnings >= Decimal::ZERO);
        }
        let state = ledger.snapshot();
        assert_eq!(state.earnings, Decimal::ZERO);
        assert_eq!(state.total_sent_to_backend, dec!(1069.01));
    }

    #[test]
    fn test_record_withdrawal() {
        let ledger = ledger();
        ledger.credit_earnings(dec!(250)).unwrap();
        let state = ledger.record_withdrawal(dec!(100)).unwrap();
        assert_eq!(state.earnings, dec!(150));
        assert_eq!(state.total_withdrawn, dec!(100));
    }

    #[test]
    fn test_recycle_when_treasury_low() {
        let ledger = ledger();
        ledger.credit_earnings(dec!(50)).unwrap();

        let outcome = ledger.auto_recycle(Some(dec!(0.001)));
        assert_eq!(
            outcome,
            RecycleOutcome::Recycled {
                native: dec!(0.003),
                usd: dec!(10.35),
                remaining_earnings: dec!(39.65),
            }
        );
        assert_eq!(ledger.snapshot().total_recycled, dec!(10.35));
    }

    #[test]
    fn test_recycle_skips() {
        let ledger = ledger();
        ledger.credit_earnings(dec!(30)).unwrap();

        assert_eq!(
            ledger.auto_recycle(Some(dec!(0.5))),
            RecycleOutcome::Skipped(RecycleSkip::SufficientGas)
        );
        assert_eq!(
            ledger.auto_recycle(None),
            RecycleOutcome::Skipped(RecycleSkip::BalanceUnknown)
        );
        assert_eq!(
            ledger.auto_recycle(Some(Decimal::ZERO)),
            RecycleOutcome::Skipped(RecycleSkip::InsufficientEarnings {
                earnings: dec!(30),
                required: dec!(35),
            })
        );
        assert_eq!(ledger.snapshot().earnings, dec!(30));
    }

    #[test]
    fn test_recycle_disabled() {
        let config = LedgerConfig {
            auto_recycle_enabled: false,
            ..LedgerConfig::default()
        };
        let ledger = EarningsLedger::new(config, EconomicsConfig::default());
        ledger.credit_earnings(dec!(500)).unwrap();
        assert_eq!(
            ledger.auto_recycle(Some(Decimal::ZERO)),
            RecycleOutcome::Skipped(RecycleSkip::Disabled)
        );
    }
}

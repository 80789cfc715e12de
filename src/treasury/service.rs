//! Treasury facade.
//!
//! The single entry point for adapters (HTTP, CLI through HTTP). Owns the
//! connection manager, balance service, withdrawal executor, scheduler and
//! ledger, and combines them into the operator-facing views.

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::blockchain::types::parse_address;
use crate::blockchain::{BlockchainResult, ConnectionManager, EndpointPool, RpcConnector, Wallet};
use crate::config::{EconomicsConfig, LedgerConfig, TreasuryConfig};
use crate::ledger::{EarningsLedger, LedgerError, LedgerState, RecycleOutcome};
use crate::scheduler::{AutoWithdrawalScheduler, SchedulerView};
use crate::treasury::balance::BalanceService;
use crate::treasury::types::{BalanceReading, WithdrawalError, WithdrawalResult};
use crate::treasury::withdrawal::WithdrawalExecutor;

/// Full operator view returned by `status()`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub connected: bool,
    pub endpoint: Option<String>,
    pub treasury_address: Option<Address>,
    pub payout_address: Option<Address>,
    pub treasury_balance: Option<Decimal>,
    #[serde(rename = "treasuryBalanceUSD")]
    pub treasury_balance_usd: Option<Decimal>,
    pub balance_known: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance_error: Option<String>,
    pub can_trade: bool,
    pub ledger: LedgerState,
    pub recycle: RecycleOutcome,
    #[serde(rename = "autoWithdrawal")]
    pub scheduler: SchedulerView,
    pub timestamp: DateTime<Utc>,
}

/// Liveness summary returned by `health()`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub connected: bool,
    pub endpoint: Option<String>,
    pub signing_enabled: bool,
    pub earnings: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Treasury balance view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceView {
    pub treasury_address: Option<Address>,
    pub balance: Option<Decimal>,
    #[serde(rename = "balanceUSD")]
    pub balance_usd: Option<Decimal>,
    pub balance_known: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub can_trade: bool,
    pub gas_reserve: Decimal,
}

/// Result of an accounting-only withdrawal.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountingWithdrawal {
    #[serde(rename = "amountUSD")]
    pub amount_usd: Decimal,
    #[serde(rename = "amountETH")]
    pub amount_native: Decimal,
    pub to: Option<Address>,
    pub remaining_earnings: Decimal,
}

/// Result of an accounting allocation to the treasury.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendAllocation {
    pub allocated: Decimal,
    #[serde(rename = "allocatedUSD")]
    pub allocated_usd: Decimal,
    pub to: Option<Address>,
    pub remaining_earnings: Decimal,
}

pub struct TreasuryService {
    connections: Arc<ConnectionManager>,
    balances: Arc<BalanceService>,
    executor: Arc<WithdrawalExecutor>,
    scheduler: Arc<AutoWithdrawalScheduler>,
    ledger: Arc<EarningsLedger>,
    economics: EconomicsConfig,
    ledger_config: LedgerConfig,
    payout: Option<Address>,
}

impl TreasuryService {
    /// Wire up every component from configuration.
    ///
    /// `wallet` is `None` when no key is configured: accounting still works,
    /// on-chain operations report connectivity failures.
    pub fn new(
        config: &TreasuryConfig,
        connector: Arc<dyn RpcConnector>,
        wallet: Option<Wallet>,
    ) -> BlockchainResult<Self> {
        let payout = parse_address(config.wallets.payout_address.as_deref())?;
        let fallback = parse_address(config.wallets.treasury_address.as_deref())?;
        let signing_enabled = wallet.is_some();

        let connections = Arc::new(
            ConnectionManager::new(
                EndpointPool::from_urls(&config.blockchain.endpoints),
                connector,
                wallet,
                Duration::from_secs(config.blockchain.probe_timeout_secs),
            )
            .with_fallback_address(fallback),
        );
        let balances = Arc::new(BalanceService::new(connections.clone(), config.economics.clone()));
        let executor = Arc::new(WithdrawalExecutor::new(
            connections.clone(),
            &config.economics,
            &config.blockchain,
        ));
        let scheduler = Arc::new(AutoWithdrawalScheduler::new(
            config.scheduler.clone(),
            balances.clone(),
            executor.clone(),
            payout,
            signing_enabled,
        ));

        if payout.is_none() {
            tracing::warn!("No payout address configured; auto-withdrawal disabled");
        }
        if !signing_enabled {
            tracing::warn!("No treasury key configured; running accounting-only");
        }

        Ok(Self {
            connections,
            balances,
            executor,
            scheduler,
            ledger: Arc::new(EarningsLedger::new(config.ledger.clone(), config.economics.clone())),
            economics: config.economics.clone(),
            ledger_config: config.ledger.clone(),
            payout,
        })
    }

    pub fn scheduler(&self) -> Arc<AutoWithdrawalScheduler> {
        self.scheduler.clone()
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    pub fn payout_address(&self) -> Option<Address> {
        self.payout
    }

    pub fn credit_earnings(&self, amount: Decimal) -> Result<Decimal, LedgerError> {
        self.ledger.credit_earnings(amount)
    }

    pub fn earnings(&self) -> LedgerState {
        self.ledger.snapshot()
    }

    /// Build the status view. Runs the auto-recycle check against the fresh
    /// balance first.
    pub async fn status(&self) -> ServiceStatus {
        let reading = self.balances.treasury_balance().await;
        let recycle = self.ledger.auto_recycle(reading.known());
        let balance = reading.known();

        ServiceStatus {
            connected: self.connections.is_connected().await,
            endpoint: self.connections.current_endpoint().await.map(|e| e.to_string()),
            treasury_address: self.connections.treasury_address(),
            payout_address: self.payout,
            treasury_balance: balance,
            treasury_balance_usd: balance.map(|b| self.balances.fiat_value(b)),
            balance_known: reading.is_known(),
            balance_error: unavailable_reason(&reading),
            can_trade: self.can_trade(&reading),
            ledger: self.ledger.snapshot(),
            recycle,
            scheduler: self.scheduler.view(),
            timestamp: Utc::now(),
        }
    }

    pub async fn balance(&self) -> BalanceView {
        let reading = self.balances.treasury_balance().await;
        BalanceView {
            treasury_address: self.connections.treasury_address(),
            balance: reading.known(),
            balance_usd: reading.known().map(|b| self.balances.fiat_value(b)),
            balance_known: reading.is_known(),
            error: unavailable_reason(&reading),
            can_trade: self.can_trade(&reading),
            gas_reserve: self.economics.gas_reserve_native,
        }
    }

    /// Probe connectivity and summarize.
    pub async fn health(&self) -> HealthReport {
        let connected = match self.connections.acquire_connection().await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Health check: chain unreachable");
                false
            }
        };

        HealthReport {
            status: if connected { "healthy" } else { "degraded" },
            connected,
            endpoint: self.connections.current_endpoint().await.map(|e| e.to_string()),
            signing_enabled: self.connections.has_signing_key(),
            earnings: self.ledger.snapshot().earnings,
            timestamp: Utc::now(),
        }
    }

    /// On-chain withdrawal. Zero sweeps; the destination defaults to the
    /// payout address. The ledger is only touched on success. The attempt
    /// finishes and is accounted even if the caller stops waiting.
    pub async fn request_withdrawal(
        &self,
        amount: Decimal,
        destination: Option<Address>,
    ) -> WithdrawalResult {
        let Some(destination) = destination.or(self.payout) else {
            return WithdrawalResult::failed(&WithdrawalError::NoDestination);
        };

        // Runs detached so a dropped caller cannot cut it off between
        // submission and accounting.
        let executor = Arc::clone(&self.executor);
        let ledger = Arc::clone(&self.ledger);
        let attempt = tokio::spawn(async move {
            let result = executor.execute_withdrawal(amount, destination).await;
            if let (true, Some(usd)) = (result.success, result.amount_usd) {
                if let Err(e) = ledger.record_withdrawal(usd) {
                    tracing::debug!(error = %e, "Withdrawal too small to account");
                }
            }
            result
        });

        match attempt.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "Withdrawal task failed");
                WithdrawalResult::failed(&WithdrawalError::ConfirmationAmbiguous {
                    tx_hash: None,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Accounting-only withdrawal to the payout account.
    pub fn record_accounting_withdrawal(
        &self,
        usd: Option<Decimal>,
        to: Option<Address>,
    ) -> Result<AccountingWithdrawal, LedgerError> {
        let usd = usd.unwrap_or(self.ledger_config.accounting_withdrawal_usd);
        let state = self.ledger.record_withdrawal(usd)?;

        Ok(AccountingWithdrawal {
            amount_usd: usd,
            amount_native: (usd / self.economics.price_usd).round_dp(6),
            to: to.or(self.payout),
            remaining_earnings: state.earnings,
        })
    }

    /// Accounting allocation of native funds back to the treasury. Returns the
    /// USD figure charged against earnings.
    pub fn request_backend_transfer(
        &self,
        amount_native: Option<Decimal>,
    ) -> Result<BackendAllocation, LedgerError> {
        let native = amount_native.unwrap_or(self.ledger_config.backend_allocation_native);
        let usd = self.balances.fiat_value(native);
        let state = self.ledger.record_backend_transfer(usd)?;

        Ok(BackendAllocation {
            allocated: native,
            allocated_usd: usd,
            to: self.connections.treasury_address(),
            remaining_earnings: state.earnings,
        })
    }

    fn can_trade(&self, reading: &BalanceReading) -> bool {
        reading
            .known()
            .is_some_and(|b| b >= self.economics.gas_reserve_native)
    }
}

impl std::fmt::Debug for TreasuryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreasuryService")
            .field("connections", &self.connections)
            .field("payout", &self.payout)
            .finish()
    }
}

fn unavailable_reason(reading: &BalanceReading) -> Option<String> {
    match reading {
        BalanceReading::Known(_) => None,
        BalanceReading::Unavailable(reason) => Some(reason.clone()),
    }
}

//! Auto-withdrawal scheduler.
//!
//! # Design Decisions
//! - State is an `ArcSwap` snapshot: status readers never wait on a run
//! - Runs never overlap; a tick that finds a run in flight is skipped
//! - The first tick fires immediately at start

use alloy::primitives::Address;
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinSet;
use tokio::time::{interval, MissedTickBehavior};

use crate::config::SchedulerConfig;
use crate::observability::metrics;
use crate::treasury::balance::BalanceService;
use crate::treasury::types::BalanceReading;
use crate::treasury::withdrawal::WithdrawalExecutor;

/// What the scheduler last did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerStatus {
    Inactive,
    Disabled,
    BalanceUnavailable(String),
    AwaitingThreshold {
        balance_usd: Decimal,
        threshold_usd: Decimal,
    },
    Executing,
    Succeeded {
        amount: Decimal,
        amount_usd: Decimal,
        tx_hash: String,
    },
    Failed {
        error: String,
    },
}

impl fmt::Display for SchedulerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerStatus::Inactive => write!(f, "Inactive (awaiting first run)"),
            SchedulerStatus::Disabled => {
                write!(f, "Disabled (check configuration, signing key or payout address)")
            }
            SchedulerStatus::BalanceUnavailable(reason) => {
                write!(f, "Balance unavailable: {}", reason)
            }
            SchedulerStatus::AwaitingThreshold {
                balance_usd,
                threshold_usd,
            } => write!(
                f,
                "Awaiting threshold. Balance: ${:.2}/${}",
                balance_usd,
                threshold_usd.normalize()
            ),
            SchedulerStatus::Executing => write!(f, "Executing withdrawal..."),
            SchedulerStatus::Succeeded {
                amount,
                amount_usd,
                tx_hash,
            } => {
                let short: String = tx_hash.chars().take(10).collect();
                write!(
                    f,
                    "Success. Sent {:.6} ETH (${:.2}) to payout wallet. TX: {}...",
                    amount, amount_usd, short
                )
            }
            SchedulerStatus::Failed { error } => write!(f, "Failed: {}", error),
        }
    }
}

impl Serialize for SchedulerStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Snapshot of scheduler progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerState {
    pub status: SchedulerStatus,
    pub runs: u64,
    pub skipped_ticks: u64,
    pub last_success: Option<DateTime<Utc>>,
}

impl Default for SchedulerState {
    fn default() -> Self {
        Self {
            status: SchedulerStatus::Inactive,
            runs: 0,
            skipped_ticks: 0,
            last_success: None,
        }
    }
}

/// Scheduler state plus its configuration, for status reporting.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerView {
    pub enabled: bool,
    #[serde(rename = "thresholdUSD")]
    pub threshold_usd: Decimal,
    pub interval_secs: u64,
    #[serde(flatten)]
    pub state: SchedulerState,
}

/// Whether a tick did any work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Ran,
    Skipped,
}

pub struct AutoWithdrawalScheduler {
    config: SchedulerConfig,
    balances: Arc<BalanceService>,
    executor: Arc<WithdrawalExecutor>,
    payout: Option<Address>,
    signing_enabled: bool,
    state: ArcSwap<SchedulerState>,
    running: Mutex<()>,
}

impl AutoWithdrawalScheduler {
    pub fn new(
        config: SchedulerConfig,
        balances: Arc<BalanceService>,
        executor: Arc<WithdrawalExecutor>,
        payout: Option<Address>,
        signing_enabled: bool,
    ) -> Self {
        Self {
            config,
            balances,
            executor,
            payout,
            signing_enabled,
            state: ArcSwap::from_pointee(SchedulerState::default()),
            running: Mutex::new(()),
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state.load().as_ref().clone()
    }

    pub fn view(&self) -> SchedulerView {
        SchedulerView {
            enabled: self.is_enabled(),
            threshold_usd: self.config.threshold_usd,
            interval_secs: self.config.interval_secs,
            state: self.state(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled && self.signing_enabled && self.payout.is_some()
    }

    /// Run until shutdown. Each tick runs on its own task so a slow withdrawal
    /// never delays the clock; an attempt in flight at shutdown is awaited.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = interval(Duration::from_secs(self.config.interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            interval_secs = self.config.interval_secs,
            threshold_usd = %self.config.threshold_usd,
            enabled = self.is_enabled(),
            "Auto-withdrawal scheduler started"
        );

        let mut ticks = JoinSet::new();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let scheduler = self.clone();
                    ticks.spawn(async move {
                        scheduler.tick().await;
                    });
                }
                Some(joined) = ticks.join_next(), if !ticks.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!(error = %e, "Auto-withdrawal task failed");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Auto-withdrawal scheduler stopping");
                    break;
                }
            }
        }

        if !ticks.is_empty() {
            tracing::info!(
                status = %self.state().status,
                "Waiting for in-flight auto-withdrawal before exit"
            );
        }
        while let Some(joined) = ticks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Auto-withdrawal task failed");
            }
        }
        tracing::info!(status = %self.state().status, "Auto-withdrawal scheduler stopped");
    }

    /// One scheduled attempt, skipped if the previous one is still in flight.
    pub async fn tick(&self) -> TickOutcome {
        let Ok(_guard) = self.running.try_lock() else {
            self.state.rcu(|state| SchedulerState {
                skipped_ticks: state.skipped_ticks + 1,
                ..SchedulerState::clone(state)
            });
            metrics::record_scheduler_run("skipped");
            tracing::warn!("Auto-withdrawal still running; tick skipped");
            return TickOutcome::Skipped;
        };

        self.run_auto_withdrawal().await;
        TickOutcome::Ran
    }

    async fn run_auto_withdrawal(&self) {
        self.state.rcu(|state| SchedulerState {
            runs: state.runs + 1,
            ..SchedulerState::clone(state)
        });

        let payout = match self.payout {
            Some(payout) if self.config.enabled && self.signing_enabled => payout,
            _ => {
                self.set_status(SchedulerStatus::Disabled);
                metrics::record_scheduler_run("disabled");
                return;
            }
        };

        let balance = match self.balances.treasury_balance().await {
            BalanceReading::Known(balance) => balance,
            BalanceReading::Unavailable(reason) => {
                self.set_status(SchedulerStatus::BalanceUnavailable(reason));
                metrics::record_scheduler_run("balance_unavailable");
                return;
            }
        };

        // Gate on the exact value; rounding is for display only
        let exact_usd = balance * self.balances.price_usd();
        let balance_usd = self.balances.fiat_value(balance);
        if exact_usd < self.config.threshold_usd {
            tracing::debug!(
                balance_usd = %exact_usd,
                threshold_usd = %self.config.threshold_usd,
                "Below auto-withdrawal threshold"
            );
            self.set_status(SchedulerStatus::AwaitingThreshold {
                balance_usd,
                threshold_usd: self.config.threshold_usd,
            });
            metrics::record_scheduler_run("below_threshold");
            return;
        }

        tracing::info!(balance_usd = %balance_usd, payout = %payout, "Threshold reached, sweeping treasury");
        self.set_status(SchedulerStatus::Executing);

        let result = self.executor.execute_withdrawal(Decimal::ZERO, payout).await;

        match (result.success, result.tx_hash, result.amount, result.amount_usd) {
            (true, Some(tx_hash), Some(amount), Some(amount_usd)) => {
                self.state.rcu(|state| SchedulerState {
                    status: SchedulerStatus::Succeeded {
                        amount,
                        amount_usd,
                        tx_hash: tx_hash.to_string(),
                    },
                    last_success: Some(Utc::now()),
                    ..SchedulerState::clone(state)
                });
                metrics::record_scheduler_run("success");
            }
            _ => {
                self.set_status(SchedulerStatus::Failed {
                    error: result.error.unwrap_or_else(|| "unknown error".to_string()),
                });
                metrics::record_scheduler_run("failed");
            }
        }
    }

    fn set_status(&self, status: SchedulerStatus) {
        self.state.rcu(|state| SchedulerState {
            status: status.clone(),
            ..SchedulerState::clone(state)
        });
    }
}

impl fmt::Debug for AutoWithdrawalScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutoWithdrawalScheduler")
            .field("enabled", &self.is_enabled())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::{BlockchainConfig, ConnectionManager, EndpointPool};
    use crate::config::EconomicsConfig;
    use crate::testkit::{test_wallet, MockChain, MockConnector};
    use rust_decimal_macros::dec;

    const PRIMARY: &str = "http://primary.invalid";

    fn scheduler(chain: MockChain, payout: Option<Address>) -> (Arc<AutoWithdrawalScheduler>, Arc<MockChain>) {
        let connector = Arc::new(MockConnector::new());
        let chain = connector.register(PRIMARY, chain);
        let connections = Arc::new(ConnectionManager::new(
            EndpointPool::from_urls(&[PRIMARY]),
            connector,
            Some(test_wallet()),
            Duration::from_secs(5),
        ));
        let economics = EconomicsConfig::default();
        let balances = Arc::new(BalanceService::new(connections.clone(), economics.clone()));
        let executor = Arc::new(WithdrawalExecutor::new(
            connections,
            &economics,
            &BlockchainConfig::default(),
        ));
        let scheduler = AutoWithdrawalScheduler::new(
            SchedulerConfig::default(),
            balances,
            executor,
            payout,
            true,
        );
        (Arc::new(scheduler), chain)
    }

    #[test]
    fn test_status_rendering() {
        let awaiting = SchedulerStatus::AwaitingThreshold {
            balance_usd: dec!(690),
            threshold_usd: dec!(1000),
        };
        assert_eq!(awaiting.to_string(), "Awaiting threshold. Balance: $690.00/$1000");

        let success = SchedulerStatus::Succeeded {
            amount: dec!(0.347),
            amount_usd: dec!(1197.15),
            tx_hash: "0xabcdef0123456789".to_string(),
        };
        assert_eq!(
            success.to_string(),
            "Success. Sent 0.347000 ETH ($1197.15) to payout wallet. TX: 0xabcdef01..."
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_below_threshold_does_not_withdraw() {
        let chain = MockChain::new();
        chain.set_balance_native(dec!(0.2));
        let (scheduler, chain) = scheduler(chain, Some(Address::repeat_byte(0x42)));

        assert_eq!(scheduler.tick().await, TickOutcome::Ran);

        let state = scheduler.state();
        assert_eq!(state.runs, 1);
        assert_eq!(state.status.to_string(), "Awaiting threshold. Balance: $690.00/$1000");
        assert!(chain.submissions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_at_threshold_withdraws_once_per_tick() {
        let chain = MockChain::new();
        chain.set_balance_native(dec!(0.35));
        let (scheduler, chain) = scheduler(chain, Some(Address::repeat_byte(0x42)));

        scheduler.tick().await;
        assert_eq!(chain.submissions().len(), 1);

        let state = scheduler.state();
        assert!(state.status.to_string().starts_with("Success."));
        assert!(state.last_success.is_some());

        // Swept down to the buffer; the next tick waits again
        scheduler.tick().await;
        assert_eq!(chain.submissions().len(), 1);
        assert!(matches!(scheduler.state().status, SchedulerStatus::AwaitingThreshold { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_just_below_threshold_does_not_withdraw() {
        // 0.289854 * 3450 = 999.9963, which rounds to $1000.00
        let chain = MockChain::new();
        chain.set_balance_native(dec!(0.289854));
        let (scheduler, chain) = scheduler(chain, Some(Address::repeat_byte(0x42)));

        scheduler.tick().await;
        assert!(chain.submissions().is_empty());
        assert!(matches!(scheduler.state().status, SchedulerStatus::AwaitingThreshold { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exactly_at_threshold_withdraws() {
        // Smallest wei amount worth at least $1000 at $3450
        let chain = MockChain::new();
        chain.set_balance_native(dec!(0.289855072463768116));
        let (at, at_chain) = scheduler(chain, Some(Address::repeat_byte(0x42)));

        at.tick().await;
        assert_eq!(at_chain.submissions().len(), 1);

        // One wei less stays below
        let chain = MockChain::new();
        chain.set_balance_native(dec!(0.289855072463768115));
        let (below, below_chain) = scheduler(chain, Some(Address::repeat_byte(0x42)));

        below.tick().await;
        assert!(below_chain.submissions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_without_payout() {
        let chain = MockChain::new();
        chain.set_balance_native(dec!(5));
        let (scheduler, chain) = scheduler(chain, None);

        scheduler.tick().await;
        assert_eq!(scheduler.state().status, SchedulerStatus::Disabled);
        assert!(!scheduler.view().enabled);
        assert_eq!(chain.balance_reads(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreadable_balance_is_reported() {
        let chain = MockChain::new();
        chain.fail_balance("rate limited");
        let (scheduler, _chain) = scheduler(chain, Some(Address::repeat_byte(0x42)));

        scheduler.tick().await;
        assert!(matches!(scheduler.state().status, SchedulerStatus::BalanceUnavailable(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_tick_is_skipped() {
        let chain = MockChain::new();
        chain.set_balance_native(dec!(1));
        chain.set_submit_delay(Duration::from_secs(30));
        let (scheduler, chain) = scheduler(chain, Some(Address::repeat_byte(0x42)));

        let (first, second) = tokio::join!(scheduler.tick(), scheduler.tick());
        assert_eq!(first, TickOutcome::Ran);
        assert_eq!(second, TickOutcome::Skipped);

        let state = scheduler.state();
        assert_eq!(state.runs, 1);
        assert_eq!(state.skipped_ticks, 1);
        assert_eq!(chain.submissions().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_loop_ticks_and_stops() {
        let chain = MockChain::new();
        chain.set_balance_native(dec!(0.1));
        let (scheduler, _chain) = scheduler(chain, Some(Address::repeat_byte(0x42)));

        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(scheduler.clone().run(rx));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(scheduler.state().runs, 1);

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(scheduler.state().runs, 2);

        tx.send(()).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_in_flight_sweep() {
        let chain = MockChain::new();
        chain.set_balance_native(dec!(1));
        chain.set_submit_delay(Duration::from_secs(30));
        let (scheduler, chain) = scheduler(chain, Some(Address::repeat_byte(0x42)));

        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(scheduler.clone().run(rx));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(scheduler.state().status, SchedulerStatus::Executing);

        tx.send(()).unwrap();
        handle.await.unwrap();

        assert_eq!(chain.submissions().len(), 1);
        assert!(matches!(scheduler.state().status, SchedulerStatus::Succeeded { .. }));
    }
}

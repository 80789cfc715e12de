//! End-to-end treasury scenarios over scripted endpoints.

use alloy::primitives::Address;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::Duration;
use treasury_relay::scheduler::{SchedulerStatus, TickOutcome};
use treasury_relay::Shutdown;

mod common;

#[tokio::test(start_paused = true)]
async fn test_failover_sweep_scenario() {
    let h = common::harness(common::config());
    h.good.set_balance_native(dec!(0.35));

    let scheduler = h.service.scheduler();
    assert_eq!(scheduler.tick().await, TickOutcome::Ran);

    // Connected through the third endpoint
    let endpoint = h.service.connections().current_endpoint().await.unwrap();
    assert_eq!(endpoint.url().host_str(), Some("good.invalid"));
    assert_eq!(h.bad[0].probes(), 1);
    assert_eq!(h.bad[1].probes(), 1);

    let submissions = h.good.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].0.to, common::PAYOUT.parse::<Address>().unwrap());

    let state = scheduler.state();
    let SchedulerStatus::Succeeded { amount, amount_usd, tx_hash } = &state.status else {
        panic!("unexpected status: {}", state.status);
    };
    assert_eq!(*amount, dec!(0.347));
    assert_eq!(*amount_usd, dec!(1197.15));

    let rendered = state.status.to_string();
    assert!(rendered.starts_with("Success"));
    assert!(rendered.contains(&tx_hash[..10]));
    assert!(!rendered.contains(&tx_hash[..11]));
}

#[tokio::test(start_paused = true)]
async fn test_threshold_gate() {
    let h = common::harness(common::config());
    h.good.set_balance_native(dec!(0.28));
    let scheduler = h.service.scheduler();

    // $966 < $1000
    scheduler.tick().await;
    assert!(h.good.submissions().is_empty());
    assert_eq!(
        scheduler.state().status.to_string(),
        "Awaiting threshold. Balance: $966.00/$1000"
    );

    h.good.set_balance_native(dec!(0.3));
    scheduler.tick().await;
    assert_eq!(h.good.submissions().len(), 1);
    assert_eq!(scheduler.state().runs, 2);
}

#[tokio::test(start_paused = true)]
async fn test_stale_endpoint_replaced_without_restart() {
    let h = common::harness(common::config());
    h.good.set_balance_native(dec!(1));

    assert!(h.service.balance().await.balance_known);

    // The working endpoint dies and the first one comes back
    h.good.set_reachable(false);
    h.bad[0].set_reachable(true);
    h.bad[0].set_balance_native(dec!(1));

    let view = h.service.balance().await;
    assert!(!view.balance_known);
    assert!(view.error.is_some());

    let view = h.service.balance().await;
    assert_eq!(view.balance, Some(dec!(1)));
    let endpoint = h.service.connections().current_endpoint().await.unwrap();
    assert_eq!(endpoint.url().host_str(), Some("bad-1.invalid"));
    assert!(h.connector.connects() >= 4);
}

#[tokio::test(start_paused = true)]
async fn test_ledger_untouched_by_failed_withdrawal() {
    let h = common::harness(common::config());
    h.good.set_balance_native(dec!(0.002));
    h.service.credit_earnings(dec!(50)).unwrap();
    assert!(h.service.credit_earnings(dec!(-5)).is_err());

    let result = h.service.request_withdrawal(Decimal::ZERO, None).await;
    assert!(!result.success);
    assert_eq!(result.error_kind, Some("insufficient_funds"));

    let ledger = h.service.earnings();
    assert_eq!(ledger.earnings, dec!(50));
    assert_eq!(ledger.total_withdrawn, Decimal::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_stops_on_shutdown() {
    let h = common::harness(common::config());
    h.good.set_balance_native(dec!(0.1));

    let shutdown = Shutdown::new();
    let handle = tokio::spawn(h.service.scheduler().run(shutdown.subscribe()));

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.service.scheduler().state().runs, 1);

    shutdown.trigger();
    handle.await.unwrap();
}

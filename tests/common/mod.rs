//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use treasury_relay::config::TreasuryConfig;
use treasury_relay::testkit::{test_wallet, MockChain, MockConnector};
use treasury_relay::TreasuryService;

pub const BAD_1: &str = "http://bad-1.invalid";
pub const BAD_2: &str = "http://bad-2.invalid";
pub const GOOD: &str = "http://good.invalid";
pub const PAYOUT: &str = "0x4242424242424242424242424242424242424242";

/// A treasury over three endpoints where only the last answers.
pub struct Harness {
    pub service: Arc<TreasuryService>,
    pub connector: Arc<MockConnector>,
    pub bad: [Arc<MockChain>; 2],
    pub good: Arc<MockChain>,
}

pub fn config() -> TreasuryConfig {
    let mut config = TreasuryConfig::default();
    config.blockchain.endpoints = vec![BAD_1.into(), BAD_2.into(), GOOD.into()];
    config.wallets.payout_address = Some(PAYOUT.into());
    config
}

pub fn harness(config: TreasuryConfig) -> Harness {
    let connector = Arc::new(MockConnector::new());
    let bad = [
        connector.register(BAD_1, MockChain::unreachable()),
        connector.register(BAD_2, MockChain::unreachable()),
    ];
    let good = connector.register(GOOD, MockChain::new());

    let service = TreasuryService::new(&config, connector.clone(), Some(test_wallet()))
        .expect("harness config is valid");

    Harness {
        service: Arc::new(service),
        connector,
        bad,
        good,
    }
}

//! Treasury balance reads.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::blockchain::types::wei_to_native;
use crate::blockchain::ConnectionManager;
use crate::config::EconomicsConfig;
use crate::observability::metrics;
use crate::treasury::types::BalanceReading;

/// Reads the treasury balance over the shared connection.
///
/// Never fails: problems come back as [`BalanceReading::Unavailable`].
#[derive(Debug, Clone)]
pub struct BalanceService {
    connections: Arc<ConnectionManager>,
    economics: EconomicsConfig,
}

impl BalanceService {
    pub fn new(connections: Arc<ConnectionManager>, economics: EconomicsConfig) -> Self {
        Self {
            connections,
            economics,
        }
    }

    pub async fn treasury_balance(&self) -> BalanceReading {
        let Some(address) = self.connections.treasury_address() else {
            return BalanceReading::Unavailable("no treasury address configured".to_string());
        };

        let connection = match self.connections.acquire_connection().await {
            Ok(connection) => connection,
            Err(e) => {
                tracing::warn!(error = %e, "Treasury balance unavailable");
                return BalanceReading::Unavailable(e.to_string());
            }
        };

        let wei = match connection.rpc().balance(address).await {
            Ok(wei) => wei,
            Err(e) => {
                tracing::warn!(
                    endpoint = %connection.endpoint(),
                    error = %e,
                    "Treasury balance read failed"
                );
                if e.is_connectivity() {
                    self.connections.invalidate("balance read failed").await;
                }
                return BalanceReading::Unavailable(e.to_string());
            }
        };

        match wei_to_native(wei) {
            Ok(amount) => {
                metrics::record_treasury_balance(amount.to_f64().unwrap_or_default());
                tracing::debug!(treasury = %address, balance = %amount, "Treasury balance read");
                BalanceReading::Known(amount)
            }
            Err(e) => BalanceReading::Unavailable(e.to_string()),
        }
    }

    pub fn price_usd(&self) -> Decimal {
        self.economics.price_usd
    }

    /// USD value of a native amount at the configured price, to the cent.
    pub fn fiat_value(&self, amount: Decimal) -> Decimal {
        fiat_value(amount, self.economics.price_usd)
    }
}

pub(crate) fn fiat_value(amount: Decimal, price_usd: Decimal) -> Decimal {
    (amount * price_usd).round_dp(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::EndpointPool;
    use crate::testkit::{test_wallet, MockChain, MockConnector};
    use rust_decimal_macros::dec;
    use std::time::Duration;

    const PRIMARY: &str = "http://primary.invalid";
    const BACKUP: &str = "http://backup.invalid";

    fn service(connector: Arc<MockConnector>) -> BalanceService {
        let connections = ConnectionManager::new(
            EndpointPool::from_urls(&[PRIMARY, BACKUP]),
            connector,
            Some(test_wallet()),
            Duration::from_secs(5),
        );
        BalanceService::new(Arc::new(connections), EconomicsConfig::default())
    }

    #[tokio::test]
    async fn test_known_balance() {
        let connector = Arc::new(MockConnector::new());
        let chain = connector.register(PRIMARY, MockChain::new());
        chain.set_balance_native(dec!(0.35));

        let service = service(connector);
        assert_eq!(service.treasury_balance().await, BalanceReading::Known(dec!(0.35)));
        assert_eq!(service.fiat_value(dec!(0.35)), dec!(1207.50));
    }

    #[tokio::test]
    async fn test_read_failure_is_unavailable_and_rotates() {
        let connector = Arc::new(MockConnector::new());
        let primary = connector.register(PRIMARY, MockChain::new());
        let backup = connector.register(BACKUP, MockChain::new());
        primary.fail_balance("upstream 502");
        backup.set_balance_native(dec!(1));

        let service = service(connector);
        let reading = service.treasury_balance().await;
        assert!(matches!(reading, BalanceReading::Unavailable(_)));
        assert_ne!(reading, BalanceReading::Known(Decimal::ZERO));

        // Next read moves to the backup endpoint
        assert_eq!(service.treasury_balance().await, BalanceReading::Known(dec!(1)));
        assert_eq!(backup.balance_reads(), 1);
    }

    #[tokio::test]
    async fn test_no_endpoint_is_unavailable() {
        let service = service(Arc::new(MockConnector::new()));
        assert!(!service.treasury_balance().await.is_known());
    }
}

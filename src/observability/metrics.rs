//! Metrics collection and exposition.
//!
//! # Metrics
//! - `treasury_endpoint_probes_total` (counter): liveness probes by result
//! - `treasury_connection_failovers_total` (counter): connection moved to another endpoint
//! - `treasury_withdrawals_total` (counter): withdrawal attempts by outcome
//! - `treasury_balance_native` (gauge): last known treasury balance
//! - `treasury_scheduler_runs_total` (counter): scheduler ticks by outcome
//! - `treasury_ledger_earnings_usd` (gauge): accrued earnings

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_endpoint_probe(success: bool) {
    let result = if success { "ok" } else { "failed" };
    counter!("treasury_endpoint_probes_total", "result" => result).increment(1);
}

pub fn record_failover() {
    counter!("treasury_connection_failovers_total").increment(1);
}

pub fn record_withdrawal(outcome: &'static str) {
    counter!("treasury_withdrawals_total", "outcome" => outcome).increment(1);
}

pub fn record_treasury_balance(native: f64) {
    gauge!("treasury_balance_native").set(native);
}

pub fn record_scheduler_run(outcome: &'static str) {
    counter!("treasury_scheduler_runs_total", "outcome" => outcome).increment(1);
}

pub fn record_ledger_earnings(usd: f64) {
    gauge!("treasury_ledger_earnings_usd").set(usd);
}

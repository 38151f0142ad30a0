//! Metrics collection and exposition.
//!
//! # Metrics
//! - `custody_withdrawals_total` (counter): withdrawal attempts by outcome
//! - `custody_balance_updates_total` (counter): balance updates delivered
//! - `custody_monitor_errors_total` (counter): monitor errors by kind
//! - `custody_monitor_reconnects_total` (counter): resubscribe attempts
//! - `custody_account_balance_lamports` (gauge): last observed balance
//! - `custody_rpc_health` (gauge): 1=healthy, 0=unhealthy
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter")
        }
    }
}

pub fn record_withdrawal(outcome: &'static str) {
    ::metrics::counter!("custody_withdrawals_total", "outcome" => outcome).increment(1);
}

pub fn record_balance_update(lamports: u64) {
    ::metrics::counter!("custody_balance_updates_total").increment(1);
    ::metrics::gauge!("custody_account_balance_lamports").set(lamports as f64);
}

pub fn record_monitor_error(kind: &'static str) {
    ::metrics::counter!("custody_monitor_errors_total", "kind" => kind).increment(1);
}

pub fn record_reconnect() {
    ::metrics::counter!("custody_monitor_reconnects_total").increment(1);
}

pub fn record_rpc_health(healthy: bool) {
    ::metrics::gauge!("custody_rpc_health").set(if healthy { 1.0 } else { 0.0 });
}

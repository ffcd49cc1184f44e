//! Business metrics for Gatepass.
//!
//! The core services record these counters inline; this module describes
//! them and installs the Prometheus exporter.
//!
//! # Exported Metrics
//!
//! - `gatepass_scans_total{outcome}` - Gate scans by outcome
//! - `gatepass_orders_total{status}` - Order transitions by resulting status
//! - `gatepass_tickets_issued_total` - Ticket codes minted
//! - `gatepass_inventory_commits_total{result}` - Ledger commits by result
//! - `gatepass_code_collisions_total` - Minting attempts lost to a code collision
//! - `gatepass_webhooks_total{result}` - Payment webhooks by result

use metrics::describe_counter;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;

/// Register all business metric descriptions.
///
/// Call once at startup, before any metrics are recorded.
pub fn register_business_metrics() {
    describe_counter!(
        "gatepass_scans_total",
        "Gate scan attempts by outcome (success, already_used, blocked, invalid)"
    );
    describe_counter!(
        "gatepass_orders_total",
        "Order transitions by resulting status"
    );
    describe_counter!("gatepass_tickets_issued_total", "Ticket codes minted");
    describe_counter!(
        "gatepass_inventory_commits_total",
        "Inventory ledger commits by result (committed, rejected)"
    );
    describe_counter!(
        "gatepass_code_collisions_total",
        "Ticket minting attempts retried after a code collision"
    );
    describe_counter!(
        "gatepass_webhooks_total",
        "Payment webhooks by result (completed, duplicate, ignored, rejected, unauthorized)"
    );

    tracing::info!("Business metrics registered");
}

/// Installs the Prometheus recorder with an HTTP listener on `addr`.
///
/// Must be called from within a Tokio runtime.
///
/// # Errors
///
/// Returns [`BuildError`] if a recorder is already installed or the listener
/// cannot be set up.
pub fn install_exporter(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    register_business_metrics();
    tracing::info!(%addr, "Metrics exporter listening");
    Ok(())
}

/// Record a webhook outcome
pub fn record_webhook(result: &'static str) {
    metrics::counter!("gatepass_webhooks_total", "result" => result).increment(1);
}

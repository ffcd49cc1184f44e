//! Router configuration.

use super::health::{health_check, readiness_check};
use super::state::AppState;
use crate::api::{admin, gate, orders, payments, stats, tiers};
use crate::middleware::correlation_id;
use axum::{
    Router,
    http::{Method, header},
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the complete router.
///
/// Public routes serve the storefront and the payment gateway; everything
/// under `/api/admin` and `/api/gate` checks an admin session in its
/// handler.
pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/tiers", get(tiers::list_tiers))
        .route("/orders", post(orders::create_order))
        .route("/orders/:number", get(orders::get_order))
        .route("/payments/webhook", post(payments::paystack_webhook));

    let staff = Router::new()
        .route("/gate/scan", post(gate::scan))
        .route("/admin/login", post(admin::login))
        .route("/admin/cash-sales", post(admin::record_cash_sale))
        .route("/admin/orders/:number/cancel", post(admin::cancel_order))
        .route("/admin/orders/:number/refund", post(admin::refund_order))
        .route("/admin/orders/:number/tickets", get(admin::order_tickets))
        .route("/admin/orders/:number/audit", get(stats::order_audit))
        .route("/admin/tickets/:code/audit", get(stats::ticket_audit))
        .route("/admin/tiers/:tier/history", get(stats::tier_history))
        .route("/admin/stats/entries", get(stats::entry_stats))
        .route("/admin/stats/sales", get(stats::sales_stats))
        .route("/admin/entries", get(stats::recent_entries));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .nest("/api", public.merge(staff))
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(correlation_id))
        .layer(cors)
        .with_state(state)
}

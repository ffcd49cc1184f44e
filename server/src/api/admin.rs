//! Back-office endpoints.
//!
//! - POST /api/admin/login - exchange the admin password for a session token
//! - POST /api/admin/cash-sales - record a cash or complimentary sale
//! - POST /api/admin/orders/:number/cancel - cancel, releasing units
//! - POST /api/admin/orders/:number/refund - refund, releasing units
//! - GET /api/admin/orders/:number/tickets - tickets with QR images
//!
//! Everything except login requires an [`AdminSession`].

use super::{BuyerInput, IssuedOrder, OrderView, TicketView, one};
use crate::auth::{AdminSession, SessionToken};
use crate::error::AppError;
use crate::notify::spawn_delivery;
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use gatepass_core::orders::{Completion, NewCashSale};
use gatepass_core::types::{AccessType, GroupSize, Money, OrderNumber, PaymentMethod, TierKind};
use serde::Deserialize;

/// Login request
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    /// Admin password
    pub password: String,
}

/// Exchanges the admin password for a session token
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<SessionToken>, AppError> {
    let token = state
        .sessions
        .login(&request.password, state.clock.now())
        .inspect_err(|_| tracing::warn!("Admin login failed"))?;
    tracing::info!(expires_at = %token.expires_at, "Admin session issued");
    Ok(Json(token))
}

/// Cash sale at the gate
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CashSaleRequest {
    /// Tier
    pub tier: TierKind,
    /// Group multiplier
    #[serde(default)]
    pub group_size: GroupSize,
    /// Units of `group_size`
    #[serde(default = "one")]
    pub units: u32,
    /// Parking passes
    #[serde(default)]
    pub parking_passes: u32,
    /// Purchaser
    pub buyer: BuyerInput,
    /// Attendee or vendor
    #[serde(default)]
    pub access_type: AccessType,
    /// `cash` or `complimentary`
    pub payment_method: PaymentMethod,
    /// Cash collected, in kobo
    #[serde(default)]
    pub amount_received: Money,
}

/// Records a manual sale and returns the issued tickets
pub async fn record_cash_sale(
    State(state): State<AppState>,
    AdminSession(session): AdminSession,
    Json(request): Json<CashSaleRequest>,
) -> Result<(StatusCode, Json<IssuedOrder>), AppError> {
    let completion = state
        .orders
        .record_cash_sale(NewCashSale {
            tier: request.tier,
            group_size: request.group_size,
            units: request.units,
            parking_passes: request.parking_passes,
            buyer: request.buyer.into(),
            access_type: request.access_type,
            payment_method: request.payment_method,
            amount_received: request.amount_received,
        })
        .await?;
    tracing::info!(
        session = %session.sid,
        order = %completion.order().number,
        "Manual sale recorded"
    );

    let body = IssuedOrder::new(completion.order(), completion.tickets());
    if let Completion::Issued { order, tickets } = completion {
        spawn_delivery(state.notifier.clone(), order, tickets);
    }
    Ok((StatusCode::CREATED, Json(body)))
}

/// Reason for closing an order
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CloseRequest {
    /// Free-text reason, kept in the audit log
    #[serde(default)]
    pub reason: String,
}

/// Cancels an order
pub async fn cancel_order(
    State(state): State<AppState>,
    AdminSession(session): AdminSession,
    Path(number): Path<String>,
    Json(request): Json<CloseRequest>,
) -> Result<Json<OrderView>, AppError> {
    let number = OrderNumber::from_raw(number);
    let order = state.orders.cancel(&number, &request.reason).await?;
    tracing::info!(session = %session.sid, order = %number, "Order cancelled by admin");
    Ok(Json(OrderView::from(&order)))
}

/// Refunds an order
pub async fn refund_order(
    State(state): State<AppState>,
    AdminSession(session): AdminSession,
    Path(number): Path<String>,
    Json(request): Json<CloseRequest>,
) -> Result<Json<OrderView>, AppError> {
    let number = OrderNumber::from_raw(number);
    let order = state.orders.refund(&number, &request.reason).await?;
    tracing::info!(session = %session.sid, order = %number, "Order refunded by admin");
    Ok(Json(OrderView::from(&order)))
}

/// Tickets of an order, with QR images
pub async fn order_tickets(
    State(state): State<AppState>,
    AdminSession(_): AdminSession,
    Path(number): Path<String>,
) -> Result<Json<Vec<TicketView>>, AppError> {
    let tickets = state.orders.tickets(&OrderNumber::from_raw(number)).await?;
    Ok(Json(tickets.iter().map(TicketView::from).collect()))
}

//! Public order endpoints.
//!
//! - POST /api/orders - create a pending order; pay with its number as reference
//! - GET /api/orders/:number - order status

use super::{BuyerInput, OrderView, one};
use crate::error::AppError;
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use gatepass_core::orders::NewOrder;
use gatepass_core::types::{AccessType, GroupSize, OrderNumber, TierKind};
use serde::Deserialize;

/// Online purchase request
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateOrderRequest {
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
}

/// Creates a pending order.
///
/// ```bash
/// curl -X POST http://localhost:8080/api/orders \
///   -H 'content-type: application/json' \
///   -d '{"tier":"gold","group_size":"pair","buyer":{"name":"Ada Obi","email":"ada@example.com"}}'
/// ```
pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderView>), AppError> {
    let order = state
        .orders
        .create_pending(NewOrder {
            tier: request.tier,
            group_size: request.group_size,
            units: request.units,
            parking_passes: request.parking_passes,
            buyer: request.buyer.into(),
            access_type: request.access_type,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(OrderView::from(&order))))
}

/// Order status by number
pub async fn get_order(
    State(state): State<AppState>,
    Path(number): Path<String>,
) -> Result<Json<OrderView>, AppError> {
    let order = state.orders.order(&OrderNumber::from_raw(number)).await?;
    Ok(Json(OrderView::from(&order)))
}

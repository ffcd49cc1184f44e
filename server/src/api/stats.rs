//! Back-office reports. All require an admin session.
//!
//! - GET /api/admin/stats/entries - entry-log counts
//! - GET /api/admin/stats/sales - sales and issuance figures
//! - GET /api/admin/entries?limit=N - most recent scan attempts
//! - GET /api/admin/orders/:number/audit - audit trail of an order
//! - GET /api/admin/tickets/:code/audit - audit trail of a ticket
//! - GET /api/admin/tiers/:tier/history - inventory changes of a tier

use crate::auth::AdminSession;
use crate::error::AppError;
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
};
use gatepass_core::codes::normalize;
use gatepass_core::reports::{EntryStats, SalesStats};
use gatepass_core::types::{AuditLogEntry, EntityType, EntryLogEntry, InventoryLogEntry, TierKind};
use serde::Deserialize;

/// Default page size for recent entries
pub const DEFAULT_ENTRY_LIMIT: u32 = 50;

/// Largest page size for recent entries
pub const MAX_ENTRY_LIMIT: u32 = 500;

/// Entry-log counts
pub async fn entry_stats(
    State(state): State<AppState>,
    AdminSession(_): AdminSession,
) -> Result<Json<EntryStats>, AppError> {
    Ok(Json(state.reports.entry_stats().await?))
}

/// Sales figures
pub async fn sales_stats(
    State(state): State<AppState>,
    AdminSession(_): AdminSession,
) -> Result<Json<SalesStats>, AppError> {
    Ok(Json(state.reports.sales_stats().await?))
}

/// Page size query
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntriesQuery {
    /// Rows to return, capped at [`MAX_ENTRY_LIMIT`]
    pub limit: Option<u32>,
}

/// Most recent scan attempts, newest first
pub async fn recent_entries(
    State(state): State<AppState>,
    AdminSession(_): AdminSession,
    Query(query): Query<EntriesQuery>,
) -> Result<Json<Vec<EntryLogEntry>>, AppError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_ENTRY_LIMIT)
        .min(MAX_ENTRY_LIMIT);
    Ok(Json(state.reports.recent_entries(limit).await?))
}

/// Audit trail of an order
pub async fn order_audit(
    State(state): State<AppState>,
    AdminSession(_): AdminSession,
    Path(number): Path<String>,
) -> Result<Json<Vec<AuditLogEntry>>, AppError> {
    Ok(Json(
        state
            .reports
            .audit_trail(EntityType::Order, number.trim())
            .await?,
    ))
}

/// Audit trail of a ticket
pub async fn ticket_audit(
    State(state): State<AppState>,
    AdminSession(_): AdminSession,
    Path(code): Path<String>,
) -> Result<Json<Vec<AuditLogEntry>>, AppError> {
    Ok(Json(
        state
            .reports
            .audit_trail(EntityType::Ticket, &normalize(&code))
            .await?,
    ))
}

/// Inventory changes of a tier, oldest first
pub async fn tier_history(
    State(state): State<AppState>,
    AdminSession(_): AdminSession,
    Path(tier): Path<TierKind>,
) -> Result<Json<Vec<InventoryLogEntry>>, AppError> {
    Ok(Json(state.reports.inventory_history(tier).await?))
}

//! Public tier listing.
//!
//! - GET /api/tiers - tiers with current prices and remaining units

use crate::error::AppError;
use crate::server::state::AppState;
use axum::{Json, extract::State};
use gatepass_core::inventory::LedgerError;
use gatepass_core::pricing::{PricingWindow, quote};
use gatepass_core::types::{GroupSize, Money, TicketTier, TierKind, TierPerks};
use serde::Serialize;

/// Price of one purchase option
#[derive(Debug, Clone, Serialize)]
pub struct PriceOption {
    /// Group multiplier
    pub group_size: GroupSize,
    /// Per-person price, in kobo
    pub per_person: Money,
    /// Amount due for one unit, in kobo
    pub total: Money,
}

/// One tier on sale
#[derive(Debug, Clone, Serialize)]
pub struct TierView {
    /// Tier
    pub tier: TierKind,
    /// Display name
    pub name: &'static str,
    /// Pricing window in effect
    pub window: PricingWindow,
    /// Purchase options
    pub prices: Vec<PriceOption>,
    /// Units left
    pub remaining: u32,
    /// No units left
    pub sold_out: bool,
    /// Bundled perks
    pub perks: TierPerks,
}

/// Response for the tier listing
#[derive(Debug, Clone, Serialize)]
pub struct TierListing {
    /// Tiers in display order
    pub tiers: Vec<TierView>,
}

fn view(tier: &TicketTier, state: &AppState) -> Result<TierView, AppError> {
    let now = state.clock.now();
    let prices = [GroupSize::Single, GroupSize::Pair, GroupSize::Quad]
        .into_iter()
        .map(|group_size| {
            quote(tier, group_size, now).map(|q| PriceOption {
                group_size,
                per_person: q.unit_price,
                total: q.total,
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::internal("Could not price tiers").with_source(e))?;

    Ok(TierView {
        tier: tier.kind,
        name: tier.kind.display_name(),
        window: tier.pricing.window_at(now),
        prices,
        remaining: tier.remaining(),
        sold_out: tier.remaining() == 0,
        perks: tier.perks,
    })
}

/// Lists tiers on sale.
///
/// When the store is unreachable this answers 503 rather than any
/// placeholder catalog.
///
/// ```bash
/// curl http://localhost:8080/api/tiers
/// ```
pub async fn list_tiers(State(state): State<AppState>) -> Result<Json<TierListing>, AppError> {
    let tiers = match state.ledger.tiers().await {
        Ok(tiers) => tiers,
        Err(LedgerError::Store(e)) => {
            tracing::warn!(error = %e, "Tier listing degraded: store unreachable");
            return Err(AppError::unavailable("Ticket sales are temporarily unavailable"));
        },
        Err(e) => return Err(e.into()),
    };

    let tiers = tiers
        .iter()
        .map(|tier| view(tier, &state))
        .collect::<Result<_, _>>()?;
    Ok(Json(TierListing { tiers }))
}

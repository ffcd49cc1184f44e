//! Per-tier capacity bookkeeping.
//!
//! `sold_units` and `manual_sold` are only ever moved by a store through one
//! atomic operation per change. The pure [`plan_commit`] / [`plan_release`]
//! functions define what that operation must do; the in-memory store applies
//! them under a lock and the `PostgreSQL` store mirrors them as conditional
//! `UPDATE`s.

use crate::environment::Clock;
use crate::store::{CommitOutcome, InventoryStore, StoreError, UnitChange};
use crate::types::{InventoryLogEntry, InventoryReason, OrderNumber, SalesChannel, TicketTier, TierKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// Level arithmetic
// ============================================================================

/// Counter values after a planned mutation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LedgerLevels {
    /// New `sold_units`
    pub sold_units: u32,
    /// New `manual_sold`
    pub manual_sold: u32,
}

/// Why a commit was refused
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LedgerRejection {
    /// Tier not configured in the store
    #[error("tier is not configured")]
    UnknownTier,

    /// Zero-unit commits are refused
    #[error("quantity must be at least 1")]
    ZeroQuantity,

    /// Tier capacity would be exceeded
    #[error("requested {requested} units but only {available} remain")]
    CapacityExceeded {
        /// Units requested
        requested: u32,
        /// Units left in the tier
        available: u32,
    },

    /// Manual-channel cap would be exceeded
    #[error("requested {requested} units but the manual sales cap leaves {remaining}")]
    ManualCapReached {
        /// Units requested
        requested: u32,
        /// Units left under the manual cap
        remaining: u32,
    },
}

/// Plans committing `quantity` units of `tier` through `channel`.
///
/// Both the tier capacity and, for manual sales, the manual cap must hold
/// after the change.
///
/// # Errors
///
/// Returns the [`LedgerRejection`] describing which bound would be broken.
pub fn plan_commit(
    tier: &TicketTier,
    quantity: u32,
    channel: SalesChannel,
) -> Result<LedgerLevels, LedgerRejection> {
    if quantity == 0 {
        return Err(LedgerRejection::ZeroQuantity);
    }

    let sold_units = tier
        .sold_units
        .checked_add(quantity)
        .filter(|sold| *sold <= tier.total_units)
        .ok_or(LedgerRejection::CapacityExceeded {
            requested: quantity,
            available: tier.remaining(),
        })?;

    let manual_sold = match channel {
        SalesChannel::Online => tier.manual_sold,
        SalesChannel::Manual => tier
            .manual_sold
            .checked_add(quantity)
            .filter(|sold| *sold <= tier.manual_cap)
            .ok_or(LedgerRejection::ManualCapReached {
                requested: quantity,
                remaining: tier.manual_cap.saturating_sub(tier.manual_sold),
            })?,
    };

    Ok(LedgerLevels {
        sold_units,
        manual_sold,
    })
}

/// Plans releasing `quantity` units previously committed through `channel`.
/// Both counters floor at zero.
#[must_use]
pub const fn plan_release(tier: &TicketTier, quantity: u32, channel: SalesChannel) -> LedgerLevels {
    let manual_sold = match channel {
        SalesChannel::Online => tier.manual_sold,
        SalesChannel::Manual => tier.manual_sold.saturating_sub(quantity),
    };
    LedgerLevels {
        sold_units: tier.sold_units.saturating_sub(quantity),
        manual_sold,
    }
}

// ============================================================================
// Service
// ============================================================================

/// Ledger errors
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The commit would break a capacity bound
    #[error("{tier} inventory: {rejection}")]
    Rejected {
        /// Tier
        tier: TierKind,
        /// Which bound
        rejection: LedgerRejection,
    },

    /// Tier missing from the store
    #[error("tier {0} is not configured")]
    UnknownTier(TierKind),

    /// Storage failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Current capacity figures for one tier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    /// Tier
    pub tier: TierKind,
    /// Capacity
    pub total_units: u32,
    /// Committed units
    pub sold_units: u32,
    /// Units left through any channel
    pub remaining: u32,
    /// Units left through the manual channel
    pub manual_remaining: u32,
}

impl From<&TicketTier> for Availability {
    fn from(tier: &TicketTier) -> Self {
        Self {
            tier: tier.kind,
            total_units: tier.total_units,
            sold_units: tier.sold_units,
            remaining: tier.remaining(),
            manual_remaining: tier.manual_remaining(),
        }
    }
}

/// Inventory ledger over an [`InventoryStore`]
#[derive(Clone)]
pub struct InventoryLedger {
    store: Arc<dyn InventoryStore>,
    clock: Arc<dyn Clock>,
}

impl InventoryLedger {
    /// Creates a ledger
    #[must_use]
    pub fn new(store: Arc<dyn InventoryStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Atomically checks capacity and commits `quantity` online units.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Rejected`] if the tier would oversell, or a store error.
    pub async fn reserve_and_commit(
        &self,
        tier: TierKind,
        quantity: u32,
        order: &OrderNumber,
    ) -> Result<InventoryLogEntry, LedgerError> {
        self.commit(tier, quantity, order, SalesChannel::Online, InventoryReason::OrderCompleted)
            .await
    }

    /// Releases `quantity` units, flooring at zero.
    ///
    /// # Errors
    ///
    /// [`LedgerError::UnknownTier`] or a store error.
    pub async fn release(
        &self,
        tier: TierKind,
        quantity: u32,
        channel: SalesChannel,
        order: &OrderNumber,
        reason: InventoryReason,
    ) -> Result<InventoryLogEntry, LedgerError> {
        let change = UnitChange {
            tier,
            quantity,
            channel,
            order: order.clone(),
            reason,
        };
        let entry = self
            .store
            .release_units(&change, self.clock.now())
            .await?
            .ok_or(LedgerError::UnknownTier(tier))?;

        tracing::info!(
            tier = %tier,
            order = %order,
            previous = entry.previous,
            new = entry.new,
            reason = reason.as_str(),
            "Inventory released"
        );
        Ok(entry)
    }

    /// Capacity figures for one tier
    ///
    /// # Errors
    ///
    /// [`LedgerError::UnknownTier`] or a store error.
    pub async fn availability(&self, tier: TierKind) -> Result<Availability, LedgerError> {
        let tier = self
            .store
            .tier(tier)
            .await?
            .ok_or(LedgerError::UnknownTier(tier))?;
        Ok(Availability::from(&tier))
    }

    /// All configured tiers in display order
    ///
    /// # Errors
    ///
    /// Returns a store error if the store is unreachable.
    pub async fn tiers(&self) -> Result<Vec<TicketTier>, LedgerError> {
        let mut tiers = self.store.tiers().await?;
        tiers.sort_by_key(|t| TierKind::ALL.iter().position(|k| *k == t.kind));
        Ok(tiers)
    }

    async fn commit(
        &self,
        tier: TierKind,
        quantity: u32,
        order: &OrderNumber,
        channel: SalesChannel,
        reason: InventoryReason,
    ) -> Result<InventoryLogEntry, LedgerError> {
        let change = UnitChange {
            tier,
            quantity,
            channel,
            order: order.clone(),
            reason,
        };

        match self.store.commit_units(&change, self.clock.now()).await? {
            CommitOutcome::Committed(entry) => {
                metrics::counter!("gatepass_inventory_commits_total", "result" => "committed")
                    .increment(1);
                tracing::info!(
                    tier = %tier,
                    order = %order,
                    channel = channel.as_str(),
                    previous = entry.previous,
                    new = entry.new,
                    "Inventory committed"
                );
                Ok(entry)
            },
            CommitOutcome::Rejected(LedgerRejection::UnknownTier) => {
                Err(LedgerError::UnknownTier(tier))
            },
            CommitOutcome::Rejected(rejection) => {
                metrics::counter!("gatepass_inventory_commits_total", "result" => "rejected")
                    .increment(1);
                tracing::warn!(
                    tier = %tier,
                    order = %order,
                    channel = channel.as_str(),
                    %rejection,
                    "Inventory commit rejected"
                );
                Err(LedgerError::Rejected { tier, rejection })
            },
        }
    }
}

//! Read-only aggregates for the back office.
//!
//! Stores may compute these in SQL; the `from_*` constructors define the
//! expected figures over raw records.

use crate::types::{
    EntryLogEntry, Money, Order, OrderStatus, ScanOutcome, ScanStatus, TicketCode, TicketTier,
    TierKind,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Counts over the entry log
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryStats {
    /// Scan attempts
    pub total: u64,
    /// Successful admissions
    pub admitted: u64,
    /// Attempts per outcome key
    pub by_outcome: BTreeMap<String, u64>,
    /// Successful admissions per payment method key
    pub by_payment_method: BTreeMap<String, u64>,
    /// Successful admissions per access type key
    pub by_access_type: BTreeMap<String, u64>,
    /// Attempts per gate
    pub by_gate: BTreeMap<String, u64>,
}

impl EntryStats {
    /// Aggregates entry-log rows
    #[must_use]
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a EntryLogEntry>) -> Self {
        let mut stats = Self::default();
        for entry in entries {
            stats.total += 1;
            *stats
                .by_outcome
                .entry(entry.outcome.as_str().to_string())
                .or_default() += 1;
            *stats.by_gate.entry(entry.gate.clone()).or_default() += 1;

            if entry.outcome != ScanOutcome::Success {
                continue;
            }
            stats.admitted += 1;
            if let Some(method) = entry.payment_method {
                *stats
                    .by_payment_method
                    .entry(method.as_str().to_string())
                    .or_default() += 1;
            }
            if let Some(access) = entry.access_type {
                *stats
                    .by_access_type
                    .entry(access.as_str().to_string())
                    .or_default() += 1;
            }
        }
        stats
    }
}

/// Capacity figures for one tier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierSales {
    /// Tier
    pub tier: TierKind,
    /// Capacity
    pub total_units: u32,
    /// Units committed through any channel
    pub sold_units: u32,
    /// Units committed through the manual channel
    pub manual_sold: u32,
    /// Units left
    pub remaining: u32,
}

impl From<&TicketTier> for TierSales {
    fn from(tier: &TicketTier) -> Self {
        Self {
            tier: tier.kind,
            total_units: tier.total_units,
            sold_units: tier.sold_units,
            manual_sold: tier.manual_sold,
            remaining: tier.remaining(),
        }
    }
}

/// Sales and issuance figures
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesStats {
    /// Per-tier capacity
    pub tiers: Vec<TierSales>,
    /// Orders per status key
    pub orders_by_status: BTreeMap<String, u64>,
    /// Ticket codes minted
    pub tickets_issued: u64,
    /// Ticket codes scanned
    pub tickets_scanned: u64,
    /// Completed-order revenue per payment method key
    pub revenue_by_method: BTreeMap<String, Money>,
}

impl SalesStats {
    /// Aggregates raw records
    #[must_use]
    pub fn from_records<'a>(
        tiers: impl IntoIterator<Item = &'a TicketTier>,
        orders: impl IntoIterator<Item = &'a Order>,
        tickets: impl IntoIterator<Item = &'a TicketCode>,
    ) -> Self {
        let mut stats = Self {
            tiers: tiers.into_iter().map(TierSales::from).collect(),
            ..Self::default()
        };
        stats.tiers.sort_by_key(|t| t.tier);

        for order in orders {
            *stats
                .orders_by_status
                .entry(order.status.as_str().to_string())
                .or_default() += 1;
            if order.status == OrderStatus::Completed {
                let revenue = stats
                    .revenue_by_method
                    .entry(order.payment_method.as_str().to_string())
                    .or_default();
                *revenue = revenue.checked_add(order.total).unwrap_or(*revenue);
            }
        }

        for ticket in tickets {
            stats.tickets_issued += 1;
            if ticket.status == ScanStatus::Scanned {
                stats.tickets_scanned += 1;
            }
        }
        stats
    }
}

//! Presale/onsale pricing for ticket tiers.
//!
//! Prices are per person. A tier switches from its presale book to its onsale
//! book at `presale_ends_at`; group purchases (pair, quad) use the group price.

use crate::types::{GroupSize, Money, TicketTier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Per-person prices within one pricing window
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBook {
    /// Price for a single ticket
    pub single: Money,
    /// Per-person price when buying as a pair or quad
    pub group: Money,
}

impl PriceBook {
    /// Per-person price for the given group size
    #[must_use]
    pub const fn per_person(&self, group_size: GroupSize) -> Money {
        if group_size.is_group() {
            self.group
        } else {
            self.single
        }
    }
}

/// Presale and onsale prices for a tier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierPricing {
    /// Prices before the cutoff
    pub presale: PriceBook,
    /// Prices from the cutoff onward
    pub onsale: PriceBook,
    /// Presale cutoff
    pub presale_ends_at: DateTime<Utc>,
}

/// Which pricing window a quote was taken from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingWindow {
    /// Before the cutoff
    Presale,
    /// From the cutoff onward
    Onsale,
}

/// Price quote for one purchased unit
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Per-person price applied
    pub unit_price: Money,
    /// People admitted
    pub people: u32,
    /// Amount due
    pub total: Money,
    /// Window the price came from
    pub window: PricingWindow,
}

/// Pricing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    /// Price arithmetic overflowed
    #[error("price overflow for {people} people at {unit_price}")]
    Overflow {
        /// Per-person price
        unit_price: Money,
        /// People
        people: u32,
    },
}

impl TierPricing {
    /// Window in effect at `now`
    #[must_use]
    pub fn window_at(&self, now: DateTime<Utc>) -> PricingWindow {
        if now < self.presale_ends_at {
            PricingWindow::Presale
        } else {
            PricingWindow::Onsale
        }
    }

    /// Price book in effect at `now`
    #[must_use]
    pub fn book_at(&self, now: DateTime<Utc>) -> &PriceBook {
        match self.window_at(now) {
            PricingWindow::Presale => &self.presale,
            PricingWindow::Onsale => &self.onsale,
        }
    }
}

/// Quotes one unit of `tier` at `group_size`.
///
/// # Errors
///
/// Returns [`PricingError::Overflow`] if the total does not fit in `u64` kobo.
pub fn quote(
    tier: &TicketTier,
    group_size: GroupSize,
    now: DateTime<Utc>,
) -> Result<Quote, PricingError> {
    let window = tier.pricing.window_at(now);
    let unit_price = tier.pricing.book_at(now).per_person(group_size);
    let people = group_size.people();
    let total = unit_price
        .checked_multiply(people)
        .ok_or(PricingError::Overflow { unit_price, people })?;

    Ok(Quote {
        unit_price,
        people,
        total,
        window,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use crate::types::{TierKind, TierPerks};
    use chrono::TimeZone;

    pub(crate) fn cutoff() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
    }

    pub(crate) fn tier(kind: TierKind, total_units: u32) -> TicketTier {
        TicketTier {
            kind,
            total_units,
            sold_units: 0,
            manual_cap: 0,
            manual_sold: 0,
            pricing: TierPricing {
                presale: PriceBook {
                    single: Money::from_kobo(400_000),
                    group: Money::from_kobo(350_000),
                },
                onsale: PriceBook {
                    single: Money::from_kobo(500_000),
                    group: Money::from_kobo(450_000),
                },
                presale_ends_at: cutoff(),
            },
            perks: TierPerks::default(),
        }
    }

    #[test]
    fn test_presale_single() {
        let before = cutoff() - chrono::Duration::seconds(1);
        let q = quote(&tier(TierKind::Bronze, 10), GroupSize::Single, before).unwrap();
        assert_eq!(q.window, PricingWindow::Presale);
        assert_eq!(q.total, Money::from_kobo(400_000));
        assert_eq!(q.people, 1);
    }

    #[test]
    fn test_onsale_starts_at_cutoff() {
        let q = quote(&tier(TierKind::Bronze, 10), GroupSize::Single, cutoff()).unwrap();
        assert_eq!(q.window, PricingWindow::Onsale);
        assert_eq!(q.unit_price, Money::from_kobo(500_000));
    }

    #[test]
    fn test_group_price_is_per_person() {
        let q = quote(&tier(TierKind::Gold, 10), GroupSize::Quad, cutoff()).unwrap();
        assert_eq!(q.people, 4);
        assert_eq!(q.unit_price, Money::from_kobo(450_000));
        assert_eq!(q.total, Money::from_kobo(1_800_000));
    }

    #[test]
    fn test_overflow_is_an_error() {
        let mut t = tier(TierKind::Gold, 10);
        t.pricing.onsale.group = Money::from_kobo(u64::MAX);
        let err = quote(&t, GroupSize::Pair, cutoff()).unwrap_err();
        assert!(matches!(err, PricingError::Overflow { people: 2, .. }));
    }
}

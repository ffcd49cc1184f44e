//! Fixtures and a fully wired service harness.

#![allow(clippy::expect_used)] // Fixture constants are known-good
#![allow(clippy::missing_panics_doc)]

use crate::memory::InMemoryStore;
use crate::mocks::{FixedClock, test_clock};
use chrono::{DateTime, TimeZone, Utc};
use gatepass_core::codes::{CodeGenerator, CodeVerifier};
use gatepass_core::environment::Clock;
use gatepass_core::gate::GateScanner;
use gatepass_core::inventory::InventoryLedger;
use gatepass_core::orders::{
    Completion, NewOrder, OrderError, OrderService, OrderSettings, PaymentConfirmation,
};
use gatepass_core::payload::PayloadCodec;
use gatepass_core::pricing::{PriceBook, TierPricing};
use gatepass_core::types::{AccessType, Buyer, GroupSize, Money, TicketTier, TierKind, TierPerks};
use std::sync::Arc;

/// Code prefix used by fixtures
pub const CODE_PREFIX: &str = "IAF";

/// Event tag used by fixtures
pub const EVENT_TAG: &str = "IAF2026";

/// Event date used by fixtures
pub const EVENT_DATE: &str = "2026-04-18";

/// HMAC secret used by fixtures
pub const TEST_SECRET: &[u8] = b"test-ticket-code-secret";

/// Presale cutoff used by fixtures (2026-03-01 00:00 UTC)
#[must_use]
pub fn presale_ends_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0)
        .single()
        .expect("valid fixture date")
}

/// Presale single price for a tier, in naira
#[must_use]
pub const fn presale_price(kind: TierKind) -> u64 {
    match kind {
        TierKind::Regular => 10_000,
        TierKind::Bronze => 25_000,
        TierKind::Silver => 50_000,
        TierKind::Gold => 100_000,
        TierKind::Diamond => 250_000,
    }
}

/// A tier with fixture prices: onsale is 25% above presale, group prices 10%
/// below single
#[must_use]
pub fn tier(kind: TierKind, total_units: u32, manual_cap: u32) -> TicketTier {
    let presale = presale_price(kind) * 100;
    let onsale = presale + presale / 4;
    TicketTier {
        kind,
        total_units,
        sold_units: 0,
        manual_cap,
        manual_sold: 0,
        pricing: TierPricing {
            presale: PriceBook {
                single: Money::from_kobo(presale),
                group: Money::from_kobo(presale - presale / 10),
            },
            onsale: PriceBook {
                single: Money::from_kobo(onsale),
                group: Money::from_kobo(onsale - onsale / 10),
            },
            presale_ends_at: presale_ends_at(),
        },
        perks: TierPerks {
            seating: matches!(kind, TierKind::Gold | TierKind::Diamond),
            pack: kind != TierKind::Regular,
            merch: kind == TierKind::Diamond,
        },
    }
}

/// All five tiers with 100 units each and a manual cap of 20
#[must_use]
pub fn standard_tiers() -> Vec<TicketTier> {
    TierKind::ALL.iter().map(|k| tier(*k, 100, 20)).collect()
}

/// A buyer with an email address
#[must_use]
pub fn buyer(name: &str) -> Buyer {
    Buyer {
        name: name.to_string(),
        email: Some(format!("{}@example.com", name.to_ascii_lowercase().replace(' ', "."))),
        phone: None,
    }
}

/// An online order request
#[must_use]
pub fn new_order(tier: TierKind, group_size: GroupSize, units: u32) -> NewOrder {
    NewOrder {
        tier,
        group_size,
        units,
        parking_passes: 0,
        buyer: buyer("Ada Obi"),
        access_type: AccessType::Attendee,
    }
}

/// Verifier keyed with [`TEST_SECRET`]
#[must_use]
pub fn verifier() -> CodeVerifier {
    CodeVerifier::new(CODE_PREFIX, TEST_SECRET).expect("valid fixture prefix and secret")
}

/// Payload codec for [`EVENT_TAG`]
#[must_use]
pub fn codec() -> PayloadCodec {
    PayloadCodec::new(EVENT_TAG, EVENT_DATE, verifier())
}

/// Every service wired to one [`InMemoryStore`]
#[derive(Clone)]
pub struct Harness {
    /// Shared store
    pub store: InMemoryStore,
    /// Clock shared by all services
    pub clock: Arc<dyn Clock>,
    /// Inventory ledger
    pub ledger: InventoryLedger,
    /// Order service
    pub orders: OrderService,
    /// Gate scanner
    pub gate: GateScanner,
    /// Payload codec
    pub codec: PayloadCodec,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    /// Harness over [`standard_tiers`] at [`test_clock`]
    #[must_use]
    pub fn new() -> Self {
        Self::with_tiers(standard_tiers())
    }

    /// Harness over `tiers` at [`test_clock`]
    #[must_use]
    pub fn with_tiers(tiers: impl IntoIterator<Item = TicketTier>) -> Self {
        Self::build(InMemoryStore::with_tiers(tiers), Arc::new(test_clock()))
    }

    /// Harness over `tiers` at a fixed time
    #[must_use]
    pub fn at(tiers: impl IntoIterator<Item = TicketTier>, now: DateTime<Utc>) -> Self {
        Self::build(InMemoryStore::with_tiers(tiers), Arc::new(FixedClock::new(now)))
    }

    fn build(store: InMemoryStore, clock: Arc<dyn Clock>) -> Self {
        let shared = Arc::new(store.clone());
        let codec = codec();
        let generator = CodeGenerator::new(verifier(), clock.clone());

        Self {
            ledger: InventoryLedger::new(shared.clone(), clock.clone()),
            orders: OrderService::new(
                shared.clone(),
                shared.clone(),
                generator,
                codec.clone(),
                clock.clone(),
                OrderSettings::default(),
            ),
            gate: GateScanner::new(shared, codec.clone(), clock.clone()),
            codec,
            store,
            clock,
        }
    }

    /// Creates an order and confirms full payment for it
    ///
    /// # Errors
    ///
    /// Whatever the order service returns.
    pub async fn paid_order(
        &self,
        tier: TierKind,
        group_size: GroupSize,
        units: u32,
    ) -> Result<Completion, OrderError> {
        let order = self
            .orders
            .create_pending(new_order(tier, group_size, units))
            .await?;
        self.orders
            .confirm_payment(PaymentConfirmation {
                reference: order.number.clone(),
                provider_reference: format!("PSK-{}", order.number),
                amount: order.total,
            })
            .await
    }
}

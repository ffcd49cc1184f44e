//! HTTP API handlers and their request/response types.
//!
//! Request bodies reject unknown fields. Money is always in kobo.

pub mod admin;
pub mod gate;
pub mod orders;
pub mod payments;
pub mod stats;
pub mod tiers;

use chrono::{DateTime, Utc};
use gatepass_core::payload::render_data_url;
use gatepass_core::types::{
    Buyer, GroupSize, Money, Order, OrderStatus, PaymentMethod, PaymentStatus,
    ScanStatus, TicketCode, TierKind,
};
use serde::{Deserialize, Serialize};

/// Buyer details in a request
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuyerInput {
    /// Name printed on the ticket
    pub name: String,
    /// Email for delivery
    #[serde(default)]
    pub email: Option<String>,
    /// Phone number
    #[serde(default)]
    pub phone: Option<String>,
}

impl From<BuyerInput> for Buyer {
    fn from(input: BuyerInput) -> Self {
        let clean = |s: Option<String>| s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        Self {
            name: input.name.trim().to_string(),
            email: clean(input.email),
            phone: clean(input.phone),
        }
    }
}

pub(crate) const fn one() -> u32 {
    1
}

/// Order as returned to clients; buyer details are left out
#[derive(Debug, Clone, Serialize)]
pub struct OrderView {
    /// Order number, also the payment reference
    pub number: String,
    /// Tier
    pub tier: TierKind,
    /// Group multiplier
    pub group_size: GroupSize,
    /// People admitted
    pub quantity: u32,
    /// Parking passes
    pub parking_passes: u32,
    /// Amount due, in kobo
    pub total: Money,
    /// Payment method
    pub payment_method: PaymentMethod,
    /// Payment status
    pub payment_status: PaymentStatus,
    /// Order status
    pub status: OrderStatus,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Payment window end
    pub expires_at: DateTime<Utc>,
    /// Payment time
    pub paid_at: Option<DateTime<Utc>>,
}

impl From<&Order> for OrderView {
    fn from(order: &Order) -> Self {
        Self {
            number: order.number.as_str().to_string(),
            tier: order.tier,
            group_size: order.group_size,
            quantity: order.quantity,
            parking_passes: order.parking_passes,
            total: order.total,
            payment_method: order.payment_method,
            payment_status: order.payment_status,
            status: order.status,
            created_at: order.created_at,
            expires_at: order.expires_at,
            paid_at: order.paid_at,
        }
    }
}

/// Issued ticket with its QR image
#[derive(Debug, Clone, Serialize)]
pub struct TicketView {
    /// Ticket code
    pub code: String,
    /// Tier
    pub tier: TierKind,
    /// Scan status
    pub status: ScanStatus,
    /// Parking pass IDs
    pub parking_passes: Vec<String>,
    /// Admission time
    pub scanned_at: Option<DateTime<Utc>>,
    /// Admitting gate
    pub scan_location: Option<String>,
    /// Text encoded in the QR code
    pub qr_payload: String,
    /// QR code as an SVG data URL; absent if rendering failed
    pub qr_data_url: Option<String>,
}

impl From<&TicketCode> for TicketView {
    fn from(ticket: &TicketCode) -> Self {
        let qr_data_url = render_data_url(&ticket.qr_payload)
            .inspect_err(|e| tracing::warn!(code = %ticket.code, error = %e, "QR render failed"))
            .ok();
        Self {
            code: ticket.code.clone(),
            tier: ticket.tier,
            status: ticket.status,
            parking_passes: ticket.parking_passes.clone(),
            scanned_at: ticket.scanned_at,
            scan_location: ticket.scan_location.clone(),
            qr_payload: ticket.qr_payload.clone(),
            qr_data_url,
        }
    }
}

/// An order with its tickets
#[derive(Debug, Clone, Serialize)]
pub struct IssuedOrder {
    /// Order
    pub order: OrderView,
    /// Tickets
    pub tickets: Vec<TicketView>,
}

impl IssuedOrder {
    pub(crate) fn new(order: &Order, tickets: &[TicketCode]) -> Self {
        Self {
            order: OrderView::from(order),
            tickets: tickets.iter().map(TicketView::from).collect(),
        }
    }
}

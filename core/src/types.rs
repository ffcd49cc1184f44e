//! Domain types for ticket issuance and gate admission.
//!
//! Tier identity, order status and scan status are closed enumerations so that
//! every state machine in this crate is checked exhaustively by the compiler.

use crate::pricing::TierPricing;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for an order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(Uuid);

impl OrderId {
    /// Creates a new random `OrderId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `OrderId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an issued ticket (one per admitted person)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TicketId(Uuid);

impl TicketId {
    /// Creates a new random `TicketId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `TicketId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TicketId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Human-readable order number, e.g. `IAF-2026-0001`.
///
/// The sequence part is allocated by the order store, so numbers are unique
/// without relying on randomness.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    /// Formats an order number from a prefix and a store-allocated sequence
    #[must_use]
    pub fn new(prefix: &str, sequence: u64) -> Self {
        Self(format!("{prefix}-{sequence:04}"))
    }

    /// Wraps an order number received from outside (payment reference, URL path)
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into().trim().to_string())
    }

    /// Returns the order number as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Money Value Object (kobo-based to avoid floating point errors)
// ============================================================================

/// Money in kobo (1/100 naira), the unit the payment gateway reports amounts in
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Zero amount
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from kobo
    #[must_use]
    pub const fn from_kobo(kobo: u64) -> Self {
        Self(kobo)
    }

    /// Creates a `Money` value from whole naira, `None` on overflow
    #[must_use]
    pub const fn from_naira(naira: u64) -> Option<Self> {
        match naira.checked_mul(100) {
            Some(kobo) => Some(Self(kobo)),
            None => None,
        }
    }

    /// Returns the amount in kobo
    #[must_use]
    pub const fn kobo(&self) -> u64 {
        self.0
    }

    /// Returns the amount in whole naira (rounded down)
    #[must_use]
    pub const fn naira(&self) -> u64 {
        self.0 / 100
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Adds two money amounts with overflow checking
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Multiplies money by a quantity with overflow checking
    #[must_use]
    pub const fn checked_multiply(self, quantity: u32) -> Option<Self> {
        match self.0.checked_mul(quantity as u64) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NGN {}.{:02}", self.naira(), self.0 % 100)
    }
}

// ============================================================================
// Closed enumerations
// ============================================================================

/// Error returned when a string does not name a known variant
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value:?}")]
pub struct ParseEnumError {
    /// Which enumeration was being parsed
    pub kind: &'static str,
    /// The rejected input
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Ticket tier (a purchasable category with its own price and capacity)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierKind {
    /// Bronze tier
    Bronze,
    /// Silver tier
    Silver,
    /// Gold tier
    Gold,
    /// Diamond tier
    Diamond,
    /// Regular (general admission)
    Regular,
}

impl TierKind {
    /// All tiers, in display order
    pub const ALL: [Self; 5] = [
        Self::Regular,
        Self::Bronze,
        Self::Silver,
        Self::Gold,
        Self::Diamond,
    ];

    /// Storage key
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Bronze => "bronze",
            Self::Silver => "silver",
            Self::Gold => "gold",
            Self::Diamond => "diamond",
            Self::Regular => "regular",
        }
    }

    /// Name printed on tickets and shown to gate staff
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Bronze => "Bronze",
            Self::Silver => "Silver",
            Self::Gold => "Gold",
            Self::Diamond => "Diamond",
            Self::Regular => "Regular",
        }
    }
}

impl fmt::Display for TierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for TierKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bronze" => Ok(Self::Bronze),
            "silver" => Ok(Self::Silver),
            "gold" => Ok(Self::Gold),
            "diamond" => Ok(Self::Diamond),
            "regular" => Ok(Self::Regular),
            _ => Err(ParseEnumError::new("tier", s)),
        }
    }
}

/// Group multiplier applied to one purchased unit
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupSize {
    /// One person
    #[default]
    Single,
    /// Two people
    Pair,
    /// Four people
    Quad,
}

impl GroupSize {
    /// Number of people admitted by one unit of this size
    #[must_use]
    pub const fn people(&self) -> u32 {
        match self {
            Self::Single => 1,
            Self::Pair => 2,
            Self::Quad => 4,
        }
    }

    /// Storage key
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Pair => "pair",
            Self::Quad => "quad",
        }
    }

    /// Whether group pricing applies
    #[must_use]
    pub const fn is_group(&self) -> bool {
        !matches!(self, Self::Single)
    }
}

impl FromStr for GroupSize {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" | "1" | "x1" => Ok(Self::Single),
            "pair" | "2" | "x2" => Ok(Self::Pair),
            "quad" | "4" | "x4" => Ok(Self::Quad),
            _ => Err(ParseEnumError::new("group size", s)),
        }
    }
}

/// Order status.
///
/// ```text
/// pending ──► completed ──► refunded
///    │            └───────► cancelled
///    ├──► failed
///    └──► cancelled
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Awaiting payment confirmation
    Pending,
    /// Paid and tickets minted
    Completed,
    /// Payment or inventory commit failed
    Failed,
    /// Money returned after completion
    Refunded,
    /// Withdrawn before or after completion
    Cancelled,
}

impl OrderStatus {
    /// Storage key
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
            Self::Cancelled => "cancelled",
        }
    }

    /// Terminal statuses accept no further transitions except the
    /// completed → refunded/cancelled reversal
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Whether `self → next` is a legal transition
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (
                Self::Pending,
                Self::Completed | Self::Failed | Self::Cancelled | Self::Refunded
            ) | (Self::Completed, Self::Refunded | Self::Cancelled)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "refunded" => Ok(Self::Refunded),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(ParseEnumError::new("order status", s)),
        }
    }
}

/// How an order was paid
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Online card/bank payment through the payment gateway
    Paystack,
    /// Cash at the gate
    Cash,
    /// Issued free of charge (guests, vendors)
    Complimentary,
}

impl PaymentMethod {
    /// Storage key
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Paystack => "paystack",
            Self::Cash => "cash",
            Self::Complimentary => "complimentary",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paystack" => Ok(Self::Paystack),
            "cash" => Ok(Self::Cash),
            "complimentary" => Ok(Self::Complimentary),
            _ => Err(ParseEnumError::new("payment method", s)),
        }
    }
}

/// Payment state of an order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// No confirmed payment yet
    Unpaid,
    /// Payment confirmed
    Paid,
    /// Payment attempt failed
    Failed,
    /// Payment returned
    Refunded,
}

impl PaymentStatus {
    /// Storage key
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unpaid => "unpaid",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unpaid" => Ok(Self::Unpaid),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            "refunded" => Ok(Self::Refunded),
            _ => Err(ParseEnumError::new("payment status", s)),
        }
    }
}

/// Scan state of a ticket code. `Scanned` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    /// Issued, not yet used
    Pending,
    /// Holder admitted
    Scanned,
}

impl ScanStatus {
    /// Storage key
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Scanned => "scanned",
        }
    }
}

impl FromStr for ScanStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "scanned" => Ok(Self::Scanned),
            _ => Err(ParseEnumError::new("scan status", s)),
        }
    }
}

/// Who a ticket admits
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessType {
    /// Paying or invited guest
    #[default]
    Attendee,
    /// Vendor staff
    Vendor,
}

impl AccessType {
    /// Storage key
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Attendee => "attendee",
            Self::Vendor => "vendor",
        }
    }
}

impl FromStr for AccessType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "attendee" => Ok(Self::Attendee),
            "vendor" => Ok(Self::Vendor),
            _ => Err(ParseEnumError::new("access type", s)),
        }
    }
}

/// Which inventory channel a sale draws through
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SalesChannel {
    /// Online sale confirmed by the payment gateway
    #[default]
    Online,
    /// Cash sale at the gate, subject to the per-tier manual cap
    Manual,
}

impl SalesChannel {
    /// Storage key
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Manual => "manual",
        }
    }
}

impl FromStr for SalesChannel {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(Self::Online),
            "manual" => Ok(Self::Manual),
            _ => Err(ParseEnumError::new("sales channel", s)),
        }
    }
}

/// Adjudicated result of a gate scan attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanOutcome {
    /// Admitted; the ticket is now scanned
    Success,
    /// Ticket was already used
    AlreadyUsed,
    /// Ticket exists but its order is not completed
    Blocked,
    /// Code failed validation or does not exist
    Invalid,
}

impl ScanOutcome {
    /// Storage key
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::AlreadyUsed => "already_used",
            Self::Blocked => "blocked",
            Self::Invalid => "invalid",
        }
    }
}

impl fmt::Display for ScanOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanOutcome {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "already_used" => Ok(Self::AlreadyUsed),
            "blocked" => Ok(Self::Blocked),
            "invalid" => Ok(Self::Invalid),
            _ => Err(ParseEnumError::new("scan outcome", s)),
        }
    }
}

// ============================================================================
// Entities
// ============================================================================

/// Perks bundled with a tier
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierPerks {
    /// Reserved seating
    pub seating: bool,
    /// Welcome pack
    pub pack: bool,
    /// Merchandise included
    pub merch: bool,
}

/// A purchasable ticket category with its own price and capacity
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketTier {
    /// Tier identity
    pub kind: TierKind,
    /// Capacity in admitted people
    pub total_units: u32,
    /// People committed so far (online and manual)
    pub sold_units: u32,
    /// Cap on units sellable through the manual (cash) channel
    pub manual_cap: u32,
    /// Units sold through the manual channel, also counted in `sold_units`
    pub manual_sold: u32,
    /// Presale/onsale prices
    pub pricing: TierPricing,
    /// Bundled perks
    pub perks: TierPerks,
}

impl TicketTier {
    /// Units still available through any channel
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.total_units.saturating_sub(self.sold_units)
    }

    /// Units still available through the manual channel, bounded by both caps
    #[must_use]
    pub const fn manual_remaining(&self) -> u32 {
        let manual = self.manual_cap.saturating_sub(self.manual_sold);
        let overall = self.remaining();
        if manual < overall { manual } else { overall }
    }
}

/// Purchaser contact details
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buyer {
    /// Name printed on the ticket
    pub name: String,
    /// Email for ticket delivery
    pub email: Option<String>,
    /// Phone number
    pub phone: Option<String>,
}

/// One purchase transaction for tickets of a single tier
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Internal identifier
    pub id: OrderId,
    /// Human-readable order number (also the payment reference)
    pub number: OrderNumber,
    /// Tier purchased
    pub tier: TierKind,
    /// Group multiplier chosen at purchase
    pub group_size: GroupSize,
    /// Total admitted people; one ticket code is minted per person
    pub quantity: u32,
    /// Parking passes bundled with the order
    pub parking_passes: u32,
    /// Amount due
    pub total: Money,
    /// How the order is paid
    pub payment_method: PaymentMethod,
    /// Payment state
    pub payment_status: PaymentStatus,
    /// Order state
    pub status: OrderStatus,
    /// Inventory channel
    pub channel: SalesChannel,
    /// Attendee or vendor
    pub access_type: AccessType,
    /// Purchaser
    pub buyer: Buyer,
    /// Gateway transaction reference, once paid
    pub provider_reference: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Advisory end of the payment window
    pub expires_at: DateTime<Utc>,
    /// When payment was confirmed
    pub paid_at: Option<DateTime<Utc>>,
}

/// The unit that is scanned at the gate
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketCode {
    /// Internal identifier
    pub id: TicketId,
    /// Tamper-evident code string, unique across the system
    pub code: String,
    /// Owning order
    pub order_id: OrderId,
    /// Owning order's number
    pub order_number: OrderNumber,
    /// Tier of the owning order
    pub tier: TierKind,
    /// Encoded QR payload text
    pub qr_payload: String,
    /// Scan state
    pub status: ScanStatus,
    /// When the holder was admitted
    pub scanned_at: Option<DateTime<Utc>>,
    /// Gate that admitted the holder
    pub scan_location: Option<String>,
    /// Up to two parking pass identifiers
    pub parking_passes: Vec<String>,
    /// Issuance time
    pub created_at: DateTime<Utc>,
}

/// Append-only record of one gate scan attempt
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryLogEntry {
    /// Row identifier
    pub id: Uuid,
    /// Code as presented (may not exist)
    pub ticket: String,
    /// Access type, when the ticket was found
    pub access_type: Option<AccessType>,
    /// Tier, when the ticket was found
    pub tier: Option<TierKind>,
    /// Payment method of the owning order, when found
    pub payment_method: Option<PaymentMethod>,
    /// Adjudicated outcome
    pub outcome: ScanOutcome,
    /// Gate identifier
    pub gate: String,
    /// Attempt time
    pub at: DateTime<Utc>,
}

/// Why an inventory counter moved
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryReason {
    /// Online order completed
    OrderCompleted,
    /// Cash sale at the gate
    CashSale,
    /// Completed order refunded
    Refund,
    /// Completed order cancelled
    Cancellation,
}

impl InventoryReason {
    /// Storage key
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OrderCompleted => "order_completed",
            Self::CashSale => "cash_sale",
            Self::Refund => "refund",
            Self::Cancellation => "cancellation",
        }
    }
}

impl FromStr for InventoryReason {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "order_completed" => Ok(Self::OrderCompleted),
            "cash_sale" => Ok(Self::CashSale),
            "refund" => Ok(Self::Refund),
            "cancellation" => Ok(Self::Cancellation),
            _ => Err(ParseEnumError::new("inventory reason", s)),
        }
    }
}

/// Immutable record of one `sold_units` mutation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryLogEntry {
    /// Row identifier
    pub id: Uuid,
    /// Tier mutated
    pub tier: TierKind,
    /// `sold_units` before
    pub previous: u32,
    /// `sold_units` after
    pub new: u32,
    /// Triggering order
    pub order: OrderNumber,
    /// Why the counter moved
    pub reason: InventoryReason,
    /// When
    pub at: DateTime<Utc>,
}

impl InventoryLogEntry {
    /// Signed change applied to `sold_units`
    #[must_use]
    pub fn delta(&self) -> i64 {
        i64::from(self.new) - i64::from(self.previous)
    }
}

/// Entity an audit row refers to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// An order
    Order,
    /// A ticket code
    Ticket,
    /// A ticket tier
    Tier,
}

impl EntityType {
    /// Storage key
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Order => "order",
            Self::Ticket => "ticket",
            Self::Tier => "tier",
        }
    }
}

impl FromStr for EntityType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "order" => Ok(Self::Order),
            "ticket" => Ok(Self::Ticket),
            "tier" => Ok(Self::Tier),
            _ => Err(ParseEnumError::new("entity type", s)),
        }
    }
}

/// Generic audit row keyed by entity type and id
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Row identifier
    pub id: Uuid,
    /// Entity kind
    pub entity_type: EntityType,
    /// Entity key (order number, ticket code, tier key)
    pub entity_id: String,
    /// What happened, e.g. `order.completed`
    pub action: String,
    /// Structured details
    pub detail: serde_json::Value,
    /// When
    pub at: DateTime<Utc>,
}

impl AuditLogEntry {
    /// Creates a new audit row
    #[must_use]
    pub fn new(
        entity_type: EntityType,
        entity_id: impl Into<String>,
        action: impl Into<String>,
        detail: serde_json::Value,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity_type,
            entity_id: entity_id.into(),
            action: action.into(),
            detail,
            at,
        }
    }
}

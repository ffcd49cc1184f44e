//! Row shapes and their conversion into domain values.
//!
//! Enumerations are stored as their `as_str` keys and counters as `BIGINT`;
//! anything that fails to convert back is reported as [`StoreError::Corrupt`].

use chrono::{DateTime, Utc};
use gatepass_core::pricing::{PriceBook, TierPricing};
use gatepass_core::store::StoreError;
use gatepass_core::types::{
    AuditLogEntry, Buyer, EntryLogEntry, InventoryLogEntry, Money, Order, OrderId, OrderNumber,
    ParseEnumError, TicketCode, TicketId, TicketTier, TierPerks,
};
use sqlx::FromRow;
use sqlx::types::Json;
use std::str::FromStr;
use uuid::Uuid;

pub(crate) const TIER_COLUMNS: &str = "kind, total_units, sold_units, manual_cap, manual_sold, \
     presale_single_kobo, presale_group_kobo, onsale_single_kobo, onsale_group_kobo, \
     presale_ends_at, perks";

pub(crate) const ORDER_COLUMNS: &str = "id, number, tier, group_size, quantity, parking_passes, \
     total_kobo, payment_method, payment_status, status, channel, access_type, buyer_name, \
     buyer_email, buyer_phone, provider_reference, created_at, expires_at, paid_at";

pub(crate) const TICKET_COLUMNS: &str = "id, code, order_id, order_number, tier, qr_payload, \
     status, scanned_at, scan_location, parking_passes, created_at";

pub(crate) const ENTRY_COLUMNS: &str =
    "id, ticket, access_type, tier, payment_method, outcome, gate, at";

pub(crate) const INVENTORY_COLUMNS: &str = "id, tier, previous, new, order_number, reason, at";

pub(crate) const AUDIT_COLUMNS: &str = "id, entity_type, entity_id, action, detail, at";

// ============================================================================
// Scalar conversions
// ============================================================================

pub(crate) fn parse<T>(raw: &str) -> Result<T, StoreError>
where
    T: FromStr<Err = ParseEnumError>,
{
    raw.parse()
        .map_err(|e: ParseEnumError| StoreError::Corrupt(e.to_string()))
}

fn parse_opt<T>(raw: Option<&str>) -> Result<Option<T>, StoreError>
where
    T: FromStr<Err = ParseEnumError>,
{
    raw.map(parse).transpose()
}

pub(crate) fn count(value: i64, column: &str) -> Result<u32, StoreError> {
    u32::try_from(value)
        .map_err(|_| StoreError::Corrupt(format!("{column} out of range: {value}")))
}

fn money(value: i64, column: &str) -> Result<Money, StoreError> {
    u64::try_from(value)
        .map(Money::from_kobo)
        .map_err(|_| StoreError::Corrupt(format!("{column} is negative: {value}")))
}

pub(crate) fn kobo(amount: Money) -> Result<i64, StoreError> {
    i64::try_from(amount.kobo())
        .map_err(|_| StoreError::Conflict(format!("amount {amount} exceeds storage range")))
}

// ============================================================================
// Rows
// ============================================================================

#[derive(Debug, FromRow)]
pub(crate) struct TierRow {
    kind: String,
    total_units: i64,
    sold_units: i64,
    manual_cap: i64,
    manual_sold: i64,
    presale_single_kobo: i64,
    presale_group_kobo: i64,
    onsale_single_kobo: i64,
    onsale_group_kobo: i64,
    presale_ends_at: DateTime<Utc>,
    perks: Json<TierPerks>,
}

impl TryFrom<TierRow> for TicketTier {
    type Error = StoreError;

    fn try_from(row: TierRow) -> Result<Self, Self::Error> {
        Ok(Self {
            kind: parse(&row.kind)?,
            total_units: count(row.total_units, "total_units")?,
            sold_units: count(row.sold_units, "sold_units")?,
            manual_cap: count(row.manual_cap, "manual_cap")?,
            manual_sold: count(row.manual_sold, "manual_sold")?,
            pricing: TierPricing {
                presale: PriceBook {
                    single: money(row.presale_single_kobo, "presale_single_kobo")?,
                    group: money(row.presale_group_kobo, "presale_group_kobo")?,
                },
                onsale: PriceBook {
                    single: money(row.onsale_single_kobo, "onsale_single_kobo")?,
                    group: money(row.onsale_group_kobo, "onsale_group_kobo")?,
                },
                presale_ends_at: row.presale_ends_at,
            },
            perks: row.perks.0,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct OrderRow {
    id: Uuid,
    number: String,
    tier: String,
    group_size: String,
    quantity: i64,
    parking_passes: i64,
    total_kobo: i64,
    payment_method: String,
    payment_status: String,
    status: String,
    channel: String,
    access_type: String,
    buyer_name: String,
    buyer_email: Option<String>,
    buyer_phone: Option<String>,
    provider_reference: Option<String>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: OrderId::from_uuid(row.id),
            number: OrderNumber::from_raw(row.number),
            tier: parse(&row.tier)?,
            group_size: parse(&row.group_size)?,
            quantity: count(row.quantity, "quantity")?,
            parking_passes: count(row.parking_passes, "parking_passes")?,
            total: money(row.total_kobo, "total_kobo")?,
            payment_method: parse(&row.payment_method)?,
            payment_status: parse(&row.payment_status)?,
            status: parse(&row.status)?,
            channel: parse(&row.channel)?,
            access_type: parse(&row.access_type)?,
            buyer: Buyer {
                name: row.buyer_name,
                email: row.buyer_email,
                phone: row.buyer_phone,
            },
            provider_reference: row.provider_reference,
            created_at: row.created_at,
            expires_at: row.expires_at,
            paid_at: row.paid_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct TicketRow {
    id: Uuid,
    code: String,
    order_id: Uuid,
    order_number: String,
    tier: String,
    qr_payload: String,
    status: String,
    scanned_at: Option<DateTime<Utc>>,
    scan_location: Option<String>,
    parking_passes: Vec<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<TicketRow> for TicketCode {
    type Error = StoreError;

    fn try_from(row: TicketRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: TicketId::from_uuid(row.id),
            code: row.code,
            order_id: OrderId::from_uuid(row.order_id),
            order_number: OrderNumber::from_raw(row.order_number),
            tier: parse(&row.tier)?,
            qr_payload: row.qr_payload,
            status: parse(&row.status)?,
            scanned_at: row.scanned_at,
            scan_location: row.scan_location,
            parking_passes: row.parking_passes,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct EntryRow {
    id: Uuid,
    ticket: String,
    access_type: Option<String>,
    tier: Option<String>,
    payment_method: Option<String>,
    outcome: String,
    gate: String,
    at: DateTime<Utc>,
}

impl TryFrom<EntryRow> for EntryLogEntry {
    type Error = StoreError;

    fn try_from(row: EntryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            ticket: row.ticket,
            access_type: parse_opt(row.access_type.as_deref())?,
            tier: parse_opt(row.tier.as_deref())?,
            payment_method: parse_opt(row.payment_method.as_deref())?,
            outcome: parse(&row.outcome)?,
            gate: row.gate,
            at: row.at,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct InventoryRow {
    id: Uuid,
    tier: String,
    previous: i64,
    new: i64,
    order_number: String,
    reason: String,
    at: DateTime<Utc>,
}

impl TryFrom<InventoryRow> for InventoryLogEntry {
    type Error = StoreError;

    fn try_from(row: InventoryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            tier: parse(&row.tier)?,
            previous: count(row.previous, "previous")?,
            new: count(row.new, "new")?,
            order: OrderNumber::from_raw(row.order_number),
            reason: parse(&row.reason)?,
            at: row.at,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct AuditRow {
    id: Uuid,
    entity_type: String,
    entity_id: String,
    action: String,
    detail: serde_json::Value,
    at: DateTime<Utc>,
}

impl TryFrom<AuditRow> for AuditLogEntry {
    type Error = StoreError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            entity_type: parse(&row.entity_type)?,
            entity_id: row.entity_id,
            action: row.action,
            detail: row.detail,
            at: row.at,
        })
    }
}

/// Converts every row, failing on the first corrupt one
pub(crate) fn convert<R, T>(rows: Vec<R>) -> Result<Vec<T>, StoreError>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use gatepass_core::types::{ScanOutcome, TierKind};

    #[test]
    fn test_parse_keys() {
        assert_eq!(parse::<TierKind>("gold"), Ok(TierKind::Gold));
        assert_eq!(parse::<ScanOutcome>("already_used"), Ok(ScanOutcome::AlreadyUsed));
        assert!(matches!(
            parse::<TierKind>("platinum"),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[test]
    fn test_counters_reject_out_of_range() {
        assert_eq!(count(7, "sold_units"), Ok(7));
        assert!(count(-1, "sold_units").is_err());
        assert!(count(i64::MAX, "sold_units").is_err());
        assert!(money(-5, "total_kobo").is_err());
        assert_eq!(kobo(Money::from_kobo(1_250_000)), Ok(1_250_000));
        assert!(kobo(Money::from_kobo(u64::MAX)).is_err());
    }

    #[test]
    fn test_entry_row_with_unknown_ticket() {
        let row = EntryRow {
            id: Uuid::new_v4(),
            ticket: "garbage".to_string(),
            access_type: None,
            tier: None,
            payment_method: None,
            outcome: "invalid".to_string(),
            gate: "north".to_string(),
            at: Utc::now(),
        };
        let entry = EntryLogEntry::try_from(row).unwrap();
        assert_eq!(entry.outcome, ScanOutcome::Invalid);
        assert_eq!(entry.tier, None);
    }
}

//! Gate admission.
//!
//! A ticket moves `pending -> scanned` exactly once. The decision runs in
//! this order and stops at the first rejection:
//!
//! 1. integrity: payload structure, event tag, code checksum → `INVALID`
//! 2. lookup by code → `INVALID` if not found
//! 3. already scanned → `ALREADY_USED` with the first scan's time and gate
//! 4. owning order not completed → `BLOCKED`
//! 5. conditional transition in the store → `SUCCESS`
//!
//! Step 5 is the source of truth: when two gates race, the loser observes
//! the winner's scan and reports `ALREADY_USED`. The transition re-checks the
//! order status, so a refund landing after the lookup still yields `BLOCKED`. Every adjudicated attempt
//! is written to the entry log. Store failures are not adjudications and
//! are returned as [`GateError`] without an entry-log row.

use crate::codes::CodeError;
use crate::environment::Clock;
use crate::payload::{PayloadCodec, PayloadError};
use crate::store::{AdmitOutcome, Admission, GateStore, ScanTarget, StoreError};
use crate::types::{
    AccessType, AuditLogEntry, EntityType, EntryLogEntry, GroupSize, OrderStatus, ScanStatus,
    TierKind,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

pub use crate::types::ScanOutcome;

/// Longest presented text kept in the entry log
const MAX_LOGGED_INPUT: usize = 128;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// A scan attempt from a gate device
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRequest {
    /// Scanned QR text or a manually typed code
    pub input: String,
    /// Gate identifier
    pub gate: String,
}

/// Why a scan was refused
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    /// Payload is not a ticket payload
    MalformedPayload,
    /// Typed code is not shaped like a ticket code
    MalformedCode,
    /// Payload is for another event
    WrongEvent,
    /// Code belongs to another namespace
    WrongPrefix,
    /// Code checksum does not match
    TamperedCode,
    /// Code was never issued
    NotFound,
    /// Payload's order disagrees with the stored ticket
    PayloadMismatch,
    /// Owning order is not completed
    OrderNotCompleted,
}

impl RejectReason {
    /// Human-readable reason for gate staff
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::MalformedPayload => "Not a valid ticket QR code",
            Self::MalformedCode => "Not a valid ticket code",
            Self::WrongEvent => "Ticket is for a different event",
            Self::WrongPrefix => "Ticket code is not from this event",
            Self::TamperedCode => "Ticket code failed verification",
            Self::NotFound => "Ticket not found",
            Self::PayloadMismatch => "QR details do not match the ticket on record",
            Self::OrderNotCompleted => "Order not completed",
        }
    }

    /// Outcome this reason maps to
    #[must_use]
    pub const fn outcome(&self) -> ScanOutcome {
        match self {
            Self::OrderNotCompleted => ScanOutcome::Blocked,
            _ => ScanOutcome::Invalid,
        }
    }
}

impl From<&PayloadError> for RejectReason {
    fn from(err: &PayloadError) -> Self {
        match err {
            PayloadError::MalformedPayload(_) | PayloadError::Render(_) => Self::MalformedPayload,
            PayloadError::WrongEvent { .. } => Self::WrongEvent,
            PayloadError::WrongPrefix { .. } => Self::WrongPrefix,
            PayloadError::TamperedCode => Self::TamperedCode,
        }
    }
}

impl From<&CodeError> for RejectReason {
    fn from(err: &CodeError) -> Self {
        match err {
            CodeError::Malformed { .. } | CodeError::InvalidConfig(_) => Self::MalformedCode,
            CodeError::WrongPrefix { .. } => Self::WrongPrefix,
            CodeError::Tampered => Self::TamperedCode,
        }
    }
}

/// Ticket details shown to gate staff
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketDisplay {
    /// Ticket code
    pub code: String,
    /// Owning order
    pub order_number: String,
    /// Buyer name
    pub customer_name: String,
    /// Tier
    pub tier: TierKind,
    /// Group multiplier of the order
    pub group_size: GroupSize,
    /// Attendee or vendor
    pub access_type: AccessType,
    /// Parking passes attached to this ticket
    pub parking_passes: Vec<String>,
    /// Admission time, if admitted
    pub scanned_at: Option<DateTime<Utc>>,
    /// Admitting gate, if admitted
    pub scan_location: Option<String>,
}

impl From<&ScanTarget> for TicketDisplay {
    fn from(target: &ScanTarget) -> Self {
        Self {
            code: target.ticket.code.clone(),
            order_number: target.order.number.as_str().to_string(),
            customer_name: target.order.buyer.name.clone(),
            tier: target.ticket.tier,
            group_size: target.order.group_size,
            access_type: target.order.access_type,
            parking_passes: target.ticket.parking_passes.clone(),
            scanned_at: target.ticket.scanned_at,
            scan_location: target.ticket.scan_location.clone(),
        }
    }
}

/// Adjudicated scan
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    /// Tag for the gate UI
    pub outcome: ScanOutcome,
    /// Rejection reason, for `BLOCKED` and `INVALID`
    pub reason: Option<RejectReason>,
    /// Human-readable detail
    pub detail: String,
    /// Ticket details when the ticket was found
    pub display: Option<TicketDisplay>,
}

/// Decision on a found ticket before any state change
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Proceed to the conditional transition
    Admit,
    /// Already scanned
    AlreadyUsed {
        /// First admission time
        scanned_at: Option<DateTime<Utc>>,
        /// First admission gate
        location: Option<String>,
    },
    /// Order is not completed
    Blocked(OrderStatus),
}

/// Decides a found ticket. Already-used is checked before the order status.
#[must_use]
pub fn adjudicate(target: &ScanTarget) -> Verdict {
    if target.ticket.status == ScanStatus::Scanned {
        return Verdict::AlreadyUsed {
            scanned_at: target.ticket.scanned_at,
            location: target.ticket.scan_location.clone(),
        };
    }
    if target.order.status != OrderStatus::Completed {
        return Verdict::Blocked(target.order.status);
    }
    Verdict::Admit
}

/// Infrastructure failure during a scan; the scan was not adjudicated
#[derive(Debug, Error)]
pub enum GateError {
    /// Storage failure
    #[error("scan could not be completed: {0}")]
    Store(#[from] StoreError),
}

/// Gate scanner
#[derive(Clone)]
pub struct GateScanner {
    store: Arc<dyn GateStore>,
    payloads: PayloadCodec,
    clock: Arc<dyn Clock>,
}

impl GateScanner {
    /// Creates a scanner
    #[must_use]
    pub fn new(store: Arc<dyn GateStore>, payloads: PayloadCodec, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            payloads,
            clock,
        }
    }

    /// Adjudicates one scan attempt.
    ///
    /// Input starting with `{` is decoded as a QR payload; anything else is
    /// treated as a typed code.
    ///
    /// # Errors
    ///
    /// [`GateError::Store`] if the store fails; the caller should retry the
    /// whole scan.
    pub async fn scan(&self, request: ScanRequest) -> Result<ScanReport, GateError> {
        let input = request.input.trim();
        let gate = request.gate.trim();

        let (code, expected_order) = match self.identify(input) {
            Ok(found) => found,
            Err(reason) => {
                let presented: String = input.chars().take(MAX_LOGGED_INPUT).collect();
                return self.reject(&presented, gate, reason, None).await;
            },
        };
        let qr_payload = expected_order.is_some().then_some(input);

        let Some(target) = self.store.scan_target(&code, qr_payload).await? else {
            return self.reject(&code, gate, RejectReason::NotFound, None).await;
        };

        if let Some(order) = expected_order {
            if order != target.ticket.order_number.as_str() {
                tracing::warn!(
                    code = %code,
                    payload_order = %order,
                    stored_order = %target.ticket.order_number,
                    "Payload order does not match stored ticket"
                );
                return self
                    .reject(&code, gate, RejectReason::PayloadMismatch, Some(&target))
                    .await;
            }
        }

        match adjudicate(&target) {
            Verdict::AlreadyUsed {
                scanned_at,
                location,
            } => self.already_used(&target, gate, scanned_at, location).await,
            Verdict::Blocked(status) => {
                tracing::info!(
                    code = %code,
                    order = %target.order.number,
                    status = %status,
                    "Ticket blocked"
                );
                self.reject(&code, gate, RejectReason::OrderNotCompleted, Some(&target))
                    .await
            },
            Verdict::Admit => self.admit(&target, gate).await,
        }
    }

    /// Returns the normalized code and, for payloads, the claimed order number.
    fn identify(&self, input: &str) -> Result<(String, Option<String>), RejectReason> {
        if input.starts_with('{') {
            let payload = self.payloads.decode(input).map_err(|e| {
                tracing::debug!(error = %e, "Payload rejected");
                RejectReason::from(&e)
            })?;
            Ok((payload.code, Some(payload.order)))
        } else {
            let code = self.payloads.verifier().verify(input).map_err(|e| {
                tracing::debug!(error = %e, "Typed code rejected");
                RejectReason::from(&e)
            })?;
            Ok((code, None))
        }
    }

    async fn admit(&self, target: &ScanTarget, gate: &str) -> Result<ScanReport, GateError> {
        let now = self.clock.now();
        let code = &target.ticket.code;
        let admission = Admission {
            ticket: target.ticket.id,
            gate: gate.to_string(),
            at: now,
            entry: entry(code, gate, ScanOutcome::Success, Some(target), now),
            audit: AuditLogEntry::new(
                EntityType::Ticket,
                code.as_str(),
                "ticket.scanned",
                serde_json::json!({
                    "order": target.order.number.as_str(),
                    "gate": gate,
                }),
                now,
            ),
        };

        match self.store.admit(&admission).await? {
            AdmitOutcome::Admitted => {
                metrics::counter!("gatepass_scans_total", "outcome" => "success").increment(1);
                tracing::info!(
                    code = %code,
                    order = %target.order.number,
                    tier = %target.ticket.tier,
                    gate,
                    "Ticket admitted"
                );

                let mut display = TicketDisplay::from(target);
                display.scanned_at = Some(now);
                display.scan_location = Some(gate.to_string());
                Ok(ScanReport {
                    outcome: ScanOutcome::Success,
                    reason: None,
                    detail: format!(
                        "Admit {} ({})",
                        target.order.buyer.name,
                        target.ticket.tier.display_name()
                    ),
                    display: Some(display),
                })
            },
            AdmitOutcome::AlreadyScanned {
                scanned_at,
                location,
            } => {
                tracing::info!(code = %code, gate, "Lost admission race");
                self.already_used(target, gate, scanned_at, location).await
            },
            AdmitOutcome::OrderNotCompleted(status) => {
                tracing::warn!(
                    code = %code,
                    order = %target.order.number,
                    status = %status,
                    "Order closed during scan; ticket blocked"
                );
                let mut current = target.clone();
                current.order.status = status;
                self.reject(code, gate, RejectReason::OrderNotCompleted, Some(&current))
                    .await
            },
            AdmitOutcome::NotFound => self.reject(code, gate, RejectReason::NotFound, None).await,
        }
    }

    async fn already_used(
        &self,
        target: &ScanTarget,
        gate: &str,
        scanned_at: Option<DateTime<Utc>>,
        location: Option<String>,
    ) -> Result<ScanReport, GateError> {
        let now = self.clock.now();
        let code = &target.ticket.code;
        self.log_entry(&entry(code, gate, ScanOutcome::AlreadyUsed, Some(target), now))
            .await;
        metrics::counter!("gatepass_scans_total", "outcome" => "already_used").increment(1);
        tracing::warn!(
            code = %code,
            gate,
            first_scanned_at = ?scanned_at,
            first_gate = ?location,
            "Ticket already used"
        );

        let detail = match (&scanned_at, &location) {
            (Some(at), Some(loc)) => format!("Already used at {} ({loc})", at.format(TIME_FORMAT)),
            (Some(at), None) => format!("Already used at {}", at.format(TIME_FORMAT)),
            _ => "Already used".to_string(),
        };
        let mut display = TicketDisplay::from(target);
        display.scanned_at = scanned_at;
        display.scan_location = location;

        Ok(ScanReport {
            outcome: ScanOutcome::AlreadyUsed,
            reason: None,
            detail,
            display: Some(display),
        })
    }

    async fn reject(
        &self,
        presented: &str,
        gate: &str,
        reason: RejectReason,
        target: Option<&ScanTarget>,
    ) -> Result<ScanReport, GateError> {
        let outcome = reason.outcome();
        let now = self.clock.now();
        self.log_entry(&entry(presented, gate, outcome, target, now))
            .await;
        metrics::counter!("gatepass_scans_total", "outcome" => outcome.as_str()).increment(1);

        let detail = match (reason, target) {
            (RejectReason::OrderNotCompleted, Some(t)) => {
                format!("{}: order {} is {}", reason.message(), t.order.number, t.order.status)
            },
            _ => reason.message().to_string(),
        };

        Ok(ScanReport {
            outcome,
            reason: Some(reason),
            detail,
            display: target.map(TicketDisplay::from),
        })
    }

    /// Writes a non-admitting entry-log row. The decision stands if the write
    /// fails.
    async fn log_entry(&self, entry: &EntryLogEntry) {
        if let Err(e) = self.store.record_entry(entry).await {
            tracing::error!(
                ticket = %entry.ticket,
                outcome = entry.outcome.as_str(),
                error = %e,
                "Failed to write entry log"
            );
        }
    }
}

fn entry(
    presented: &str,
    gate: &str,
    outcome: ScanOutcome,
    target: Option<&ScanTarget>,
    at: DateTime<Utc>,
) -> EntryLogEntry {
    EntryLogEntry {
        id: Uuid::new_v4(),
        ticket: presented.to_string(),
        access_type: target.map(|t| t.order.access_type),
        tier: target.map(|t| t.ticket.tier),
        payment_method: target.map(|t| t.order.payment_method),
        outcome,
        gate: gate.to_string(),
        at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        Buyer, Money, Order, OrderId, OrderNumber, PaymentMethod, PaymentStatus, SalesChannel,
        TicketCode, TicketId,
    };

    fn target(order_status: OrderStatus, scan_status: ScanStatus) -> ScanTarget {
        let now = Utc::now();
        let number = OrderNumber::from_raw("IAF-2026-0001");
        let order = Order {
            id: OrderId::new(),
            number: number.clone(),
            tier: TierKind::Bronze,
            group_size: GroupSize::Single,
            quantity: 1,
            parking_passes: 0,
            total: Money::from_kobo(500_000),
            payment_method: PaymentMethod::Paystack,
            payment_status: PaymentStatus::Paid,
            status: order_status,
            channel: SalesChannel::Online,
            access_type: AccessType::Attendee,
            buyer: Buyer {
                name: "Ada Obi".to_string(),
                email: None,
                phone: None,
            },
            provider_reference: None,
            created_at: now,
            expires_at: now,
            paid_at: Some(now),
        };
        let scanned = scan_status == ScanStatus::Scanned;
        let ticket = TicketCode {
            id: TicketId::new(),
            code: "IAF-MA1B2C3D-9F04C2E1-7A3B".to_string(),
            order_id: order.id,
            order_number: number,
            tier: TierKind::Bronze,
            qr_payload: String::new(),
            status: scan_status,
            scanned_at: scanned.then_some(now),
            scan_location: scanned.then(|| "north".to_string()),
            parking_passes: Vec::new(),
            created_at: now,
        };
        ScanTarget { ticket, order }
    }

    #[test]
    fn test_pending_ticket_on_completed_order_is_admitted() {
        let t = target(OrderStatus::Completed, ScanStatus::Pending);
        assert_eq!(adjudicate(&t), Verdict::Admit);
    }

    #[test]
    fn test_scanned_ticket_reports_first_scan() {
        let t = target(OrderStatus::Completed, ScanStatus::Scanned);
        assert_eq!(
            adjudicate(&t),
            Verdict::AlreadyUsed {
                scanned_at: t.ticket.scanned_at,
                location: Some("north".to_string()),
            }
        );
    }

    #[test]
    fn test_incomplete_orders_are_blocked() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Refunded,
            OrderStatus::Cancelled,
            OrderStatus::Failed,
        ] {
            let t = target(status, ScanStatus::Pending);
            assert_eq!(adjudicate(&t), Verdict::Blocked(status));
        }
    }

    #[test]
    fn test_already_used_checked_before_blocked() {
        let t = target(OrderStatus::Refunded, ScanStatus::Scanned);
        assert!(matches!(adjudicate(&t), Verdict::AlreadyUsed { .. }));
    }

    #[test]
    fn test_reason_outcomes() {
        assert_eq!(RejectReason::OrderNotCompleted.outcome(), ScanOutcome::Blocked);
        assert_eq!(RejectReason::TamperedCode.outcome(), ScanOutcome::Invalid);
        assert_eq!(RejectReason::NotFound.outcome(), ScanOutcome::Invalid);
        assert_eq!(
            RejectReason::from(&PayloadError::WrongEvent {
                expected: "A".to_string(),
                found: "B".to_string()
            }),
            RejectReason::WrongEvent
        );
    }

    #[test]
    fn test_report_serializes_gate_tags() {
        let report = ScanReport {
            outcome: ScanOutcome::AlreadyUsed,
            reason: Some(RejectReason::TamperedCode),
            detail: String::new(),
            display: None,
        };
        let json = serde_json::to_value(&report).unwrap_or_default();
        assert_eq!(json["outcome"], "ALREADY_USED");
        assert_eq!(json["reason"], "TAMPERED_CODE");
    }
}

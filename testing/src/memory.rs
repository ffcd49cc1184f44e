//! In-memory implementation of every storage trait.
//!
//! All state sits behind one mutex and every trait method takes it exactly
//! once, so each operation is atomic with respect to every other. Capacity
//! arithmetic goes through [`plan_commit`] / [`plan_release`], the same rules
//! the `PostgreSQL` store encodes in SQL.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Lock poisoning only follows a panicking test

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gatepass_core::inventory::{LedgerRejection, plan_commit, plan_release};
use gatepass_core::reports::{EntryStats, SalesStats};
use gatepass_core::store::{
    AdmitOutcome, Admission, CloseOutcome, CommitOutcome, CompletionOutcome, GateStore,
    InventoryStore, OrderClosure, OrderCompletion, OrderStore, ReportStore, ScanTarget,
    StoreError, UnitChange,
};
use gatepass_core::types::{
    AuditLogEntry, EntityType, EntryLogEntry, InventoryLogEntry, InventoryReason, Order,
    OrderNumber, OrderStatus, PaymentStatus, SalesChannel, ScanStatus, TicketCode, TicketTier,
    TierKind,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Debug, Default)]
struct State {
    tiers: BTreeMap<TierKind, TicketTier>,
    orders: HashMap<OrderNumber, Order>,
    tickets: Vec<TicketCode>,
    codes: HashSet<String>,
    entries: Vec<EntryLogEntry>,
    inventory_log: Vec<InventoryLogEntry>,
    audit_log: Vec<AuditLogEntry>,
    sequence: u64,
    forced_collisions: u32,
}

impl State {
    fn tickets_for(&self, number: &OrderNumber) -> Vec<TicketCode> {
        self.tickets
            .iter()
            .filter(|t| &t.order_number == number)
            .cloned()
            .collect()
    }

    fn commit(
        &mut self,
        change: &UnitChange,
        at: DateTime<Utc>,
    ) -> Result<InventoryLogEntry, LedgerRejection> {
        let tier = self
            .tiers
            .get_mut(&change.tier)
            .ok_or(LedgerRejection::UnknownTier)?;
        let levels = plan_commit(tier, change.quantity, change.channel)?;
        let entry = log_entry(change, tier.sold_units, levels.sold_units, at);
        tier.sold_units = levels.sold_units;
        tier.manual_sold = levels.manual_sold;
        self.inventory_log.push(entry.clone());
        Ok(entry)
    }

    fn release(&mut self, change: &UnitChange, at: DateTime<Utc>) -> Option<InventoryLogEntry> {
        let tier = self.tiers.get_mut(&change.tier)?;
        let levels = plan_release(tier, change.quantity, change.channel);
        let entry = log_entry(change, tier.sold_units, levels.sold_units, at);
        tier.sold_units = levels.sold_units;
        tier.manual_sold = levels.manual_sold;
        self.inventory_log.push(entry.clone());
        Some(entry)
    }
}

fn log_entry(change: &UnitChange, previous: u32, new: u32, at: DateTime<Utc>) -> InventoryLogEntry {
    InventoryLogEntry {
        id: Uuid::new_v4(),
        tier: change.tier,
        previous,
        new,
        order: change.order.clone(),
        reason: change.reason,
        at,
    }
}

/// In-memory store for fast, deterministic tests.
///
/// Cloning shares the underlying state.
///
/// # Example
///
/// ```
/// use gatepass_testing::InMemoryStore;
/// use gatepass_testing::fixtures::standard_tiers;
///
/// let store = InMemoryStore::with_tiers(standard_tiers());
/// assert_eq!(store.tier_snapshot(gatepass_core::TierKind::Gold).map(|t| t.sold_units), Some(0));
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
    offline: Arc<AtomicBool>,
}

impl InMemoryStore {
    /// Creates an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with `tiers`
    #[must_use]
    pub fn with_tiers(tiers: impl IntoIterator<Item = TicketTier>) -> Self {
        let store = Self::new();
        for tier in tiers {
            store.upsert_tier(tier);
        }
        store
    }

    /// Inserts or replaces a tier
    pub fn upsert_tier(&self, tier: TicketTier) {
        self.lock().tiers.insert(tier.kind, tier);
    }

    /// Makes every operation fail with [`StoreError::Unavailable`]
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Reports a code collision for the next `n` completions
    pub fn force_code_collisions(&self, n: u32) {
        self.lock().forced_collisions = n;
    }

    /// Current tier row
    #[must_use]
    pub fn tier_snapshot(&self, kind: TierKind) -> Option<TicketTier> {
        self.lock().tiers.get(&kind).cloned()
    }

    /// All entry-log rows, oldest first
    #[must_use]
    pub fn entries(&self) -> Vec<EntryLogEntry> {
        self.lock().entries.clone()
    }

    /// All inventory-log rows, oldest first
    #[must_use]
    pub fn inventory_log(&self) -> Vec<InventoryLogEntry> {
        self.lock().inventory_log.clone()
    }

    /// All audit rows, oldest first
    #[must_use]
    pub fn audit_log(&self) -> Vec<AuditLogEntry> {
        self.lock().audit_log.clone()
    }

    /// All tickets
    #[must_use]
    pub fn tickets(&self) -> Vec<TicketCode> {
        self.lock().tickets.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    fn online(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store is offline".to_string()));
        }
        Ok(self.lock())
    }
}

#[async_trait]
impl InventoryStore for InMemoryStore {
    async fn tier(&self, kind: TierKind) -> Result<Option<TicketTier>, StoreError> {
        Ok(self.online()?.tiers.get(&kind).cloned())
    }

    async fn tiers(&self) -> Result<Vec<TicketTier>, StoreError> {
        Ok(self.online()?.tiers.values().cloned().collect())
    }

    async fn commit_units(
        &self,
        change: &UnitChange,
        at: DateTime<Utc>,
    ) -> Result<CommitOutcome, StoreError> {
        let mut state = self.online()?;
        Ok(match state.commit(change, at) {
            Ok(entry) => CommitOutcome::Committed(entry),
            Err(rejection) => CommitOutcome::Rejected(rejection),
        })
    }

    async fn release_units(
        &self,
        change: &UnitChange,
        at: DateTime<Utc>,
    ) -> Result<Option<InventoryLogEntry>, StoreError> {
        Ok(self.online()?.release(change, at))
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn next_order_sequence(&self) -> Result<u64, StoreError> {
        let mut state = self.online()?;
        state.sequence += 1;
        Ok(state.sequence)
    }

    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        let mut state = self.online()?;
        if state.orders.contains_key(&order.number) {
            return Err(StoreError::Conflict(format!(
                "order {} already exists",
                order.number
            )));
        }
        state.orders.insert(order.number.clone(), order.clone());
        Ok(())
    }

    async fn order_by_number(&self, number: &OrderNumber) -> Result<Option<Order>, StoreError> {
        Ok(self.online()?.orders.get(number).cloned())
    }

    async fn tickets_for_order(
        &self,
        number: &OrderNumber,
    ) -> Result<Vec<TicketCode>, StoreError> {
        Ok(self.online()?.tickets_for(number))
    }

    async fn complete_order(
        &self,
        completion: &OrderCompletion,
    ) -> Result<CompletionOutcome, StoreError> {
        let mut state = self.online()?;
        let Some(order) = state.orders.get(&completion.order).cloned() else {
            return Ok(CompletionOutcome::NotFound);
        };

        match order.status {
            OrderStatus::Pending => {},
            OrderStatus::Completed => {
                let tickets = state.tickets_for(&order.number);
                return Ok(CompletionOutcome::AlreadyCompleted { order, tickets });
            },
            _ => return Ok(CompletionOutcome::NotPending(order)),
        }

        if state.forced_collisions > 0 {
            state.forced_collisions -= 1;
            let code = completion
                .tickets
                .first()
                .map(|t| t.code.clone())
                .unwrap_or_default();
            return Ok(CompletionOutcome::CodeCollision(code));
        }
        let mut batch = HashSet::new();
        for ticket in &completion.tickets {
            if state.codes.contains(&ticket.code) || !batch.insert(ticket.code.as_str()) {
                return Ok(CompletionOutcome::CodeCollision(ticket.code.clone()));
            }
        }

        let change = UnitChange {
            tier: order.tier,
            quantity: order.quantity,
            channel: order.channel,
            order: order.number.clone(),
            reason: completion.reason,
        };
        let inventory = match state.commit(&change, completion.at) {
            Ok(entry) => entry,
            Err(rejection) => return Ok(CompletionOutcome::Rejected(rejection)),
        };

        let mut completed = order;
        completed.status = OrderStatus::Completed;
        completed.payment_status = PaymentStatus::Paid;
        completed.provider_reference = completion.provider_reference.clone();
        completed.paid_at = Some(completion.at);

        for ticket in &completion.tickets {
            state.codes.insert(ticket.code.clone());
            state.tickets.push(ticket.clone());
        }
        state
            .orders
            .insert(completed.number.clone(), completed.clone());
        state.audit_log.push(AuditLogEntry::new(
            EntityType::Order,
            completed.number.as_str(),
            "order.completed",
            serde_json::json!({
                "tickets": completion.tickets.len(),
                "provider_reference": completion.provider_reference,
            }),
            completion.at,
        ));

        Ok(CompletionOutcome::Completed {
            order: completed,
            tickets: completion.tickets.clone(),
            inventory,
        })
    }

    async fn close_order(&self, closure: &OrderClosure) -> Result<CloseOutcome, StoreError> {
        let mut state = self.online()?;
        let Some(order) = state.orders.get(&closure.order).cloned() else {
            return Ok(CloseOutcome::NotFound);
        };
        if !order.status.can_transition_to(closure.status) {
            return Ok(CloseOutcome::InvalidTransition(order));
        }

        let released = if order.status == OrderStatus::Completed {
            let reason = if closure.status == OrderStatus::Refunded {
                InventoryReason::Refund
            } else {
                InventoryReason::Cancellation
            };
            let change = UnitChange {
                tier: order.tier,
                quantity: order.quantity,
                channel: order.channel,
                order: order.number.clone(),
                reason,
            };
            state.release(&change, closure.at)
        } else {
            None
        };

        let mut closed = order;
        let previous = closed.status;
        closed.status = closure.status;
        if let Some(payment_status) = closure.payment_status {
            closed.payment_status = payment_status;
        }
        state.orders.insert(closed.number.clone(), closed.clone());
        state.audit_log.push(AuditLogEntry::new(
            EntityType::Order,
            closed.number.as_str(),
            format!("order.{}", closure.status.as_str()),
            serde_json::json!({
                "from": previous.as_str(),
                "reason": closure.reason,
                "released": released.as_ref().map(|r| r.previous.saturating_sub(r.new)),
            }),
            closure.at,
        ));

        Ok(CloseOutcome::Closed {
            order: closed,
            released,
        })
    }
}

#[async_trait]
impl GateStore for InMemoryStore {
    async fn scan_target(
        &self,
        code: &str,
        qr_payload: Option<&str>,
    ) -> Result<Option<ScanTarget>, StoreError> {
        let state = self.online()?;
        let ticket = state.tickets.iter().find(|t| t.code == code).or_else(|| {
            qr_payload.and_then(|raw| state.tickets.iter().find(|t| t.qr_payload == raw))
        });

        let Some(ticket) = ticket else {
            return Ok(None);
        };
        let order = state.orders.get(&ticket.order_number).cloned().ok_or_else(|| {
            StoreError::Corrupt(format!("ticket {} has no order", ticket.code))
        })?;

        Ok(Some(ScanTarget {
            ticket: ticket.clone(),
            order,
        }))
    }

    async fn admit(&self, admission: &Admission) -> Result<AdmitOutcome, StoreError> {
        let mut state = self.online()?;
        let state = &mut *state;
        let Some(ticket) = state.tickets.iter_mut().find(|t| t.id == admission.ticket) else {
            return Ok(AdmitOutcome::NotFound);
        };

        if ticket.status == ScanStatus::Scanned {
            return Ok(AdmitOutcome::AlreadyScanned {
                scanned_at: ticket.scanned_at,
                location: ticket.scan_location.clone(),
            });
        }

        let order_status = state
            .orders
            .get(&ticket.order_number)
            .map(|o| o.status)
            .ok_or_else(|| StoreError::Corrupt(format!("ticket {} has no order", ticket.code)))?;
        if order_status != OrderStatus::Completed {
            return Ok(AdmitOutcome::OrderNotCompleted(order_status));
        }

        ticket.status = ScanStatus::Scanned;
        ticket.scanned_at = Some(admission.at);
        ticket.scan_location = Some(admission.gate.clone());
        state.entries.push(admission.entry.clone());
        state.audit_log.push(admission.audit.clone());
        Ok(AdmitOutcome::Admitted)
    }

    async fn record_entry(&self, entry: &EntryLogEntry) -> Result<(), StoreError> {
        self.online()?.entries.push(entry.clone());
        Ok(())
    }
}

#[async_trait]
impl ReportStore for InMemoryStore {
    async fn entry_stats(&self) -> Result<EntryStats, StoreError> {
        Ok(EntryStats::from_entries(&self.online()?.entries))
    }

    async fn sales_stats(&self) -> Result<SalesStats, StoreError> {
        let state = self.online()?;
        Ok(SalesStats::from_records(
            state.tiers.values(),
            state.orders.values(),
            &state.tickets,
        ))
    }

    async fn recent_entries(&self, limit: u32) -> Result<Vec<EntryLogEntry>, StoreError> {
        let state = self.online()?;
        Ok(state
            .entries
            .iter()
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn audit_trail(
        &self,
        entity_type: EntityType,
        entity_id: &str,
    ) -> Result<Vec<AuditLogEntry>, StoreError> {
        Ok(self
            .online()?
            .audit_log
            .iter()
            .filter(|a| a.entity_type == entity_type && a.entity_id == entity_id)
            .cloned()
            .collect())
    }

    async fn inventory_history(
        &self,
        tier: TierKind,
    ) -> Result<Vec<InventoryLogEntry>, StoreError> {
        Ok(self
            .online()?
            .inventory_log
            .iter()
            .filter(|e| e.tier == tier)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{standard_tiers, tier};

    fn change(quantity: u32, channel: SalesChannel) -> UnitChange {
        UnitChange {
            tier: TierKind::Regular,
            quantity,
            channel,
            order: OrderNumber::from_raw("IAF-2026-0001"),
            reason: InventoryReason::CashSale,
        }
    }

    #[tokio::test]
    async fn test_commit_appends_log_with_counters() {
        let store = InMemoryStore::with_tiers([tier(TierKind::Regular, 5, 2)]);
        let outcome = store
            .commit_units(&change(2, SalesChannel::Manual), Utc::now())
            .await
            .unwrap();

        assert!(matches!(
            &outcome,
            CommitOutcome::Committed(entry) if (entry.previous, entry.new) == (0, 2)
        ));
        let t = store.tier_snapshot(TierKind::Regular).unwrap();
        assert_eq!((t.sold_units, t.manual_sold), (2, 2));
        assert_eq!(store.inventory_log().len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_commit_changes_nothing() {
        let store = InMemoryStore::with_tiers([tier(TierKind::Regular, 5, 1)]);
        let outcome = store
            .commit_units(&change(2, SalesChannel::Manual), Utc::now())
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            CommitOutcome::Rejected(LedgerRejection::ManualCapReached { .. })
        ));
        assert_eq!(store.tier_snapshot(TierKind::Regular).unwrap().sold_units, 0);
        assert!(store.inventory_log().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_tier() {
        let store = InMemoryStore::new();
        let outcome = store
            .commit_units(&change(1, SalesChannel::Online), Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome, CommitOutcome::Rejected(LedgerRejection::UnknownTier));
    }

    #[tokio::test]
    async fn test_offline_store_is_unavailable() {
        let store = InMemoryStore::with_tiers(standard_tiers());
        store.set_offline(true);
        assert!(matches!(
            store.tiers().await,
            Err(StoreError::Unavailable(_))
        ));
        store.set_offline(false);
        assert_eq!(store.tiers().await.unwrap().len(), 5);
    }
}

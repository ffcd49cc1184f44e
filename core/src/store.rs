//! Storage collaborator traits.
//!
//! Every mutation of shared state (`sold_units`, `manual_sold`, order status,
//! scan status) is a single atomic store operation. Implementations must not
//! split an operation into a read followed by an unguarded write.
//!
//! Outcomes that are normal business results (capacity reached, already
//! scanned, order not pending) are returned as data. [`StoreError`] is reserved
//! for infrastructure failures.

use crate::inventory::LedgerRejection;
use crate::reports::{EntryStats, SalesStats};
use crate::types::{
    AuditLogEntry, EntityType, EntryLogEntry, InventoryLogEntry, InventoryReason, Order,
    OrderNumber, OrderStatus, PaymentStatus, SalesChannel, TicketCode, TicketId, TicketTier,
    TierKind,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Infrastructure failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store could not be reached
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A uniqueness or concurrency constraint was violated
    #[error("conflict: {0}")]
    Conflict(String),

    /// A stored row could not be mapped to a domain value
    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// Any other database failure
    #[error("database error: {0}")]
    Database(String),
}

// ============================================================================
// Inventory
// ============================================================================

/// One requested change to a tier's counters
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnitChange {
    /// Tier
    pub tier: TierKind,
    /// Units
    pub quantity: u32,
    /// Channel the units were sold through
    pub channel: SalesChannel,
    /// Triggering order
    pub order: OrderNumber,
    /// Recorded in the inventory log
    pub reason: InventoryReason,
}

/// Result of a conditional commit
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Counters moved; the log row written with them
    Committed(InventoryLogEntry),
    /// Nothing changed
    Rejected(LedgerRejection),
}

/// Tier counters
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// One tier, if configured
    async fn tier(&self, kind: TierKind) -> Result<Option<TicketTier>, StoreError>;

    /// All configured tiers
    async fn tiers(&self) -> Result<Vec<TicketTier>, StoreError>;

    /// Atomically checks the bounds of [`crate::inventory::plan_commit`] and
    /// applies it, appending the inventory log row in the same operation.
    async fn commit_units(
        &self,
        change: &UnitChange,
        at: DateTime<Utc>,
    ) -> Result<CommitOutcome, StoreError>;

    /// Atomically applies [`crate::inventory::plan_release`] and appends the
    /// log row. `None` if the tier is not configured.
    async fn release_units(
        &self,
        change: &UnitChange,
        at: DateTime<Utc>,
    ) -> Result<Option<InventoryLogEntry>, StoreError>;
}

// ============================================================================
// Orders
// ============================================================================

/// Everything needed to complete a pending order in one unit
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderCompletion {
    /// Order to complete
    pub order: OrderNumber,
    /// Gateway transaction reference
    pub provider_reference: Option<String>,
    /// Inventory log reason
    pub reason: InventoryReason,
    /// Freshly minted tickets, one per admitted person
    pub tickets: Vec<TicketCode>,
    /// Completion time
    pub at: DateTime<Utc>,
}

/// Result of [`OrderStore::complete_order`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// Order claimed, units committed, tickets inserted
    Completed {
        /// Order after completion
        order: Order,
        /// Inserted tickets
        tickets: Vec<TicketCode>,
        /// Inventory log row
        inventory: InventoryLogEntry,
    },
    /// A previous call already completed the order; nothing changed
    AlreadyCompleted {
        /// Order as stored
        order: Order,
        /// Tickets minted by the earlier completion
        tickets: Vec<TicketCode>,
    },
    /// Order is in another terminal state; nothing changed
    NotPending(Order),
    /// Ledger refused the commit; nothing changed
    Rejected(LedgerRejection),
    /// A minted code already exists; everything rolled back
    CodeCollision(String),
    /// No such order
    NotFound,
}

/// A terminal transition away from `pending` or `completed`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderClosure {
    /// Order to close
    pub order: OrderNumber,
    /// Target status
    pub status: OrderStatus,
    /// Payment status to record; `None` keeps the current one
    pub payment_status: Option<PaymentStatus>,
    /// Free-text reason for the audit trail
    pub reason: String,
    /// Transition time
    pub at: DateTime<Utc>,
}

/// Result of [`OrderStore::close_order`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Status changed
    Closed {
        /// Order after the transition
        order: Order,
        /// Release applied when leaving `completed`
        released: Option<InventoryLogEntry>,
    },
    /// Transition not allowed from the current status; nothing changed
    InvalidTransition(Order),
    /// No such order
    NotFound,
}

/// Orders and the tickets they own
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Next value of the order number sequence
    async fn next_order_sequence(&self) -> Result<u64, StoreError>;

    /// Inserts a new order. [`StoreError::Conflict`] if the number exists.
    async fn insert_order(&self, order: &Order) -> Result<(), StoreError>;

    /// Looks up an order by number
    async fn order_by_number(&self, number: &OrderNumber) -> Result<Option<Order>, StoreError>;

    /// Tickets minted for an order, in issuance order
    async fn tickets_for_order(&self, number: &OrderNumber)
    -> Result<Vec<TicketCode>, StoreError>;

    /// In one atomic unit: claims `pending -> completed`, commits the order's
    /// quantity through its channel, inserts the tickets, and writes the
    /// inventory and audit rows. Any failure leaves no trace.
    async fn complete_order(
        &self,
        completion: &OrderCompletion,
    ) -> Result<CompletionOutcome, StoreError>;

    /// In one atomic unit: checks the transition, releases committed units
    /// when leaving `completed`, updates the order and writes audit rows.
    async fn close_order(&self, closure: &OrderClosure) -> Result<CloseOutcome, StoreError>;
}

// ============================================================================
// Gate
// ============================================================================

/// A ticket with its owning order, as seen by the gate
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanTarget {
    /// Ticket
    pub ticket: TicketCode,
    /// Owning order
    pub order: Order,
}

/// A successful admission to persist
#[derive(Clone, Debug, PartialEq)]
pub struct Admission {
    /// Ticket to admit
    pub ticket: TicketId,
    /// Gate identifier
    pub gate: String,
    /// Admission time
    pub at: DateTime<Utc>,
    /// `SUCCESS` entry-log row written with the transition
    pub entry: EntryLogEntry,
    /// Audit row written with the transition
    pub audit: AuditLogEntry,
}

/// Result of [`GateStore::admit`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdmitOutcome {
    /// This call moved the ticket to `scanned`
    Admitted,
    /// The ticket was already scanned; nothing written
    AlreadyScanned {
        /// First admission time
        scanned_at: Option<DateTime<Utc>>,
        /// First admission gate
        location: Option<String>,
    },
    /// The owning order left `completed` after the lookup; nothing written
    OrderNotCompleted(OrderStatus),
    /// No such ticket
    NotFound,
}

/// Ticket scan state
#[async_trait]
pub trait GateStore: Send + Sync {
    /// Looks a ticket up by exact code, falling back to its stored QR payload
    /// text when the scan presented one
    async fn scan_target(
        &self,
        code: &str,
        qr_payload: Option<&str>,
    ) -> Result<Option<ScanTarget>, StoreError>;

    /// Conditional `pending -> scanned` transition, written together with the
    /// admission's entry-log and audit rows. The owning order must still be
    /// `completed` at the moment of the transition.
    async fn admit(&self, admission: &Admission) -> Result<AdmitOutcome, StoreError>;

    /// Appends a non-admitting entry-log row
    async fn record_entry(&self, entry: &EntryLogEntry) -> Result<(), StoreError>;
}

// ============================================================================
// Reports
// ============================================================================

/// Read-only projections for the back office
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Counts over the entry log
    async fn entry_stats(&self) -> Result<EntryStats, StoreError>;

    /// Sales and issuance figures
    async fn sales_stats(&self) -> Result<SalesStats, StoreError>;

    /// Most recent entry-log rows, newest first
    async fn recent_entries(&self, limit: u32) -> Result<Vec<EntryLogEntry>, StoreError>;

    /// Audit rows for one entity, oldest first
    async fn audit_trail(
        &self,
        entity_type: EntityType,
        entity_id: &str,
    ) -> Result<Vec<AuditLogEntry>, StoreError>;

    /// Inventory log rows for one tier, oldest first
    async fn inventory_history(&self, tier: TierKind)
    -> Result<Vec<InventoryLogEntry>, StoreError>;
}

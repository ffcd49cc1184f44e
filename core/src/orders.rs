//! Order lifecycle.
//!
//! ```text
//!             confirm_payment             refund / cancel
//!  pending ───────────────────► completed ───────────────► refunded | cancelled
//!     │                                                     (units released)
//!     └──── fail / cancel / refund ────► failed | cancelled | refunded
//!                                        (nothing was committed)
//! ```
//!
//! Units are committed and codes minted only at completion, inside one store
//! operation. A confirmed payment is the sole online path to `completed`;
//! cash sales at the gate complete immediately through the manual channel.

use crate::codes::CodeGenerator;
use crate::environment::Clock;
use crate::inventory::LedgerRejection;
use crate::payload::PayloadCodec;
use crate::pricing::{self, PricingError};
use crate::store::{
    CloseOutcome, CompletionOutcome, InventoryStore, OrderClosure, OrderCompletion, OrderStore,
    StoreError,
};
use crate::types::{
    AccessType, Buyer, GroupSize, InventoryReason, Money, Order, OrderId, OrderNumber,
    OrderStatus, PaymentMethod, PaymentStatus, SalesChannel, ScanStatus, TicketCode, TicketId,
    TierKind,
};
use async_trait::async_trait;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Times a completion is retried with fresh codes after a collision
pub const MAX_MINT_ATTEMPTS: u32 = 5;

/// Parking passes attached to one ticket at most
pub const PARKING_PASSES_PER_TICKET: u32 = 2;

/// Purchased units (group purchases) per order at most
pub const MAX_UNITS_PER_ORDER: u32 = 10;

// ============================================================================
// Requests and results
// ============================================================================

/// Order service settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderSettings {
    /// Order number prefix, e.g. `IAF-2026`
    pub number_prefix: String,
    /// Advisory payment window for pending orders
    pub expiry: Duration,
}

impl Default for OrderSettings {
    fn default() -> Self {
        Self {
            number_prefix: "IAF-2026".to_string(),
            expiry: Duration::minutes(30),
        }
    }
}

/// An online purchase request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    /// Tier
    pub tier: TierKind,
    /// Group multiplier
    pub group_size: GroupSize,
    /// Units of `group_size` purchased
    pub units: u32,
    /// Parking passes requested
    pub parking_passes: u32,
    /// Purchaser
    pub buyer: Buyer,
    /// Attendee or vendor
    pub access_type: AccessType,
}

/// A sale recorded by staff at the gate
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCashSale {
    /// Tier
    pub tier: TierKind,
    /// Group multiplier
    pub group_size: GroupSize,
    /// Units of `group_size` sold
    pub units: u32,
    /// Parking passes sold
    pub parking_passes: u32,
    /// Purchaser
    pub buyer: Buyer,
    /// Attendee or vendor
    pub access_type: AccessType,
    /// `Cash` or `Complimentary`
    pub payment_method: PaymentMethod,
    /// Cash collected
    pub amount_received: Money,
}

/// Payment-verified signal from the gateway
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    /// Order number echoed back as the payment reference
    pub reference: OrderNumber,
    /// Gateway transaction id
    pub provider_reference: String,
    /// Amount paid
    pub amount: Money,
}

/// Result of a completion request
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Completion {
    /// This call completed the order and minted its tickets
    Issued {
        /// Completed order
        order: Order,
        /// Minted tickets
        tickets: Vec<TicketCode>,
    },
    /// The order had already been completed; nothing changed
    AlreadyCompleted {
        /// Stored order
        order: Order,
        /// Tickets from the first completion
        tickets: Vec<TicketCode>,
    },
}

impl Completion {
    /// The completed order
    #[must_use]
    pub const fn order(&self) -> &Order {
        match self {
            Self::Issued { order, .. } | Self::AlreadyCompleted { order, .. } => order,
        }
    }

    /// Its tickets
    #[must_use]
    pub fn tickets(&self) -> &[TicketCode] {
        match self {
            Self::Issued { tickets, .. } | Self::AlreadyCompleted { tickets, .. } => tickets,
        }
    }

    /// Whether this call minted the tickets
    #[must_use]
    pub const fn is_new(&self) -> bool {
        matches!(self, Self::Issued { .. })
    }
}

/// Order lifecycle errors
#[derive(Debug, Error)]
pub enum OrderError {
    /// No order with this number
    #[error("order {0} not found")]
    NotFound(OrderNumber),

    /// Tier not configured
    #[error("tier {0} is not on sale")]
    UnknownTier(TierKind),

    /// Request failed validation
    #[error("invalid order: {0}")]
    InvalidRequest(String),

    /// Paid amount below the order total
    #[error("amount mismatch: expected {expected}, received {received}")]
    AmountMismatch {
        /// Order total
        expected: Money,
        /// Amount received
        received: Money,
    },

    /// Status change not allowed
    #[error("order {order} cannot move from {from} to {to}")]
    InvalidTransition {
        /// Order
        order: OrderNumber,
        /// Current status
        from: OrderStatus,
        /// Requested status
        to: OrderStatus,
    },

    /// Capacity bound reached
    #[error("{tier}: {rejection}")]
    Inventory {
        /// Tier
        tier: TierKind,
        /// Which bound
        rejection: LedgerRejection,
    },

    /// Every minting attempt collided with an existing code
    #[error("ticket code collision after {0} attempts")]
    CodeCollisions(u32),

    /// Price arithmetic failed
    #[error(transparent)]
    Pricing(#[from] PricingError),

    /// Storage failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// Notifications
// ============================================================================

/// Notification delivery failure
#[derive(Debug, Error)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

/// Delivers issued tickets to the buyer (email, SMS).
///
/// Invoked after completion as a fire-and-forget side effect; failures are
/// logged by the caller and never undo the completion.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Tickets were minted for `order`
    async fn tickets_issued(&self, order: &Order, tickets: &[TicketCode])
    -> Result<(), NotifyError>;
}

// ============================================================================
// Service
// ============================================================================

/// Parking pass identifiers for each of `tickets` tickets.
///
/// Passes are numbered `P-{order}-{n}` from 1 and fill tickets in order, at
/// most [`PARKING_PASSES_PER_TICKET`] each.
#[must_use]
pub fn allocate_parking(order: &OrderNumber, passes: u32, tickets: u32) -> Vec<Vec<String>> {
    let passes = passes.min(tickets.saturating_mul(PARKING_PASSES_PER_TICKET));
    (0..tickets)
        .map(|ticket| {
            let first = ticket * PARKING_PASSES_PER_TICKET + 1;
            (first..first + PARKING_PASSES_PER_TICKET)
                .filter(|n| *n <= passes)
                .map(|n| format!("P-{order}-{n}"))
                .collect()
        })
        .collect()
}

/// Order lifecycle service
#[derive(Clone)]
pub struct OrderService {
    orders: Arc<dyn OrderStore>,
    inventory: Arc<dyn InventoryStore>,
    codes: CodeGenerator,
    payloads: PayloadCodec,
    clock: Arc<dyn Clock>,
    settings: OrderSettings,
}

impl OrderService {
    /// Creates the service
    #[must_use]
    pub fn new(
        orders: Arc<dyn OrderStore>,
        inventory: Arc<dyn InventoryStore>,
        codes: CodeGenerator,
        payloads: PayloadCodec,
        clock: Arc<dyn Clock>,
        settings: OrderSettings,
    ) -> Self {
        Self {
            orders,
            inventory,
            codes,
            payloads,
            clock,
            settings,
        }
    }

    /// Payload codec used for minted tickets
    #[must_use]
    pub const fn payloads(&self) -> &PayloadCodec {
        &self.payloads
    }

    /// Creates a pending online order.
    ///
    /// Availability is checked here only as a courtesy; units are committed
    /// atomically when payment is confirmed.
    ///
    /// # Errors
    ///
    /// Validation, pricing, capacity or store errors.
    pub async fn create_pending(&self, request: NewOrder) -> Result<Order, OrderError> {
        let draft = Draft {
            tier: request.tier,
            group_size: request.group_size,
            units: request.units,
            parking_passes: request.parking_passes,
            buyer: request.buyer,
            access_type: request.access_type,
        };
        let order = self
            .draft_order(draft, PaymentMethod::Paystack, SalesChannel::Online)
            .await?;

        self.orders.insert_order(&order).await?;
        metrics::counter!("gatepass_orders_total", "status" => "pending").increment(1);
        tracing::info!(
            order = %order.number,
            tier = %order.tier,
            quantity = order.quantity,
            total = %order.total,
            "Order created"
        );
        Ok(order)
    }

    /// Completes an order on a verified payment. Idempotent.
    ///
    /// # Errors
    ///
    /// - [`OrderError::NotFound`] for an unknown reference
    /// - [`OrderError::AmountMismatch`] if underpaid (order unchanged)
    /// - [`OrderError::InvalidTransition`] if the order failed or was closed
    /// - [`OrderError::Inventory`] if the tier sold out (order marked failed)
    pub async fn confirm_payment(
        &self,
        confirmation: PaymentConfirmation,
    ) -> Result<Completion, OrderError> {
        let number = confirmation.reference;
        let order = self
            .orders
            .order_by_number(&number)
            .await?
            .ok_or_else(|| OrderError::NotFound(number.clone()))?;

        match order.status {
            OrderStatus::Completed => {
                tracing::debug!(order = %number, "Payment already applied");
                let tickets = self.orders.tickets_for_order(&number).await?;
                return Ok(Completion::AlreadyCompleted { order, tickets });
            },
            OrderStatus::Pending => {},
            from => {
                return Err(OrderError::InvalidTransition {
                    order: number,
                    from,
                    to: OrderStatus::Completed,
                });
            },
        }

        if confirmation.amount < order.total {
            tracing::warn!(
                order = %number,
                expected = %order.total,
                received = %confirmation.amount,
                "Underpaid order left pending"
            );
            return Err(OrderError::AmountMismatch {
                expected: order.total,
                received: confirmation.amount,
            });
        }

        self.complete(
            &order,
            Some(confirmation.provider_reference),
            InventoryReason::OrderCompleted,
        )
        .await
    }

    /// Records a cash or complimentary sale and issues its tickets at once,
    /// drawing on the tier's manual cap.
    ///
    /// # Errors
    ///
    /// Validation, [`OrderError::AmountMismatch`] for short cash,
    /// [`OrderError::Inventory`] when either cap is reached, or store errors.
    pub async fn record_cash_sale(&self, sale: NewCashSale) -> Result<Completion, OrderError> {
        if !matches!(
            sale.payment_method,
            PaymentMethod::Cash | PaymentMethod::Complimentary
        ) {
            return Err(OrderError::InvalidRequest(format!(
                "manual sales must be cash or complimentary, got {}",
                sale.payment_method
            )));
        }

        let draft = Draft {
            tier: sale.tier,
            group_size: sale.group_size,
            units: sale.units,
            parking_passes: sale.parking_passes,
            buyer: sale.buyer,
            access_type: sale.access_type,
        };
        let mut order = self
            .draft_order(draft, sale.payment_method, SalesChannel::Manual)
            .await?;
        if sale.payment_method == PaymentMethod::Complimentary {
            order.total = Money::ZERO;
        }
        if sale.amount_received < order.total {
            return Err(OrderError::AmountMismatch {
                expected: order.total,
                received: sale.amount_received,
            });
        }

        self.orders.insert_order(&order).await?;
        tracing::info!(
            order = %order.number,
            tier = %order.tier,
            quantity = order.quantity,
            method = %order.payment_method,
            "Cash sale recorded"
        );
        match self.complete(&order, None, InventoryReason::CashSale).await {
            Err(e @ OrderError::CodeCollisions(_)) => {
                // No webhook will ever retry a manual sale
                self.mark_failed(&order, e.to_string()).await;
                Err(e)
            },
            other => other,
        }
    }

    /// Cancels an order, releasing its units if it had completed
    ///
    /// # Errors
    ///
    /// [`OrderError::NotFound`], [`OrderError::InvalidTransition`] or store errors.
    pub async fn cancel(&self, number: &OrderNumber, reason: &str) -> Result<Order, OrderError> {
        self.close(number, OrderStatus::Cancelled, None, reason).await
    }

    /// Marks a pending order failed (payment declined or abandoned)
    ///
    /// # Errors
    ///
    /// [`OrderError::NotFound`], [`OrderError::InvalidTransition`] or store errors.
    pub async fn fail(&self, number: &OrderNumber, reason: &str) -> Result<Order, OrderError> {
        self.close(number, OrderStatus::Failed, Some(PaymentStatus::Failed), reason)
            .await
    }

    /// Refunds an order, releasing its units if it had completed
    ///
    /// # Errors
    ///
    /// [`OrderError::NotFound`], [`OrderError::InvalidTransition`] or store errors.
    pub async fn refund(&self, number: &OrderNumber, reason: &str) -> Result<Order, OrderError> {
        self.close(
            number,
            OrderStatus::Refunded,
            Some(PaymentStatus::Refunded),
            reason,
        )
        .await
    }

    /// Looks up an order
    ///
    /// # Errors
    ///
    /// [`OrderError::NotFound`] or store errors.
    pub async fn order(&self, number: &OrderNumber) -> Result<Order, OrderError> {
        self.orders
            .order_by_number(number)
            .await?
            .ok_or_else(|| OrderError::NotFound(number.clone()))
    }

    /// Tickets minted for an order
    ///
    /// # Errors
    ///
    /// [`OrderError::NotFound`] or store errors.
    pub async fn tickets(&self, number: &OrderNumber) -> Result<Vec<TicketCode>, OrderError> {
        self.order(number).await?;
        Ok(self.orders.tickets_for_order(number).await?)
    }

    async fn draft_order(
        &self,
        draft: Draft,
        payment_method: PaymentMethod,
        channel: SalesChannel,
    ) -> Result<Order, OrderError> {
        if draft.units == 0 || draft.units > MAX_UNITS_PER_ORDER {
            return Err(OrderError::InvalidRequest(format!(
                "units must be between 1 and {MAX_UNITS_PER_ORDER}"
            )));
        }
        if draft.buyer.name.trim().is_empty() {
            return Err(OrderError::InvalidRequest("buyer name is required".to_string()));
        }

        let tier = self
            .inventory
            .tier(draft.tier)
            .await?
            .ok_or(OrderError::UnknownTier(draft.tier))?;

        let now = self.clock.now();
        let quote = pricing::quote(&tier, draft.group_size, now)?;
        let overflow = PricingError::Overflow {
            unit_price: quote.unit_price,
            people: quote.people,
        };
        let quantity = quote
            .people
            .checked_mul(draft.units)
            .ok_or_else(|| overflow.clone())?;
        let total = quote.total.checked_multiply(draft.units).ok_or(overflow)?;

        if draft.parking_passes > quantity.saturating_mul(PARKING_PASSES_PER_TICKET) {
            return Err(OrderError::InvalidRequest(format!(
                "at most {PARKING_PASSES_PER_TICKET} parking passes per ticket"
            )));
        }

        let available = match channel {
            SalesChannel::Online => tier.remaining(),
            SalesChannel::Manual => tier.manual_remaining(),
        };
        if quantity > available {
            let rejection = match channel {
                SalesChannel::Online => LedgerRejection::CapacityExceeded {
                    requested: quantity,
                    available,
                },
                SalesChannel::Manual => LedgerRejection::ManualCapReached {
                    requested: quantity,
                    remaining: available,
                },
            };
            return Err(OrderError::Inventory {
                tier: draft.tier,
                rejection,
            });
        }

        let sequence = self.orders.next_order_sequence().await?;
        Ok(Order {
            id: OrderId::new(),
            number: OrderNumber::new(&self.settings.number_prefix, sequence),
            tier: draft.tier,
            group_size: draft.group_size,
            quantity,
            parking_passes: draft.parking_passes,
            total,
            payment_method,
            payment_status: PaymentStatus::Unpaid,
            status: OrderStatus::Pending,
            channel,
            access_type: draft.access_type,
            buyer: draft.buyer,
            provider_reference: None,
            created_at: now,
            expires_at: now + self.settings.expiry,
            paid_at: None,
        })
    }

    async fn complete(
        &self,
        order: &Order,
        provider_reference: Option<String>,
        reason: InventoryReason,
    ) -> Result<Completion, OrderError> {
        for attempt in 1..=MAX_MINT_ATTEMPTS {
            let completion = OrderCompletion {
                order: order.number.clone(),
                provider_reference: provider_reference.clone(),
                reason,
                tickets: self.mint(order),
                at: self.clock.now(),
            };

            match self.orders.complete_order(&completion).await? {
                CompletionOutcome::Completed {
                    order,
                    tickets,
                    inventory,
                } => {
                    metrics::counter!("gatepass_orders_total", "status" => "completed")
                        .increment(1);
                    metrics::counter!("gatepass_tickets_issued_total")
                        .increment(tickets.len() as u64);
                    metrics::counter!("gatepass_inventory_commits_total", "result" => "committed")
                        .increment(1);
                    tracing::info!(
                        order = %order.number,
                        tier = %order.tier,
                        tickets = tickets.len(),
                        sold_units = inventory.new,
                        "Order completed"
                    );
                    return Ok(Completion::Issued { order, tickets });
                },
                CompletionOutcome::AlreadyCompleted { order, tickets } => {
                    return Ok(Completion::AlreadyCompleted { order, tickets });
                },
                CompletionOutcome::NotPending(current) => {
                    return Err(OrderError::InvalidTransition {
                        order: current.number,
                        from: current.status,
                        to: OrderStatus::Completed,
                    });
                },
                CompletionOutcome::Rejected(rejection) => {
                    return Err(self.reject(order, rejection).await);
                },
                CompletionOutcome::CodeCollision(code) => {
                    metrics::counter!("gatepass_code_collisions_total").increment(1);
                    tracing::warn!(order = %order.number, %code, attempt, "Ticket code collision");
                },
                CompletionOutcome::NotFound => {
                    return Err(OrderError::NotFound(order.number.clone()));
                },
            }
        }

        tracing::error!(
            order = %order.number,
            attempts = MAX_MINT_ATTEMPTS,
            "Giving up after repeated code collisions"
        );
        Err(OrderError::CodeCollisions(MAX_MINT_ATTEMPTS))
    }

    /// Marks an order failed after the ledger refused it.
    async fn reject(&self, order: &Order, rejection: LedgerRejection) -> OrderError {
        metrics::counter!("gatepass_inventory_commits_total", "result" => "rejected").increment(1);
        tracing::warn!(
            order = %order.number,
            tier = %order.tier,
            %rejection,
            "Order failed at inventory commit"
        );

        self.mark_failed(order, rejection.to_string()).await;
        OrderError::Inventory {
            tier: order.tier,
            rejection,
        }
    }

    /// Closes a pending order as failed; errors are logged only.
    async fn mark_failed(&self, order: &Order, reason: String) {
        // Online money was taken; the order stays flagged paid until refunded.
        let payment_status = match order.channel {
            SalesChannel::Online => Some(PaymentStatus::Paid),
            SalesChannel::Manual => None,
        };
        let closure = OrderClosure {
            order: order.number.clone(),
            status: OrderStatus::Failed,
            payment_status,
            reason,
            at: self.clock.now(),
        };
        if let Err(e) = self.orders.close_order(&closure).await {
            tracing::error!(order = %order.number, error = %e, "Failed to mark order failed");
        } else {
            metrics::counter!("gatepass_orders_total", "status" => "failed").increment(1);
        }
    }

    async fn close(
        &self,
        number: &OrderNumber,
        status: OrderStatus,
        payment_status: Option<PaymentStatus>,
        reason: &str,
    ) -> Result<Order, OrderError> {
        let closure = OrderClosure {
            order: number.clone(),
            status,
            payment_status,
            reason: reason.to_string(),
            at: self.clock.now(),
        };

        match self.orders.close_order(&closure).await? {
            CloseOutcome::Closed { order, released } => {
                metrics::counter!("gatepass_orders_total", "status" => status.as_str())
                    .increment(1);
                tracing::info!(
                    order = %number,
                    status = status.as_str(),
                    released = released.as_ref().map_or(0, |r| r.previous.saturating_sub(r.new)),
                    reason,
                    "Order closed"
                );
                Ok(order)
            },
            CloseOutcome::InvalidTransition(current) => Err(OrderError::InvalidTransition {
                order: number.clone(),
                from: current.status,
                to: status,
            }),
            CloseOutcome::NotFound => Err(OrderError::NotFound(number.clone())),
        }
    }

    fn mint(&self, order: &Order) -> Vec<TicketCode> {
        let parking = allocate_parking(&order.number, order.parking_passes, order.quantity);
        let now = self.clock.now();

        parking
            .into_iter()
            .map(|parking_passes| {
                let code = self.codes.generate();
                let payload =
                    self.payloads
                        .payload(&code, &order.number, order.tier, &order.buyer.name);
                TicketCode {
                    id: TicketId::new(),
                    qr_payload: self.payloads.encode(&payload),
                    code,
                    order_id: order.id,
                    order_number: order.number.clone(),
                    tier: order.tier,
                    status: ScanStatus::Pending,
                    scanned_at: None,
                    scan_location: None,
                    parking_passes,
                    created_at: now,
                }
            })
            .collect()
    }
}

struct Draft {
    tier: TierKind,
    group_size: GroupSize,
    units: u32,
    parking_passes: u32,
    buyer: Buyer,
    access_type: AccessType,
}

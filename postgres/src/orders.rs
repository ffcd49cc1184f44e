//! Orders and their tickets.

use crate::inventory::{commit_locked, release_locked};
use crate::rows::{ORDER_COLUMNS, OrderRow, TICKET_COLUMNS, TicketRow, convert, kobo};
use crate::{PostgresStore, db_error, insert_audit, total};
use async_trait::async_trait;
use gatepass_core::store::{
    CloseOutcome, CompletionOutcome, OrderClosure, OrderCompletion, OrderStore, StoreError,
    UnitChange,
};
use gatepass_core::types::{
    AuditLogEntry, EntityType, InventoryReason, Order, OrderNumber, OrderStatus, PaymentStatus,
    TicketCode,
};
use sqlx::PgConnection;
use std::collections::HashSet;

async fn fetch_order(
    conn: &mut PgConnection,
    number: &OrderNumber,
    lock: bool,
) -> Result<Option<Order>, StoreError> {
    let suffix = if lock { " FOR UPDATE" } else { "" };
    let query = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE number = $1{suffix}");
    let row: Option<OrderRow> = sqlx::query_as(&query)
        .bind(number.as_str())
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error)?;
    row.map(Order::try_from).transpose()
}

async fn fetch_tickets(
    conn: &mut PgConnection,
    number: &OrderNumber,
) -> Result<Vec<TicketCode>, StoreError> {
    let query = format!(
        "SELECT {TICKET_COLUMNS} FROM ticket_codes WHERE order_number = $1 ORDER BY position"
    );
    let rows: Vec<TicketRow> = sqlx::query_as(&query)
        .bind(number.as_str())
        .fetch_all(&mut *conn)
        .await
        .map_err(db_error)?;
    convert(rows)
}

/// Outcome of inserting one ticket
enum TicketInsert {
    Inserted,
    Duplicate,
}

async fn insert_ticket(
    conn: &mut PgConnection,
    ticket: &TicketCode,
    position: i64,
) -> Result<TicketInsert, StoreError> {
    let result = sqlx::query(
        r"
        INSERT INTO ticket_codes (
            id, code, order_id, order_number, position, tier, qr_payload,
            status, scanned_at, scan_location, parking_passes, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        ",
    )
    .bind(ticket.id.as_uuid())
    .bind(&ticket.code)
    .bind(ticket.order_id.as_uuid())
    .bind(ticket.order_number.as_str())
    .bind(position)
    .bind(ticket.tier.as_str())
    .bind(&ticket.qr_payload)
    .bind(ticket.status.as_str())
    .bind(ticket.scanned_at)
    .bind(&ticket.scan_location)
    .bind(&ticket.parking_passes)
    .bind(ticket.created_at)
    .execute(&mut *conn)
    .await;

    match result {
        Ok(_) => Ok(TicketInsert::Inserted),
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Ok(TicketInsert::Duplicate),
        Err(e) => Err(db_error(e)),
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    async fn next_order_sequence(&self) -> Result<u64, StoreError> {
        let (next,): (i64,) = sqlx::query_as("SELECT nextval('order_number_seq')")
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        total(next)
    }

    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO orders (
                id, number, tier, group_size, quantity, parking_passes, total_kobo,
                payment_method, payment_status, status, channel, access_type,
                buyer_name, buyer_email, buyer_phone, provider_reference,
                created_at, expires_at, paid_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15, $16, $17, $18, $19
            )
            ",
        )
        .bind(order.id.as_uuid())
        .bind(order.number.as_str())
        .bind(order.tier.as_str())
        .bind(order.group_size.as_str())
        .bind(i64::from(order.quantity))
        .bind(i64::from(order.parking_passes))
        .bind(kobo(order.total)?)
        .bind(order.payment_method.as_str())
        .bind(order.payment_status.as_str())
        .bind(order.status.as_str())
        .bind(order.channel.as_str())
        .bind(order.access_type.as_str())
        .bind(&order.buyer.name)
        .bind(&order.buyer.email)
        .bind(&order.buyer.phone)
        .bind(&order.provider_reference)
        .bind(order.created_at)
        .bind(order.expires_at)
        .bind(order.paid_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn order_by_number(&self, number: &OrderNumber) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        fetch_order(&mut conn, number, false).await
    }

    async fn tickets_for_order(
        &self,
        number: &OrderNumber,
    ) -> Result<Vec<TicketCode>, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        fetch_tickets(&mut conn, number).await
    }

    async fn complete_order(
        &self,
        completion: &OrderCompletion,
    ) -> Result<CompletionOutcome, StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let Some(order) = fetch_order(&mut tx, &completion.order, true).await? else {
            tx.rollback().await.map_err(db_error)?;
            return Ok(CompletionOutcome::NotFound);
        };
        match order.status {
            OrderStatus::Pending => {},
            OrderStatus::Completed => {
                let tickets = fetch_tickets(&mut tx, &order.number).await?;
                tx.rollback().await.map_err(db_error)?;
                return Ok(CompletionOutcome::AlreadyCompleted { order, tickets });
            },
            _ => {
                tx.rollback().await.map_err(db_error)?;
                return Ok(CompletionOutcome::NotPending(order));
            },
        }

        let mut batch = HashSet::new();
        if let Some(dup) = completion
            .tickets
            .iter()
            .find(|t| !batch.insert(t.code.as_str()))
        {
            tx.rollback().await.map_err(db_error)?;
            return Ok(CompletionOutcome::CodeCollision(dup.code.clone()));
        }

        let change = UnitChange {
            tier: order.tier,
            quantity: order.quantity,
            channel: order.channel,
            order: order.number.clone(),
            reason: completion.reason,
        };
        let inventory = match commit_locked(&mut tx, &change, completion.at).await? {
            Ok(entry) => entry,
            Err(rejection) => {
                tx.rollback().await.map_err(db_error)?;
                return Ok(CompletionOutcome::Rejected(rejection));
            },
        };

        for (position, ticket) in (0_i64..).zip(&completion.tickets) {
            if let TicketInsert::Duplicate = insert_ticket(&mut tx, ticket, position).await? {
                tx.rollback().await.map_err(db_error)?;
                return Ok(CompletionOutcome::CodeCollision(ticket.code.clone()));
            }
        }

        sqlx::query(
            r"
            UPDATE orders
            SET status = $2, payment_status = $3, provider_reference = $4,
                paid_at = $5, updated_at = now()
            WHERE number = $1
            ",
        )
        .bind(order.number.as_str())
        .bind(OrderStatus::Completed.as_str())
        .bind(PaymentStatus::Paid.as_str())
        .bind(&completion.provider_reference)
        .bind(completion.at)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        insert_audit(
            &mut tx,
            &AuditLogEntry::new(
                EntityType::Order,
                order.number.as_str(),
                "order.completed",
                serde_json::json!({
                    "tickets": completion.tickets.len(),
                    "provider_reference": completion.provider_reference,
                }),
                completion.at,
            ),
        )
        .await?;

        tx.commit().await.map_err(db_error)?;

        let mut completed = order;
        completed.status = OrderStatus::Completed;
        completed.payment_status = PaymentStatus::Paid;
        completed.provider_reference.clone_from(&completion.provider_reference);
        completed.paid_at = Some(completion.at);

        Ok(CompletionOutcome::Completed {
            order: completed,
            tickets: completion.tickets.clone(),
            inventory,
        })
    }

    async fn close_order(&self, closure: &OrderClosure) -> Result<CloseOutcome, StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let Some(order) = fetch_order(&mut tx, &closure.order, true).await? else {
            tx.rollback().await.map_err(db_error)?;
            return Ok(CloseOutcome::NotFound);
        };
        if !order.status.can_transition_to(closure.status) {
            tx.rollback().await.map_err(db_error)?;
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
            release_locked(&mut tx, &change, closure.at).await?
        } else {
            None
        };

        let mut closed = order;
        let previous = closed.status;
        closed.status = closure.status;
        if let Some(payment_status) = closure.payment_status {
            closed.payment_status = payment_status;
        }

        sqlx::query(
            r"
            UPDATE orders
            SET status = $2, payment_status = $3, updated_at = now()
            WHERE number = $1
            ",
        )
        .bind(closed.number.as_str())
        .bind(closed.status.as_str())
        .bind(closed.payment_status.as_str())
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        insert_audit(
            &mut tx,
            &AuditLogEntry::new(
                EntityType::Order,
                closed.number.as_str(),
                format!("order.{}", closed.status.as_str()),
                serde_json::json!({
                    "from": previous.as_str(),
                    "reason": closure.reason,
                    "released": released.as_ref().map(|r| r.previous.saturating_sub(r.new)),
                }),
                closure.at,
            ),
        )
        .await?;

        tx.commit().await.map_err(db_error)?;
        Ok(CloseOutcome::Closed {
            order: closed,
            released,
        })
    }
}

//! Ticket scan state.

use crate::rows::{ORDER_COLUMNS, OrderRow, TICKET_COLUMNS, TicketRow, parse};
use crate::{PostgresStore, db_error, insert_audit, insert_entry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gatepass_core::store::{AdmitOutcome, Admission, GateStore, ScanTarget, StoreError};
use gatepass_core::types::{EntryLogEntry, Order, OrderStatus, ScanStatus, TicketCode};

#[async_trait]
impl GateStore for PostgresStore {
    async fn scan_target(
        &self,
        code: &str,
        qr_payload: Option<&str>,
    ) -> Result<Option<ScanTarget>, StoreError> {
        let by_code = format!("SELECT {TICKET_COLUMNS} FROM ticket_codes WHERE code = $1");
        let mut row: Option<TicketRow> = sqlx::query_as(&by_code)
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        if let (None, Some(raw)) = (&row, qr_payload) {
            let by_payload =
                format!("SELECT {TICKET_COLUMNS} FROM ticket_codes WHERE qr_payload = $1");
            row = sqlx::query_as(&by_payload)
                .bind(raw)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;
        }

        let Some(row) = row else {
            return Ok(None);
        };
        let ticket = TicketCode::try_from(row)?;

        let query = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let order: Option<OrderRow> = sqlx::query_as(&query)
            .bind(ticket.order_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        let order = order
            .map(Order::try_from)
            .transpose()?
            .ok_or_else(|| StoreError::Corrupt(format!("ticket {} has no order", ticket.code)))?;

        Ok(Some(ScanTarget { ticket, order }))
    }

    async fn admit(&self, admission: &Admission) -> Result<AdmitOutcome, StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        // Ticket locked for the transition, order locked against close_order
        let current: Option<(String, Option<DateTime<Utc>>, Option<String>, String)> =
            sqlx::query_as(
                r"
                SELECT t.status, t.scanned_at, t.scan_location, o.status
                FROM ticket_codes t
                JOIN orders o ON o.id = t.order_id
                WHERE t.id = $1
                FOR UPDATE OF t
                FOR SHARE OF o
                ",
            )
            .bind(admission.ticket.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error)?;

        let Some((ticket_status, scanned_at, location, order_status)) = current else {
            tx.rollback().await.map_err(db_error)?;
            return Ok(AdmitOutcome::NotFound);
        };
        if parse::<ScanStatus>(&ticket_status)? == ScanStatus::Scanned {
            tx.rollback().await.map_err(db_error)?;
            return Ok(AdmitOutcome::AlreadyScanned {
                scanned_at,
                location,
            });
        }
        let order_status = parse::<OrderStatus>(&order_status)?;
        if order_status != OrderStatus::Completed {
            tx.rollback().await.map_err(db_error)?;
            return Ok(AdmitOutcome::OrderNotCompleted(order_status));
        }

        sqlx::query(
            r"
            UPDATE ticket_codes
            SET status = $2, scanned_at = $3, scan_location = $4
            WHERE id = $1 AND status = $5
            ",
        )
        .bind(admission.ticket.as_uuid())
        .bind(ScanStatus::Scanned.as_str())
        .bind(admission.at)
        .bind(&admission.gate)
        .bind(ScanStatus::Pending.as_str())
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        insert_entry(&mut tx, &admission.entry).await?;
        insert_audit(&mut tx, &admission.audit).await?;
        tx.commit().await.map_err(db_error)?;
        Ok(AdmitOutcome::Admitted)
    }

    async fn record_entry(&self, entry: &EntryLogEntry) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        insert_entry(&mut conn, entry).await
    }
}

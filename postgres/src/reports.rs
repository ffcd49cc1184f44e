//! Back-office aggregates, computed in SQL.

use crate::rows::{
    AUDIT_COLUMNS, AuditRow, ENTRY_COLUMNS, EntryRow, INVENTORY_COLUMNS, InventoryRow, convert,
};
use crate::{PostgresStore, db_error, total};
use async_trait::async_trait;
use gatepass_core::reports::{EntryStats, SalesStats, TierSales};
use gatepass_core::store::{InventoryStore, ReportStore, StoreError};
use gatepass_core::types::{
    AuditLogEntry, EntityType, EntryLogEntry, InventoryLogEntry, Money, OrderStatus,
    ScanOutcome, ScanStatus, TierKind,
};
use std::collections::BTreeMap;

impl PostgresStore {
    /// Runs a `SELECT key, COUNT(*) ... GROUP BY key` style query
    async fn grouped(
        &self,
        sql: &str,
        bind: Option<&str>,
    ) -> Result<BTreeMap<String, u64>, StoreError> {
        let mut query = sqlx::query_as::<_, (String, i64)>(sql);
        if let Some(value) = bind {
            query = query.bind(value);
        }
        let rows = query.fetch_all(&self.pool).await.map_err(db_error)?;
        rows.into_iter()
            .map(|(key, n)| total(n).map(|n| (key, n)))
            .collect()
    }
}

#[async_trait]
impl ReportStore for PostgresStore {
    async fn entry_stats(&self) -> Result<EntryStats, StoreError> {
        let success = Some(ScanOutcome::Success.as_str());
        let by_outcome = self
            .grouped(
                "SELECT outcome, COUNT(*) FROM entry_log GROUP BY outcome",
                None,
            )
            .await?;
        let by_gate = self
            .grouped("SELECT gate, COUNT(*) FROM entry_log GROUP BY gate", None)
            .await?;
        let by_payment_method = self
            .grouped(
                r"
                SELECT payment_method, COUNT(*) FROM entry_log
                WHERE outcome = $1 AND payment_method IS NOT NULL
                GROUP BY payment_method
                ",
                success,
            )
            .await?;
        let by_access_type = self
            .grouped(
                r"
                SELECT access_type, COUNT(*) FROM entry_log
                WHERE outcome = $1 AND access_type IS NOT NULL
                GROUP BY access_type
                ",
                success,
            )
            .await?;

        Ok(EntryStats {
            total: by_outcome.values().sum(),
            admitted: by_outcome
                .get(ScanOutcome::Success.as_str())
                .copied()
                .unwrap_or_default(),
            by_outcome,
            by_payment_method,
            by_access_type,
            by_gate,
        })
    }

    async fn sales_stats(&self) -> Result<SalesStats, StoreError> {
        let tiers = self.tiers().await?;
        let orders_by_status = self
            .grouped(
                "SELECT status, COUNT(*) FROM orders GROUP BY status",
                None,
            )
            .await?;

        let revenue: Vec<(String, i64)> = sqlx::query_as(
            r"
            SELECT payment_method, COALESCE(SUM(total_kobo), 0)::BIGINT
            FROM orders
            WHERE status = $1
            GROUP BY payment_method
            ",
        )
        .bind(OrderStatus::Completed.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        let revenue_by_method = revenue
            .into_iter()
            .map(|(method, kobo)| total(kobo).map(|k| (method, Money::from_kobo(k))))
            .collect::<Result<_, _>>()?;

        let (issued, scanned): (i64, i64) = sqlx::query_as(
            r"
            SELECT COUNT(*), COUNT(*) FILTER (WHERE status = $1)
            FROM ticket_codes
            ",
        )
        .bind(ScanStatus::Scanned.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(SalesStats {
            tiers: tiers.iter().map(TierSales::from).collect(),
            orders_by_status,
            tickets_issued: total(issued)?,
            tickets_scanned: total(scanned)?,
            revenue_by_method,
        })
    }

    async fn recent_entries(&self, limit: u32) -> Result<Vec<EntryLogEntry>, StoreError> {
        let query =
            format!("SELECT {ENTRY_COLUMNS} FROM entry_log ORDER BY at DESC, seq DESC LIMIT $1");
        let rows: Vec<EntryRow> = sqlx::query_as(&query)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        convert(rows)
    }

    async fn audit_trail(
        &self,
        entity_type: EntityType,
        entity_id: &str,
    ) -> Result<Vec<AuditLogEntry>, StoreError> {
        let query = format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_log \
             WHERE entity_type = $1 AND entity_id = $2 ORDER BY seq"
        );
        let rows: Vec<AuditRow> = sqlx::query_as(&query)
            .bind(entity_type.as_str())
            .bind(entity_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        convert(rows)
    }

    async fn inventory_history(
        &self,
        tier: TierKind,
    ) -> Result<Vec<InventoryLogEntry>, StoreError> {
        let query =
            format!("SELECT {INVENTORY_COLUMNS} FROM inventory_log WHERE tier = $1 ORDER BY seq");
        let rows: Vec<InventoryRow> = sqlx::query_as(&query)
            .bind(tier.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        convert(rows)
    }
}

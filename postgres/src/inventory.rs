//! Tier counters.

use crate::rows::{TIER_COLUMNS, TierRow, convert};
use crate::{PostgresStore, apply_levels, db_error, lock_tier};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gatepass_core::inventory::{LedgerRejection, plan_commit, plan_release};
use gatepass_core::store::{CommitOutcome, InventoryStore, StoreError, UnitChange};
use gatepass_core::types::{InventoryLogEntry, TicketTier, TierKind};
use sqlx::PgConnection;

/// Commits against the locked tier row. Writes nothing on rejection.
pub(crate) async fn commit_locked(
    conn: &mut PgConnection,
    change: &UnitChange,
    at: DateTime<Utc>,
) -> Result<Result<InventoryLogEntry, LedgerRejection>, StoreError> {
    let Some(tier) = lock_tier(conn, change.tier).await? else {
        return Ok(Err(LedgerRejection::UnknownTier));
    };
    match plan_commit(&tier, change.quantity, change.channel) {
        Ok(levels) => apply_levels(conn, change, tier.sold_units, levels, at)
            .await
            .map(Ok),
        Err(rejection) => Ok(Err(rejection)),
    }
}

/// Releases against the locked tier row, flooring at zero
pub(crate) async fn release_locked(
    conn: &mut PgConnection,
    change: &UnitChange,
    at: DateTime<Utc>,
) -> Result<Option<InventoryLogEntry>, StoreError> {
    let Some(tier) = lock_tier(conn, change.tier).await? else {
        return Ok(None);
    };
    let levels = plan_release(&tier, change.quantity, change.channel);
    apply_levels(conn, change, tier.sold_units, levels, at)
        .await
        .map(Some)
}

#[async_trait]
impl InventoryStore for PostgresStore {
    async fn tier(&self, kind: TierKind) -> Result<Option<TicketTier>, StoreError> {
        let query = format!("SELECT {TIER_COLUMNS} FROM ticket_tiers WHERE kind = $1");
        let row: Option<TierRow> = sqlx::query_as(&query)
            .bind(kind.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        row.map(TicketTier::try_from).transpose()
    }

    async fn tiers(&self) -> Result<Vec<TicketTier>, StoreError> {
        let query = format!("SELECT {TIER_COLUMNS} FROM ticket_tiers ORDER BY kind");
        let rows: Vec<TierRow> = sqlx::query_as(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        convert(rows)
    }

    async fn commit_units(
        &self,
        change: &UnitChange,
        at: DateTime<Utc>,
    ) -> Result<CommitOutcome, StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        match commit_locked(&mut tx, change, at).await? {
            Ok(entry) => {
                tx.commit().await.map_err(db_error)?;
                Ok(CommitOutcome::Committed(entry))
            },
            Err(rejection) => {
                tx.rollback().await.map_err(db_error)?;
                tracing::debug!(tier = %change.tier, %rejection, "Commit rejected");
                Ok(CommitOutcome::Rejected(rejection))
            },
        }
    }

    async fn release_units(
        &self,
        change: &UnitChange,
        at: DateTime<Utc>,
    ) -> Result<Option<InventoryLogEntry>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let entry = release_locked(&mut tx, change, at).await?;
        tx.commit().await.map_err(db_error)?;
        Ok(entry)
    }
}

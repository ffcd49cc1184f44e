//! `PostgreSQL` storage for Gatepass.
//!
//! [`PostgresStore`] implements every storage trait from `gatepass-core`:
//!
//! - [`InventoryStore`](gatepass_core::InventoryStore): row-locked tier
//!   counters with the inventory log written in the same transaction
//! - [`OrderStore`](gatepass_core::OrderStore): order completion and closure
//!   as single transactions (status, counters, tickets, audit rows)
//! - [`GateStore`](gatepass_core::GateStore): conditional `pending -> scanned`
//!   update plus entry/audit rows
//! - [`ReportStore`](gatepass_core::ReportStore): aggregates computed in SQL
//!
//! Capacity bounds are decided by the same `plan_commit` / `plan_release`
//! functions the in-memory store uses, applied to a row locked with
//! `SELECT ... FOR UPDATE`, and backed by `CHECK` constraints.
//!
//! # Example
//!
//! ```no_run
//! use gatepass_postgres::PostgresStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = PostgresStore::new("postgres://localhost/gatepass").await?;
//! store.migrate().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod gate;
mod inventory;
mod orders;
mod reports;
mod rows;

use chrono::{DateTime, Utc};
use gatepass_core::store::{StoreError, UnitChange};
use gatepass_core::types::{AuditLogEntry, EntryLogEntry, InventoryLogEntry, TicketTier, TierKind};
use rows::{TIER_COLUMNS, TierRow, kobo};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use std::time::Duration;
use uuid::Uuid;

/// Default pool size for [`PostgresStore::new`]
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Default time to wait for a pooled connection
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// `PostgreSQL`-backed store for tiers, orders, tickets and logs.
///
/// Cloning shares the connection pool.
#[derive(Clone, Debug)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connects with default pool settings.
    ///
    /// # Errors
    ///
    /// [`StoreError::Unavailable`] if the database cannot be reached.
    pub async fn new(database_url: &str) -> Result<Self, StoreError> {
        Self::connect(database_url, DEFAULT_MAX_CONNECTIONS, DEFAULT_ACQUIRE_TIMEOUT).await
    }

    /// Connects with an explicit pool size and acquire timeout.
    ///
    /// # Errors
    ///
    /// [`StoreError::Unavailable`] if the database cannot be reached.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to connect: {e}")))?;
        Ok(Self::from_pool(pool))
    }

    /// Wraps an existing pool
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Underlying connection pool
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Applies the schema migrations in `migrations/`.
    ///
    /// # Errors
    ///
    /// [`StoreError::Database`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// Round-trips a trivial query.
    ///
    /// # Errors
    ///
    /// [`StoreError::Unavailable`] or [`StoreError::Database`].
    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    /// Inserts or updates tier configuration (capacity, caps, prices, perks).
    ///
    /// Sold counters are never touched. Lowering a capacity below what is
    /// already sold fails the table's `CHECK` constraint and leaves every
    /// tier unchanged.
    ///
    /// # Errors
    ///
    /// [`StoreError::Conflict`] if a capacity would drop below sold units, or
    /// other store errors.
    pub async fn sync_tiers(&self, tiers: &[TicketTier]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        for tier in tiers {
            sqlx::query(
                r"
                INSERT INTO ticket_tiers (
                    kind, total_units, manual_cap,
                    presale_single_kobo, presale_group_kobo,
                    onsale_single_kobo, onsale_group_kobo,
                    presale_ends_at, perks
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (kind) DO UPDATE SET
                    total_units = EXCLUDED.total_units,
                    manual_cap = EXCLUDED.manual_cap,
                    presale_single_kobo = EXCLUDED.presale_single_kobo,
                    presale_group_kobo = EXCLUDED.presale_group_kobo,
                    onsale_single_kobo = EXCLUDED.onsale_single_kobo,
                    onsale_group_kobo = EXCLUDED.onsale_group_kobo,
                    presale_ends_at = EXCLUDED.presale_ends_at,
                    perks = EXCLUDED.perks,
                    updated_at = now()
                ",
            )
            .bind(tier.kind.as_str())
            .bind(i64::from(tier.total_units))
            .bind(i64::from(tier.manual_cap))
            .bind(kobo(tier.pricing.presale.single)?)
            .bind(kobo(tier.pricing.presale.group)?)
            .bind(kobo(tier.pricing.onsale.single)?)
            .bind(kobo(tier.pricing.onsale.group)?)
            .bind(tier.pricing.presale_ends_at)
            .bind(Json(tier.perks))
            .execute(&mut *tx)
            .await
            .map_err(|e| constraint_conflict(e, tier.kind))?;
        }

        tx.commit().await.map_err(db_error)?;
        tracing::info!(tiers = tiers.len(), "Tier configuration synced");
        Ok(())
    }
}

// ============================================================================
// Shared transaction helpers
// ============================================================================

/// Maps a driver error onto the store's error vocabulary
pub(crate) fn db_error(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(e.to_string())
        },
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(e.to_string())
        },
        _ => StoreError::Database(e.to_string()),
    }
}

fn constraint_conflict(e: sqlx::Error, kind: TierKind) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_check_violation() {
            return StoreError::Conflict(format!(
                "tier {kind}: capacity below units already sold"
            ));
        }
    }
    db_error(e)
}

/// Locks one tier row for the rest of the transaction
pub(crate) async fn lock_tier(
    conn: &mut PgConnection,
    kind: TierKind,
) -> Result<Option<TicketTier>, StoreError> {
    let query = format!("SELECT {TIER_COLUMNS} FROM ticket_tiers WHERE kind = $1 FOR UPDATE");
    let row: Option<TierRow> = sqlx::query_as(&query)
        .bind(kind.as_str())
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error)?;
    row.map(TicketTier::try_from).transpose()
}

/// Writes planned counters to a locked tier row and appends the log row
pub(crate) async fn apply_levels(
    conn: &mut PgConnection,
    change: &UnitChange,
    previous: u32,
    levels: gatepass_core::inventory::LedgerLevels,
    at: DateTime<Utc>,
) -> Result<InventoryLogEntry, StoreError> {
    sqlx::query(
        r"
        UPDATE ticket_tiers
        SET sold_units = $2, manual_sold = $3, updated_at = now()
        WHERE kind = $1
        ",
    )
    .bind(change.tier.as_str())
    .bind(i64::from(levels.sold_units))
    .bind(i64::from(levels.manual_sold))
    .execute(&mut *conn)
    .await
    .map_err(db_error)?;

    let entry = InventoryLogEntry {
        id: Uuid::new_v4(),
        tier: change.tier,
        previous,
        new: levels.sold_units,
        order: change.order.clone(),
        reason: change.reason,
        at,
    };
    insert_inventory_log(conn, &entry).await?;
    Ok(entry)
}

pub(crate) async fn insert_inventory_log(
    conn: &mut PgConnection,
    entry: &InventoryLogEntry,
) -> Result<(), StoreError> {
    sqlx::query(
        r"
        INSERT INTO inventory_log (id, tier, previous, new, order_number, reason, at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ",
    )
    .bind(entry.id)
    .bind(entry.tier.as_str())
    .bind(i64::from(entry.previous))
    .bind(i64::from(entry.new))
    .bind(entry.order.as_str())
    .bind(entry.reason.as_str())
    .bind(entry.at)
    .execute(&mut *conn)
    .await
    .map_err(db_error)?;
    Ok(())
}

pub(crate) async fn insert_audit(
    conn: &mut PgConnection,
    entry: &AuditLogEntry,
) -> Result<(), StoreError> {
    sqlx::query(
        r"
        INSERT INTO audit_log (id, entity_type, entity_id, action, detail, at)
        VALUES ($1, $2, $3, $4, $5, $6)
        ",
    )
    .bind(entry.id)
    .bind(entry.entity_type.as_str())
    .bind(&entry.entity_id)
    .bind(&entry.action)
    .bind(&entry.detail)
    .bind(entry.at)
    .execute(&mut *conn)
    .await
    .map_err(db_error)?;
    Ok(())
}

pub(crate) async fn insert_entry(
    conn: &mut PgConnection,
    entry: &EntryLogEntry,
) -> Result<(), StoreError> {
    sqlx::query(
        r"
        INSERT INTO entry_log (id, ticket, access_type, tier, payment_method, outcome, gate, at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ",
    )
    .bind(entry.id)
    .bind(&entry.ticket)
    .bind(entry.access_type.map(|a| a.as_str()))
    .bind(entry.tier.map(|t| t.as_str()))
    .bind(entry.payment_method.map(|m| m.as_str()))
    .bind(entry.outcome.as_str())
    .bind(&entry.gate)
    .bind(entry.at)
    .execute(&mut *conn)
    .await
    .map_err(db_error)?;
    Ok(())
}

/// Reads a `BIGINT` aggregate as `u64`
pub(crate) fn total(value: i64) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|_| StoreError::Corrupt(format!("negative aggregate: {value}")))
}

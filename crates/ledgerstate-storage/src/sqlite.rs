//! SQLite storage backend.
//!
//! Persists claimable balances and their claimants to a single SQLite file
//! via `sqlx`, with WAL mode enabled.
//!
//! # Usage
//! ```rust,no_run
//! use ledgerstate_storage::sqlite::SqliteStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let store = SqliteStore::open("./ledgerstate.db").await?;
//!
//! // In-memory (tests / ephemeral)
//! let store = SqliteStore::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::debug;

use ledgerstate_core::error::StoreError;
use ledgerstate_core::rows::{ClaimableBalanceRow, ClaimantPart, ClaimantRow};
use ledgerstate_core::store::ClaimableBalanceStore;
use ledgerstate_core::xdr::Asset;

/// Rows per statement; 7 binds per balance row stays well under SQLite's
/// bind-parameter limit.
const ROWS_PER_STATEMENT: usize = 1_000;

fn db_err(e: sqlx::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

fn json_err(e: serde_json::Error) -> StoreError {
    StoreError::Database(format!("serialize: {e}"))
}

/// SQLite-backed claimable-balance store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./ledgerstate.db"`) or a full
    /// SQLite URL (`"sqlite:./ledgerstate.db?mode=rwc"`).
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let pool = SqlitePool::connect(&url).await.map_err(db_err)?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Open an in-memory SQLite database.
    ///
    /// Uses a single connection so every query sees the same database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(db_err)?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS claimable_balances (
                id                   TEXT    NOT NULL PRIMARY KEY,
                claimants            TEXT    NOT NULL,
                asset                TEXT    NOT NULL,
                amount               INTEGER NOT NULL,
                sponsor              TEXT,
                last_modified_ledger INTEGER NOT NULL,
                flags                INTEGER NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS claimable_balance_claimants (
                id                   TEXT    NOT NULL,
                destination          TEXT    NOT NULL,
                last_modified_ledger INTEGER NOT NULL,
                PRIMARY KEY (id, destination)
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_claimants_destination
             ON claimable_balance_claimants (destination);",
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    // ─── Queries ────────────────────────────────────────────────────────────────

    /// Look up a balance row by id.
    pub async fn balance(&self, id: &str) -> Result<Option<ClaimableBalanceRow>, StoreError> {
        let row = sqlx::query(
            "SELECT id, claimants, asset, amount, sponsor, last_modified_ledger, flags
             FROM claimable_balances WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        let Some(r) = row else {
            return Ok(None);
        };
        let claimants: Vec<ClaimantPart> =
            serde_json::from_str(&r.get::<String, _>("claimants")).map_err(json_err)?;
        let asset: Asset = serde_json::from_str(&r.get::<String, _>("asset")).map_err(json_err)?;

        Ok(Some(ClaimableBalanceRow {
            balance_id: r.get("id"),
            claimants,
            asset,
            amount: r.get("amount"),
            sponsor: r.get("sponsor"),
            last_modified_ledger: r.get::<i64, _>("last_modified_ledger") as u32,
            flags: r.get::<i64, _>("flags") as u32,
        }))
    }

    pub async fn balance_count(&self) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM claimable_balances")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.get::<i64, _>("cnt") as u64)
    }

    /// Ids of the balances `destination` can claim.
    pub async fn balance_ids_for_destination(&self, destination: &str) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query(
            "SELECT id FROM claimable_balance_claimants WHERE destination = ? ORDER BY id",
        )
        .bind(destination)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(|r| r.get("id")).collect())
    }

    pub async fn claimant_count(&self) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM claimable_balance_claimants")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.get::<i64, _>("cnt") as u64)
    }

    /// `DELETE FROM <table> WHERE id IN (...)`, chunked inside one
    /// transaction.
    async fn delete_by_ids(&self, table: &str, ids: &[String]) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let mut affected = 0;
        for chunk in ids.chunks(ROWS_PER_STATEMENT) {
            let mut qb: QueryBuilder<Sqlite> =
                QueryBuilder::new(format!("DELETE FROM {table} WHERE id IN ("));
            let mut separated = qb.separated(", ");
            for id in chunk {
                separated.push_bind(id.as_str());
            }
            separated.push_unseparated(")");
            affected += qb.build().execute(&mut *tx).await.map_err(db_err)?.rows_affected();
        }
        tx.commit().await.map_err(db_err)?;
        Ok(affected)
    }
}

// ─── ClaimableBalanceStore impl ──────────────────────────────────────────────

#[async_trait]
impl ClaimableBalanceStore for SqliteStore {
    async fn insert_claimable_balances(&self, rows: &[ClaimableBalanceRow]) -> Result<(), StoreError> {
        let encoded = rows
            .iter()
            .map(|r| {
                Ok((
                    r,
                    serde_json::to_string(&r.claimants)?,
                    serde_json::to_string(&r.asset)?,
                ))
            })
            .collect::<Result<Vec<_>, serde_json::Error>>()
            .map_err(json_err)?;

        let mut tx = self.pool.begin().await.map_err(db_err)?;
        for chunk in encoded.chunks(ROWS_PER_STATEMENT) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO claimable_balances
                 (id, claimants, asset, amount, sponsor, last_modified_ledger, flags) ",
            );
            qb.push_values(chunk, |mut b, (row, claimants, asset)| {
                b.push_bind(row.balance_id.as_str())
                    .push_bind(claimants.as_str())
                    .push_bind(asset.as_str())
                    .push_bind(row.amount)
                    .push_bind(row.sponsor.as_deref())
                    .push_bind(row.last_modified_ledger as i64)
                    .push_bind(row.flags as i64);
            });
            qb.push(" ON CONFLICT (id) DO NOTHING");
            qb.build().execute(&mut *tx).await.map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)?;

        debug!(rows = rows.len(), "claimable balances inserted");
        Ok(())
    }

    async fn insert_claimants(&self, rows: &[ClaimantRow]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        for chunk in rows.chunks(ROWS_PER_STATEMENT) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO claimable_balance_claimants (id, destination, last_modified_ledger) ",
            );
            qb.push_values(chunk, |mut b, row| {
                b.push_bind(row.balance_id.as_str())
                    .push_bind(row.destination.as_str())
                    .push_bind(row.last_modified_ledger as i64);
            });
            qb.push(" ON CONFLICT (id, destination) DO NOTHING");
            qb.build().execute(&mut *tx).await.map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)?;

        debug!(rows = rows.len(), "claimants inserted");
        Ok(())
    }

    async fn remove_claimable_balances(&self, ids: &[String]) -> Result<u64, StoreError> {
        let affected = self.delete_by_ids("claimable_balances", ids).await?;
        debug!(requested = ids.len(), affected, "claimable balances removed");
        Ok(affected)
    }

    async fn remove_claimants(&self, ids: &[String]) -> Result<u64, StoreError> {
        self.delete_by_ids("claimable_balance_claimants", ids).await
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

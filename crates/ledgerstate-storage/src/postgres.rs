//! PostgreSQL storage backend.
//!
//! Persists claimable balances and claimants to PostgreSQL via `sqlx` with
//! connection pooling, for production ingestion.
//!
//! # Feature Flag
//! Requires the `postgres` feature:
//! ```toml
//! ledgerstate-storage = { version = "0.1", features = ["postgres"] }
//! ```
//!
//! # Schema
//! Created on first connect:
//! - `claimable_balances` — one row per live balance, claimants as JSONB
//! - `claimable_balance_claimants` — (balance id, destination) index rows

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::{debug, info};

use ledgerstate_core::error::StoreError;
use ledgerstate_core::rows::{ClaimableBalanceRow, ClaimantPart, ClaimantRow};
use ledgerstate_core::store::ClaimableBalanceStore;
use ledgerstate_core::xdr::Asset;

/// Rows per statement; 7 binds per balance row against Postgres' 65535.
const ROWS_PER_STATEMENT: usize = 5_000;

fn db_err(e: sqlx::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

// ─── Connection options ────────────────────────────────────────────────────────

/// Connection options for the Postgres store.
#[derive(Debug, Clone)]
pub struct PostgresOptions {
    /// Maximum number of connections in the pool (default: 10)
    pub max_connections: u32,
    /// Minimum number of idle connections to keep open (default: 1)
    pub min_connections: u32,
    /// Connection timeout in seconds (default: 30)
    pub connect_timeout_secs: u64,
}

impl Default for PostgresOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 30,
        }
    }
}

// ─── PostgresStore ───────────────────────────────────────────────────────────

/// PostgreSQL-backed claimable-balance store.
///
/// Cheap to clone; wraps a connection pool.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect with default pool options and initialize the schema.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        Self::connect_with_options(database_url, PostgresOptions::default()).await
    }

    /// Connect with custom pool options.
    pub async fn connect_with_options(
        database_url: &str,
        opts: PostgresOptions,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(opts.max_connections)
            .min_connections(opts.min_connections)
            .acquire_timeout(std::time::Duration::from_secs(opts.connect_timeout_secs))
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Database(format!("postgres connect: {e}")))?;

        let store = Self { pool };
        store.init_schema().await?;
        info!("PostgresStore connected and schema initialized");
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS claimable_balances (
                id                   TEXT    NOT NULL PRIMARY KEY,
                claimants            JSONB   NOT NULL,
                asset                JSONB   NOT NULL,
                amount               BIGINT  NOT NULL,
                sponsor              TEXT,
                last_modified_ledger INTEGER NOT NULL,
                flags                INTEGER NOT NULL
            )",
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
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_claimable_balance_claimants_destination
             ON claimable_balance_claimants (destination)",
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        debug!("PostgresStore schema initialized");
        Ok(())
    }

    /// Look up a balance row by id.
    pub async fn balance(&self, id: &str) -> Result<Option<ClaimableBalanceRow>, StoreError> {
        let row = sqlx::query(
            "SELECT id, claimants, asset, amount, sponsor, last_modified_ledger, flags
             FROM claimable_balances WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(|r| ClaimableBalanceRow {
            balance_id: r.get("id"),
            claimants: r.get::<Json<Vec<ClaimantPart>>, _>("claimants").0,
            asset: r.get::<Json<Asset>, _>("asset").0,
            amount: r.get("amount"),
            sponsor: r.get("sponsor"),
            last_modified_ledger: r.get::<i32, _>("last_modified_ledger") as u32,
            flags: r.get::<i32, _>("flags") as u32,
        }))
    }

    /// The underlying pool, for ad-hoc queries.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn delete_by_ids(&self, table: &str, ids: &[String]) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let mut affected = 0;
        for chunk in ids.chunks(ROWS_PER_STATEMENT) {
            let result = sqlx::query(&format!("DELETE FROM {table} WHERE id = ANY($1)"))
                .bind(chunk)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
            affected += result.rows_affected();
        }
        tx.commit().await.map_err(db_err)?;
        Ok(affected)
    }
}

#[async_trait]
impl ClaimableBalanceStore for PostgresStore {
    async fn insert_claimable_balances(&self, rows: &[ClaimableBalanceRow]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        for chunk in rows.chunks(ROWS_PER_STATEMENT) {
            let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO claimable_balances
                 (id, claimants, asset, amount, sponsor, last_modified_ledger, flags) ",
            );
            qb.push_values(chunk, |mut b, row| {
                b.push_bind(row.balance_id.as_str())
                    .push_bind(Json(&row.claimants))
                    .push_bind(Json(&row.asset))
                    .push_bind(row.amount)
                    .push_bind(row.sponsor.as_deref())
                    .push_bind(row.last_modified_ledger as i32)
                    .push_bind(row.flags as i32);
            });
            qb.push(" ON CONFLICT (id) DO NOTHING");
            qb.build().execute(&mut *tx).await.map_err(db_err)?;
        }
        tx.commit()
            .await
            .map_err(|e| StoreError::Database(format!("commit batch: {e}")))?;

        debug!(rows = rows.len(), "claimable balances inserted");
        Ok(())
    }

    async fn insert_claimants(&self, rows: &[ClaimantRow]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        for chunk in rows.chunks(ROWS_PER_STATEMENT) {
            let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO claimable_balance_claimants (id, destination, last_modified_ledger) ",
            );
            qb.push_values(chunk, |mut b, row| {
                b.push_bind(row.balance_id.as_str())
                    .push_bind(row.destination.as_str())
                    .push_bind(row.last_modified_ledger as i32);
            });
            qb.push(" ON CONFLICT (id, destination) DO NOTHING");
            qb.build().execute(&mut *tx).await.map_err(db_err)?;
        }
        tx.commit()
            .await
            .map_err(|e| StoreError::Database(format!("commit batch: {e}")))?;

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

#[cfg(test)]
mod tests {
    // Integration tests require a running PostgreSQL instance.
    // Example: DATABASE_URL=postgresql://localhost/ledgerstate_test cargo test --features postgres

    use super::*;
    use ledgerstate_core::xdr::ClaimPredicate;

    #[tokio::test]
    #[ignore = "requires PostgreSQL (set DATABASE_URL to enable)"]
    async fn test_postgres_insert_and_remove() {
        let url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set for integration tests");
        let store = PostgresStore::connect(&url).await.unwrap();

        let id = "00000000".to_string() + &"ee".repeat(32);
        let row = ClaimableBalanceRow {
            balance_id: id.clone(),
            claimants: vec![ClaimantPart {
                destination: "GD1".into(),
                predicate: ClaimPredicate::Unconditional,
            }],
            asset: Asset::Native,
            amount: 100,
            sponsor: None,
            last_modified_ledger: 9,
            flags: 0,
        };
        store.insert_claimable_balances(&[row.clone()]).await.unwrap();
        assert_eq!(store.balance(&id).await.unwrap().unwrap(), row);

        let affected = store.remove_claimable_balances(&[id.clone()]).await.unwrap();
        assert_eq!(affected, 1);
        assert!(store.balance(&id).await.unwrap().is_none());
    }
}

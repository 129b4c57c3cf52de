//! Store contract for claimable balances and the batch insert builders that
//! write through it.
//!
//! Backends live in `ledgerstate-storage` (memory, SQLite, Postgres).

use async_trait::async_trait;

use crate::error::StoreError;
use crate::rows::{ClaimableBalanceRow, ClaimantRow};

/// Bulk operations on the claimable-balance tables.
#[async_trait]
pub trait ClaimableBalanceStore: Send + Sync {
    /// Insert balance rows in one bulk statement.
    async fn insert_claimable_balances(&self, rows: &[ClaimableBalanceRow]) -> Result<(), StoreError>;

    /// Insert claimant rows in one bulk statement.
    async fn insert_claimants(&self, rows: &[ClaimantRow]) -> Result<(), StoreError>;

    /// Delete balances by id, returning the number of rows removed.
    async fn remove_claimable_balances(&self, ids: &[String]) -> Result<u64, StoreError>;

    /// Delete every claimant row of the given balances, returning the number
    /// of rows removed.
    async fn remove_claimants(&self, ids: &[String]) -> Result<u64, StoreError>;
}

/// A row type that knows which bulk insert of the store it goes through.
#[async_trait]
pub trait BatchRow: Sized + Send + Sync {
    async fn insert_all(store: &dyn ClaimableBalanceStore, rows: &[Self]) -> Result<(), StoreError>;
}

#[async_trait]
impl BatchRow for ClaimableBalanceRow {
    async fn insert_all(store: &dyn ClaimableBalanceStore, rows: &[Self]) -> Result<(), StoreError> {
        store.insert_claimable_balances(rows).await
    }
}

#[async_trait]
impl BatchRow for ClaimantRow {
    async fn insert_all(store: &dyn ClaimableBalanceStore, rows: &[Self]) -> Result<(), StoreError> {
        store.insert_claimants(rows).await
    }
}

/// Accumulates rows and flushes them as a single bulk insert.
#[derive(Debug)]
pub struct BatchInsertBuilder<R> {
    rows: Vec<R>,
}

pub type ClaimableBalanceBatchInsertBuilder = BatchInsertBuilder<ClaimableBalanceRow>;
pub type ClaimantBatchInsertBuilder = BatchInsertBuilder<ClaimantRow>;

impl<R> Default for BatchInsertBuilder<R> {
    fn default() -> Self {
        Self { rows: Vec::new() }
    }
}

impl<R: BatchRow> BatchInsertBuilder<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, row: R) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Flush every buffered row in one insert. No store call when empty.
    ///
    /// The builder is empty afterwards whether or not the insert succeeded.
    pub async fn exec(&mut self, store: &dyn ClaimableBalanceStore) -> Result<(), StoreError> {
        if self.rows.is_empty() {
            return Ok(());
        }
        let rows = std::mem::take(&mut self.rows);
        R::insert_all(store, &rows).await
    }
}

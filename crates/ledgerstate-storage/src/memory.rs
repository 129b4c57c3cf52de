//! In-memory storage backend.
//!
//! Keeps balance and claimant rows in RAM with the same keys as the SQL
//! backends. Re-inserting an existing key is a no-op. Useful for tests and
//! dry-run replays.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use ledgerstate_core::error::StoreError;
use ledgerstate_core::rows::{ClaimableBalanceRow, ClaimantRow};
use ledgerstate_core::store::ClaimableBalanceStore;

/// In-memory claimable-balance store.
///
/// All data is lost when the process exits.
#[derive(Default)]
pub struct InMemoryStore {
    balances: Mutex<HashMap<String, ClaimableBalanceRow>>,
    claimants: Mutex<Vec<ClaimantRow>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a balance row by id.
    pub fn balance(&self, id: &str) -> Option<ClaimableBalanceRow> {
        self.balances.lock().unwrap().get(id).cloned()
    }

    pub fn balance_count(&self) -> usize {
        self.balances.lock().unwrap().len()
    }

    /// Claimant rows of one balance, in insertion order.
    pub fn claimants_for(&self, id: &str) -> Vec<ClaimantRow> {
        self.claimants
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.balance_id == id)
            .cloned()
            .collect()
    }

    /// Ids of the balances `destination` can claim.
    pub fn balance_ids_for_destination(&self, destination: &str) -> Vec<String> {
        self.claimants
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.destination == destination)
            .map(|c| c.balance_id.clone())
            .collect()
    }

    pub fn claimant_count(&self) -> usize {
        self.claimants.lock().unwrap().len()
    }
}

#[async_trait]
impl ClaimableBalanceStore for InMemoryStore {
    async fn insert_claimable_balances(&self, rows: &[ClaimableBalanceRow]) -> Result<(), StoreError> {
        let mut balances = self.balances.lock().unwrap();
        // Existing ids are kept, like `ON CONFLICT (id) DO NOTHING`.
        for row in rows {
            balances
                .entry(row.balance_id.clone())
                .or_insert_with(|| row.clone());
        }
        Ok(())
    }

    async fn insert_claimants(&self, rows: &[ClaimantRow]) -> Result<(), StoreError> {
        let mut claimants = self.claimants.lock().unwrap();
        let mut keys: HashSet<(String, String)> = claimants
            .iter()
            .map(|c| (c.balance_id.clone(), c.destination.clone()))
            .collect();
        for row in rows {
            if keys.insert((row.balance_id.clone(), row.destination.clone())) {
                claimants.push(row.clone());
            }
        }
        Ok(())
    }

    async fn remove_claimable_balances(&self, ids: &[String]) -> Result<u64, StoreError> {
        let mut balances = self.balances.lock().unwrap();
        let removed = ids.iter().filter(|id| balances.remove(*id).is_some()).count();
        Ok(removed as u64)
    }

    async fn remove_claimants(&self, ids: &[String]) -> Result<u64, StoreError> {
        let ids: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut claimants = self.claimants.lock().unwrap();
        let before = claimants.len();
        claimants.retain(|c| !ids.contains(c.balance_id.as_str()));
        Ok((before - claimants.len()) as u64)
    }
}

//! Processor + store scenarios: a replayed change stream ends up as the
//! expected table contents.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use ledgerstate_core::error::StoreError;
use ledgerstate_core::rows::{to_balance_row, to_claimant_rows, ClaimableBalanceRow, ClaimantRow};
use ledgerstate_core::xdr::{
    Asset, ClaimPredicate, ClaimableBalanceEntry, ClaimableBalanceEntryExt, ClaimableBalanceId,
    Claimant, ClaimantV0, LedgerEntry, LedgerEntryData,
};
use ledgerstate_core::{
    Change, ClaimableBalanceStore, ClaimableBalancesChangeProcessor, ProcessorBuilder,
};
use ledgerstate_storage::InMemoryStore;

fn balance(seed: u8, destinations: &[&str]) -> LedgerEntry {
    LedgerEntry {
        last_modified_ledger_seq: 50_000,
        data: LedgerEntryData::ClaimableBalance(ClaimableBalanceEntry {
            balance_id: ClaimableBalanceId::V0([seed; 32]),
            claimants: destinations
                .iter()
                .map(|d| {
                    Claimant::V0(ClaimantV0 {
                        destination: d.to_string(),
                        predicate: ClaimPredicate::Not(Some(Box::new(
                            ClaimPredicate::BeforeRelativeTime(3_600),
                        ))),
                    })
                })
                .collect(),
            asset: Asset::CreditAlphanum4 {
                code: "EURT".into(),
                issuer: "GAP5LETOV6YIE62YAM56STDANPRDO7ZFDBGSNHJQIYGGKSMOZAHOOS2S".into(),
            },
            amount: 1_000_000,
            ext: ClaimableBalanceEntryExt::V0,
        }),
        sponsor: Some("GSPONSOR".into()),
    }
}

fn id(seed: u8) -> String {
    ClaimableBalanceId::V0([seed; 32]).to_hex()
}

/// Put a balance and its claimants in the store as an earlier ledger would
/// have.
async fn seed(store: &InMemoryStore, entry: &LedgerEntry) {
    let row = to_balance_row(entry).unwrap();
    store.insert_claimants(&to_claimant_rows(&row)).await.unwrap();
    store.insert_claimable_balances(&[row]).await.unwrap();
}

#[tokio::test]
async fn create_and_remove_in_one_window() {
    let store = Arc::new(InMemoryStore::new());
    seed(&store, &balance(0xb2, &["GD3"])).await;

    let mut processor = ClaimableBalancesChangeProcessor::new(store.clone());
    processor
        .process_change(Change::created(balance(0xa1, &["GD1", "GD2"])))
        .await
        .unwrap();
    processor
        .process_change(Change::removed(balance(0xb2, &["GD3"])))
        .await
        .unwrap();
    processor.commit().await.unwrap();

    let row = store.balance(&id(0xa1)).expect("balance a1 inserted");
    assert_eq!(row.claimants.len(), 2);
    assert_eq!(row.sponsor.as_deref(), Some("GSPONSOR"));
    assert_eq!(row.last_modified_ledger, 50_000);
    let destinations: Vec<_> = store
        .claimants_for(&id(0xa1))
        .into_iter()
        .map(|c| c.destination)
        .collect();
    assert_eq!(destinations, vec!["GD1", "GD2"]);

    assert!(store.balance(&id(0xb2)).is_none());
    assert!(store.claimants_for(&id(0xb2)).is_empty());
    assert_eq!(store.balance_count(), 1);
    assert_eq!(store.claimant_count(), 2);
}

#[tokio::test]
async fn removing_an_unknown_balance_halts_and_keeps_claimants() {
    let store = Arc::new(InMemoryStore::new());
    // Claimant rows exist but the balance row itself is missing.
    let orphan = to_balance_row(&balance(0xb2, &["GD3"])).unwrap();
    store.insert_claimants(&to_claimant_rows(&orphan)).await.unwrap();

    let mut processor = ClaimableBalancesChangeProcessor::new(store.clone());
    processor
        .process_change(Change::created(balance(0xa1, &["GD1", "GD2"])))
        .await
        .unwrap();
    processor
        .process_change(Change::removed(balance(0xb2, &["GD3"])))
        .await
        .unwrap();

    let err = processor.commit().await.unwrap_err();
    assert!(err.is_state_error());
    assert_eq!(
        err.to_string(),
        "state error: 0 rows affected when deleting 1 claimable balances"
    );
    // Claimant deletion was never issued.
    assert_eq!(store.claimants_for(&id(0xb2)).len(), 1);
    // Inserts ran before the deletion check.
    assert!(store.balance(&id(0xa1)).is_some());
}

#[tokio::test]
async fn balance_created_and_claimed_within_window_never_reaches_store() {
    let store = Arc::new(InMemoryStore::new());
    let mut processor = ClaimableBalancesChangeProcessor::new(store.clone());
    processor
        .process_change(Change::created(balance(0x01, &["GD1"])))
        .await
        .unwrap();
    processor
        .process_change(Change::removed(balance(0x01, &["GD1"])))
        .await
        .unwrap();
    processor.commit().await.unwrap();

    assert_eq!(store.balance_count(), 0);
    assert_eq!(store.claimant_count(), 0);
}

#[tokio::test]
async fn replay_across_automatic_commits() {
    let store = Arc::new(InMemoryStore::new());
    let config = ProcessorBuilder::new().max_batch_size(3).build_config();
    let mut processor = ClaimableBalancesChangeProcessor::with_config(store.clone(), config);

    for seed in 1..=8u8 {
        processor
            .process_change(Change::created(balance(seed, &["GD1"])))
            .await
            .unwrap();
    }
    // Two windows of four went out on their own.
    assert_eq!(store.balance_count(), 8);
    assert_eq!(processor.pending_changes(), 0);

    for seed in 1..=4u8 {
        processor
            .process_change(Change::removed(balance(seed, &["GD1"])))
            .await
            .unwrap();
    }
    assert_eq!(store.balance_count(), 4);
    processor.commit().await.unwrap();

    assert_eq!(store.balance_count(), 4);
    assert_eq!(store.balance_ids_for_destination("GD1").len(), 4);
    assert!(store.balance(&id(1)).is_none());
    assert!(store.balance(&id(8)).is_some());
}

/// Fails the first balance insert after the claimant insert went through.
struct FailFirstBalanceInsert {
    inner: InMemoryStore,
    armed: AtomicBool,
}

#[async_trait]
impl ClaimableBalanceStore for FailFirstBalanceInsert {
    async fn insert_claimable_balances(&self, rows: &[ClaimableBalanceRow]) -> Result<(), StoreError> {
        if self.armed.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Database("connection reset".into()));
        }
        self.inner.insert_claimable_balances(rows).await
    }

    async fn insert_claimants(&self, rows: &[ClaimantRow]) -> Result<(), StoreError> {
        self.inner.insert_claimants(rows).await
    }

    async fn remove_claimable_balances(&self, ids: &[String]) -> Result<u64, StoreError> {
        self.inner.remove_claimable_balances(ids).await
    }

    async fn remove_claimants(&self, ids: &[String]) -> Result<u64, StoreError> {
        self.inner.remove_claimants(ids).await
    }
}

#[tokio::test]
async fn resubmitting_after_a_half_applied_commit_converges() {
    let store = Arc::new(FailFirstBalanceInsert {
        inner: InMemoryStore::new(),
        armed: AtomicBool::new(true),
    });
    let mut processor = ClaimableBalancesChangeProcessor::new(store.clone());
    let ledger = [
        Change::created(balance(7, &["GD1", "GD2"])),
        Change::created(balance(8, &["GD1"])),
    ];

    for change in ledger.iter().cloned() {
        processor.process_change(change).await.unwrap();
    }
    let err = processor.commit().await.unwrap_err();
    assert!(err.is_retriable());
    assert_eq!(store.inner.claimant_count(), 3);
    assert_eq!(store.inner.balance_count(), 0);

    for change in ledger.iter().cloned() {
        processor.process_change(change).await.unwrap();
    }
    processor.commit().await.unwrap();

    assert_eq!(store.inner.balance_count(), 2);
    assert_eq!(store.inner.claimant_count(), 3);
    assert_eq!(store.inner.claimants_for(&id(7)).len(), 2);
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn sqlite_create_and_remove_in_one_window() {
    use ledgerstate_storage::sqlite::SqliteStore;

    let store = Arc::new(SqliteStore::in_memory().await.unwrap());
    let b2 = to_balance_row(&balance(0xb2, &["GD3"])).unwrap();
    store.insert_claimants(&to_claimant_rows(&b2)).await.unwrap();
    store.insert_claimable_balances(&[b2]).await.unwrap();

    let mut processor = ClaimableBalancesChangeProcessor::new(store.clone());
    processor
        .process_change(Change::created(balance(0xa1, &["GD1", "GD2"])))
        .await
        .unwrap();
    processor
        .process_change(Change::removed(balance(0xb2, &["GD3"])))
        .await
        .unwrap();
    processor.commit().await.unwrap();

    assert_eq!(store.balance_count().await.unwrap(), 1);
    assert_eq!(store.claimant_count().await.unwrap(), 2);
    let loaded = store.balance(&id(0xa1)).await.unwrap().unwrap();
    assert_eq!(loaded, to_balance_row(&balance(0xa1, &["GD1", "GD2"])).unwrap());
}

//! Change compactor — folds every change seen for an entry within a window
//! into a single net change.
//!
//! # Folding rules
//!
//! ```text
//! existing \ incoming   created          updated           removed
//! (none)                store            store             store
//! created               error            created(post')    drop entry
//! updated               error            updated(pre,post') removed(pre)
//! removed               updated(pre,post') error           error
//! ```

use indexmap::map::Entry;
use indexmap::IndexMap;

use crate::change::{Change, ChangeKind};
use crate::error::CompactorError;
use crate::xdr::LedgerKey;

/// Accumulates changes keyed by entry identity.
///
/// Implementations guarantee at most one net change per identity on
/// [`drain`](ChangeCompactor::drain).
pub trait ChangeCompactor: Send + Sync {
    /// Fold `change` into the buffered net change for its entry.
    fn add(&mut self, change: Change) -> Result<(), CompactorError>;

    /// Number of entries with a buffered net change.
    fn size(&self) -> usize;

    /// Take every buffered net change, leaving the compactor empty.
    fn drain(&mut self) -> Vec<Change>;
}

/// Insertion-ordered [`ChangeCompactor`] keyed by [`LedgerKey`].
#[derive(Debug, Default)]
pub struct LedgerChangeCompactor {
    cache: IndexMap<LedgerKey, Change>,
}

impl LedgerChangeCompactor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChangeCompactor for LedgerChangeCompactor {
    fn add(&mut self, change: Change) -> Result<(), CompactorError> {
        let incoming = change.kind()?;
        let key = change.key()?;

        let mut slot = match self.cache.entry(key) {
            Entry::Vacant(v) => {
                v.insert(change);
                return Ok(());
            }
            Entry::Occupied(o) => o,
        };

        let existing = slot.get().kind()?;
        match (existing, incoming) {
            (ChangeKind::Created | ChangeKind::Updated, ChangeKind::Created) => {
                return Err(CompactorError::AlreadyExists { key: slot.key().to_string() });
            }
            (ChangeKind::Removed, ChangeKind::Updated) => {
                return Err(CompactorError::UpdateAfterRemove { key: slot.key().to_string() });
            }
            (ChangeKind::Removed, ChangeKind::Removed) => {
                return Err(CompactorError::RemoveAfterRemove { key: slot.key().to_string() });
            }
            // Removed then re-created: net update from the original pre.
            (ChangeKind::Removed, ChangeKind::Created)
            | (ChangeKind::Updated, ChangeKind::Updated)
            | (ChangeKind::Created, ChangeKind::Updated) => {
                slot.get_mut().post = change.post;
            }
            (ChangeKind::Created, ChangeKind::Removed) => {
                slot.shift_remove();
            }
            (ChangeKind::Updated, ChangeKind::Removed) => {
                slot.get_mut().post = None;
            }
        }
        Ok(())
    }

    fn size(&self) -> usize {
        self.cache.len()
    }

    fn drain(&mut self) -> Vec<Change> {
        self.cache
            .drain(..)
            .map(|(_, change)| change)
            .filter(|change| match (&change.pre, &change.post) {
                (Some(pre), Some(post)) => pre != post,
                _ => true,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xdr::{
        AccountEntry, Asset, ClaimableBalanceEntry, ClaimableBalanceEntryExt, ClaimableBalanceId,
        LedgerEntry, LedgerEntryData, LedgerEntryType,
    };

    fn account(id: &str, balance: i64) -> LedgerEntry {
        LedgerEntry {
            last_modified_ledger_seq: 1,
            data: LedgerEntryData::Account(AccountEntry {
                account_id: id.into(),
                balance,
            }),
            sponsor: None,
        }
    }

    fn balance(seed: u8, seq: u64) -> LedgerEntry {
        LedgerEntry {
            last_modified_ledger_seq: seq,
            data: LedgerEntryData::ClaimableBalance(ClaimableBalanceEntry {
                balance_id: ClaimableBalanceId::V0([seed; 32]),
                claimants: vec![],
                asset: Asset::Native,
                amount: 100,
                ext: ClaimableBalanceEntryExt::V0,
            }),
            sponsor: None,
        }
    }

    #[test]
    fn create_then_remove_cancels_out() {
        let mut c = LedgerChangeCompactor::new();
        c.add(Change::created(balance(1, 10))).unwrap();
        c.add(Change::removed(balance(1, 10))).unwrap();
        assert_eq!(c.size(), 0);
        assert!(c.drain().is_empty());
    }

    #[test]
    fn create_then_update_stays_created() {
        let mut c = LedgerChangeCompactor::new();
        c.add(Change::created(account("GA", 1))).unwrap();
        c.add(Change::updated(account("GA", 1), account("GA", 5))).unwrap();
        let out = c.drain();
        assert_eq!(out.len(), 1);
        assert!(out[0].pre.is_none());
        assert_eq!(out[0].post, Some(account("GA", 5)));
    }

    #[test]
    fn update_then_remove_becomes_removed_with_original_pre() {
        let mut c = LedgerChangeCompactor::new();
        c.add(Change::updated(account("GA", 1), account("GA", 2))).unwrap();
        c.add(Change::removed(account("GA", 2))).unwrap();
        let out = c.drain();
        assert_eq!(out, vec![Change::removed(account("GA", 1))]);
    }

    #[test]
    fn remove_then_create_becomes_update() {
        let mut c = LedgerChangeCompactor::new();
        c.add(Change::removed(balance(3, 1))).unwrap();
        c.add(Change::created(balance(3, 9))).unwrap();
        let out = c.drain();
        assert_eq!(out, vec![Change::updated(balance(3, 1), balance(3, 9))]);
    }

    #[test]
    fn net_noop_update_is_elided() {
        let mut c = LedgerChangeCompactor::new();
        c.add(Change::updated(account("GA", 1), account("GA", 2))).unwrap();
        c.add(Change::updated(account("GA", 2), account("GA", 1))).unwrap();
        assert_eq!(c.size(), 1);
        assert!(c.drain().is_empty());
        assert_eq!(c.size(), 0);
    }

    #[test]
    fn illegal_sequences_are_rejected() {
        let mut c = LedgerChangeCompactor::new();
        c.add(Change::created(balance(1, 1))).unwrap();
        assert!(matches!(
            c.add(Change::created(balance(1, 1))),
            Err(CompactorError::AlreadyExists { .. })
        ));

        c.add(Change::removed(account("GB", 1))).unwrap();
        assert!(matches!(
            c.add(Change::removed(account("GB", 1))),
            Err(CompactorError::RemoveAfterRemove { .. })
        ));
        assert!(matches!(
            c.add(Change::updated(account("GB", 1), account("GB", 2))),
            Err(CompactorError::UpdateAfterRemove { .. })
        ));

        let empty = Change {
            entry_type: LedgerEntryType::Account,
            pre: None,
            post: None,
        };
        assert_eq!(c.add(empty), Err(CompactorError::EmptyChange));
    }

    #[test]
    fn drain_preserves_first_seen_order() {
        let mut c = LedgerChangeCompactor::new();
        for seed in [5u8, 2, 9] {
            c.add(Change::created(balance(seed, 1))).unwrap();
        }
        let seeds: Vec<_> = c
            .drain()
            .into_iter()
            .map(|ch| ch.post.unwrap().key())
            .collect();
        assert_eq!(seeds, vec![
            balance(5, 1).key(),
            balance(2, 1).key(),
            balance(9, 1).key(),
        ]);
    }
}

//! Ledger entry changes as produced by ledger replay.

use serde::{Deserialize, Serialize};

use crate::error::CompactorError;
use crate::xdr::{LedgerEntry, LedgerEntryType, LedgerKey};

/// A before/after pair for one ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    #[serde(rename = "type")]
    pub entry_type: LedgerEntryType,
    #[serde(default)]
    pub pre: Option<LedgerEntry>,
    #[serde(default)]
    pub post: Option<LedgerEntry>,
}

/// The transition a change describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
    Removed,
}

impl Change {
    pub fn created(post: LedgerEntry) -> Self {
        Self {
            entry_type: post.entry_type(),
            pre: None,
            post: Some(post),
        }
    }

    pub fn updated(pre: LedgerEntry, post: LedgerEntry) -> Self {
        Self {
            entry_type: post.entry_type(),
            pre: Some(pre),
            post: Some(post),
        }
    }

    pub fn removed(pre: LedgerEntry) -> Self {
        Self {
            entry_type: pre.entry_type(),
            pre: Some(pre),
            post: None,
        }
    }

    /// Classify the change. An absent/absent change has no kind.
    pub fn kind(&self) -> Result<ChangeKind, CompactorError> {
        match (&self.pre, &self.post) {
            (None, Some(_)) => Ok(ChangeKind::Created),
            (Some(_), Some(_)) => Ok(ChangeKind::Updated),
            (Some(_), None) => Ok(ChangeKind::Removed),
            (None, None) => Err(CompactorError::EmptyChange),
        }
    }

    /// Both snapshots must hold an entry of the declared type.
    pub fn check_type(&self) -> Result<(), CompactorError> {
        for entry in self.pre.iter().chain(self.post.iter()) {
            let actual = entry.entry_type();
            if actual != self.entry_type {
                return Err(CompactorError::TypeMismatch {
                    declared: self.entry_type.to_string(),
                    actual: actual.to_string(),
                });
            }
        }
        Ok(())
    }

    /// The identity of the entry this change touches.
    pub fn key(&self) -> Result<LedgerKey, CompactorError> {
        self.check_type()?;
        match (&self.pre, &self.post) {
            (Some(pre), Some(post)) => {
                let key = pre.key();
                if key != post.key() {
                    return Err(CompactorError::KeyMismatch);
                }
                Ok(key)
            }
            (Some(entry), None) | (None, Some(entry)) => Ok(entry.key()),
            (None, None) => Err(CompactorError::EmptyChange),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xdr::{AccountEntry, LedgerEntryData};

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

    #[test]
    fn kind_follows_snapshots() {
        assert_eq!(Change::created(account("GA", 1)).kind(), Ok(ChangeKind::Created));
        assert_eq!(Change::removed(account("GA", 1)).kind(), Ok(ChangeKind::Removed));
        assert_eq!(
            Change::updated(account("GA", 1), account("GA", 2)).kind(),
            Ok(ChangeKind::Updated)
        );
        let empty = Change {
            entry_type: LedgerEntryType::Account,
            pre: None,
            post: None,
        };
        assert_eq!(empty.kind(), Err(CompactorError::EmptyChange));
    }

    #[test]
    fn key_rejects_mismatched_snapshots() {
        let change = Change::updated(account("GA", 1), account("GB", 1));
        assert_eq!(change.key(), Err(CompactorError::KeyMismatch));
    }

    #[test]
    fn key_rejects_snapshot_of_another_type() {
        let mut change = Change::created(account("GA", 1));
        change.entry_type = LedgerEntryType::ClaimableBalance;
        assert_eq!(
            change.key(),
            Err(CompactorError::TypeMismatch {
                declared: "claimable_balance".into(),
                actual: "account".into(),
            })
        );
    }
}

//! Persistent row shapes for claimable balances and the mapping from
//! decoded ledger entries to them.

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::xdr::{AccountId, Asset, ClaimPredicate, Claimant, LedgerEntry};

/// One claimant as stored on a balance row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimantPart {
    pub destination: AccountId,
    pub predicate: ClaimPredicate,
}

/// A claimable balance as persisted. Inserted once, removed once, never
/// updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimableBalanceRow {
    /// Lowercase hex of the balance id's XDR encoding.
    pub balance_id: String,
    pub claimants: Vec<ClaimantPart>,
    pub asset: Asset,
    pub amount: i64,
    pub sponsor: Option<AccountId>,
    pub last_modified_ledger: u32,
    pub flags: u32,
}

/// Index row letting a destination account find the balances it can claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimantRow {
    pub balance_id: String,
    pub destination: AccountId,
    pub last_modified_ledger: u32,
}

fn claimant_parts(claimants: &[Claimant]) -> Result<Vec<ClaimantPart>, DecodeError> {
    claimants
        .iter()
        .map(|c| match c {
            Claimant::V0(v0) => Ok(ClaimantPart {
                destination: v0.destination.clone(),
                predicate: v0.predicate.clone(),
            }),
            Claimant::Unsupported { version } => {
                Err(DecodeError::UnsupportedClaimantVersion { version: *version })
            }
        })
        .collect()
}

/// Map a claimable-balance ledger entry to its balance row.
pub fn to_balance_row(entry: &LedgerEntry) -> Result<ClaimableBalanceRow, DecodeError> {
    let cb = entry.claimable_balance()?;
    let last_modified_ledger = u32::try_from(entry.last_modified_ledger_seq).map_err(|_| {
        DecodeError::LedgerSequenceOutOfRange {
            seq: entry.last_modified_ledger_seq,
        }
    })?;

    Ok(ClaimableBalanceRow {
        balance_id: cb.balance_id.to_hex(),
        claimants: claimant_parts(&cb.claimants)?,
        asset: cb.asset.clone(),
        amount: cb.amount,
        sponsor: entry.sponsor.clone().filter(|s| !s.is_empty()),
        last_modified_ledger,
        flags: cb.flags(),
    })
}

/// One claimant row per claimant of `row`.
pub fn to_claimant_rows(row: &ClaimableBalanceRow) -> Vec<ClaimantRow> {
    row.claimants
        .iter()
        .map(|c| ClaimantRow {
            balance_id: row.balance_id.clone(),
            destination: c.destination.clone(),
            last_modified_ledger: row.last_modified_ledger,
        })
        .collect()
}

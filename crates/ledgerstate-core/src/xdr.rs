//! Decoded ledger-entry model.
//!
//! These types mirror the XDR shapes the ledger replay produces, already
//! decoded into Rust values. Only claimable balances are modelled in full;
//! the other entry kinds carry just enough to derive their [`LedgerKey`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// A `G…` account address.
pub type AccountId = String;

/// Claimable balance flag: the issuer may claw the balance back.
pub const CLAIMABLE_BALANCE_CLAWBACK_ENABLED_FLAG: u32 = 0x1;

// ─── LedgerEntryType ──────────────────────────────────────────────────────────

/// Discriminant of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntryType {
    Account,
    Trustline,
    Offer,
    Data,
    ClaimableBalance,
}

impl fmt::Display for LedgerEntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Account => write!(f, "account"),
            Self::Trustline => write!(f, "trustline"),
            Self::Offer => write!(f, "offer"),
            Self::Data => write!(f, "data"),
            Self::ClaimableBalance => write!(f, "claimable_balance"),
        }
    }
}

// ─── Asset ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Asset {
    Native,
    CreditAlphanum4 { code: String, issuer: AccountId },
    CreditAlphanum12 { code: String, issuer: AccountId },
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => write!(f, "native"),
            Self::CreditAlphanum4 { code, issuer } | Self::CreditAlphanum12 { code, issuer } => {
                write!(f, "{code}:{issuer}")
            }
        }
    }
}

// ─── Claimable balances ───────────────────────────────────────────────────────

/// Fixed-length binary identifier of a claimable balance.
///
/// Serialized as its canonical hex string (see [`ClaimableBalanceId::to_hex`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ClaimableBalanceId {
    V0([u8; 32]),
}

impl ClaimableBalanceId {
    const V0_DISCRIMINANT: u32 = 0;
    /// 4-byte discriminant + 32-byte hash.
    pub const XDR_LEN: usize = 36;

    /// The XDR encoding: big-endian discriminant followed by the hash.
    pub fn to_xdr_bytes(&self) -> [u8; Self::XDR_LEN] {
        let mut out = [0u8; Self::XDR_LEN];
        match self {
            Self::V0(hash) => {
                out[..4].copy_from_slice(&Self::V0_DISCRIMINANT.to_be_bytes());
                out[4..].copy_from_slice(hash);
            }
        }
        out
    }

    /// Lowercase hex of the XDR encoding. This is the persistent balance id;
    /// every component that needs the id derives it here.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_xdr_bytes())
    }

    /// Parse the hex form produced by [`to_hex`](Self::to_hex).
    pub fn from_hex(s: &str) -> Result<Self, DecodeError> {
        let invalid = |reason: String| DecodeError::InvalidBalanceId {
            id: s.to_string(),
            reason,
        };
        let bytes = hex::decode(s).map_err(|e| invalid(e.to_string()))?;
        if bytes.len() != Self::XDR_LEN {
            return Err(invalid(format!(
                "expected {} bytes, got {}",
                Self::XDR_LEN,
                bytes.len()
            )));
        }
        let discriminant = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if discriminant != Self::V0_DISCRIMINANT {
            return Err(invalid(format!("unknown id type {discriminant}")));
        }
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes[4..]);
        Ok(Self::V0(hash))
    }
}

impl TryFrom<String> for ClaimableBalanceId {
    type Error = DecodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<ClaimableBalanceId> for String {
    fn from(id: ClaimableBalanceId) -> Self {
        id.to_hex()
    }
}

impl fmt::Display for ClaimableBalanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Condition under which a claimant may claim a balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimPredicate {
    Unconditional,
    And(Vec<ClaimPredicate>),
    Or(Vec<ClaimPredicate>),
    Not(Option<Box<ClaimPredicate>>),
    /// Unix seconds.
    BeforeAbsoluteTime(i64),
    /// Seconds after the balance was created.
    BeforeRelativeTime(i64),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimantV0 {
    pub destination: AccountId,
    pub predicate: ClaimPredicate,
}

/// A versioned claimant. Versions other than 0 are carried through
/// decoding but cannot be ingested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Claimant {
    V0(ClaimantV0),
    Unsupported { version: i32 },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimableBalanceEntryExt {
    #[default]
    V0,
    V1 {
        flags: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimableBalanceEntry {
    pub balance_id: ClaimableBalanceId,
    pub claimants: Vec<Claimant>,
    pub asset: Asset,
    /// Stroops.
    pub amount: i64,
    #[serde(default)]
    pub ext: ClaimableBalanceEntryExt,
}

impl ClaimableBalanceEntry {
    /// Claimable-balance flags; zero when the entry has no v1 extension.
    pub fn flags(&self) -> u32 {
        match self.ext {
            ClaimableBalanceEntryExt::V0 => 0,
            ClaimableBalanceEntryExt::V1 { flags } => flags,
        }
    }
}

// ─── Other entry kinds ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountEntry {
    pub account_id: AccountId,
    pub balance: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustLineEntry {
    pub account_id: AccountId,
    pub asset: Asset,
    pub balance: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferEntry {
    pub seller_id: AccountId,
    pub offer_id: i64,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataEntry {
    pub account_id: AccountId,
    pub data_name: String,
    pub data_value: String,
}

// ─── LedgerEntry ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEntryData {
    Account(AccountEntry),
    Trustline(TrustLineEntry),
    Offer(OfferEntry),
    Data(DataEntry),
    ClaimableBalance(ClaimableBalanceEntry),
}

impl LedgerEntryData {
    pub fn entry_type(&self) -> LedgerEntryType {
        match self {
            Self::Account(_) => LedgerEntryType::Account,
            Self::Trustline(_) => LedgerEntryType::Trustline,
            Self::Offer(_) => LedgerEntryType::Offer,
            Self::Data(_) => LedgerEntryType::Data,
            Self::ClaimableBalance(_) => LedgerEntryType::ClaimableBalance,
        }
    }
}

/// A versioned record in the ledger's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub last_modified_ledger_seq: u64,
    pub data: LedgerEntryData,
    /// Account sponsoring the entry's reserve, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sponsor: Option<AccountId>,
}

impl LedgerEntry {
    pub fn entry_type(&self) -> LedgerEntryType {
        self.data.entry_type()
    }

    /// The stable identity of this entry.
    pub fn key(&self) -> LedgerKey {
        match &self.data {
            LedgerEntryData::Account(a) => LedgerKey::Account {
                account_id: a.account_id.clone(),
            },
            LedgerEntryData::Trustline(t) => LedgerKey::Trustline {
                account_id: t.account_id.clone(),
                asset: t.asset.clone(),
            },
            LedgerEntryData::Offer(o) => LedgerKey::Offer {
                seller_id: o.seller_id.clone(),
                offer_id: o.offer_id,
            },
            LedgerEntryData::Data(d) => LedgerKey::Data {
                account_id: d.account_id.clone(),
                data_name: d.data_name.clone(),
            },
            LedgerEntryData::ClaimableBalance(cb) => LedgerKey::ClaimableBalance {
                balance_id: cb.balance_id,
            },
        }
    }

    /// The claimable-balance body of this entry.
    pub fn claimable_balance(&self) -> Result<&ClaimableBalanceEntry, DecodeError> {
        match &self.data {
            LedgerEntryData::ClaimableBalance(cb) => Ok(cb),
            other => Err(DecodeError::UnexpectedEntryType {
                expected: LedgerEntryType::ClaimableBalance.to_string(),
                actual: other.entry_type().to_string(),
            }),
        }
    }
}

/// Stable identity of a ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LedgerKey {
    Account { account_id: AccountId },
    Trustline { account_id: AccountId, asset: Asset },
    Offer { seller_id: AccountId, offer_id: i64 },
    Data { account_id: AccountId, data_name: String },
    ClaimableBalance { balance_id: ClaimableBalanceId },
}

impl fmt::Display for LedgerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Account { account_id } => write!(f, "account:{account_id}"),
            Self::Trustline { account_id, asset } => write!(f, "trustline:{account_id}:{asset}"),
            Self::Offer { seller_id, offer_id } => write!(f, "offer:{seller_id}:{offer_id}"),
            Self::Data { account_id, data_name } => write!(f, "data:{account_id}:{data_name}"),
            Self::ClaimableBalance { balance_id } => write!(f, "claimable_balance:{balance_id}"),
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

//! Error types for the ingestion pipeline.

use thiserror::Error;

/// Errors raised while decoding a ledger entry into persistent rows.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unsupported claimant version {version}")]
    UnsupportedClaimantVersion { version: i32 },

    #[error("invalid claimable balance id '{id}': {reason}")]
    InvalidBalanceId { id: String, reason: String },

    #[error("ledger sequence {seq} does not fit in 32 bits")]
    LedgerSequenceOutOfRange { seq: u64 },

    #[error("expected a {expected} entry, got {actual}")]
    UnexpectedEntryType { expected: String, actual: String },
}

/// Errors raised by a change compactor when a change cannot be folded in.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompactorError {
    #[error("change has neither a pre nor a post snapshot")]
    EmptyChange,

    #[error("pre and post snapshots have different keys")]
    KeyMismatch,

    #[error("change is typed {declared} but carries a {actual} entry")]
    TypeMismatch { declared: String, actual: String },

    #[error("can't create an entry that already exists (key = {key})")]
    AlreadyExists { key: String },

    #[error("can't update an entry that was previously removed (key = {key})")]
    UpdateAfterRemove { key: String },

    #[error("can't remove an entry that was already removed (key = {key})")]
    RemoveAfterRemove { key: String },
}

/// Errors returned by a store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("timed out after {ms}ms")]
    Timeout { ms: u64 },
}

/// Errors that can occur while ingesting ledger changes.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid change entry for a claimable balance was detected: {reason}")]
    InvalidChange { reason: String },

    #[error("error decoding ledger entry: {0}")]
    Decode(#[from] DecodeError),

    #[error("error adding to ledger cache: {0}")]
    Compactor(#[from] CompactorError),

    #[error("{context}: {source}")]
    Store {
        context: &'static str,
        #[source]
        source: StoreError,
    },

    /// The store's contents diverged from the ledger's view of history.
    #[error("state error: {0}")]
    State(String),

    /// A change failed classification and the rows classified before it
    /// could not be flushed either.
    #[error("{cause}; flushing rows classified before the failure also failed: {flush}")]
    FlushAfterFailure {
        #[source]
        cause: Box<IngestError>,
        flush: Box<IngestError>,
    },

    #[error("error in commit of '{processor}': {source}")]
    Commit {
        processor: &'static str,
        #[source]
        source: Box<IngestError>,
    },
}

impl IngestError {
    pub(crate) fn store(context: &'static str, source: StoreError) -> Self {
        Self::Store { context, source }
    }

    /// Returns `true` for a consistency fault. Callers must halt, not retry.
    pub fn is_state_error(&self) -> bool {
        match self {
            Self::State(_) => true,
            Self::Commit { source, .. } => source.is_state_error(),
            Self::FlushAfterFailure { cause, .. } => cause.is_state_error(),
            _ => false,
        }
    }

    /// Returns `true` if re-ingesting the same ledger range may succeed.
    ///
    /// A failed flush behind an invalid change is not retriable: the same
    /// change fails again.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Store { .. } => true,
            Self::Commit { source, .. } => source.is_retriable(),
            Self::FlushAfterFailure { cause, .. } => cause.is_retriable(),
            _ => false,
        }
    }
}

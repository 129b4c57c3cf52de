//! ledgerstate-core — turns a replayed ledger change stream into bulk
//! writes against a claimable-balance store.
//!
//! # Architecture
//!
//! ```text
//! Change stream → ClaimableBalancesChangeProcessor
//!                     ├── ChangeCompactor     (one net change per entry per window)
//!                     ├── rows                (ledger entry → balance + claimant rows)
//!                     ├── BatchInsertBuilder  (one bulk insert per table per commit)
//!                     └── ClaimableBalanceStore (memory / SQLite / Postgres)
//! ```

pub mod change;
pub mod compactor;
pub mod config;
pub mod error;
pub mod group;
pub mod processor;
pub mod rows;
pub mod store;
pub mod xdr;

pub use change::{Change, ChangeKind};
pub use compactor::{ChangeCompactor, LedgerChangeCompactor};
pub use config::{ProcessorBuilder, ProcessorConfig, DEFAULT_MAX_BATCH_SIZE};
pub use error::{CompactorError, DecodeError, IngestError, StoreError};
pub use group::ProcessorGroup;
pub use processor::{ChangeProcessor, ClaimableBalancesChangeProcessor};
pub use rows::{ClaimableBalanceRow, ClaimantPart, ClaimantRow};
pub use store::{BatchInsertBuilder, ClaimableBalanceStore};
pub use xdr::{LedgerEntry, LedgerEntryType, LedgerKey};

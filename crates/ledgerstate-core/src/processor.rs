//! Change processors — turn compacted ledger changes into bulk store writes.
//!
//! # Commit protocol (claimable balances)
//!
//! ```text
//! drain compactor
//!   ├── created  → balance row + claimant rows → insert builders
//!   ├── removed  → hex balance id → delete list
//!   └── other    → InvalidChange (rows classified so far are still inserted;
//!                  a failed flush is chained as FlushAfterFailure)
//! insert claimants → insert balances
//! delete balances  → affected rows must equal ids requested (else State)
//! delete claimants
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::change::Change;
use crate::compactor::{ChangeCompactor, LedgerChangeCompactor};
use crate::config::ProcessorConfig;
use crate::error::{IngestError, StoreError};
use crate::rows::{to_balance_row, to_claimant_rows};
use crate::store::{ClaimableBalanceBatchInsertBuilder, ClaimableBalanceStore, ClaimantBatchInsertBuilder};
use crate::xdr::LedgerEntryType;

/// A consumer of the ledger change stream.
///
/// Callers feed every change of a ledger range through
/// [`process_change`](ChangeProcessor::process_change) in stream order and
/// finish with [`commit`](ChangeProcessor::commit).
#[async_trait]
pub trait ChangeProcessor: Send {
    /// Static identifier used in diagnostics.
    fn name(&self) -> &'static str;

    async fn process_change(&mut self, change: Change) -> Result<(), IngestError>;

    async fn commit(&mut self) -> Result<(), IngestError>;
}

/// Builds a fresh compactor for every processing window.
pub type CompactorFactory = Box<dyn Fn() -> Box<dyn ChangeCompactor> + Send + Sync>;

/// Everything buffered for one processing window.
struct Window {
    cache: Box<dyn ChangeCompactor>,
    claimants: ClaimantBatchInsertBuilder,
    balances: ClaimableBalanceBatchInsertBuilder,
}

impl Window {
    fn open(factory: &CompactorFactory) -> Self {
        Self {
            cache: factory(),
            claimants: ClaimantBatchInsertBuilder::new(),
            balances: ClaimableBalanceBatchInsertBuilder::new(),
        }
    }
}

/// Ingests claimable-balance changes.
///
/// Claimable balances are created once and removed once; any net change
/// that is not a pure creation or a pure removal fails the commit.
pub struct ClaimableBalancesChangeProcessor {
    store: Arc<dyn ClaimableBalanceStore>,
    config: ProcessorConfig,
    new_compactor: CompactorFactory,
    window: Window,
}

impl ClaimableBalancesChangeProcessor {
    pub const NAME: &'static str = "processors.ClaimableBalancesChangeProcessor";

    pub fn new(store: Arc<dyn ClaimableBalanceStore>) -> Self {
        Self::with_config(store, ProcessorConfig::default())
    }

    pub fn with_config(store: Arc<dyn ClaimableBalanceStore>, config: ProcessorConfig) -> Self {
        Self::with_compactor(
            store,
            config,
            Box::new(|| Box::new(LedgerChangeCompactor::new()) as Box<dyn ChangeCompactor>),
        )
    }

    /// Use a custom compactor implementation.
    pub fn with_compactor(
        store: Arc<dyn ClaimableBalanceStore>,
        config: ProcessorConfig,
        new_compactor: CompactorFactory,
    ) -> Self {
        let window = Window::open(&new_compactor);
        Self {
            store,
            config,
            new_compactor,
            window,
        }
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Entries currently buffered in the compactor.
    pub fn pending_changes(&self) -> usize {
        self.window.cache.size()
    }

    /// Rows currently buffered in the (balance, claimant) insert builders.
    pub fn pending_rows(&self) -> (usize, usize) {
        (self.window.balances.len(), self.window.claimants.len())
    }

    /// Add a change to the current window. Changes for other entry types are
    /// ignored once their snapshots are checked against the declared type. Commits automatically once the window exceeds
    /// `max_batch_size` entries.
    pub async fn process_change(&mut self, change: Change) -> Result<(), IngestError> {
        change.check_type()?;
        if change.entry_type != LedgerEntryType::ClaimableBalance {
            return Ok(());
        }

        self.window.cache.add(change)?;

        if self.window.cache.size() > self.config.max_batch_size {
            self.commit().await.map_err(|e| IngestError::Commit {
                processor: Self::NAME,
                source: Box::new(e),
            })?;
        }
        Ok(())
    }

    /// Write the current window to the store.
    ///
    /// The window is swapped for a fresh one before the first store call, so
    /// every exit path (success, error, or the future being dropped) leaves
    /// the processor empty. Store writes already issued are not undone.
    pub async fn commit(&mut self) -> Result<(), IngestError> {
        let mut window = std::mem::replace(&mut self.window, Window::open(&self.new_compactor));
        let changes = window.cache.drain();
        let total = changes.len();
        let mut ids_to_delete: Vec<String> = Vec::new();

        if let Err(err) = classify(changes, &mut window, &mut ids_to_delete) {
            // Rows classified before the failure still go out.
            return match self.flush_inserts(&mut window).await {
                Ok(()) => Err(err),
                Err(flush) => Err(IngestError::FlushAfterFailure {
                    cause: Box::new(err),
                    flush: Box::new(flush),
                }),
            };
        }

        let inserted = window.balances.len();
        self.flush_inserts(&mut window).await?;

        if !ids_to_delete.is_empty() {
            let timeout = self.config.store_timeout();
            let count = guarded(
                timeout,
                "error executing removal",
                self.store.remove_claimable_balances(&ids_to_delete),
            )
            .await?;

            if count != ids_to_delete.len() as u64 {
                return Err(IngestError::State(format!(
                    "{} rows affected when deleting {} claimable balances",
                    count,
                    ids_to_delete.len()
                )));
            }

            guarded(
                timeout,
                "error executing removal of claimants",
                self.store.remove_claimants(&ids_to_delete),
            )
            .await?;
        }

        debug!(
            processor = Self::NAME,
            changes = total,
            inserted,
            removed = ids_to_delete.len(),
            "commit complete"
        );
        Ok(())
    }

    /// Claimants first, then balances.
    async fn flush_inserts(&self, window: &mut Window) -> Result<(), IngestError> {
        let timeout = self.config.store_timeout();
        guarded(
            timeout,
            "error executing ClaimableBalanceClaimantBatchInsertBuilder",
            window.claimants.exec(self.store.as_ref()),
        )
        .await?;
        guarded(
            timeout,
            "error executing ClaimableBalanceBatchInsertBuilder",
            window.balances.exec(self.store.as_ref()),
        )
        .await
    }
}

/// Route each net change to the insert builders or the delete list.
fn classify(
    changes: Vec<Change>,
    window: &mut Window,
    ids_to_delete: &mut Vec<String>,
) -> Result<(), IngestError> {
    for change in changes {
        match (change.pre, change.post) {
            (None, Some(post)) => {
                let row = to_balance_row(&post)?;
                for claimant in to_claimant_rows(&row) {
                    window.claimants.add(claimant);
                }
                window.balances.add(row);
            }
            (Some(pre), None) => {
                let balance = pre.claimable_balance()?;
                ids_to_delete.push(balance.balance_id.to_hex());
            }
            (Some(pre), Some(_)) => {
                return Err(IngestError::InvalidChange {
                    reason: format!("{} was updated; claimable balances can only be created or removed", pre.key()),
                });
            }
            (None, None) => {
                return Err(IngestError::InvalidChange {
                    reason: "change has neither a pre nor a post snapshot".into(),
                });
            }
        }
    }
    Ok(())
}

/// Run one store call under the optional deadline, tagging failures with
/// the step that failed.
async fn guarded<T, F>(timeout: Option<Duration>, context: &'static str, call: F) -> Result<T, IngestError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    let result = match timeout {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .map_err(|_| StoreError::Timeout {
                ms: limit.as_millis() as u64,
            })
            .and_then(|r| r),
        None => call.await,
    };
    result.map_err(|e| IngestError::store(context, e))
}

#[async_trait]
impl ChangeProcessor for ClaimableBalancesChangeProcessor {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn process_change(&mut self, change: Change) -> Result<(), IngestError> {
        ClaimableBalancesChangeProcessor::process_change(self, change).await
    }

    async fn commit(&mut self) -> Result<(), IngestError> {
        ClaimableBalancesChangeProcessor::commit(self).await
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

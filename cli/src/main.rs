//! ledgerstate CLI — replay ledger change streams into a claimable-balance
//! store.
//!
//! Usage:
//! ```bash
//! ledgerstate replay --changes ledger-50000.jsonl
//! ledgerstate replay --changes ledger-50000.jsonl --sqlite ./ledgerstate.db --batch-size 5000
//! ledgerstate info
//! ```

mod logging;

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use ledgerstate_core::{
    Change, ClaimableBalanceStore, ClaimableBalancesChangeProcessor, IngestError, LedgerEntryType,
    ProcessorConfig, DEFAULT_MAX_BATCH_SIZE,
};
use ledgerstate_storage::InMemoryStore;

use crate::logging::{init_tracing, LogConfig};

#[derive(Parser)]
#[command(
    name = "ledgerstate",
    about = "Replay ledger changes into a claimable-balance store",
    version
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON logs
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Feed a JSON-lines change stream through the claimable-balance processor
    Replay {
        /// File with one JSON-encoded change per line
        #[arg(long)]
        changes: PathBuf,
        /// Write to this SQLite database instead of memory (feature `sqlite`)
        #[arg(long)]
        sqlite: Option<String>,
        /// Commit automatically above this many buffered entries
        #[arg(long, default_value_t = DEFAULT_MAX_BATCH_SIZE)]
        batch_size: usize,
        /// Deadline for each store call, in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Show processor defaults
    Info,
}

#[derive(Debug, Default)]
struct ReplayStats {
    lines: u64,
    claimable_balance_changes: u64,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&LogConfig {
        level: if cli.verbose { "debug" } else { "info" }.into(),
        json: cli.json_logs,
        ..Default::default()
    });

    if let Err(err) = run(cli.command).await {
        let halt = err
            .downcast_ref::<IngestError>()
            .is_some_and(IngestError::is_state_error);
        if halt {
            eprintln!("state error: ledger and store have diverged; halt ingestion");
        }
        eprintln!("error: {err:#}");
        process::exit(if halt { 2 } else { 1 });
    }
}

async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Info => {
            cmd_info();
            Ok(())
        }
        Commands::Replay {
            changes,
            sqlite,
            batch_size,
            timeout_ms,
        } => {
            let config = ProcessorConfig {
                max_batch_size: batch_size,
                store_timeout_ms: timeout_ms,
            };
            cmd_replay(&changes, sqlite.as_deref(), config).await
        }
    }
}

fn cmd_info() {
    let config = ProcessorConfig::default();
    println!("ledgerstate v{}", env!("CARGO_PKG_VERSION"));
    println!("  Processor: {}", ClaimableBalancesChangeProcessor::NAME);
    println!("  Default max batch size: {} entries", config.max_batch_size);
    println!("  Default store timeout: none");
    println!("  Storage backends: memory, SQLite (feature: sqlite), Postgres (feature: postgres)");
}

async fn cmd_replay(path: &Path, sqlite: Option<&str>, config: ProcessorConfig) -> Result<()> {
    match sqlite {
        None => {
            let store = Arc::new(InMemoryStore::new());
            let stats = replay(path, store.clone(), config).await?;
            println!(
                "replayed {} lines ({} claimable balance changes): {} balances, {} claimants in memory",
                stats.lines,
                stats.claimable_balance_changes,
                store.balance_count(),
                store.claimant_count()
            );
            Ok(())
        }
        Some(db) => replay_sqlite(path, db, config).await,
    }
}

#[cfg(feature = "sqlite")]
async fn replay_sqlite(path: &Path, db: &str, config: ProcessorConfig) -> Result<()> {
    use ledgerstate_storage::sqlite::SqliteStore;

    let store = Arc::new(
        SqliteStore::open(db)
            .await
            .with_context(|| format!("opening {db}"))?,
    );
    let stats = replay(path, store.clone(), config).await?;
    println!(
        "replayed {} lines ({} claimable balance changes): {} balances, {} claimants in {db}",
        stats.lines,
        stats.claimable_balance_changes,
        store.balance_count().await?,
        store.claimant_count().await?
    );
    Ok(())
}

#[cfg(not(feature = "sqlite"))]
async fn replay_sqlite(_path: &Path, _db: &str, _config: ProcessorConfig) -> Result<()> {
    anyhow::bail!("this build has no SQLite support; rebuild with `--features sqlite`")
}

async fn replay(
    path: &Path,
    store: Arc<dyn ClaimableBalanceStore>,
    config: ProcessorConfig,
) -> Result<ReplayStats> {
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("opening {}", path.display()))?;
    let mut lines = BufReader::new(file).lines();
    let mut processor = ClaimableBalancesChangeProcessor::with_config(store, config);
    let mut stats = ReplayStats::default();

    while let Some(line) = lines.next_line().await? {
        stats.lines += 1;
        if line.trim().is_empty() {
            continue;
        }
        let change: Change = serde_json::from_str(&line)
            .with_context(|| format!("line {}: invalid change", stats.lines))?;
        if change.entry_type == LedgerEntryType::ClaimableBalance {
            stats.claimable_balance_changes += 1;
        }
        processor
            .process_change(change)
            .await
            .with_context(|| format!("line {}", stats.lines))?;
    }

    processor.commit().await.context("final commit")?;
    info!(
        lines = stats.lines,
        changes = stats.claimable_balance_changes,
        "replay complete"
    );
    Ok(stats)
}

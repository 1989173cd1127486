//! Main ledger orchestration layer
//!
//! This module ties together the engine, storage, and actor components
//! into the API callers use: `record`, `balance_of`, `count`, `read`.
//!
//! # Example
//!
//! ```no_run
//! use ledger_engine::{AccountId, Amount, Config, Ledger};
//!
//! #[tokio::main]
//! async fn main() -> ledger_engine::Result<()> {
//!     let ledger = Ledger::open(Config::in_memory()).await?;
//!     let alice: AccountId = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse()?;
//!
//!     ledger.record(alice, "Initial capital", Amount::new(5000), true).await?;
//!     ledger.record(alice, "Supplier payment", Amount::new(200), false).await?;
//!     assert_eq!(ledger.balance_of(&alice), Amount::new(4800));
//!
//!     ledger.shutdown().await
//! }
//! ```

use crate::{
    actor::{spawn_ledger_actor, LedgerHandle},
    engine::LedgerEngine,
    log::EntryLog,
    metrics::Metrics,
    types::{AccountId, Amount, Entry},
    Config, Error, Result, Storage,
};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Main ledger interface
#[derive(Debug)]
pub struct Ledger {
    /// Actor handle for writes
    handle: LedgerHandle,

    /// Shared state for reads
    engine: Arc<RwLock<LedgerEngine>>,

    /// Metrics
    metrics: Metrics,

    /// Writer task
    actor_task: JoinHandle<()>,

    /// Configuration
    config: Config,
}

impl Ledger {
    /// Open ledger with configuration
    ///
    /// With persistence enabled the stored log is replayed and checked against
    /// the stored balance table before any new call is accepted.
    pub async fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let (engine, storage) = if config.persistence.enabled {
            let storage = Storage::open(&config)?;
            let engine = recover(&storage)?;
            (engine, Some(storage))
        } else {
            (LedgerEngine::new(), None)
        };

        let metrics = Metrics::new()?;
        metrics.accounts.set(engine.accounts() as i64);

        tracing::info!(
            service = %config.service_name,
            version = %config.service_version,
            entries = engine.count(),
            accounts = engine.accounts(),
            durable = config.persistence.enabled,
            "Ledger opened"
        );

        let engine = Arc::new(RwLock::new(engine));
        let (handle, actor_task) = spawn_ledger_actor(
            engine.clone(),
            storage,
            metrics.clone(),
            config.actor.mailbox_capacity,
        );

        Ok(Self {
            handle,
            engine,
            metrics,
            actor_task,
            config,
        })
    }

    /// Record a credit or debit for `account`, returning the entry index
    pub async fn record(
        &self,
        account: AccountId,
        description: impl Into<String>,
        amount: Amount,
        is_credit: bool,
    ) -> Result<u64> {
        self.handle
            .record(account, description, amount, is_credit)
            .await
    }

    /// Balance of an account (zero if never referenced)
    pub fn balance_of(&self, account: &AccountId) -> Amount {
        self.engine.read().balance_of(account)
    }

    /// Number of successful `record` calls
    pub fn count(&self) -> u64 {
        self.engine.read().count()
    }

    /// Entry at `index`
    pub fn read(&self, index: u64) -> Result<Entry> {
        self.engine.read().read(index).cloned()
    }

    /// Up to `limit` entries, newest first
    pub fn recent(&self, limit: usize) -> Vec<Entry> {
        self.history().iter().rev().take(limit).cloned().collect()
    }

    /// All entries of one account, in log order
    pub fn entries_for(&self, account: &AccountId) -> Vec<Entry> {
        self.history()
            .iter()
            .filter(|e| &e.account == account)
            .cloned()
            .collect()
    }

    /// Number of accounts that have at least one entry
    pub fn accounts(&self) -> usize {
        self.engine.read().accounts()
    }

    /// Frozen view of the log as of the last commit
    ///
    /// The guard is held only to clone two pointers; walking the view never
    /// holds up the writer.
    pub fn history(&self) -> EntryLog {
        self.engine.read().log().clone()
    }

    /// Cloneable write handle for concurrent callers
    pub fn handle(&self) -> LedgerHandle {
        self.handle.clone()
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Configuration the ledger was opened with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Flush storage to disk
    pub async fn flush(&self) -> Result<()> {
        self.handle.flush().await
    }

    /// Shutdown ledger
    ///
    /// Calls queued before this one are processed first. Returns once the
    /// writer has stopped and released storage.
    pub async fn shutdown(self) -> Result<()> {
        self.handle.shutdown().await?;
        self.actor_task
            .await
            .map_err(|e| Error::Concurrency(format!("Actor task failed: {}", e)))?;
        tracing::info!("Ledger shut down");
        Ok(())
    }
}

/// Rebuild the engine from storage and cross-check the balance table
fn recover(storage: &Storage) -> Result<LedgerEngine> {
    let entries = storage.load_entries()?;
    let engine = LedgerEngine::replay(entries)?;

    let stored = storage.load_balances()?;
    if &stored != engine.balances() {
        return Err(Error::InvariantViolation(format!(
            "stored balances ({} accounts) disagree with replayed log ({} accounts)",
            stored.len(),
            engine.accounts()
        )));
    }

    Ok(engine)
}

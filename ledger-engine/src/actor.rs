//! Actor-based concurrency for the ledger
//!
//! Every `record` call goes through one writer task, so calls are totally
//! ordered and each one is validated against the state left by all the calls
//! before it:
//! - One logical writer eliminates lost updates and double application
//! - The durable append happens outside the engine lock
//! - Bounded mailbox gives backpressure to callers
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │          Callers (CLI, tasks, RPC adapters)           │
//! └──────────────┬─────────────────────────┬─────────────┘
//!                │ record                  │ balance_of / count / read
//!                ▼                         │
//! ┌──────────────────────────────┐         │
//! │     LedgerHandle (Clone)     │         │
//! └──────────────┬───────────────┘         │
//!                │ mpsc::channel (bounded) │
//!                ▼                         ▼
//! ┌──────────────────────────────┐   ┌───────────────────────┐
//! │   LedgerActor (single task)  │   │ RwLock<LedgerEngine>  │
//! │  1. prepare   (read lock)    │──▶│  read guards only     │
//! │  2. Storage::append_entry    │   │  for callers          │
//! │  3. commit    (write lock)   │──▶│                       │
//! └──────────────────────────────┘   └───────────────────────┘
//! ```

use crate::engine::LedgerEngine;
use crate::metrics::Metrics;
use crate::types::{AccountId, Amount};
use crate::{Error, Result, Storage};
use chrono::Utc;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Message sent to the ledger actor
#[derive(Debug)]
pub enum LedgerMessage {
    /// Record a credit or debit
    Record {
        /// Account to credit or debit
        account: AccountId,
        /// Caller-supplied description
        description: String,
        /// Amount in smallest units
        amount: Amount,
        /// Credit (true) or debit (false)
        is_credit: bool,
        /// Index of the new entry, or why it was rejected
        response: oneshot::Sender<Result<u64>>,
    },

    /// Flush storage to disk
    Flush {
        #[allow(missing_docs)]
        response: oneshot::Sender<Result<()>>,
    },

    /// Close storage and stop, after everything queued before this message
    Shutdown {
        #[allow(missing_docs)]
        response: oneshot::Sender<Result<()>>,
    },
}

/// Actor that owns all writes to the ledger
#[derive(Debug)]
pub struct LedgerActor {
    /// Shared state; readers hold read guards, only this actor writes
    engine: Arc<RwLock<LedgerEngine>>,

    /// Durable log (None when running in memory)
    storage: Option<Storage>,

    /// Metrics
    metrics: Metrics,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<LedgerMessage>,
}

impl LedgerActor {
    /// Create new actor
    pub fn new(
        engine: Arc<RwLock<LedgerEngine>>,
        storage: Option<Storage>,
        metrics: Metrics,
        mailbox: mpsc::Receiver<LedgerMessage>,
    ) -> Self {
        Self {
            engine,
            storage,
            metrics,
            mailbox,
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                LedgerMessage::Record {
                    account,
                    description,
                    amount,
                    is_credit,
                    response,
                } => {
                    let result = self.handle_record(account, description, amount, is_credit);
                    let _ = response.send(result);
                }

                LedgerMessage::Flush { response } => {
                    let _ = response.send(self.flush());
                }

                LedgerMessage::Shutdown { response } => {
                    let result = match self.storage.take() {
                        Some(storage) => storage.close(),
                        None => Ok(()),
                    };
                    if let Err(ref e) = result {
                        tracing::error!("Error closing storage on shutdown: {}", e);
                    }
                    let _ = response.send(result);
                    break;
                }
            }
        }

        tracing::debug!("Ledger actor stopped");
    }

    fn handle_record(
        &mut self,
        account: AccountId,
        description: String,
        amount: Amount,
        is_credit: bool,
    ) -> Result<u64> {
        let started = Instant::now();
        let result = self.apply_record(account, description, amount, is_credit);
        self.metrics
            .observe_record_duration(started.elapsed().as_secs_f64());

        match &result {
            Ok(index) => {
                tracing::debug!(index, account = %account, is_credit, "Entry recorded");
            }
            Err(e) if e.is_business_rule() => {
                self.metrics.record_rejection(e.kind());
                tracing::debug!(account = %account, is_credit, reason = e.kind(), "Record rejected");
            }
            Err(e) => {
                self.metrics.record_rejection(e.kind());
                tracing::error!(account = %account, "Record failed: {}", e);
            }
        }

        result
    }

    /// prepare -> persist -> commit
    ///
    /// Nothing is visible to readers until `commit`; a failure in either of
    /// the first two steps leaves memory and disk untouched.
    fn apply_record(
        &mut self,
        account: AccountId,
        description: String,
        amount: Amount,
        is_credit: bool,
    ) -> Result<u64> {
        let prepared = self
            .engine
            .read()
            .prepare(account, description, amount, is_credit, Utc::now())?;

        if let Some(storage) = &self.storage {
            storage.append_entry(&prepared.entry, prepared.new_balance)?;
        }

        let mut engine = self.engine.write();
        let index = engine.commit(prepared)?;
        self.metrics.record_entry_appended(engine.accounts());

        Ok(index)
    }

    fn flush(&self) -> Result<()> {
        match &self.storage {
            Some(storage) => storage.flush(),
            None => Ok(()),
        }
    }
}

/// Handle for sending messages to the actor
#[derive(Clone, Debug)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerMessage>,
}

impl LedgerHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<LedgerMessage>) -> Self {
        Self { sender }
    }

    /// Record a credit or debit
    pub async fn record(
        &self,
        account: AccountId,
        description: impl Into<String>,
        amount: Amount,
        is_credit: bool,
    ) -> Result<u64> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(LedgerMessage::Record {
                account,
                description: description.into(),
                amount,
                is_credit,
                response: tx,
            })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Flush storage to disk
    pub async fn flush(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(LedgerMessage::Flush { response: tx })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(LedgerMessage::Shutdown { response: tx })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }
}

/// Spawn the ledger actor
pub fn spawn_ledger_actor(
    engine: Arc<RwLock<LedgerEngine>>,
    storage: Option<Storage>,
    metrics: Metrics,
    mailbox_capacity: usize,
) -> (LedgerHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(mailbox_capacity); // Bounded channel for backpressure
    let actor = LedgerActor::new(engine, storage, metrics, rx);

    let task = tokio::spawn(async move {
        actor.run().await;
    });

    (LedgerHandle::new(tx), task)
}

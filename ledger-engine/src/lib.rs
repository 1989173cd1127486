//! Ledger Engine
//!
//! Per-account credit/debit ledger with running balances and an append-only,
//! indexable entry log.
//!
//! # Architecture
//!
//! - **State machine**: [`LedgerEngine`] owns balances and the log
//! - **Single Writer**: one actor task serialises every `record` call
//! - **Write-ahead log**: optional RocksDB storage, replayed on open
//! - **Snapshot reads**: readers see whole committed states only
//!
//! # Invariants
//!
//! - Non-negative balances: a debit larger than the balance is rejected
//! - Balance == Σ(credits) - Σ(debits) for every account
//! - Append-only: entries are never modified or deleted
//! - Dense indices: `count()` equals the number of successful `record` calls

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod types;
pub mod engine;
pub mod log;
pub mod storage;
pub mod error;
pub mod actor;
pub mod ledger;
pub mod config;
pub mod metrics;

// Re-exports
pub use error::{Error, Result};
pub use types::{AccountId, Amount, Entry};
pub use engine::{LedgerEngine, PreparedEntry};
pub use log::EntryLog;
pub use storage::Storage;
pub use ledger::Ledger;
pub use config::Config;
pub use metrics::Metrics;

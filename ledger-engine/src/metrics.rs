//! Metrics collection for observability
//!
//! Prometheus metrics for the ledger service. Each ledger owns its own
//! registry so several ledgers (or tests) can live in one process.
//!
//! # Metrics
//!
//! - `ledger_entries_total` - Entries appended
//! - `ledger_rejections_total{reason}` - Failed `record` calls by error kind
//! - `ledger_record_duration_seconds` - Histogram of `record` latencies in the writer
//! - `ledger_accounts` - Accounts with at least one entry

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Entries appended
    pub entries_total: IntCounter,

    /// Rejected record calls, labelled by reason
    pub rejections_total: IntCounterVec,

    /// Record duration histogram
    pub record_duration: Histogram,

    /// Known accounts
    pub accounts: IntGauge,

    registry: Arc<Registry>,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("entries_total", &self.entries_total.get())
            .field("accounts", &self.accounts.get())
            .finish_non_exhaustive()
    }
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let entries_total =
            IntCounter::new("ledger_entries_total", "Total number of entries appended")?;
        registry.register(Box::new(entries_total.clone()))?;

        let rejections_total = IntCounterVec::new(
            Opts::new("ledger_rejections_total", "Rejected record calls"),
            &["reason"],
        )?;
        registry.register(Box::new(rejections_total.clone()))?;

        let record_duration = Histogram::with_opts(
            HistogramOpts::new(
                "ledger_record_duration_seconds",
                "Histogram of record latencies",
            )
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.010, 0.050, 0.100, 0.500, 1.0]),
        )?;
        registry.register(Box::new(record_duration.clone()))?;

        let accounts = IntGauge::new("ledger_accounts", "Accounts with at least one entry")?;
        registry.register(Box::new(accounts.clone()))?;

        Ok(Self {
            entries_total,
            rejections_total,
            record_duration,
            accounts,
            registry,
        })
    }

    /// Record a successful append
    pub fn record_entry_appended(&self, accounts: usize) {
        self.entries_total.inc();
        self.accounts.set(accounts as i64);
    }

    /// Record a rejected call
    pub fn record_rejection(&self, reason: &str) {
        self.rejections_total.with_label_values(&[reason]).inc();
    }

    /// Record how long the writer spent on one call
    pub fn observe_record_duration(&self, duration_seconds: f64) {
        self.record_duration.observe(duration_seconds);
    }

    /// Text exposition format
    pub fn gather_text(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

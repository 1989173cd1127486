//! Ledger state machine
//!
//! `LedgerEngine` owns the balance table and the append-only entry log. Every
//! mutation goes through [`LedgerEngine::record`] (or its two halves,
//! [`LedgerEngine::prepare`] and [`LedgerEngine::commit`]), which validates
//! against the current state before touching anything.
//!
//! # Invariants
//!
//! - `balance_of(a) >= 0` for every account (enforced by the unsigned type
//!   plus the debit check)
//! - `balance_of(a) == Σ credits(a) - Σ debits(a)` over the log
//! - `count()` equals the number of successful `record` calls
//! - `read(i)` never changes once it has succeeded
//!
//! The engine does no I/O and no logging; see [`crate::Ledger`] for the
//! concurrent, durable service built on top of it.

use crate::{
    log::EntryLog,
    types::{AccountId, Amount, Entry},
    Error, Result,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// A validated transition that has not been applied yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedEntry {
    /// The entry to append
    pub entry: Entry,

    /// Balance of `entry.account` after the entry is applied
    pub new_balance: Amount,
}

/// Balance table plus append-only log
#[derive(Debug, Default, Clone)]
pub struct LedgerEngine {
    balances: HashMap<AccountId, Amount>,
    log: EntryLog,
}

impl LedgerEngine {
    /// Empty ledger: no entries, every balance zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a credit or debit, returning the new entry's index
    pub fn record(
        &mut self,
        account: AccountId,
        description: impl Into<String>,
        amount: Amount,
        is_credit: bool,
    ) -> Result<u64> {
        let prepared = self.prepare(account, description, amount, is_credit, Utc::now())?;
        self.commit(prepared)
    }

    /// Validate a transition against the current state without mutating it
    pub fn prepare(
        &self,
        account: AccountId,
        description: impl Into<String>,
        amount: Amount,
        is_credit: bool,
        timestamp: DateTime<Utc>,
    ) -> Result<PreparedEntry> {
        let balance = self.balance_of(&account);

        let new_balance = if is_credit {
            balance.checked_add(amount).ok_or(Error::AmountOverflow {
                account,
                balance,
                amount,
            })?
        } else {
            balance.checked_sub(amount).ok_or(Error::InsufficientBalance {
                account,
                balance,
                requested: amount,
            })?
        };

        Ok(PreparedEntry {
            entry: Entry {
                index: self.count(),
                account,
                description: description.into(),
                amount,
                is_credit,
                timestamp,
            },
            new_balance,
        })
    }

    /// Apply a prepared transition
    ///
    /// The preparation must have been made against the current state: its
    /// index must be the next free one and its balance must follow from the
    /// account's current balance.
    pub fn commit(&mut self, prepared: PreparedEntry) -> Result<u64> {
        let PreparedEntry { entry, new_balance } = prepared;

        if entry.index != self.count() {
            return Err(Error::InvariantViolation(format!(
                "stale entry: index {} but next index is {}",
                entry.index,
                self.count()
            )));
        }

        let balance = self.balance_of(&entry.account);
        let expected = if entry.is_credit {
            balance.checked_add(entry.amount)
        } else {
            balance.checked_sub(entry.amount)
        };
        if expected != Some(new_balance) {
            return Err(Error::InvariantViolation(format!(
                "stale balance for {}: {} does not follow from {}",
                entry.account, new_balance, balance
            )));
        }

        let index = entry.index;
        self.balances.insert(entry.account, new_balance);
        self.log.push(entry);
        Ok(index)
    }

    /// Balance of an account (zero if never referenced)
    pub fn balance_of(&self, account: &AccountId) -> Amount {
        self.balances.get(account).copied().unwrap_or(Amount::ZERO)
    }

    /// Number of entries in the log
    pub fn count(&self) -> u64 {
        self.log.len()
    }

    /// Entry at `index`
    pub fn read(&self, index: u64) -> Result<&Entry> {
        self.log.get(index).ok_or(Error::IndexOutOfRange {
            index,
            count: self.count(),
        })
    }

    /// Up to `limit` entries, newest first
    pub fn recent(&self, limit: usize) -> Vec<&Entry> {
        self.log.iter().rev().take(limit).collect()
    }

    /// All entries of one account, in log order
    pub fn entries_for(&self, account: &AccountId) -> Vec<&Entry> {
        self.log.iter().filter(|e| &e.account == account).collect()
    }

    /// Number of accounts that have at least one entry
    pub fn accounts(&self) -> usize {
        self.balances.len()
    }

    /// The balance table
    pub fn balances(&self) -> &HashMap<AccountId, Amount> {
        &self.balances
    }

    /// The entry log; cloning it is O(1) and yields a frozen view
    pub fn log(&self) -> &EntryLog {
        &self.log
    }

    /// Rebuild an engine by re-running every entry of a log
    ///
    /// Entries must be dense from 0 and each transition must succeed;
    /// timestamps are kept as recorded.
    pub fn replay<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = Entry>,
    {
        let mut engine = Self::new();

        for entry in entries {
            if entry.index != engine.count() {
                return Err(Error::InvariantViolation(format!(
                    "log gap: found index {} where {} was expected",
                    entry.index,
                    engine.count()
                )));
            }

            let prepared = engine
                .prepare(
                    entry.account,
                    entry.description,
                    entry.amount,
                    entry.is_credit,
                    entry.timestamp,
                )
                .map_err(|e| {
                    Error::InvariantViolation(format!("replay of entry {} failed: {}", entry.index, e))
                })?;
            engine.commit(prepared)?;
        }

        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> AccountId {
        AccountId::from_bytes([0xa1; 20])
    }

    fn bob() -> AccountId {
        AccountId::from_bytes([0xb0; 20])
    }

    #[test]
    fn test_empty_engine() {
        let engine = LedgerEngine::new();
        assert_eq!(engine.count(), 0);
        assert_eq!(engine.balance_of(&alice()), Amount::ZERO);
        assert!(engine.recent(10).is_empty());
    }

    #[test]
    fn test_credit_debit_scenario() {
        let mut engine = LedgerEngine::new();

        // Seed
        let idx = engine.record(alice(), "seed", Amount::new(100), true).unwrap();
        assert_eq!(idx, 0);
        assert_eq!(engine.balance_of(&alice()), Amount::new(100));
        assert_eq!(engine.count(), 1);

        // Pay
        let idx = engine.record(alice(), "pay", Amount::new(30), false).unwrap();
        assert_eq!(idx, 1);
        assert_eq!(engine.balance_of(&alice()), Amount::new(70));
        let entry = engine.read(1).unwrap();
        assert_eq!(entry.amount, Amount::new(30));
        assert!(!entry.is_credit);

        // Overpay
        let err = engine
            .record(alice(), "overpay", Amount::new(1000), false)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientBalance { balance, requested, .. }
                if balance == Amount::new(70) && requested == Amount::new(1000)
        ));
        assert_eq!(engine.balance_of(&alice()), Amount::new(70));
        assert_eq!(engine.count(), 2);

        // Read past the end
        assert!(matches!(
            engine.read(5),
            Err(Error::IndexOutOfRange { index: 5, count: 2 })
        ));
    }

    #[test]
    fn test_debit_boundary() {
        let mut engine = LedgerEngine::new();
        engine.record(alice(), "seed", Amount::new(50), true).unwrap();

        let over = engine.balance_of(&alice()).checked_add(Amount::new(1)).unwrap();
        assert!(engine.record(alice(), "x", over, false).is_err());
        assert_eq!(engine.balance_of(&alice()), Amount::new(50));

        let exact = engine.balance_of(&alice());
        engine.record(alice(), "x", exact, false).unwrap();
        assert_eq!(engine.balance_of(&alice()), Amount::ZERO);
    }

    #[test]
    fn test_debit_on_unknown_account() {
        let mut engine = LedgerEngine::new();
        assert!(engine.record(bob(), "x", Amount::new(1), false).is_err());
        assert_eq!(engine.count(), 0);
        assert_eq!(engine.accounts(), 0);

        // Zero debit on a fresh account is legal
        engine.record(bob(), "noop", Amount::ZERO, false).unwrap();
        assert_eq!(engine.count(), 1);
    }

    #[test]
    fn test_credit_overflow_rejected() {
        let mut engine = LedgerEngine::new();
        engine.record(alice(), "max", Amount::MAX, true).unwrap();

        let err = engine.record(alice(), "one more", Amount::new(1), true).unwrap_err();
        assert!(matches!(err, Error::AmountOverflow { .. }));
        assert_eq!(engine.balance_of(&alice()), Amount::MAX);
        assert_eq!(engine.count(), 1);
    }

    #[test]
    fn test_accounts_are_independent() {
        let mut engine = LedgerEngine::new();
        engine.record(alice(), "a", Amount::new(10), true).unwrap();
        engine.record(bob(), "b", Amount::new(3), true).unwrap();

        assert!(engine.record(bob(), "b", Amount::new(10), false).is_err());
        engine.record(alice(), "a", Amount::new(10), false).unwrap();

        assert_eq!(engine.balance_of(&alice()), Amount::ZERO);
        assert_eq!(engine.balance_of(&bob()), Amount::new(3));
        assert_eq!(engine.entries_for(&bob()).len(), 1);
        assert_eq!(engine.accounts(), 2);
    }

    #[test]
    fn test_recent_is_newest_first() {
        let mut engine = LedgerEngine::new();
        for i in 0..15u128 {
            engine.record(alice(), format!("e{i}"), Amount::new(i), true).unwrap();
        }

        let recent = engine.recent(10);
        assert_eq!(recent.len(), 10);
        assert_eq!(recent[0].index, 14);
        assert_eq!(recent[9].index, 5);
    }

    #[test]
    fn test_prepare_does_not_mutate() {
        let engine = LedgerEngine::new();
        let prepared = engine
            .prepare(alice(), "seed", Amount::new(5), true, Utc::now())
            .unwrap();
        assert_eq!(prepared.entry.index, 0);
        assert_eq!(prepared.new_balance, Amount::new(5));
        assert_eq!(engine.count(), 0);
        assert_eq!(engine.balance_of(&alice()), Amount::ZERO);
    }

    #[test]
    fn test_commit_rejects_stale_preparation() {
        let mut engine = LedgerEngine::new();
        let first = engine
            .prepare(alice(), "a", Amount::new(5), true, Utc::now())
            .unwrap();
        let second = first.clone();

        engine.commit(first).unwrap();
        assert!(matches!(
            engine.commit(second),
            Err(Error::InvariantViolation(_))
        ));
        assert_eq!(engine.count(), 1);
    }

    #[test]
    fn test_replay_reproduces_state() {
        let mut engine = LedgerEngine::new();
        engine.record(alice(), "seed", Amount::new(100), true).unwrap();
        engine.record(bob(), "seed", Amount::new(40), true).unwrap();
        engine.record(alice(), "pay", Amount::new(30), false).unwrap();

        let log: Vec<Entry> = (0..engine.count())
            .map(|i| engine.read(i).unwrap().clone())
            .collect();
        let replayed = LedgerEngine::replay(log).unwrap();

        assert_eq!(replayed.count(), 3);
        assert_eq!(replayed.balances(), engine.balances());
        assert_eq!(replayed.read(2).unwrap(), engine.read(2).unwrap());
    }

    #[test]
    fn test_replay_rejects_gap_and_overdraft() {
        let mut engine = LedgerEngine::new();
        engine.record(alice(), "seed", Amount::new(10), true).unwrap();
        engine.record(alice(), "pay", Amount::new(10), false).unwrap();

        let mut gapped = engine.read(1).unwrap().clone();
        gapped.index = 3;
        let result = LedgerEngine::replay(vec![engine.read(0).unwrap().clone(), gapped]);
        assert!(matches!(result, Err(Error::InvariantViolation(_))));

        // Debit before the credit that funds it
        let mut debit = engine.read(1).unwrap().clone();
        debit.index = 0;
        let result = LedgerEngine::replay(vec![debit]);
        assert!(matches!(result, Err(Error::InvariantViolation(_))));
    }
}

//! Error types for the ledger

use crate::types::{AccountId, Amount};
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Debit larger than the account balance
    #[error("Insufficient balance for {account}: balance {balance}, requested {requested}")]
    InsufficientBalance {
        /// Account being debited
        account: AccountId,
        /// Balance at the time of the call
        balance: Amount,
        /// Requested debit
        requested: Amount,
    },

    /// Read past the end of the log
    #[error("Index {index} out of range (count {count})")]
    IndexOutOfRange {
        /// Requested index
        index: u64,
        /// Number of entries in the log
        count: u64,
    },

    /// Credit would exceed the representable balance
    #[error("Amount overflow for {account}: balance {balance} + credit {amount}")]
    AmountOverflow {
        /// Account being credited
        account: AccountId,
        /// Balance at the time of the call
        balance: Amount,
        /// Requested credit
        amount: Amount,
    },

    /// Malformed account identifier
    #[error("Invalid account id: {0}")]
    InvalidAccountId(String),

    /// Malformed amount text
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Invariant violation (dense indices, replay mismatch, etc.)
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for the failures a caller can act on by changing its request.
    pub fn is_business_rule(&self) -> bool {
        matches!(
            self,
            Error::InsufficientBalance { .. }
                | Error::IndexOutOfRange { .. }
                | Error::AmountOverflow { .. }
        )
    }

    /// Short label used for metrics and structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InsufficientBalance { .. } => "insufficient_balance",
            Error::IndexOutOfRange { .. } => "index_out_of_range",
            Error::AmountOverflow { .. } => "amount_overflow",
            Error::InvalidAccountId(_) => "invalid_account_id",
            Error::InvalidAmount(_) => "invalid_amount",
            Error::InvariantViolation(_) => "invariant_violation",
            Error::Storage(_) => "storage",
            Error::Serialization(_) => "serialization",
            Error::Concurrency(_) => "concurrency",
            Error::Config(_) => "config",
            Error::Metrics(_) => "metrics",
            Error::Io(_) => "io",
        }
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_rule_kinds() {
        let account = AccountId::from_bytes([7u8; 20]);
        let err = Error::InsufficientBalance {
            account,
            balance: Amount::new(70),
            requested: Amount::new(1000),
        };
        assert!(err.is_business_rule());
        assert_eq!(err.kind(), "insufficient_balance");

        let err = Error::IndexOutOfRange { index: 5, count: 2 };
        assert!(err.is_business_rule());
        assert_eq!(err.to_string(), "Index 5 out of range (count 2)");

        assert!(!Error::Concurrency("closed".to_string()).is_business_rule());
    }

    #[test]
    fn test_insufficient_balance_message() {
        let err = Error::InsufficientBalance {
            account: AccountId::from_bytes([0xab; 20]),
            balance: Amount::new(70),
            requested: Amount::new(1000),
        };
        let msg = err.to_string();
        assert!(msg.contains("balance 70"));
        assert!(msg.contains("requested 1000"));
    }
}

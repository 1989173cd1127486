//! Core types for the ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode for storage, JSON for callers)
//! - Exact arithmetic (smallest-unit integers, never floating point)
//! - A fixed identifier representation, so keys never need normalising

use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Account identifier width in bytes (EVM address width)
pub const ACCOUNT_ID_LEN: usize = 20;

/// Fractional digits of the display unit used by the dashboard (wei -> ether)
pub const DEFAULT_DECIMALS: u32 = 18;

/// Most fractional digits `parse_units` accepts (10^38 fits a u128, 10^39 does not)
pub const MAX_DECIMALS: u32 = 38;

/// Account identifier (20-byte address)
///
/// Identity is the byte string. Text input may use any hex case; display is
/// always lowercase `0x`-prefixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountId([u8; ACCOUNT_ID_LEN]);

impl AccountId {
    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; ACCOUNT_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; ACCOUNT_ID_LEN] {
        &self.0
    }

    /// Lowercase hex without prefix
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Abbreviated form for display, e.g. `0xf39f...2266`
    pub fn short(&self) -> String {
        let hex = self.to_hex();
        format!("0x{}...{}", &hex[..4], &hex[hex.len() - 4..])
    }
}

impl FromStr for AccountId {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        let hex = s
            .strip_prefix("0x")
            .ok_or_else(|| crate::Error::InvalidAccountId(format!("missing 0x prefix: {s}")))?;

        if hex.len() != ACCOUNT_ID_LEN * 2 {
            return Err(crate::Error::InvalidAccountId(format!(
                "expected {} hex digits, got {}",
                ACCOUNT_ID_LEN * 2,
                hex.len()
            )));
        }

        let mut bytes = [0u8; ACCOUNT_ID_LEN];
        for (i, pair) in hex.as_bytes().chunks(2).enumerate() {
            let hi = hex_digit(pair[0]);
            let lo = hex_digit(pair[1]);
            match (hi, lo) {
                (Some(hi), Some(lo)) => bytes[i] = (hi << 4) | lo,
                _ => {
                    return Err(crate::Error::InvalidAccountId(format!(
                        "non-hex digit in {s}"
                    )))
                }
            }
        }

        Ok(Self(bytes))
    }
}

fn hex_digit(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl Serialize for AccountId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.collect_str(self)
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            s.parse().map_err(de::Error::custom)
        } else {
            <[u8; ACCOUNT_ID_LEN]>::deserialize(deserializer).map(Self)
        }
    }
}

/// Non-negative amount in smallest units
///
/// Human-readable formats (JSON) carry it as a decimal string, since most
/// consumers cannot hold 128-bit integers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Amount(u128);

impl Amount {
    /// Zero
    pub const ZERO: Amount = Amount(0);

    /// Largest representable amount
    pub const MAX: Amount = Amount(u128::MAX);

    /// Create from smallest units
    pub const fn new(units: u128) -> Self {
        Self(units)
    }

    /// Smallest units
    pub const fn units(&self) -> u128 {
        self.0
    }

    /// Check if zero
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Addition, `None` on overflow
    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// Subtraction, `None` if the result would be negative
    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// Parse a human decimal (`"10.50"` or `"10,50"`) into smallest units
    pub fn parse_units(text: &str, decimals: u32) -> crate::Result<Self> {
        let invalid = |why: &str| crate::Error::InvalidAmount(format!("{why}: {text:?}"));

        let normalized = text.trim().replace(',', ".");
        if normalized.is_empty() {
            return Err(invalid("empty amount"));
        }

        let mut parts = normalized.split('.');
        let whole = parts.next().unwrap_or("");
        let frac = parts.next().unwrap_or("");
        if parts.next().is_some() {
            return Err(invalid("more than one decimal separator"));
        }
        if whole.is_empty() && frac.is_empty() {
            return Err(invalid("no digits"));
        }
        if !whole.bytes().chain(frac.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid("non-digit character"));
        }
        if frac.len() > decimals as usize {
            return Err(invalid("too many fractional digits"));
        }

        let scale = 10u128
            .checked_pow(decimals)
            .ok_or_else(|| invalid("unsupported decimals"))?;
        let overflow = || invalid("amount too large");

        let whole_units = if whole.is_empty() {
            0
        } else {
            whole.parse::<u128>().map_err(|_| overflow())?
        };
        let frac_units = if frac.is_empty() {
            0
        } else {
            let pad = 10u128.pow(decimals - frac.len() as u32);
            frac.parse::<u128>().map_err(|_| overflow())? * pad
        };

        whole_units
            .checked_mul(scale)
            .and_then(|v| v.checked_add(frac_units))
            .map(Amount)
            .ok_or_else(overflow)
    }

    /// Render with `decimals` fractional digits, trailing zeros trimmed
    pub fn format_units(&self, decimals: u32) -> String {
        if decimals == 0 {
            return self.0.to_string();
        }
        // Past 10^38 every u128 is a pure fraction
        let (whole, frac) = match 10u128.checked_pow(decimals) {
            Some(scale) => (self.0 / scale, self.0 % scale),
            None => (0, self.0),
        };

        let frac = format!("{:0width$}", frac, width = decimals as usize);
        let frac = frac.trim_end_matches('0');
        if frac.is_empty() {
            format!("{whole}.0")
        } else {
            format!("{whole}.{frac}")
        }
    }
}

impl From<u128> for Amount {
    fn from(units: u128) -> Self {
        Self(units)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.collect_str(self)
        } else {
            serializer.serialize_u128(self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            let canonical = !s.is_empty()
                && s.bytes().all(|b| b.is_ascii_digit())
                && (s == "0" || !s.starts_with('0'));
            if !canonical {
                return Err(de::Error::custom(format!("amount must be plain digits: {s:?}")));
            }
            s.parse::<u128>().map(Amount).map_err(de::Error::custom)
        } else {
            u128::deserialize(deserializer).map(Amount)
        }
    }
}

/// Immutable ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Position in the log (0-based, dense)
    pub index: u64,

    /// Account the entry belongs to
    pub account: AccountId,

    /// Caller-supplied description
    pub description: String,

    /// Amount in smallest units
    pub amount: Amount,

    /// Credit (true) or debit (false)
    pub is_credit: bool,

    /// When the entry was recorded
    pub timestamp: DateTime<Utc>,
}

impl Entry {
    /// Dashboard rendering: `+ 1.5` for credits, `- 0.2` for debits
    pub fn signed_display(&self, decimals: u32) -> String {
        let sign = if self.is_credit { '+' } else { '-' };
        format!("{} {}", sign, self.amount.format_units(decimals))
    }
}

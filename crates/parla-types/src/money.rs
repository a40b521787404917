//! Fixed-point money.
//!
//! Every monetary value in the ledger is an integer count of cents. Rates are
//! expressed in basis points and applied with truncation toward zero, so repeated
//! micro-credits never accumulate floating-point drift.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ParseError, BPS_DENOMINATOR, CENTS_PER_DOLLAR};

/// A signed amount of US cents.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Zero dollars.
    pub const ZERO: Money = Money(0);

    /// Construct from a raw cent count.
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Construct from whole dollars.
    pub const fn from_dollars(dollars: i64) -> Self {
        Self(dollars * CENTS_PER_DOLLAR)
    }

    /// The raw cent count.
    pub const fn cents(self) -> i64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }

    pub fn checked_neg(self) -> Option<Money> {
        self.0.checked_neg().map(Money)
    }

    /// Multiply by an integer count.
    pub fn checked_mul(self, factor: i64) -> Option<Money> {
        self.0.checked_mul(factor).map(Money)
    }

    /// Apply a basis-point rate, truncating toward zero at the cent.
    ///
    /// `Money::from_dollars(500).apply_bps(1_000)` is $50.00.
    pub fn apply_bps(self, bps: u32) -> Option<Money> {
        self.0
            .checked_mul(i64::from(bps))
            .map(|scaled| Money(scaled / BPS_DENOMINATOR))
    }

    /// How many whole `unit`s fit into this amount. Non-positive amounts or units
    /// yield zero.
    pub fn whole_units(self, unit: Money) -> i64 {
        if self.0 <= 0 || unit.0 <= 0 {
            return 0;
        }
        self.0 / unit.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let per = CENTS_PER_DOLLAR.unsigned_abs();
        write!(f, "{sign}${}.{:02}", abs / per, abs % per)
    }
}

impl FromStr for Money {
    type Err = ParseError;

    /// Parses `"12"`, `"12.5"`, `"12.50"`, `"$1000.00"` or `"-3.25"`. More than two
    /// fractional digits is rejected rather than rounded.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidAmount(s.to_string());

        let trimmed = s.trim();
        let (negative, rest) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let rest = rest.strip_prefix('$').unwrap_or(rest);
        if rest.is_empty() {
            return Err(invalid());
        }

        let (whole, frac) = match rest.split_once('.') {
            Some((whole, frac)) => (whole, frac),
            None => (rest, ""),
        };
        if whole.is_empty() || frac.len() > 2 {
            return Err(invalid());
        }
        if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }

        let dollars: i64 = whole.parse().map_err(|_| invalid())?;
        let cents: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| invalid())? * 10,
            _ => frac.parse().map_err(|_| invalid())?,
        };

        let total = dollars
            .checked_mul(CENTS_PER_DOLLAR)
            .and_then(|d| d.checked_add(cents))
            .ok_or_else(invalid)?;

        Ok(Money(if negative { -total } else { total }))
    }
}

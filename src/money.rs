//! Fixed-point currency amounts.
//!
//! Wire amounts are decimal strings with a currency symbol (`"$0.25"`).
//! Internally every amount is an integer count of minor units at six decimal
//! places, so `"$5.00"` is exactly `5_000_000` and comparisons never touch
//! floating point. Formatting keeps at least two decimals and round-trips
//! canonical inputs: `format(parse("$5.00")) == "$5.00"`.

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

/// Decimal places of a minor unit.
pub const DECIMALS: u32 = 6;

/// Minor units per whole currency unit (10^6).
pub const MINOR_UNITS_PER_UNIT: u64 = 1_000_000;

/// A non-negative currency amount in fixed-point minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(u64);

impl Money {
    /// Zero amount.
    pub const ZERO: Money = Money(0);

    /// Construct from a raw minor-unit count.
    #[must_use]
    pub const fn from_minor_units(units: u64) -> Self {
        Self(units)
    }

    /// The raw minor-unit count.
    #[must_use]
    pub const fn minor_units(&self) -> u64 {
        self.0
    }

    /// Saturating addition, for accumulating daily totals.
    #[must_use]
    pub const fn saturating_add(&self, other: Money) -> Money {
        Money(self.0.saturating_add(other.0))
    }
}

impl FromStr for Money {
    type Err = Error;

    /// Parse a decimal currency string, with or without the leading `$`.
    ///
    /// Accepts up to six fractional digits; more precision than a minor unit
    /// is an error rather than a silent rounding.
    fn from_str(s: &str) -> Result<Self, Error> {
        let trimmed = s.trim();
        let digits = trimmed.strip_prefix('$').unwrap_or(trimmed);

        if digits.is_empty() {
            return Err(Error::Currency(format!("empty amount: {s:?}")));
        }

        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };

        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::Currency(format!("invalid whole part in {s:?}")));
        }
        if frac.len() > DECIMALS as usize || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::Currency(format!(
                "fractional part of {s:?} must be 0-{DECIMALS} digits"
            )));
        }

        let whole: u64 = whole
            .parse()
            .map_err(|_| Error::Currency(format!("amount out of range: {s:?}")))?;

        let mut frac_units: u64 = 0;
        if !frac.is_empty() {
            frac_units = frac
                .parse::<u64>()
                .map_err(|_| Error::Currency(format!("amount out of range: {s:?}")))?;
            frac_units *= 10u64.pow(DECIMALS - frac.len() as u32);
        }

        whole
            .checked_mul(MINOR_UNITS_PER_UNIT)
            .and_then(|w| w.checked_add(frac_units))
            .map(Money)
            .ok_or_else(|| Error::Currency(format!("amount out of range: {s:?}")))
    }
}

impl fmt::Display for Money {
    /// Render as `$<whole>.<frac>` with at least two fractional digits and
    /// trailing zeros beyond the second digit trimmed.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / MINOR_UNITS_PER_UNIT;
        let frac = self.0 % MINOR_UNITS_PER_UNIT;

        let mut frac_str = format!("{frac:06}");
        while frac_str.len() > 2 && frac_str.ends_with('0') {
            frac_str.pop();
        }

        write!(f, "${whole}.{frac_str}")
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(|e: Error| D::Error::custom(e.to_string()))
    }
}

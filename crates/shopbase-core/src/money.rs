//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  Summing a cart in floating point:                                      │
//! │    9.99 * 2 + 5.00 * 3 = 34.980000000000004  ❌ WRONG!                  │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    999 * 2 + 500 * 3 = 3498 cents = $34.98   ✅                          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use shopbase_core::money::Money;
//!
//! // Create from cents (preferred)
//! let price = Money::from_cents(999); // $9.99
//!
//! // Or parse a decimal string coming from a form or CLI (2 minor digits)
//! let same = Money::parse_decimal("9.99", 2).unwrap();
//! assert_eq!(price, same);
//!
//! let line_total = price.multiply_quantity(2); // $19.98
//! assert_eq!(line_total.cents(), 1998);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use ts_rs::TS;

use crate::error::ValidationError;

/// Most minor-unit digits any supported currency uses.
pub const MAX_MINOR_DIGITS: u8 = 4;

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit (cents for USD).
///
/// ## Design Decisions
/// - **i64 (signed)**: parsed amounts may be negative before validation
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Saturating math**: totals pin at `i64::MAX` instead of wrapping
///
/// ## Where Money is Used
/// ```text
/// CartLine.unit_price_cents ──► CartLine::line_total() ──► CartState::subtotal()
///                                                               │
///                                                               └──► "$34.98" in UI
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use shopbase_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // Represents $10.99
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Parses a decimal amount such as `"9.99"`, `"10"` or `"10.5"` into
    /// minor units of a currency with `decimals` fractional digits.
    ///
    /// ## Rules
    /// - Optional leading `-`
    /// - At most `decimals` fractional digits (no silent rounding)
    /// - Digits only otherwise
    ///
    /// ## Example
    /// ```rust
    /// use shopbase_core::money::Money;
    ///
    /// assert_eq!(Money::parse_decimal("10.5", 2).unwrap().cents(), 1050);
    /// assert_eq!(Money::parse_decimal("1500", 0).unwrap().cents(), 1500);
    /// assert!(Money::parse_decimal("9.999", 2).is_err());
    /// ```
    pub fn parse_decimal(input: &str, decimals: u8) -> Result<Money, ValidationError> {
        let invalid = |reason: String| ValidationError::InvalidFormat {
            field: "price".to_string(),
            reason,
        };

        if decimals > MAX_MINOR_DIGITS {
            return Err(invalid(format!(
                "at most {} decimal places are supported",
                MAX_MINOR_DIGITS
            )));
        }

        let trimmed = input.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        let (whole, frac) = match digits.split_once('.') {
            Some((whole, frac)) => (whole, frac),
            None => (digits, ""),
        };

        if whole.is_empty() && frac.is_empty() {
            return Err(invalid("empty amount".into()));
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid("must be a decimal number like 9.99".into()));
        }
        if frac.len() > decimals as usize {
            return Err(invalid(match decimals {
                0 => "must be a whole amount".to_string(),
                n => format!("at most {} decimal places", n),
            }));
        }

        let too_large = || invalid("amount too large".into());
        let scale = 10_i64.pow(decimals as u32);

        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| too_large())?
        };
        // "5" with 2 decimals is 50 minor units
        let frac: i64 = if frac.is_empty() {
            0
        } else {
            let padding = 10_i64.pow((decimals as usize - frac.len()) as u32);
            frac.parse::<i64>().map_err(|_| too_large())? * padding
        };

        let minor = whole
            .checked_mul(scale)
            .and_then(|m| m.checked_add(frac))
            .ok_or_else(too_large)?;

        Ok(Money(if negative { -minor } else { minor }))
    }

    /// Returns the value in cents (smallest currency unit).
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Multiplies money by a quantity, saturating at the `i64` bounds.
    ///
    /// ## Example
    /// ```rust
    /// use shopbase_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(299); // $2.99
    /// let line_total = unit_price.multiply_quantity(3);
    /// assert_eq!(line_total.cents(), 897); // $8.97
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0.saturating_mul(qty))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Two-decimal rendering for logs. Use `CurrencyConfig::format` in
/// shopbase-store for the configured currency.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}${}.{:02}",
            sign,
            (self.0 / 100).unsigned_abs(),
            (self.0 % 100).unsigned_abs()
        )
    }
}

/// Saturating sum.
impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        Money(iter.fold(0_i64, |total, m| total.saturating_add(m.0)))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

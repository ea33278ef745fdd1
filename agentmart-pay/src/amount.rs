//! Human-readable amount parsing.
//!
//! Amounts shown to users (`"0.1"` SOL, `"$1,200"`) are converted to exact
//! decimals and, when they go on chain, to integer base units. No floating
//! point is involved anywhere on this path: a value that cannot be represented
//! exactly in base units is rejected instead of rounded.

use std::fmt;
use std::str::FromStr;

pub use rust_decimal::Decimal;

/// Errors produced while parsing an amount.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    /// The input is not a decimal number.
    #[error("invalid amount: {0:?}")]
    Invalid(String),
    /// Negative amounts are never valid.
    #[error("amount must not be negative: {0}")]
    Negative(String),
    /// The input has more fractional digits than the unit supports.
    #[error("amount {amount} has more than {decimals} fractional digits")]
    TooPrecise {
        /// The offending input.
        amount: String,
        /// Decimals supported by the target unit.
        decimals: u8,
    },
    /// The scaled value does not fit the base-unit integer.
    #[error("amount {0} overflows the base unit")]
    Overflow(String),
}

/// Converts a human-readable decimal string into integer base units.
///
/// `decimals` is the number of fractional digits of the unit, e.g. 9 for SOL
/// (lamports) or 6 for USDC.
///
/// # Errors
///
/// Returns [`AmountError`] if the input is not a non-negative decimal, has more
/// fractional digits than `decimals`, or does not fit in a `u64`.
pub fn parse_units(amount: &str, decimals: u8) -> Result<u64, AmountError> {
    let trimmed = amount.trim();
    if trimmed.starts_with('-') {
        return Err(AmountError::Negative(trimmed.to_owned()));
    }
    let (whole, fraction) = split_decimal(trimmed)?;
    let fraction = fraction.trim_end_matches('0');
    if fraction.len() > usize::from(decimals) {
        return Err(AmountError::TooPrecise {
            amount: trimmed.to_owned(),
            decimals,
        });
    }
    let overflow = || AmountError::Overflow(trimmed.to_owned());
    let factor = 10u128.checked_pow(u32::from(decimals)).ok_or_else(overflow)?;
    let whole: u128 = whole.parse().map_err(|_| overflow())?;
    let fraction: u128 = if fraction.is_empty() {
        0
    } else {
        format!("{fraction:0<width$}", width = usize::from(decimals))
            .parse()
            .map_err(|_| overflow())?
    };
    whole
        .checked_mul(factor)
        .and_then(|units| units.checked_add(fraction))
        .and_then(|units| u64::try_from(units).ok())
        .ok_or_else(overflow)
}

/// Splits `digits[.digits]` into its whole and fractional parts.
///
/// Anything else, including signs, exponents and `_` separators, is invalid.
fn split_decimal(input: &str) -> Result<(&str, &str), AmountError> {
    let (whole, fraction) = match input.split_once('.') {
        Some((whole, fraction)) if !fraction.is_empty() => (whole, fraction),
        Some(_) => return Err(AmountError::Invalid(input.to_owned())),
        None => (input, ""),
    };
    if whole.is_empty() || !is_digits(whole) || !is_digits(fraction) {
        return Err(AmountError::Invalid(input.to_owned()));
    }
    Ok((whole, fraction))
}

fn is_digits(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit())
}

/// Checks `1,234,567` style grouping: a leading group of one to three digits,
/// then groups of exactly three.
fn is_grouped(whole: &str) -> bool {
    let mut groups = whole.split(',');
    let leading_ok = groups
        .next()
        .is_some_and(|g| (1..=3).contains(&g.len()) && is_digits(g));
    leading_ok && groups.all(|g| g.len() == 3 && is_digits(g))
}

/// Formats integer base units as a human-readable decimal string.
///
/// Trailing zeros are dropped: `100_000_000` lamports format as `"0.1"`.
#[must_use]
pub fn format_units(units: u64, decimals: u8) -> String {
    Decimal::from_i128_with_scale(i128::from(units), u32::from(decimals))
        .normalize()
        .to_string()
}

/// An exact, non-negative money amount parsed from a display string.
///
/// Accepts an optional `$` prefix, thousands separators and an optional
/// trailing ticker (`"$1,200"`, `"542.5 SOL"`, `"1,234.8 SOL"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MoneyAmount(Decimal);

impl MoneyAmount {
    /// Wraps an already exact decimal.
    #[must_use]
    pub const fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// Returns the exact decimal value.
    #[must_use]
    pub const fn value(&self) -> Decimal {
        self.0
    }

    /// Parses a display string that must end with the given ticker.
    ///
    /// # Errors
    ///
    /// Returns [`AmountError::Invalid`] if the ticker is missing or the number
    /// is malformed.
    pub fn parse_with_ticker(input: &str, ticker: &str) -> Result<Self, AmountError> {
        let trimmed = input.trim();
        let number = trimmed
            .strip_suffix(ticker)
            .ok_or_else(|| AmountError::Invalid(trimmed.to_owned()))?;
        number.parse()
    }
}

impl FromStr for MoneyAmount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let number = trimmed.strip_prefix('$').unwrap_or(trimmed).trim();
        let number = number
            .split_once(char::is_whitespace)
            .map_or(number, |(value, ticker)| {
                if ticker.chars().all(char::is_alphabetic) {
                    value
                } else {
                    number
                }
            });
        if number.starts_with('-') {
            return Err(AmountError::Negative(trimmed.to_owned()));
        }
        let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
        if whole.contains(',') && !is_grouped(whole) {
            return Err(AmountError::Invalid(trimmed.to_owned()));
        }
        let digits = whole.replace(',', "");
        let digits = if fraction.is_empty() {
            digits
        } else {
            format!("{digits}.{fraction}")
        };
        split_decimal(&digits).map_err(|_| AmountError::Invalid(trimmed.to_owned()))?;
        let value = Decimal::from_str_exact(&digits)
            .map_err(|_| AmountError::Invalid(trimmed.to_owned()))?;
        Ok(Self(value))
    }
}

impl fmt::Display for MoneyAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl From<Decimal> for MoneyAmount {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

//! Arbitrary-precision decimal numbers.
//!
//! A [`Number`] holds a normalized [`BigDecimal`] so that equality, hashing
//! and ordering all follow numeric value: `1`, `1.0`, `+1` and `10e-1` are the
//! same number and print as `1`.

use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Largest accepted scale magnitude of a normalized number.
const MAX_EXPONENT: u64 = 4096;

/// Error returned when a string is not a valid decimal number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseNumberError {
    input: String,
    reason: String,
}

impl fmt::Display for ParseNumberError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not a valid number: {}", self.input, self.reason)
    }
}

impl std::error::Error for ParseNumberError {}

/// An arbitrary-precision decimal number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Number(BigDecimal);

impl Number {
    /// The underlying decimal.
    #[must_use]
    pub fn as_big_decimal(&self) -> &BigDecimal {
        &self.0
    }

    /// Consume the number, returning the underlying decimal.
    #[must_use]
    pub fn into_big_decimal(self) -> BigDecimal {
        self.0
    }
}

impl From<BigDecimal> for Number {
    fn from(value: BigDecimal) -> Self {
        Self(value.normalized())
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Self::from(BigDecimal::from(value))
    }
}

impl FromStr for Number {
    type Err = ParseNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ParseNumberError {
            input: s.to_owned(),
            reason: reason.to_owned(),
        };

        // BigDecimal also takes digit separators and surrounding text we do
        // not want in stored numbers.
        if !s
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'))
        {
            return Err(invalid("unexpected character"));
        }
        if !s.bytes().any(|b| b.is_ascii_digit()) {
            return Err(invalid("no digits"));
        }
        if let Some((_, exponent)) = s.split_once(['e', 'E']) {
            let exponent: i64 = exponent
                .parse()
                .map_err(|_| invalid("malformed exponent"))?;
            if exponent.unsigned_abs() > 2 * MAX_EXPONENT {
                return Err(invalid("exponent out of range"));
            }
        }

        let value = BigDecimal::from_str(s)
            .map_err(|e| invalid(&e.to_string()))?
            .normalized();
        if value.as_bigint_and_exponent().1.unsigned_abs() > MAX_EXPONENT {
            return Err(invalid("exponent out of range"));
        }
        Ok(Self(value))
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_plain_string())
    }
}

impl Serialize for Number {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Number {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

//! Amount type for monetary values entered by hand or read back from the sheet.
//!
//! Amounts arrive either as JSON numbers or as strings typed into a form, and come back from the
//! sheet as formatted strings such as `¥1,200`. None of these are validated: anything that cannot
//! be read as a number becomes zero.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Currency symbols that may prefix an amount in a sheet cell.
const CURRENCY_SYMBOLS: &[char] = &['¥', '￥', '$'];

/// Represents a monetary amount.
///
/// This type wraps `Decimal` and provides lenient parsing: currency symbols, thousands separators
/// and surrounding whitespace are ignored, and unreadable input coerces to zero.
///
/// # Examples
///
/// ```
/// # use money_tracker::model::Amount;
/// assert_eq!(Amount::coerce("¥1,200").to_string(), "1200");
/// assert_eq!(Amount::coerce("twelve").to_string(), "0");
/// assert_eq!(Amount::coerce("").to_string(), "0");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(Decimal);

impl Amount {
    pub const ZERO: Amount = Amount(Decimal::ZERO);

    pub const fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// Returns the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Reads `s` as a number, falling back to zero when it is not one.
    pub fn coerce(s: &str) -> Self {
        Self::parse(s).unwrap_or(Self::ZERO)
    }

    fn parse(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return None;
        }
        let (negative, rest) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest.trim_start()),
            None => (false, trimmed),
        };
        let cleaned: String = rest
            .trim_start_matches(CURRENCY_SYMBOLS)
            .chars()
            .filter(|c| *c != ',')
            .collect();

        let value = match Decimal::from_str(&cleaned) {
            Ok(value) => value,
            // Scientific notation and the like.
            Err(_) => cleaned
                .parse::<f64>()
                .ok()
                .and_then(|f| Decimal::try_from(f).ok())?,
        };
        Some(Self(if negative { -value } else { value }).normalize())
    }

    fn normalize(self) -> Self {
        Self(self.0.normalize())
    }

    /// Builds an amount from an arbitrary JSON value the way a form submission should be read:
    /// numbers are taken as-is, strings are coerced and everything else is zero.
    pub(crate) fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Number(n) => Self::coerce(&n.to_string()),
            serde_json::Value::String(s) => Self::coerce(s),
            serde_json::Value::Bool(true) => Self(Decimal::ONE),
            _ => Self::ZERO,
        }
    }
}

impl FromStr for Amount {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::coerce(s))
    }
}

impl fmt::Display for Amount {
    /// Writes the plain number, e.g. `500` or `12.5`, which is also how it is stored in a cell.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl Serialize for Amount {
    /// Serializes as a JSON number: integral amounts as integers, others as floats.
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let value = self.0.normalize();
        if value.scale() == 0 {
            if let Some(i) = value.to_i64() {
                return serializer.serialize_i64(i);
            }
        }
        serializer.serialize_f64(value.to_f64().unwrap_or_default())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(Amount::from_json(&value))
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.value()
    }
}

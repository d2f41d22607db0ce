//! Relative time offset value type, e.g. `"-5m"`.
//!
//! Used for selector ranges expressed relative to the server's current
//! time rather than as absolute timestamps.

use super::granularity::TimeUnit;
use crate::error::SeriesLinkError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Signed offset string, e.g. `"-5m"` (five minutes in the past).
///
/// Equality is structural over `(amount, unit)`: `"-300s"` and `"-5m"`
/// are distinct offsets even though they cover the same span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RelativeOffset {
    amount: i64,
    unit: TimeUnit,
}

impl RelativeOffset {
    pub fn new(amount: i64, unit: TimeUnit) -> Self {
        Self { amount, unit }
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }

    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    /// Offset in whole seconds (negative = past).
    pub fn as_seconds(&self) -> i64 {
        self.amount * self.unit.seconds() as i64
    }
}

impl FromStr for RelativeOffset {
    type Err = SeriesLinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            SeriesLinkError::SelectorError(format!(
                "invalid relative offset '{}': expected '[-]<amount><s|m|h|d>', e.g. '-5m'",
                s
            ))
        };
        let unit = TimeUnit::from_suffix(s.chars().next_back().ok_or_else(invalid)?)
            .ok_or_else(invalid)?;
        let body = &s[..s.len() - 1];
        // Reject a bare sign and redundant leading '+'; i64::parse handles '-'.
        if body.is_empty() || body == "-" || body.starts_with('+') {
            return Err(invalid());
        }
        let amount: i64 = body.parse().map_err(|_| invalid())?;
        Ok(Self { amount, unit })
    }
}

impl fmt::Display for RelativeOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.unit.suffix())
    }
}

impl Serialize for RelativeOffset {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RelativeOffset {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let off: RelativeOffset = "-5m".parse().unwrap();
        assert_eq!(off.amount(), -5);
        assert_eq!(off.unit(), TimeUnit::Minutes);
        assert_eq!(off.to_string(), "-5m");
        assert_eq!(off.as_seconds(), -300);
    }

    #[test]
    fn test_structural_equality() {
        let a: RelativeOffset = "-5m".parse().unwrap();
        let b: RelativeOffset = "-300s".parse().unwrap();
        assert_ne!(a, b, "different units are distinct offsets");
        assert_eq!(a, "-5m".parse::<RelativeOffset>().unwrap());
    }

    #[test]
    fn test_rejects_garbage() {
        for text in ["", "-", "-m", "5", "+5m", "--5m", "5mm", "now"] {
            assert!(text.parse::<RelativeOffset>().is_err(), "accepted '{}'", text);
        }
    }

    #[test]
    fn test_serde_round_trip() {
        let off: RelativeOffset = "-12h".parse().unwrap();
        let json = serde_json::to_string(&off).unwrap();
        assert_eq!(json, "\"-12h\"");
        assert_eq!(serde_json::from_str::<RelativeOffset>(&json).unwrap(), off);
    }
}

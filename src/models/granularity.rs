//! Granularity value type for selector time resolution.
//!
//! A granularity is a compact duration string such as `"15s"`, `"3m"`,
//! `"5h"` or `"12d"`, kept in parsed form so that selectors compare
//! structurally instead of by raw string.

use crate::error::SeriesLinkError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Time unit suffix used by granularities and relative offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Single-character wire suffix (`s`, `m`, `h`, `d`).
    pub fn suffix(&self) -> char {
        match self {
            TimeUnit::Seconds => 's',
            TimeUnit::Minutes => 'm',
            TimeUnit::Hours => 'h',
            TimeUnit::Days => 'd',
        }
    }

    /// Number of seconds in one unit.
    pub fn seconds(&self) -> u64 {
        match self {
            TimeUnit::Seconds => 1,
            TimeUnit::Minutes => 60,
            TimeUnit::Hours => 3600,
            TimeUnit::Days => 86400,
        }
    }

    /// Parse a wire suffix character.
    pub fn from_suffix(c: char) -> Option<Self> {
        match c {
            's' => Some(TimeUnit::Seconds),
            'm' => Some(TimeUnit::Minutes),
            'h' => Some(TimeUnit::Hours),
            'd' => Some(TimeUnit::Days),
            _ => None,
        }
    }
}

/// Parsed duration string, e.g. `"15s"`.
///
/// The amount must be a positive integer. `"15s"` and `"1m"`-style
/// aliases of the same wall-clock length are distinct granularities;
/// equality is structural over `(amount, unit)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Granularity {
    amount: u32,
    unit: TimeUnit,
}

impl Granularity {
    /// Create a granularity from a positive amount and unit.
    pub fn new(amount: u32, unit: TimeUnit) -> Result<Self, SeriesLinkError> {
        if amount == 0 {
            return Err(SeriesLinkError::SelectorError(
                "granularity amount must be positive".to_string(),
            ));
        }
        Ok(Self { amount, unit })
    }

    pub fn amount(&self) -> u32 {
        self.amount
    }

    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    /// Wall-clock length of one granularity step.
    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.amount) * self.unit.seconds())
    }
}

impl FromStr for Granularity {
    type Err = SeriesLinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            SeriesLinkError::SelectorError(format!(
                "invalid granularity '{}': expected '<amount><s|m|h|d>', e.g. '15s'",
                s
            ))
        };
        let unit = TimeUnit::from_suffix(s.chars().next_back().ok_or_else(invalid)?)
            .ok_or_else(invalid)?;
        let amount: u32 = s[..s.len() - 1].parse().map_err(|_| invalid())?;
        Granularity::new(amount, unit).map_err(|_| invalid())
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.unit.suffix())
    }
}

impl Serialize for Granularity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Granularity {
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
        for (text, amount, unit) in [
            ("15s", 15, TimeUnit::Seconds),
            ("3m", 3, TimeUnit::Minutes),
            ("5h", 5, TimeUnit::Hours),
            ("12d", 12, TimeUnit::Days),
        ] {
            let g: Granularity = text.parse().unwrap();
            assert_eq!(g.amount(), amount);
            assert_eq!(g.unit(), unit);
            assert_eq!(g.to_string(), text);
        }
    }

    #[test]
    fn test_rejects_garbage() {
        for text in ["", "s", "15", "15x", "-3m", "1.5h", "m15"] {
            assert!(text.parse::<Granularity>().is_err(), "accepted '{}'", text);
        }
    }

    #[test]
    fn test_zero_amount_rejected() {
        assert!("0s".parse::<Granularity>().is_err());
        assert!(Granularity::new(0, TimeUnit::Seconds).is_err());
    }

    #[test]
    fn test_as_duration() {
        let g: Granularity = "3m".parse().unwrap();
        assert_eq!(g.as_duration(), Duration::from_secs(180));
    }

    #[test]
    fn test_serde_round_trip() {
        let g: Granularity = "12d".parse().unwrap();
        let json = serde_json::to_string(&g).unwrap();
        assert_eq!(json, "\"12d\"");
        let parsed: Granularity = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, g);
    }
}

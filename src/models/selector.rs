//! Series selectors: the key by which callbacks are registered and
//! inbound results are routed.
//!
//! A selector identifies a named series plus a time range and resolution.
//! The range is a tagged value type: either both bounds are absolute
//! epoch-millisecond timestamps, or both are relative offsets (with `"now"`
//! allowed as the upper bound). Mixing the two kinds is a caller error,
//! enforced at construction and at deserialization.
//!
//! Selectors compare structurally (`Eq + Hash` over the parsed fields), so
//! two JSON encodings that differ only in field order produce the same
//! registry key. Serialization always emits the fixed field order
//! `identifier, from, until, granularity`.

use super::granularity::Granularity;
use super::relative_offset::RelativeOffset;
use crate::error::SeriesLinkError;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;
use std::fmt;

/// Upper bound of a relative time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelativeBound {
    /// A signed offset from the server's current time, e.g. `"-1m"`.
    Offset(RelativeOffset),
    /// The literal `"now"`.
    Now,
}

impl fmt::Display for RelativeBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelativeBound::Offset(off) => off.fmt(f),
            RelativeBound::Now => write!(f, "now"),
        }
    }
}

/// Time range of a selector. Both bounds are of the same kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeRange {
    /// Absolute epoch-millisecond bounds.
    Absolute { from: i64, until: i64 },
    /// Bounds relative to the server's current time.
    Relative {
        from: RelativeOffset,
        until: RelativeBound,
    },
}

impl TimeRange {
    /// Classify raw JSON `from`/`until` values, enforcing the kind-matching
    /// invariant.
    fn from_raw(from: &JsonValue, until: &JsonValue) -> Result<Self, SeriesLinkError> {
        match (from, until) {
            (JsonValue::Number(f), JsonValue::Number(u)) => {
                let (from, until) = match (f.as_i64(), u.as_i64()) {
                    (Some(f), Some(u)) => (f, u),
                    _ => {
                        return Err(SeriesLinkError::SelectorError(format!(
                            "absolute bounds must be integer epoch milliseconds, got {}..{}",
                            f, u
                        )))
                    }
                };
                Ok(TimeRange::Absolute { from, until })
            }
            (JsonValue::String(f), JsonValue::String(u)) => {
                let from: RelativeOffset = f.parse()?;
                let until = if u == "now" {
                    RelativeBound::Now
                } else {
                    RelativeBound::Offset(u.parse()?)
                };
                Ok(TimeRange::Relative { from, until })
            }
            _ => Err(SeriesLinkError::SelectorError(
                "`from` and `until` must be of the same kind: both absolute \
                 timestamps, or both relative offsets (with 'now' allowed for `until`)"
                    .to_string(),
            )),
        }
    }
}

/// Identifies a requested series: name, time range, and resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Selector {
    identifier: String,
    range: TimeRange,
    granularity: Granularity,
}

impl Selector {
    /// Selector over an absolute epoch-millisecond range.
    pub fn absolute(
        identifier: impl Into<String>,
        from: i64,
        until: i64,
        granularity: Granularity,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            range: TimeRange::Absolute { from, until },
            granularity,
        }
    }

    /// Selector over a range relative to the server's current time.
    pub fn relative(
        identifier: impl Into<String>,
        from: RelativeOffset,
        until: RelativeBound,
        granularity: Granularity,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            range: TimeRange::Relative { from, until },
            granularity,
        }
    }

    /// Parse selector fields given as raw strings/JSON, enforcing the
    /// kind-matching invariant. Convenience for callers holding untyped
    /// configuration.
    pub fn from_parts(
        identifier: impl Into<String>,
        from: &JsonValue,
        until: &JsonValue,
        granularity: &str,
    ) -> Result<Self, SeriesLinkError> {
        Ok(Self {
            identifier: identifier.into(),
            range: TimeRange::from_raw(from, until)?,
            granularity: granularity.parse()?,
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn range(&self) -> &TimeRange {
        &self.range
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Normalized encoding of this selector, identical for structurally
    /// equal selectors regardless of how they were constructed or the JSON
    /// field order they were parsed from. Used for diagnostics and the
    /// debug dump.
    pub fn canonical_key(&self) -> String {
        match &self.range {
            TimeRange::Absolute { from, until } => format!(
                "{}|{}..{}|{}",
                self.identifier, from, until, self.granularity
            ),
            TimeRange::Relative { from, until } => format!(
                "{}|{}..{}|{}",
                self.identifier, from, until, self.granularity
            ),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical_key())
    }
}

impl Serialize for Selector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // Fixed field order: identifier, from, until, granularity.
        let mut st = serializer.serialize_struct("Selector", 4)?;
        st.serialize_field("identifier", &self.identifier)?;
        match &self.range {
            TimeRange::Absolute { from, until } => {
                st.serialize_field("from", from)?;
                st.serialize_field("until", until)?;
            }
            TimeRange::Relative { from, until } => {
                st.serialize_field("from", &from.to_string())?;
                st.serialize_field("until", &until.to_string())?;
            }
        }
        st.serialize_field("granularity", &self.granularity)?;
        st.end()
    }
}

impl<'de> Deserialize<'de> for Selector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            identifier: String,
            from: JsonValue,
            until: JsonValue,
            granularity: Granularity,
        }
        let raw = Raw::deserialize(deserializer)?;
        let range = TimeRange::from_raw(&raw.from, &raw.until).map_err(serde::de::Error::custom)?;
        Ok(Selector {
            identifier: raw.identifier,
            range,
            granularity: raw.granularity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cpu_load() -> Selector {
        Selector::relative(
            "cpu.load",
            "-5m".parse().unwrap(),
            RelativeBound::Now,
            "15s".parse().unwrap(),
        )
    }

    #[test]
    fn test_field_order_does_not_matter() {
        let a: Selector = serde_json::from_value(json!({
            "identifier": "cpu.load", "from": "-5m", "until": "now", "granularity": "15s"
        }))
        .unwrap();
        let b: Selector = serde_json::from_value(json!({
            "granularity": "15s", "until": "now", "from": "-5m", "identifier": "cpu.load"
        }))
        .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.canonical_key(), b.canonical_key());
        assert_eq!(a, cpu_load());
    }

    #[test]
    fn test_absolute_range() {
        let sel: Selector = serde_json::from_value(json!({
            "identifier": "mem.free", "from": 1700000000000i64,
            "until": 1700000300000i64, "granularity": "1m"
        }))
        .unwrap();
        assert_eq!(
            *sel.range(),
            TimeRange::Absolute {
                from: 1_700_000_000_000,
                until: 1_700_000_300_000
            }
        );
        assert_eq!(sel.canonical_key(), "mem.free|1700000000000..1700000300000|1m");
    }

    #[test]
    fn test_mixed_kinds_rejected() {
        let mixed = json!({
            "identifier": "cpu.load", "from": 1700000000000i64,
            "until": "now", "granularity": "15s"
        });
        assert!(serde_json::from_value::<Selector>(mixed).is_err());

        let mixed = json!({
            "identifier": "cpu.load", "from": "-5m",
            "until": 1700000000000i64, "granularity": "15s"
        });
        assert!(serde_json::from_value::<Selector>(mixed).is_err());
    }

    #[test]
    fn test_now_only_valid_for_until() {
        let bad_from = json!({
            "identifier": "cpu.load", "from": "now", "until": "now", "granularity": "15s"
        });
        assert!(serde_json::from_value::<Selector>(bad_from).is_err());
    }

    #[test]
    fn test_serialization_fixed_field_order() {
        let text = serde_json::to_string(&cpu_load()).unwrap();
        assert_eq!(
            text,
            r#"{"identifier":"cpu.load","from":"-5m","until":"now","granularity":"15s"}"#
        );
    }

    #[test]
    fn test_round_trip() {
        let sel = cpu_load();
        let parsed: Selector =
            serde_json::from_str(&serde_json::to_string(&sel).unwrap()).unwrap();
        assert_eq!(parsed, sel);

        let abs = Selector::absolute("disk.io", 1000, 2000, "1h".parse().unwrap());
        let parsed: Selector =
            serde_json::from_str(&serde_json::to_string(&abs).unwrap()).unwrap();
        assert_eq!(parsed, abs);
    }

    #[test]
    fn test_from_parts() {
        let sel =
            Selector::from_parts("cpu.load", &json!("-5m"), &json!("now"), "15s").unwrap();
        assert_eq!(sel, cpu_load());
        assert!(Selector::from_parts("cpu.load", &json!("-5m"), &json!(12), "15s").is_err());
    }
}

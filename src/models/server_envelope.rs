//! Server-to-client message envelope.
//!
//! The server batches results into one envelope with two optional lists:
//! `get` (one-shot snapshot results) and `subscription` (pushed updates).
//! An envelope carrying neither list is malformed.

use super::selector::Selector;
use crate::error::{Result, SeriesLinkError};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// Whether a result item carries data or a server-side error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    Success,
    Error,
}

impl ResultKind {
    /// Classify the wire value. Returns `None` for unknown values so the
    /// dispatcher can log and drop the item instead of failing the whole
    /// envelope.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(ResultKind::Success),
            "error" => Some(ResultKind::Error),
            _ => None,
        }
    }
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultKind::Success => write!(f, "success"),
            ResultKind::Error => write!(f, "error"),
        }
    }
}

/// One result in an envelope list: the selector it answers, whether it
/// succeeded, and the payload (series data on success, error detail on
/// error). The payload is always read from this item, never from a
/// sibling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultItem {
    /// The selector this result answers.
    #[serde(rename = "graphSelector")]
    pub selector: Selector,
    /// `"success"` or `"error"`; kept raw so unknown values drop per-item.
    pub result: String,
    /// Series data or error detail, delivered to callbacks untouched.
    #[serde(default)]
    pub data: JsonValue,
}

impl ResultItem {
    pub fn kind(&self) -> Option<ResultKind> {
        ResultKind::parse(&self.result)
    }
}

/// Inbound message envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerEnvelope {
    /// One-shot snapshot results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get: Option<Vec<ResultItem>>,
    /// Pushed subscription updates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<Vec<ResultItem>>,
}

impl ServerEnvelope {
    /// Parse a raw text frame.
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| SeriesLinkError::SerializationError(e.to_string()))
    }

    /// An envelope with neither a `get` nor a `subscription` list is
    /// malformed. Empty lists are well-formed and dispatch nothing.
    pub fn is_malformed(&self) -> bool {
        self.get.is_none() && self.subscription.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_subscription_envelope() {
        let env = ServerEnvelope::parse(
            r#"{"subscription":[{"graphSelector":{"identifier":"cpu.load","from":"-5m","until":"now","granularity":"15s"},"result":"success","data":[1,2,3]}]}"#,
        )
        .unwrap();
        assert!(!env.is_malformed());
        assert!(env.get.is_none());
        let items = env.subscription.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].kind(), Some(ResultKind::Success));
        assert_eq!(items[0].selector.identifier(), "cpu.load");
        assert_eq!(items[0].data, json!([1, 2, 3]));
    }

    #[test]
    fn test_both_lists() {
        let env = ServerEnvelope::parse(
            r#"{"get":[],"subscription":[]}"#,
        )
        .unwrap();
        assert!(!env.is_malformed());
        assert_eq!(env.get.unwrap().len(), 0);
    }

    #[test]
    fn test_malformed_when_neither_list_present() {
        let env = ServerEnvelope::parse(r#"{"status":"ok"}"#).unwrap();
        assert!(env.is_malformed());
    }

    #[test]
    fn test_unknown_result_kind() {
        let env = ServerEnvelope::parse(
            r#"{"get":[{"graphSelector":{"identifier":"a","from":"-5m","until":"now","granularity":"15s"},"result":"partial","data":null}]}"#,
        )
        .unwrap();
        assert_eq!(env.get.unwrap()[0].kind(), None);
    }

    #[test]
    fn test_error_item_carries_own_payload() {
        let env = ServerEnvelope::parse(
            r#"{"get":[
                {"graphSelector":{"identifier":"a","from":"-5m","until":"now","granularity":"15s"},"result":"error","data":"boom"},
                {"graphSelector":{"identifier":"b","from":"-5m","until":"now","granularity":"15s"},"result":"success","data":[1]}
            ]}"#,
        )
        .unwrap();
        let items = env.get.unwrap();
        assert_eq!(items[0].data, json!("boom"));
        assert_eq!(items[1].data, json!([1]));
    }

    #[test]
    fn test_invalid_json_is_error() {
        assert!(ServerEnvelope::parse("not json").is_err());
        assert!(ServerEnvelope::parse("[1,2,3]").is_err());
    }
}

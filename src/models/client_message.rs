//! Client-to-server request messages.

use super::selector::Selector;
use crate::error::{Result, SeriesLinkError};
use serde::{Deserialize, Serialize};

/// Outbound wire messages. External tagging gives the wire shape
/// `{"get": [Selector]}`, `{"subscribe": [Selector]}`,
/// `{"unsubscribe": [Selector]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientMessage {
    /// Request a one-shot snapshot for each selector.
    Get(Vec<Selector>),
    /// Register a live subscription for each selector.
    Subscribe(Vec<Selector>),
    /// Drop the live subscription for each selector.
    Unsubscribe(Vec<Selector>),
}

impl ClientMessage {
    /// Serialize to the UTF-8 text body sent over the connection.
    pub fn to_text(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| SeriesLinkError::SerializationError(e.to_string()))
    }

    /// The selectors this message addresses.
    pub fn selectors(&self) -> &[Selector] {
        match self {
            ClientMessage::Get(s) | ClientMessage::Subscribe(s) | ClientMessage::Unsubscribe(s) => {
                s
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::selector::RelativeBound;

    fn selector() -> Selector {
        Selector::relative(
            "cpu.load",
            "-5m".parse().unwrap(),
            RelativeBound::Now,
            "15s".parse().unwrap(),
        )
    }

    #[test]
    fn test_wire_shape() {
        let msg = ClientMessage::Subscribe(vec![selector()]);
        assert_eq!(
            msg.to_text().unwrap(),
            r#"{"subscribe":[{"identifier":"cpu.load","from":"-5m","until":"now","granularity":"15s"}]}"#
        );

        let msg = ClientMessage::Get(vec![selector()]);
        assert!(msg.to_text().unwrap().starts_with(r#"{"get":["#));

        let msg = ClientMessage::Unsubscribe(vec![selector()]);
        assert!(msg.to_text().unwrap().starts_with(r#"{"unsubscribe":["#));
    }

    #[test]
    fn test_round_trip() {
        let msg = ClientMessage::Get(vec![selector()]);
        let parsed: ClientMessage = serde_json::from_str(&msg.to_text().unwrap()).unwrap();
        assert_eq!(parsed, msg);
        assert_eq!(parsed.selectors().len(), 1);
    }
}

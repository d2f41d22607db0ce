//! Error types for the series-link client library.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SeriesLinkError>;

/// Errors surfaced by the series-link public API.
///
/// Protocol-level conditions (malformed envelopes, unknown result kinds,
/// dispatch misses, sends attempted while disconnected) are *not* errors:
/// they are reported through the diagnostic log and the optional
/// [`EventHandlers`](crate::EventHandlers) hooks, and never propagate to
/// application code. Server-side `"error"` results are delivered through
/// the caller's own error handler, exactly like success results.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SeriesLinkError {
    /// Invalid client configuration (bad endpoint URL, unusable options).
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// A selector could not be constructed or parsed, e.g. mixing an
    /// absolute `from` with a relative `until`.
    #[error("Invalid selector: {0}")]
    SelectorError(String),

    /// WebSocket transport failure (handshake, frame I/O).
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Failed to serialize or deserialize a wire message.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An operation exceeded its configured timeout.
    #[error("Timeout: {0}")]
    TimeoutError(String),

    /// Internal invariant violation (e.g. a poisoned lock).
    #[error("Internal error: {0}")]
    InternalError(String),
}

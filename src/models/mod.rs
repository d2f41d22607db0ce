//! Data models for the series-link client library.
//!
//! Defines the selector value types and the request/response wire
//! structures exchanged with the series service.

pub mod client_message;
pub mod granularity;
pub mod relative_offset;
pub mod selector;
pub mod server_envelope;
pub mod session_info;
pub mod session_options;

pub use client_message::ClientMessage;
pub use granularity::{Granularity, TimeUnit};
pub use relative_offset::RelativeOffset;
pub use selector::{RelativeBound, Selector, TimeRange};
pub use server_envelope::{ResultItem, ResultKind, ServerEnvelope};
pub use session_info::{RegistryEntryInfo, SessionDebug};
pub use session_options::SessionOptions;

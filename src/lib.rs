//! # series-link
//!
//! Client session library for a remote time-series data service, speaking
//! JSON over one persistent WebSocket connection. Provides:
//!
//! - **One-shot snapshots**: [`SeriesLinkSession::get`] requests a named
//!   series once; the response fires the caller's handler exactly once.
//! - **Live subscriptions**: [`SeriesLinkSession::subscribe`] registers
//!   handlers for pushed updates until the returned [`Subscription`] is
//!   explicitly unsubscribed.
//! - **Disconnection tolerance**: requests issued while the connection is
//!   not ready are queued and re-sent, in order, when it next becomes
//!   ready; the session never drops a request on the floor just because
//!   the link was down.
//!
//! Series are addressed by [`Selector`]: a name, a time range (absolute
//! epoch milliseconds or offsets relative to now), and a granularity.
//! Selectors compare structurally, so the same logical selector always
//! routes to the same registered callbacks.
//!
//! # Example
//!
//! ```rust,no_run
//! use series_link::{RelativeBound, Selector, SeriesLinkSession};
//!
//! # async fn example() -> series_link::Result<()> {
//! let session = SeriesLinkSession::builder().build();
//! session.connect("ws://localhost:9000/series")?;
//!
//! let selector = Selector::relative(
//!     "cpu.load",
//!     "-5m".parse()?,
//!     RelativeBound::Now,
//!     "15s".parse()?,
//! );
//!
//! let subscription = session.subscribe(
//!     &selector,
//!     |data| println!("cpu.load: {}", data),
//!     |err| eprintln!("cpu.load error: {}", err),
//! )?;
//!
//! // ... later:
//! subscription.unsubscribe()?;
//! # Ok(())
//! # }
//! ```

mod connection;
mod deferred;
pub mod error;
pub mod event_handlers;
pub mod models;
mod registry;
pub mod session;
pub mod timeouts;

pub use error::{Result, SeriesLinkError};
pub use event_handlers::{CloseInfo, ErrorInfo, EventHandlers};
pub use models::{
    ClientMessage, Granularity, RegistryEntryInfo, RelativeBound, RelativeOffset, ResultItem,
    ResultKind, Selector, ServerEnvelope, SessionDebug, SessionOptions, TimeRange, TimeUnit,
};
pub use registry::DataCallback;
pub use session::{
    ConnectionPhase, SeriesLinkSession, SeriesLinkSessionBuilder, Subscription,
};
pub use timeouts::{SeriesLinkTimeouts, SeriesLinkTimeoutsBuilder};

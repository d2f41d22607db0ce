//! Connection lifecycle hooks.
//!
//! Optional callback hooks for observing the session's transport:
//! open, close, transport errors, and raw frame traffic. All hooks are
//! diagnostic: none of them participates in the request/callback
//! lifecycle, and the session works with none registered.
//!
//! # Example
//!
//! ```rust
//! use series_link::EventHandlers;
//!
//! let handlers = EventHandlers::new()
//!     .on_open(|| println!("connection ready"))
//!     .on_close(|info| println!("connection lost: {}", info))
//!     .on_error(|err| eprintln!("transport error: {}", err));
//! ```

use std::fmt;
use std::sync::Arc;

/// Why the connection closed.
#[derive(Debug, Clone)]
pub struct CloseInfo {
    /// Human-readable description.
    pub message: String,
    /// WebSocket close code when the peer supplied one.
    pub code: Option<u16>,
}

impl CloseInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(message: impl Into<String>, code: u16) -> Self {
        Self {
            message: message.into(),
            code: Some(code),
        }
    }
}

impl fmt::Display for CloseInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} (code {})", self.message, code),
            None => f.write_str(&self.message),
        }
    }
}

/// Transport or session diagnostic error passed to `on_error`.
///
/// Errors never force a state transition and never propagate to
/// application code; `recoverable` hints whether a later `connect()` is
/// likely to succeed.
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    pub message: String,
    pub recoverable: bool,
}

impl ErrorInfo {
    pub fn new(message: impl Into<String>, recoverable: bool) -> Self {
        Self {
            message: message.into(),
            recoverable,
        }
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

type OnOpen = Arc<dyn Fn() + Send + Sync>;
type OnClose = Arc<dyn Fn(CloseInfo) + Send + Sync>;
type OnError = Arc<dyn Fn(ErrorInfo) + Send + Sync>;
type OnFrame = Arc<dyn Fn(&str) + Send + Sync>;

/// Optional lifecycle hooks. All are independent; register only what you
/// need.
#[derive(Clone, Default)]
pub struct EventHandlers {
    pub(crate) on_open: Option<OnOpen>,
    pub(crate) on_close: Option<OnClose>,
    pub(crate) on_error: Option<OnError>,
    /// Raw text of every outbound frame (debug hook).
    pub(crate) on_send: Option<OnFrame>,
    /// Raw text of every inbound frame, before parsing (debug hook).
    pub(crate) on_receive: Option<OnFrame>,
}

impl fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandlers")
            .field("on_open", &self.on_open.is_some())
            .field("on_close", &self.on_close.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_send", &self.on_send.is_some())
            .field("on_receive", &self.on_receive.is_some())
            .finish()
    }
}

impl EventHandlers {
    /// No hooks registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Called when the connection becomes ready (after the deferred-queue
    /// flush has been scheduled but before any inbound dispatch).
    pub fn on_open(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_open = Some(Arc::new(f));
        self
    }

    /// Called when the connection is lost or closed, with the reason.
    pub fn on_close(mut self, f: impl Fn(CloseInfo) + Send + Sync + 'static) -> Self {
        self.on_close = Some(Arc::new(f));
        self
    }

    /// Called on transport errors and session diagnostics (e.g. deferred
    /// queue overflow). State is never changed by an error alone.
    pub fn on_error(mut self, f: impl Fn(ErrorInfo) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Debug hook: raw text of every frame sent.
    pub fn on_send(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_send = Some(Arc::new(f));
        self
    }

    /// Debug hook: raw text of every frame received, before parsing.
    pub fn on_receive(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_receive = Some(Arc::new(f));
        self
    }

    pub(crate) fn emit_open(&self) {
        if let Some(cb) = &self.on_open {
            cb();
        }
    }

    pub(crate) fn emit_close(&self, info: CloseInfo) {
        if let Some(cb) = &self.on_close {
            cb(info);
        }
    }

    pub(crate) fn emit_error(&self, error: ErrorInfo) {
        if let Some(cb) = &self.on_error {
            cb(error);
        }
    }

    pub(crate) fn emit_send(&self, raw: &str) {
        if let Some(cb) = &self.on_send {
            cb(raw);
        }
    }

    pub(crate) fn emit_receive(&self, raw: &str) {
        if let Some(cb) = &self.on_receive {
            cb(raw);
        }
    }
}

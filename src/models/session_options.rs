//! Session-level behavior options.
//!
//! These control the request/callback lifecycle engine itself (deferred
//! queue bounds, reopen behavior, pending-request expiry) as opposed to
//! [`SeriesLinkTimeouts`](crate::SeriesLinkTimeouts), which covers the
//! transport.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Options controlling session lifecycle behavior.
///
/// # Example
///
/// ```rust
/// use series_link::SessionOptions;
///
/// let options = SessionOptions::default()
///     .with_max_deferred_actions(256)
///     .with_resubscribe_on_reopen(false)
///     .with_pending_get_expiry_ms(Some(60_000));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionOptions {
    /// Maximum number of deferred send actions held while disconnected.
    /// A push beyond the cap is rejected, logged, and reported through the
    /// `on_error` hook. Default: 1024.
    #[serde(default = "default_max_deferred_actions")]
    pub max_deferred_actions: usize,

    /// Re-send `subscribe` for every live subscription when the connection
    /// (re)opens, so subscriptions survive a reconnect the server has
    /// forgotten about. Subscriptions whose `subscribe` went out during the
    /// same readiness flush are not sent twice. Default: true.
    #[serde(default = "default_resubscribe_on_reopen")]
    pub resubscribe_on_reopen: bool,

    /// Expiry for pending one-shot `get` registrations, in milliseconds.
    /// A `get` whose response never arrives is purged lazily once it is
    /// older than this bound. `None` keeps pending gets forever.
    /// Default: `None`.
    #[serde(default)]
    pub pending_get_expiry_ms: Option<u64>,
}

fn default_max_deferred_actions() -> usize {
    1024
}

fn default_resubscribe_on_reopen() -> bool {
    true
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            max_deferred_actions: default_max_deferred_actions(),
            resubscribe_on_reopen: default_resubscribe_on_reopen(),
            pending_get_expiry_ms: None,
        }
    }
}

impl SessionOptions {
    /// Create options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the deferred-queue cap.
    pub fn with_max_deferred_actions(mut self, max: usize) -> Self {
        self.max_deferred_actions = max;
        self
    }

    /// Enable or disable re-subscription on reopen.
    pub fn with_resubscribe_on_reopen(mut self, enabled: bool) -> Self {
        self.resubscribe_on_reopen = enabled;
        self
    }

    /// Set the pending-get expiry in milliseconds. Pass `None` to keep
    /// pending gets forever.
    pub fn with_pending_get_expiry_ms(mut self, ms: Option<u64>) -> Self {
        self.pending_get_expiry_ms = ms;
        self
    }

    /// Pending-get expiry as a `Duration`, if configured.
    pub fn pending_get_expiry(&self) -> Option<Duration> {
        self.pending_get_expiry_ms.map(Duration::from_millis)
    }
}

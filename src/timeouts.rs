//! Timeout configuration for the transport.
//!
//! Covers only the timeouts the connection driver actually uses: the
//! connect handshake, the keepalive ping interval, and the pong window.
//! The request/callback engine itself has no timeouts; a pending `get`
//! is bounded by the `pending_get_expiry_ms` session option instead.

use std::time::Duration;

/// Transport timeout configuration.
///
/// # Examples
///
/// ```rust
/// use series_link::SeriesLinkTimeouts;
/// use std::time::Duration;
///
/// // Defaults are fine for most deployments.
/// let timeouts = SeriesLinkTimeouts::default();
///
/// // Custom values for high-latency links.
/// let timeouts = SeriesLinkTimeouts::builder()
///     .connection_timeout(Duration::from_secs(30))
///     .keepalive_interval_secs(30)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct SeriesLinkTimeouts {
    /// Timeout for establishing the connection (TCP + TLS + WebSocket
    /// handshake). Set to 0 to wait indefinitely. Default: 10 seconds.
    pub connection_timeout: Duration,

    /// Keepalive ping interval while the connection is idle.
    /// Set to 0 to disable pings. Default: 10 seconds.
    pub keepalive_interval: Duration,

    /// Maximum wait for any frame after a keepalive ping before the
    /// connection is considered dead. Set to 0 to disable.
    /// Default: 5 seconds.
    pub pong_timeout: Duration,
}

impl Default for SeriesLinkTimeouts {
    fn default() -> Self {
        Self {
            connection_timeout: Duration::from_secs(10),
            keepalive_interval: Duration::from_secs(10),
            pong_timeout: Duration::from_secs(5),
        }
    }
}

impl SeriesLinkTimeouts {
    pub fn builder() -> SeriesLinkTimeoutsBuilder {
        SeriesLinkTimeoutsBuilder::new()
    }

    /// Short timeouts for local development and tests.
    pub fn fast() -> Self {
        Self {
            connection_timeout: Duration::from_secs(2),
            keepalive_interval: Duration::from_secs(5),
            pong_timeout: Duration::from_secs(2),
        }
    }

    /// Whether a duration means "no timeout".
    pub fn is_no_timeout(duration: Duration) -> bool {
        duration.is_zero()
    }
}

/// Builder for [`SeriesLinkTimeouts`].
#[derive(Debug, Clone)]
pub struct SeriesLinkTimeoutsBuilder {
    timeouts: SeriesLinkTimeouts,
}

impl SeriesLinkTimeoutsBuilder {
    fn new() -> Self {
        Self {
            timeouts: SeriesLinkTimeouts::default(),
        }
    }

    /// Set the connect handshake timeout. Zero waits indefinitely.
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.connection_timeout = timeout;
        self
    }

    /// Set the connect handshake timeout in seconds.
    pub fn connection_timeout_secs(self, secs: u64) -> Self {
        self.connection_timeout(Duration::from_secs(secs))
    }

    /// Set the keepalive ping interval. Zero disables pings.
    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.timeouts.keepalive_interval = interval;
        self
    }

    /// Set the keepalive ping interval in seconds. Zero disables pings.
    pub fn keepalive_interval_secs(self, secs: u64) -> Self {
        self.keepalive_interval(Duration::from_secs(secs))
    }

    /// Set the pong window. Zero disables the check.
    pub fn pong_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.pong_timeout = timeout;
        self
    }

    /// Set the pong window in seconds. Zero disables the check.
    pub fn pong_timeout_secs(self, secs: u64) -> Self {
        self.pong_timeout(Duration::from_secs(secs))
    }

    pub fn build(self) -> SeriesLinkTimeouts {
        self.timeouts
    }
}

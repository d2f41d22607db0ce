//! Session core: connection lifecycle state machine, callback registries,
//! deferred-send queue, and inbound dispatch.
//!
//! A [`SeriesLinkSession`] owns one logical connection to the series
//! service plus all per-session state. Both registries, the deferred
//! queue, and the connection phase live behind a single exclusive lock, so
//! registration-then-send, unregister-then-send, queue flush, and inbound
//! dispatch are each observed atomically: an `unsubscribe` racing an
//! in-flight dispatch can never invoke a callback that has just been
//! removed.
//!
//! Locking consequence: data callbacks (success/error handlers) are
//! invoked while the session lock is held and must not call back into the
//! session. The lifecycle hooks in [`EventHandlers`] are invoked after the
//! lock is released and are free to do so.

use crate::connection;
use crate::deferred::{ActionKind, DeferredQueue, PendingAction};
use crate::error::{Result, SeriesLinkError};
use crate::event_handlers::{CloseInfo, ErrorInfo, EventHandlers};
use crate::models::{
    ClientMessage, RegistryEntryInfo, Selector, ServerEnvelope, SessionDebug, SessionOptions,
};
use crate::registry::{CallbackPair, CallbackRegistry};
use crate::timeouts::SeriesLinkTimeouts;
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;

pub use crate::registry::DataCallback;

/// Connection readiness state.
///
/// `Disconnected → Connecting → Open → Closed`, with `Closed` looping back
/// to `Disconnected` once the transport confirms the close. The session
/// never reconnects on its own; a fresh [`connect`](SeriesLinkSession::connect)
/// is the caller's policy decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// No connection and no attempt in progress.
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    /// The connection is ready; sends complete synchronously.
    Open,
    /// A close is in progress (close frame seen or `disconnect()` called).
    Closed,
}

impl ConnectionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionPhase::Disconnected => "disconnected",
            ConnectionPhase::Connecting => "connecting",
            ConnectionPhase::Open => "open",
            ConnectionPhase::Closed => "closed",
        }
    }
}

/// Frames the session hands to the connection driver.
#[derive(Debug)]
pub(crate) enum OutboundFrame {
    /// A UTF-8 text message body.
    Text(String),
    /// Initiate a graceful close.
    Close,
}

/// Mutable session state, all behind one lock.
struct SessionState {
    phase: ConnectionPhase,
    /// Bumped on every `connect()`; lifecycle events from a superseded
    /// connection attempt carry a stale generation and are ignored.
    generation: u64,
    /// Channel to the live connection driver. `Some` only while `Open`.
    outbound: Option<mpsc::UnboundedSender<OutboundFrame>>,
    /// One-shot `get` registrations.
    get_registry: CallbackRegistry,
    /// Persistent subscription registrations.
    sub_registry: CallbackRegistry,
    deferred: DeferredQueue,
}

pub(crate) struct SessionInner {
    state: Mutex<SessionState>,
    pub(crate) options: SessionOptions,
    pub(crate) timeouts: SeriesLinkTimeouts,
    pub(crate) handlers: EventHandlers,
}

impl SessionInner {
    fn state(&self) -> Result<MutexGuard<'_, SessionState>> {
        self.state
            .lock()
            .map_err(|e| SeriesLinkError::InternalError(format!("session lock poisoned: {}", e)))
    }

    /// Attempt to send `action` now; defer it when the connection is not
    /// ready. Successfully sent texts are appended to `outbox` so the
    /// caller can fire the `on_send` hook outside the lock; a queue
    /// overflow is returned the same way for `on_error`.
    fn issue_or_defer(
        state: &mut SessionState,
        options: &SessionOptions,
        outbox: &mut Vec<String>,
        action: PendingAction,
    ) -> Option<ErrorInfo> {
        let text = match action.to_message().to_text() {
            Ok(text) => text,
            Err(e) => {
                log::warn!("[series-link] failed to encode {}: {}", action, e);
                return None;
            }
        };
        if Self::send_now(state, &text) {
            log::debug!("[series-link] sent {}", action);
            outbox.push(text);
            return None;
        }
        log::info!(
            "[series-link] called {} while not connected - deferring",
            action.kind
        );
        let description = action.to_string();
        if state.deferred.push(action) {
            None
        } else {
            log::warn!(
                "[series-link] deferred queue full (cap {}) - dropping {}",
                options.max_deferred_actions,
                description
            );
            Some(ErrorInfo::new(
                format!("deferred queue overflow: dropped {}", description),
                true,
            ))
        }
    }

    /// Synchronous send attempt: succeeds only while `Open` with a live
    /// driver channel.
    fn send_now(state: &SessionState, text: &str) -> bool {
        if state.phase != ConnectionPhase::Open {
            return false;
        }
        match &state.outbound {
            Some(tx) => tx.send(OutboundFrame::Text(text.to_owned())).is_ok(),
            None => false,
        }
    }

    fn purge_expired_gets(state: &mut SessionState, options: &SessionOptions) {
        if let Some(expiry) = options.pending_get_expiry() {
            let purged = state.get_registry.purge_older_than(expiry);
            if purged > 0 {
                log::debug!("[series-link] purged {} expired pending get(s)", purged);
            }
        }
    }

    // ── Connection driver event surface ─────────────────────────────────

    /// The connection became ready. Installs the driver channel, flushes
    /// the deferred queue once (FIFO), and re-subscribes live
    /// subscriptions when configured. Returns `false` when `generation`
    /// is stale, in which case the driver must shut itself down.
    pub(crate) fn handle_open(
        &self,
        generation: u64,
        tx: mpsc::UnboundedSender<OutboundFrame>,
    ) -> bool {
        let mut outbox = Vec::new();
        {
            let Ok(mut state) = self.state() else {
                return false;
            };
            if generation != state.generation {
                log::debug!("[series-link] ignoring open event from superseded connection");
                return false;
            }
            state.phase = ConnectionPhase::Open;
            state.outbound = Some(tx);
            log::info!("[series-link] connection open");

            // One flush pass over the deferred queue, in insertion order.
            let SessionState {
                ref mut deferred,
                ref outbound,
                ..
            } = *state;
            if !deferred.is_empty() {
                log::info!(
                    "[series-link] flushing {} deferred action(s)",
                    deferred.len()
                );
            }
            let sent = deferred.flush(|action| match action.to_message().to_text() {
                Ok(text) => {
                    let ok = outbound
                        .as_ref()
                        .map(|tx| tx.send(OutboundFrame::Text(text.clone())).is_ok())
                        .unwrap_or(false);
                    if ok {
                        log::debug!("[series-link] flushed deferred {}", action);
                        outbox.push(text);
                    }
                    ok
                }
                Err(e) => {
                    // An unencodable action can never succeed; drop it.
                    log::warn!("[series-link] dropping undeliverable {}: {}", action, e);
                    true
                }
            });

            // Live subscriptions whose subscribe was not part of this flush
            // succeeded on an earlier connection; the server has forgotten
            // them, so re-send unless configured otherwise.
            if self.options.resubscribe_on_reopen {
                let flushed: HashSet<&Selector> = sent
                    .iter()
                    .filter(|a| a.kind == ActionKind::Subscribe)
                    .map(|a| &a.selector)
                    .collect();
                let SessionState {
                    ref sub_registry,
                    ref outbound,
                    ..
                } = *state;
                let to_resend: Vec<&Selector> = sub_registry
                    .selectors()
                    .filter(|s| !flushed.contains(*s))
                    .collect();
                if !to_resend.is_empty() {
                    log::info!(
                        "[series-link] re-subscribing {} of {} live subscription(s)",
                        to_resend.len(),
                        sub_registry.len()
                    );
                }
                for selector in to_resend {
                    let msg = ClientMessage::Subscribe(vec![selector.clone()]);
                    match msg.to_text() {
                        Ok(text) => {
                            let ok = outbound
                                .as_ref()
                                .map(|tx| tx.send(OutboundFrame::Text(text.clone())).is_ok())
                                .unwrap_or(false);
                            if ok {
                                log::debug!("[series-link] re-subscribed {}", selector);
                                outbox.push(text);
                            }
                        }
                        Err(e) => {
                            log::warn!("[series-link] failed to encode re-subscribe: {}", e)
                        }
                    }
                }
            }
        }
        self.handlers.emit_open();
        for text in &outbox {
            self.handlers.emit_send(text);
        }
        true
    }

    /// An inbound text frame arrived: parse the envelope and route each
    /// result to the matching registry.
    pub(crate) fn handle_message(&self, generation: u64, text: &str) {
        self.handlers.emit_receive(text);
        let Ok(mut state) = self.state() else {
            return;
        };
        if generation != state.generation {
            return;
        }
        Self::purge_expired_gets(&mut state, &self.options);

        let envelope = match ServerEnvelope::parse(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                log::warn!("[series-link] received incorrectly formatted message: {}", e);
                return;
            }
        };
        if envelope.is_malformed() {
            log::warn!(
                "[series-link] received incorrectly formatted message: neither 'get' nor 'subscription' present"
            );
            return;
        }

        for item in envelope.get.into_iter().flatten() {
            match item.kind() {
                Some(kind) => {
                    state.get_registry.dispatch_once(&item.selector, kind, &item.data);
                }
                None => log::warn!(
                    "[series-link] unknown result '{}' for {} - dropping",
                    item.result,
                    item.selector
                ),
            }
        }
        for item in envelope.subscription.into_iter().flatten() {
            match item.kind() {
                Some(kind) => {
                    state
                        .sub_registry
                        .dispatch_persistent(&item.selector, kind, &item.data);
                }
                None => log::warn!(
                    "[series-link] unknown result '{}' for {} - dropping",
                    item.result,
                    item.selector
                ),
            }
        }
    }

    /// Transport error: diagnostic only, no state transition.
    pub(crate) fn handle_error(&self, generation: u64, message: &str, recoverable: bool) {
        {
            let Ok(state) = self.state() else { return };
            if generation != state.generation {
                return;
            }
        }
        log::warn!("[series-link] transport error: {}", message);
        self.handlers.emit_error(ErrorInfo::new(message, recoverable));
    }

    /// A close frame was received: the connection is no longer usable for
    /// sends, but the stream has not ended yet.
    pub(crate) fn handle_closing(&self, generation: u64) {
        let Ok(mut state) = self.state() else { return };
        if generation != state.generation {
            return;
        }
        state.outbound = None;
        state.phase = ConnectionPhase::Closed;
        log::debug!("[series-link] close frame received");
    }

    /// The connection is gone. Clears the driver channel so any later send
    /// attempt is treated as not-ready and deferred.
    pub(crate) fn handle_close(&self, generation: u64, info: CloseInfo) {
        {
            let Ok(mut state) = self.state() else { return };
            if generation != state.generation {
                return;
            }
            state.outbound = None;
            state.phase = ConnectionPhase::Disconnected;
        }
        log::info!("[series-link] disconnected: {}", info);
        self.handlers.emit_close(info);
    }

    /// The connect attempt itself failed (handshake error or timeout).
    pub(crate) fn handle_connect_failed(&self, generation: u64, message: String, recoverable: bool) {
        {
            let Ok(mut state) = self.state() else { return };
            if generation != state.generation {
                return;
            }
            state.outbound = None;
            state.phase = ConnectionPhase::Disconnected;
        }
        log::warn!("[series-link] connection attempt failed: {}", message);
        self.handlers.emit_error(ErrorInfo::new(message, recoverable));
    }
}

/// Client session for the series service.
///
/// Cheap to clone; all clones share the same connection and registries.
///
/// # Example
///
/// ```rust,no_run
/// use series_link::{RelativeBound, Selector, SeriesLinkSession};
///
/// # async fn example() -> series_link::Result<()> {
/// let session = SeriesLinkSession::builder().build();
/// session.connect("ws://localhost:9000/series")?;
///
/// let selector = Selector::relative(
///     "cpu.load",
///     "-5m".parse()?,
///     RelativeBound::Now,
///     "15s".parse()?,
/// );
/// let subscription = session.subscribe(
///     &selector,
///     |data| println!("update: {}", data),
///     |err| eprintln!("series error: {}", err),
/// )?;
/// // ... later:
/// subscription.unsubscribe()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SeriesLinkSession {
    inner: Arc<SessionInner>,
}

impl SeriesLinkSession {
    /// Create a session with default options, timeouts, and no hooks.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> SeriesLinkSessionBuilder {
        SeriesLinkSessionBuilder::new()
    }

    /// Begin a connection attempt to `address` (a `ws://` or `wss://`
    /// URL). Non-blocking: the attempt proceeds on a background task, and
    /// readiness is observable via [`EventHandlers::on_open`] or
    /// [`is_connected`](Self::is_connected). Requests issued before the
    /// connection is ready are deferred and flushed on open.
    ///
    /// Calling `connect` again supersedes any previous connection or
    /// attempt. Must be called from within a tokio runtime.
    pub fn connect(&self, address: &str) -> Result<()> {
        let request = address.into_client_request().map_err(|e| {
            SeriesLinkError::ConfigurationError(format!(
                "invalid endpoint address '{}': {}",
                address, e
            ))
        })?;
        match request.uri().scheme_str() {
            Some("ws") | Some("wss") => {}
            other => {
                return Err(SeriesLinkError::ConfigurationError(format!(
                    "unsupported scheme '{}': expected ws:// or wss://",
                    other.unwrap_or("")
                )))
            }
        }
        let generation = {
            let mut state = self.inner.state()?;
            state.generation += 1;
            state.phase = ConnectionPhase::Connecting;
            // Dropping the old channel makes a superseded driver wind down.
            state.outbound = None;
            state.generation
        };
        log::info!("[series-link] connecting to {}", address);
        connection::spawn_driver(self.inner.clone(), request, generation);
        Ok(())
    }

    /// Gracefully close the connection (or abort an in-flight attempt).
    /// Registrations and the deferred queue are untouched; a later
    /// [`connect`](Self::connect) picks them back up.
    pub fn disconnect(&self) -> Result<()> {
        let mut state = self.inner.state()?;
        match state.phase {
            ConnectionPhase::Open => {
                if let Some(tx) = state.outbound.take() {
                    let _ = tx.send(OutboundFrame::Close);
                }
                state.phase = ConnectionPhase::Closed;
                log::info!("[series-link] closing connection");
            }
            ConnectionPhase::Connecting => {
                // Invalidate the in-flight attempt; its open event will be
                // stale and the driver will shut down.
                state.generation += 1;
                state.phase = ConnectionPhase::Disconnected;
                log::info!("[series-link] aborted connection attempt");
            }
            _ => {}
        }
        Ok(())
    }

    /// Request a one-shot snapshot for `selector`.
    ///
    /// Exactly one of the handlers fires when the matching response
    /// arrives, after which the registration is gone: a second identical
    /// inbound response invokes nothing. There is no timeout unless
    /// [`SessionOptions::pending_get_expiry_ms`] is set.
    pub fn get<S, E>(&self, selector: &Selector, on_data: S, on_error: E) -> Result<()>
    where
        S: Fn(&JsonValue) + Send + Sync + 'static,
        E: Fn(&JsonValue) + Send + Sync + 'static,
    {
        let pair = CallbackPair::new(Arc::new(on_data), Arc::new(on_error));
        let mut outbox = Vec::new();
        let mut overflow = None;
        {
            let mut state = self.inner.state()?;
            SessionInner::purge_expired_gets(&mut state, &self.inner.options);
            let created = state.get_registry.register(selector, pair);
            if created {
                overflow = SessionInner::issue_or_defer(
                    &mut state,
                    &self.inner.options,
                    &mut outbox,
                    PendingAction::new(ActionKind::Get, selector.clone()),
                );
            }
        }
        self.emit_outbox(outbox, overflow);
        Ok(())
    }

    /// Register a live subscription for `selector`.
    ///
    /// The handler pair is registered twice: persistently for pushed
    /// `subscription` updates, and once-only for the initial snapshot the
    /// server delivers as a `get` result upon subscribing. Returns a
    /// [`Subscription`] handle whose [`unsubscribe`](Subscription::unsubscribe)
    /// removes exactly this registration.
    pub fn subscribe<S, E>(&self, selector: &Selector, on_data: S, on_error: E) -> Result<Subscription>
    where
        S: Fn(&JsonValue) + Send + Sync + 'static,
        E: Fn(&JsonValue) + Send + Sync + 'static,
    {
        let pair = CallbackPair::new(Arc::new(on_data), Arc::new(on_error));
        let mut outbox = Vec::new();
        let mut overflow = None;
        {
            let mut state = self.inner.state()?;
            // Passive snapshot registration: no request of its own; the
            // subscribe below makes the server push the snapshot.
            state.get_registry.register(selector, pair.clone());
            let created = state.sub_registry.register(selector, pair.clone());
            if created {
                overflow = SessionInner::issue_or_defer(
                    &mut state,
                    &self.inner.options,
                    &mut outbox,
                    PendingAction::new(ActionKind::Subscribe, selector.clone()),
                );
            }
        }
        self.emit_outbox(outbox, overflow);
        Ok(Subscription {
            session: self.clone(),
            selector: selector.clone(),
            pair,
        })
    }

    /// Diagnostic escape hatch: send a raw text frame as-is. Returns
    /// whether the frame was handed to an open connection; nothing is
    /// deferred.
    pub fn send_raw(&self, text: &str) -> Result<bool> {
        let sent = {
            let state = self.inner.state()?;
            SessionInner::send_now(&state, text)
        };
        if sent {
            self.inner.handlers.emit_send(text);
        }
        Ok(sent)
    }

    /// Point-in-time snapshot of both registries, the deferred queue, and
    /// the connection phase.
    pub fn debug_dump(&self) -> Result<SessionDebug> {
        let state = self.inner.state()?;
        let entry_info = |(selector, callbacks, age): (String, usize, std::time::Duration)| {
            RegistryEntryInfo {
                selector,
                callbacks,
                age_ms: age.as_millis() as u64,
            }
        };
        Ok(SessionDebug {
            phase: state.phase.as_str().to_string(),
            pending_gets: state.get_registry.snapshot().into_iter().map(entry_info).collect(),
            subscriptions: state.sub_registry.snapshot().into_iter().map(entry_info).collect(),
            deferred: state.deferred.describe(),
        })
    }

    /// Current connection phase.
    pub fn phase(&self) -> ConnectionPhase {
        self.inner
            .state
            .lock()
            .map(|s| s.phase)
            .unwrap_or(ConnectionPhase::Disconnected)
    }

    /// Whether the connection is open and sends complete synchronously.
    pub fn is_connected(&self) -> bool {
        self.phase() == ConnectionPhase::Open
    }

    fn emit_outbox(&self, outbox: Vec<String>, overflow: Option<ErrorInfo>) {
        for text in &outbox {
            self.inner.handlers.emit_send(text);
        }
        if let Some(error) = overflow {
            self.inner.handlers.emit_error(error);
        }
    }

    #[cfg(test)]
    pub(crate) fn inner(&self) -> &Arc<SessionInner> {
        &self.inner
    }
}

impl Default for SeriesLinkSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`SeriesLinkSession`].
#[derive(Debug, Clone, Default)]
pub struct SeriesLinkSessionBuilder {
    options: SessionOptions,
    timeouts: Option<SeriesLinkTimeouts>,
    handlers: EventHandlers,
}

impl SeriesLinkSessionBuilder {
    fn new() -> Self {
        Self {
            options: SessionOptions::default(),
            timeouts: None,
            handlers: EventHandlers::new(),
        }
    }

    /// Set session lifecycle options.
    pub fn options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Set transport timeouts.
    pub fn timeouts(mut self, timeouts: SeriesLinkTimeouts) -> Self {
        self.timeouts = Some(timeouts);
        self
    }

    /// Set connection lifecycle hooks.
    pub fn event_handlers(mut self, handlers: EventHandlers) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn build(self) -> SeriesLinkSession {
        let capacity = self.options.max_deferred_actions;
        SeriesLinkSession {
            inner: Arc::new(SessionInner {
                state: Mutex::new(SessionState {
                    phase: ConnectionPhase::Disconnected,
                    generation: 0,
                    outbound: None,
                    get_registry: CallbackRegistry::new("get"),
                    sub_registry: CallbackRegistry::new("subscription"),
                    deferred: DeferredQueue::new(capacity),
                }),
                options: self.options,
                timeouts: self.timeouts.unwrap_or_default(),
                handlers: self.handlers,
            }),
        }
    }
}

/// Handle to one live subscription registration.
///
/// Returned by [`SeriesLinkSession::subscribe`]. Dropping the handle does
/// *not* unsubscribe; call [`unsubscribe`](Self::unsubscribe) explicitly.
pub struct Subscription {
    session: SeriesLinkSession,
    selector: Selector,
    pair: CallbackPair,
}

impl Subscription {
    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Remove exactly this handler registration. When it was the last one
    /// for the selector, `{"unsubscribe": [selector]}` is sent, or
    /// deferred until the connection is next ready. A still-pending
    /// snapshot registration for this pair is removed as well, since its
    /// response can no longer arrive.
    pub fn unsubscribe(self) -> Result<()> {
        let mut outbox = Vec::new();
        let mut overflow = None;
        {
            let mut state = self.session.inner.state()?;
            let destroyed = state.sub_registry.unregister(&self.selector, &self.pair);
            state.get_registry.unregister(&self.selector, &self.pair);
            if destroyed {
                overflow = SessionInner::issue_or_defer(
                    &mut state,
                    &self.session.inner.options,
                    &mut outbox,
                    PendingAction::new(ActionKind::Unsubscribe, self.selector.clone()),
                );
            }
        }
        self.session.emit_outbox(outbox, overflow);
        Ok(())
    }
}

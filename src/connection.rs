//! WebSocket connection driver.
//!
//! One background task per connection attempt. The task owns the
//! `tokio-tungstenite` stream and multiplexes, via `tokio::select!`:
//!
//! - outbound frames handed over by the session,
//! - inbound frames routed to the session's event surface,
//! - keepalive pings with a pong timeout.
//!
//! The driver holds no session state: registries, the deferred queue, and
//! the connection phase all live in [`SessionInner`], which also decides
//! whether this driver is still current (a newer `connect()` supersedes it
//! via the generation tag).

use crate::event_handlers::CloseInfo;
use crate::session::{OutboundFrame, SessionInner};
use crate::timeouts::SeriesLinkTimeouts;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant as TokioInstant;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Sleep deadline far enough away to mean "inactive".
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

/// Spawn the driver task for one connection attempt.
pub(crate) fn spawn_driver(inner: Arc<SessionInner>, request: Request, generation: u64) {
    tokio::spawn(async move {
        run_driver(inner, request, generation).await;
    });
}

/// Establish the WebSocket connection, honoring the connect timeout.
async fn establish(
    inner: &SessionInner,
    request: Request,
    generation: u64,
) -> Option<WsStream> {
    let timeout = inner.timeouts.connection_timeout;
    let connect = tokio_tungstenite::connect_async(request);

    let result = if SeriesLinkTimeouts::is_no_timeout(timeout) {
        connect.await
    } else {
        match tokio::time::timeout(timeout, connect).await {
            Ok(result) => result,
            Err(_) => {
                inner.handle_connect_failed(
                    generation,
                    format!("connection timeout ({:?})", timeout),
                    true,
                );
                return None;
            }
        }
    };

    match result {
        Ok((stream, _response)) => Some(stream),
        Err(tokio_tungstenite::tungstenite::Error::Http(response)) => {
            inner.handle_connect_failed(
                generation,
                format!("handshake rejected: HTTP {}", response.status()),
                false,
            );
            None
        }
        Err(e) => {
            inner.handle_connect_failed(generation, format!("connection failed: {}", e), true);
            None
        }
    }
}

/// The driver task: connect, hand readiness to the session, then pump
/// frames until the connection ends or the session supersedes us.
async fn run_driver(inner: Arc<SessionInner>, request: Request, generation: u64) {
    let Some(mut ws) = establish(&inner, request, generation).await else {
        return;
    };

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<OutboundFrame>();
    if !inner.handle_open(generation, outbound_tx) {
        // A newer connect() superseded this attempt while we were in the
        // handshake.
        let _ = ws.close(None).await;
        return;
    }

    // Keepalive bookkeeping: a ping after `keepalive_interval` of idleness,
    // and any frame must arrive within `pong_timeout` of a ping.
    let keepalive = inner.timeouts.keepalive_interval;
    let has_keepalive = !keepalive.is_zero();
    let keepalive_dur = if has_keepalive { keepalive } else { FAR_FUTURE };
    let mut idle_deadline = TokioInstant::now() + keepalive_dur;

    let pong_timeout = inner.timeouts.pong_timeout;
    let has_pong_timeout = has_keepalive && !pong_timeout.is_zero();
    let mut awaiting_pong = false;
    let mut pong_deadline = TokioInstant::now() + FAR_FUTURE;

    // Close reason reported by the server, if any.
    let mut server_close: Option<CloseInfo> = None;

    // Once the session drops its sender the channel only yields `None`;
    // stop polling it so the select loop doesn't spin while the close
    // handshake drains.
    let mut outbound_open = true;

    let close_info = loop {
        let idle_sleep = tokio::time::sleep_until(idle_deadline);
        tokio::pin!(idle_sleep);
        let pong_sleep = tokio::time::sleep_until(pong_deadline);
        tokio::pin!(pong_sleep);

        tokio::select! {
            biased;

            // No frame since our ping: the connection is dead.
            _ = &mut pong_sleep, if has_pong_timeout && awaiting_pong => {
                inner.handle_error(
                    generation,
                    &format!("pong timeout ({:?}) - server unresponsive", pong_timeout),
                    true,
                );
                break CloseInfo::new("pong timeout");
            }

            // Frames handed over by the session.
            frame = outbound_rx.recv(), if outbound_open => {
                match frame {
                    Some(OutboundFrame::Text(text)) => {
                        if let Err(e) = ws.send(Message::Text(text.into())).await {
                            inner.handle_error(generation, &format!("send failed: {}", e), true);
                            break CloseInfo::new(format!("send failed: {}", e));
                        }
                    }
                    Some(OutboundFrame::Close) | None => {
                        // Graceful close (disconnect() or a superseding
                        // connect dropped our sender). Start the close
                        // handshake; the read side drains below.
                        outbound_open = false;
                        let _ = ws.close(None).await;
                    }
                }
            }

            // Idle long enough: send a keepalive ping.
            _ = &mut idle_sleep, if has_keepalive && !awaiting_pong => {
                log::debug!("[series-link] keepalive ping (interval {:?})", keepalive_dur);
                if let Err(e) = ws.send(Message::Ping(Bytes::new())).await {
                    inner.handle_error(generation, &format!("keepalive ping failed: {}", e), true);
                    break CloseInfo::new(format!("keepalive ping failed: {}", e));
                }
                if has_pong_timeout {
                    awaiting_pong = true;
                    pong_deadline = TokioInstant::now() + pong_timeout;
                }
                idle_deadline = TokioInstant::now() + keepalive_dur;
            }

            // Inbound frames.
            frame = ws.next() => {
                // Any frame proves the connection is alive.
                idle_deadline = TokioInstant::now() + keepalive_dur;
                if awaiting_pong {
                    awaiting_pong = false;
                    pong_deadline = TokioInstant::now() + FAR_FUTURE;
                }

                match frame {
                    Some(Ok(Message::Text(text))) => {
                        inner.handle_message(generation, text.as_str());
                    }
                    Some(Ok(Message::Binary(data))) => {
                        // Binary framing is out of scope for this protocol.
                        log::warn!("[series-link] dropping unexpected binary frame ({} bytes)", data.len());
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = ws.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(frame))) => {
                        inner.handle_closing(generation);
                        // Keep reading: the stream ends once the close
                        // handshake completes.
                        server_close = Some(match frame {
                            Some(f) => CloseInfo::with_code(f.reason.to_string(), u16::from(f.code)),
                            None => CloseInfo::new("server closed connection"),
                        });
                    }
                    Some(Ok(Message::Frame(_))) => {}
                    Some(Err(e)) => {
                        inner.handle_error(generation, &e.to_string(), true);
                        break CloseInfo::new(format!("websocket error: {}", e));
                    }
                    None => {
                        break server_close
                            .take()
                            .unwrap_or_else(|| CloseInfo::new("connection closed"));
                    }
                }
            }
        }
    };

    inner.handle_close(generation, close_info);
}

//! Per-connection processing loops.
//!
//! One loop runs per connection, concurrently with all others and with
//! registry operations. The streamed variant pulls frames and reassembles
//! messages itself; the evented variant subscribes a relay and polls only
//! to notice when the connection leaves its active states. Both produce the
//! same externally observable hook sequence for equivalent input.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use portico_core::{CloseStatus, Frame, Message, MessageKind};
use tracing::{debug, warn};

use crate::connection::ConnectionHandle;
use crate::hooks::SocketHandler;
use crate::transport::{Inbound, MessageSink, Transport};

/// How often the evented loop checks whether the connection is still active.
pub(crate) const EVENTED_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Why a processing loop ended. Logged, never propagated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitReason {
    /// The peer closed the connection (or the close handshake completed).
    Closed,
    /// The transport stream ended without a close frame.
    Ended,
    /// The connection's cancellation signal fired.
    Cancelled,
    /// A message exceeded the configured maximum size.
    TooLarge,
    /// The transport reported a failure.
    Failed,
}

fn exceeds_limit(len: usize, max_message_size: usize) -> bool {
    max_message_size > 0 && len > max_message_size
}

fn size_violation_reason(max_message_size: usize) -> String {
    format!("Message too big. Maximum is {max_message_size} bytes.")
}

/// Drive a streamed connection until it ends.
///
/// This is the only place cancellation is observed mid-message: the read is
/// the loop's single suspension point.
pub(crate) async fn run_stream_loop(
    connection: &Arc<ConnectionHandle>,
    handler: &Arc<dyn SocketHandler>,
    max_message_size: usize,
) -> ExitReason {
    let transport = connection.transport().clone();
    let mut buffer: Vec<u8> = Vec::new();
    let mut kind: Option<MessageKind> = None;

    loop {
        let received = tokio::select! {
            () = connection.cancel().cancelled() => return ExitReason::Cancelled,
            received = transport.receive() => received,
        };

        let frame = match received {
            Ok(Some(frame)) => frame,
            Ok(None) => return ExitReason::Ended,
            Err(e) => {
                warn!(conn_id = %connection.id(), error = %e, "transport receive failed");
                return ExitReason::Failed;
            }
        };

        if frame.is_close() {
            if let Err(e) = transport.close(CloseStatus::Normal, "").await {
                debug!(conn_id = %connection.id(), error = %e, "close acknowledgement failed");
            }
            return ExitReason::Closed;
        }

        handler.on_frame(connection, &frame).await;

        if kind.is_none() {
            kind = MessageKind::from_opcode(frame.opcode);
        }
        buffer.extend_from_slice(&frame.payload);

        if exceeds_limit(buffer.len(), max_message_size) {
            let reason = size_violation_reason(max_message_size);
            if let Err(e) = transport.close(CloseStatus::MessageTooBig, &reason).await {
                debug!(conn_id = %connection.id(), error = %e, "size-violation close failed");
            }
            return ExitReason::TooLarge;
        }

        if !frame.fin {
            continue;
        }

        let message = Message {
            kind: kind.take().unwrap_or(MessageKind::Binary),
            payload: Bytes::from(std::mem::take(&mut buffer)),
        };
        handler.on_message(connection, message).await;
    }
}

/// Drive an evented connection until it leaves its active states.
///
/// The transport reassembles frames itself and pushes complete messages to
/// the subscribed [`EventRelay`]; this loop only polls for the moment the
/// connection stops being active so cleanup can run.
pub(crate) async fn run_event_loop(
    connection: &Arc<ConnectionHandle>,
    handler: &Arc<dyn SocketHandler>,
    max_message_size: usize,
) -> ExitReason {
    let relay: Arc<dyn MessageSink> = Arc::new(EventRelay {
        connection: connection.clone(),
        handler: handler.clone(),
        max_message_size,
    });
    if let Err(e) = connection.transport().subscribe(relay).await {
        warn!(conn_id = %connection.id(), error = %e, "transport subscription failed");
        return ExitReason::Failed;
    }

    loop {
        tokio::select! {
            () = connection.cancel().cancelled() => return ExitReason::Cancelled,
            () = tokio::time::sleep(EVENTED_POLL_INTERVAL) => {
                if !connection.state().is_active() {
                    return ExitReason::Closed;
                }
            }
        }
    }
}

/// Sink bridging an evented transport's inbound notifications to the hook
/// surface, applying the same size policy as the streamed loop.
pub(crate) struct EventRelay {
    connection: Arc<ConnectionHandle>,
    handler: Arc<dyn SocketHandler>,
    max_message_size: usize,
}

#[async_trait]
impl MessageSink for EventRelay {
    async fn deliver(&self, inbound: Inbound) {
        let transport = self.connection.transport();
        match inbound {
            Inbound::Close(_) => {
                if let Err(e) = transport.close(CloseStatus::Normal, "").await {
                    debug!(conn_id = %self.connection.id(), error = %e, "close acknowledgement failed");
                }
            }
            Inbound::Message(message) => {
                let frame = Frame {
                    opcode: message.kind.into(),
                    payload: message.payload.clone(),
                    fin: true,
                };
                self.handler.on_frame(&self.connection, &frame).await;

                if exceeds_limit(message.len(), self.max_message_size) {
                    let reason = size_violation_reason(self.max_message_size);
                    if let Err(e) = transport.close(CloseStatus::MessageTooBig, &reason).await {
                        debug!(conn_id = %self.connection.id(), error = %e, "size-violation close failed");
                    }
                    return;
                }

                self.handler.on_message(&self.connection, message).await;
            }
        }
    }
}

//! Streamed transport: adapter over an axum WebSocket.
//!
//! The socket is split; outbound traffic is funneled through a queue task
//! that also emits keep-alive pings, while [`StreamTransport::receive`] is
//! the single blocking suspension point the connection processor awaits.

use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{CloseFrame, Message as WsMessage, Utf8Bytes, WebSocket};
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use portico_core::{CloseStatus, Frame, Payload, SocketState, StateCell};
use tokio::sync::{Mutex, mpsc};
use tokio::time;
use tokio_util::sync::CancellationToken;

use super::{Transport, TransportKind};
use crate::error::TransportError;

/// Transport over an upgraded axum WebSocket.
pub struct StreamTransport {
    state: StateCell,
    outbound: mpsc::Sender<WsMessage>,
    inbound: Mutex<SplitStream<WebSocket>>,
    halt: CancellationToken,
}

impl StreamTransport {
    /// Wrap an upgraded socket.
    ///
    /// `keep_alive` enables periodic Ping frames (`None` or zero disables
    /// them); `buffer` is the outbound queue capacity.
    pub fn new(socket: WebSocket, keep_alive: Option<Duration>, buffer: usize) -> Self {
        let (sink, stream) = socket.split();
        let (outbound, queue) = mpsc::channel(buffer.max(1));
        let halt = CancellationToken::new();
        let keep_alive = keep_alive.filter(|d| !d.is_zero());

        let task_halt = halt.clone();
        let _ = tokio::spawn(async move {
            run_outbound(sink, queue, keep_alive, task_halt).await;
        });

        Self {
            state: StateCell::new(SocketState::Open),
            outbound,
            inbound: Mutex::new(stream),
            halt,
        }
    }
}

#[async_trait]
impl Transport for StreamTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Streamed
    }

    fn state(&self) -> SocketState {
        self.state.get()
    }

    async fn receive(&self) -> Result<Option<Frame>, TransportError> {
        let mut stream = self.inbound.lock().await;
        loop {
            let item = tokio::select! {
                () = self.halt.cancelled() => return Ok(None),
                item = stream.next() => item,
            };
            match item {
                None => {
                    let _ = self.state.advance(SocketState::Closed);
                    return Ok(None);
                }
                Some(Err(e)) => {
                    let _ = self.state.advance(SocketState::Closed);
                    return Err(TransportError::Protocol(e.to_string()));
                }
                Some(Ok(message)) => match message {
                    WsMessage::Text(text) => {
                        return Ok(Some(Frame::text(Bytes::copy_from_slice(text.as_bytes()))));
                    }
                    WsMessage::Binary(data) => return Ok(Some(Frame::binary(data))),
                    // axum answers pings itself; pongs need no bookkeeping here
                    WsMessage::Ping(_) | WsMessage::Pong(_) => {}
                    WsMessage::Close(_) => {
                        let was_close_sent = self.state.get() == SocketState::CloseSent;
                        let _ = self.state.advance(SocketState::CloseReceived);
                        if was_close_sent {
                            let _ = self.state.advance(SocketState::Closed);
                        }
                        return Ok(Some(Frame::close()));
                    }
                },
            }
        }
    }

    async fn send(&self, payload: Payload) -> Result<(), TransportError> {
        let state = self.state.get();
        if !state.is_open() {
            return Err(TransportError::NotOpen { state });
        }
        let message = match payload {
            Payload::Text(text) => WsMessage::Text(Utf8Bytes::from(text)),
            Payload::Binary(data) => WsMessage::Binary(data),
        };
        self.outbound
            .send(message)
            .await
            .map_err(|_| TransportError::ChannelClosed)
    }

    async fn close(&self, status: CloseStatus, reason: &str) -> Result<(), TransportError> {
        let current = self.state.get();
        if matches!(current, SocketState::CloseSent | SocketState::Closed) {
            return Ok(());
        }
        let frame = CloseFrame {
            code: status.code(),
            reason: Utf8Bytes::from(reason.to_owned()),
        };
        self.outbound
            .send(WsMessage::Close(Some(frame)))
            .await
            .map_err(|_| TransportError::ChannelClosed)?;
        let _ = self.state.advance(SocketState::CloseSent);
        if current == SocketState::CloseReceived {
            let _ = self.state.advance(SocketState::Closed);
        }
        Ok(())
    }

    fn abort(&self) {
        self.halt.cancel();
        let _ = self.state.advance(SocketState::Closed);
    }
}

async fn run_outbound(
    mut sink: SplitSink<WebSocket, WsMessage>,
    mut queue: mpsc::Receiver<WsMessage>,
    keep_alive: Option<Duration>,
    halt: CancellationToken,
) {
    let mut ping = keep_alive.map(time::interval);
    if let Some(interval) = ping.as_mut() {
        // the first tick of a fresh interval completes immediately
        let _ = interval.tick().await;
    }

    loop {
        tokio::select! {
            // queue first: frames already enqueued (close frames above all)
            // must flush even when the halt signal is already set
            biased;
            queued = queue.recv() => match queued {
                Some(message) => {
                    let closing = matches!(message, WsMessage::Close(_));
                    if sink.send(message).await.is_err() {
                        break;
                    }
                    if closing {
                        // nothing may follow a close frame
                        break;
                    }
                }
                None => break,
            },
            () = next_ping(&mut ping) => {
                if sink.send(WsMessage::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
            () = halt.cancelled() => break,
        }
    }
}

/// Await the next keep-alive tick; pends forever when pings are disabled.
async fn next_ping(ping: &mut Option<time::Interval>) {
    match ping.as_mut() {
        Some(interval) => {
            let _ = interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

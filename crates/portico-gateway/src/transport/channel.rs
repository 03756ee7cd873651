//! Evented transport: an in-process channel pair.
//!
//! For connections whose transport does not expose a blocking-read
//! primitive. The peer half pushes complete, already-reassembled messages;
//! the transport relays them to whatever sink the connection processor
//! subscribed. Traffic sent by the gateway surfaces on the peer's receiver.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use portico_core::{CloseStatus, Message, MessageKind, Payload, SocketState, StateCell};
use tokio::sync::mpsc;
use tracing::warn;

use super::{Inbound, MessageSink, Transport, TransportKind};
use crate::error::TransportError;

/// What the gateway side emitted, as observed by the peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PeerEvent {
    /// A payload sent over the connection.
    Payload(Payload),
    /// The gateway initiated or acknowledged a close handshake.
    Close {
        /// Close status code.
        status: CloseStatus,
        /// Human-readable close reason.
        reason: String,
    },
}

/// Evented transport half held by the gateway.
pub struct ChannelTransport {
    state: StateCell,
    sink: Mutex<Option<Arc<dyn MessageSink>>>,
    outbound: mpsc::Sender<PeerEvent>,
}

impl ChannelTransport {
    /// Create a connected transport/peer pair.
    ///
    /// `buffer` bounds the gateway-to-peer queue.
    pub fn pair(buffer: usize) -> (Arc<Self>, ChannelPeer) {
        let (outbound, events) = mpsc::channel(buffer.max(1));
        let transport = Arc::new(Self {
            state: StateCell::new(SocketState::Open),
            sink: Mutex::new(None),
            outbound,
        });
        let peer = ChannelPeer {
            transport: transport.clone(),
            events,
        };
        (transport, peer)
    }

    async fn deliver(&self, inbound: Inbound) {
        if matches!(inbound, Inbound::Close(_)) {
            let was_close_sent = self.state.get() == SocketState::CloseSent;
            let _ = self.state.advance(SocketState::CloseReceived);
            if was_close_sent {
                let _ = self.state.advance(SocketState::Closed);
            }
        }
        let sink = self.sink.lock().clone();
        match sink {
            Some(sink) => sink.deliver(inbound).await,
            None => warn!("inbound dropped: no subscriber registered"),
        }
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Evented
    }

    fn state(&self) -> SocketState {
        self.state.get()
    }

    async fn subscribe(&self, sink: Arc<dyn MessageSink>) -> Result<(), TransportError> {
        let _ = self.sink.lock().replace(sink);
        Ok(())
    }

    async fn send(&self, payload: Payload) -> Result<(), TransportError> {
        let state = self.state.get();
        if !state.is_open() {
            return Err(TransportError::NotOpen { state });
        }
        self.outbound
            .send(PeerEvent::Payload(payload))
            .await
            .map_err(|_| TransportError::ChannelClosed)
    }

    async fn close(&self, status: CloseStatus, reason: &str) -> Result<(), TransportError> {
        let current = self.state.get();
        if matches!(current, SocketState::CloseSent | SocketState::Closed) {
            return Ok(());
        }
        self.outbound
            .send(PeerEvent::Close {
                status,
                reason: reason.to_owned(),
            })
            .await
            .map_err(|_| TransportError::ChannelClosed)?;
        let _ = self.state.advance(SocketState::CloseSent);
        if current == SocketState::CloseReceived {
            let _ = self.state.advance(SocketState::Closed);
        }
        Ok(())
    }

    fn abort(&self) {
        let _ = self.state.advance(SocketState::Closed);
        let _ = self.sink.lock().take();
    }
}

/// Remote half of a [`ChannelTransport`] pair.
pub struct ChannelPeer {
    transport: Arc<ChannelTransport>,
    events: mpsc::Receiver<PeerEvent>,
}

impl ChannelPeer {
    /// Push a complete text message toward the gateway.
    pub async fn send_text(&self, text: &str) {
        self.send(Message {
            kind: MessageKind::Text,
            payload: Bytes::copy_from_slice(text.as_bytes()),
        })
        .await;
    }

    /// Push a complete binary message toward the gateway.
    pub async fn send_binary(&self, data: impl Into<Bytes>) {
        self.send(Message {
            kind: MessageKind::Binary,
            payload: data.into(),
        })
        .await;
    }

    /// Push a complete message toward the gateway.
    pub async fn send(&self, message: Message) {
        self.transport.deliver(Inbound::Message(message)).await;
    }

    /// Signal a peer-initiated close.
    pub async fn close(&self, status: Option<CloseStatus>) {
        self.transport.deliver(Inbound::Close(status)).await;
    }

    /// Receive the next event the gateway emitted.
    ///
    /// `None` once the gateway side is gone.
    pub async fn recv(&mut self) -> Option<PeerEvent> {
        self.events.recv().await
    }

    /// Protocol state as seen by the shared transport.
    pub fn state(&self) -> SocketState {
        self.transport.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as SyncMutex;

    struct Recorder(SyncMutex<Vec<Inbound>>);

    #[async_trait]
    impl MessageSink for Recorder {
        async fn deliver(&self, inbound: Inbound) {
            self.0.lock().push(inbound);
        }
    }

    fn recorder() -> Arc<Recorder> {
        Arc::new(Recorder(SyncMutex::new(Vec::new())))
    }

    #[tokio::test]
    async fn starts_open() {
        let (transport, peer) = ChannelTransport::pair(4);
        assert_eq!(transport.state(), SocketState::Open);
        assert_eq!(peer.state(), SocketState::Open);
        assert_eq!(transport.kind(), TransportKind::Evented);
    }

    #[tokio::test]
    async fn inbound_reaches_subscriber() {
        let (transport, peer) = ChannelTransport::pair(4);
        let sink = recorder();
        transport.subscribe(sink.clone()).await.unwrap();

        peer.send_text("hello").await;

        let seen = sink.0.lock();
        assert_eq!(seen.len(), 1);
        match &seen[0] {
            Inbound::Message(m) => {
                assert_eq!(m.kind, MessageKind::Text);
                assert_eq!(m.text(), Some("hello"));
            }
            Inbound::Close(_) => panic!("expected a message"),
        }
    }

    #[tokio::test]
    async fn inbound_without_subscriber_is_dropped() {
        let (_transport, peer) = ChannelTransport::pair(4);
        // must not panic or block
        peer.send_text("lost").await;
    }

    #[tokio::test]
    async fn outbound_surfaces_on_peer() {
        let (transport, mut peer) = ChannelTransport::pair(4);
        transport.send(Payload::Text("hi".into())).await.unwrap();

        let event = peer.recv().await.unwrap();
        assert_eq!(event, PeerEvent::Payload(Payload::Text("hi".into())));
    }

    #[tokio::test]
    async fn send_fails_after_peer_dropped() {
        let (transport, peer) = ChannelTransport::pair(4);
        drop(peer);
        let err = transport.send(Payload::Text("hi".into())).await.unwrap_err();
        assert!(matches!(err, TransportError::ChannelClosed));
    }

    #[tokio::test]
    async fn send_fails_when_not_open() {
        let (transport, _peer) = ChannelTransport::pair(4);
        transport.abort();
        let err = transport.send(Payload::Text("hi".into())).await.unwrap_err();
        assert!(matches!(
            err,
            TransportError::NotOpen {
                state: SocketState::Closed
            }
        ));
    }

    #[tokio::test]
    async fn close_reaches_peer_and_advances_state() {
        let (transport, mut peer) = ChannelTransport::pair(4);
        transport.close(CloseStatus::Normal, "bye").await.unwrap();

        assert_eq!(transport.state(), SocketState::CloseSent);
        let event = peer.recv().await.unwrap();
        assert_eq!(
            event,
            PeerEvent::Close {
                status: CloseStatus::Normal,
                reason: "bye".into()
            }
        );
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let (transport, mut peer) = ChannelTransport::pair(4);
        transport.close(CloseStatus::Normal, "").await.unwrap();
        transport.close(CloseStatus::Normal, "").await.unwrap();

        assert!(matches!(
            peer.events.try_recv(),
            Ok(PeerEvent::Close { .. })
        ));
        // the second close enqueued nothing
        assert!(peer.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn peer_close_then_ack_completes_handshake() {
        let (transport, peer) = ChannelTransport::pair(4);
        peer.close(Some(CloseStatus::Normal)).await;
        assert_eq!(transport.state(), SocketState::CloseReceived);

        transport.close(CloseStatus::Normal, "").await.unwrap();
        assert_eq!(transport.state(), SocketState::Closed);
    }

    #[tokio::test]
    async fn our_close_then_peer_close_completes_handshake() {
        let (transport, peer) = ChannelTransport::pair(4);
        transport.close(CloseStatus::Normal, "").await.unwrap();
        assert_eq!(transport.state(), SocketState::CloseSent);

        peer.close(Some(CloseStatus::Normal)).await;
        assert_eq!(transport.state(), SocketState::Closed);
    }

    #[tokio::test]
    async fn abort_is_terminal() {
        let (transport, _peer) = ChannelTransport::pair(4);
        transport.abort();
        assert_eq!(transport.state(), SocketState::Closed);
        // idempotent
        transport.abort();
        assert_eq!(transport.state(), SocketState::Closed);
    }
}

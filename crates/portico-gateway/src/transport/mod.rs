//! Transport abstraction over the two connection back-ends.
//!
//! A transport exposes the capability set `{receive-or-subscribe, send,
//! close, state}` behind one object-safe trait. The streamed back-end
//! ([`stream::StreamTransport`]) delivers frames through a cancellable
//! blocking read; the evented back-end ([`channel::ChannelTransport`])
//! reassembles messages internally and pushes them to a subscribed sink.
//! The connection processor dispatches on [`Transport::kind`] exactly once.

pub mod channel;
pub mod stream;

use std::sync::Arc;

use async_trait::async_trait;
use portico_core::{CloseStatus, Frame, Message, Payload, SocketState};

use crate::error::TransportError;

/// Tag distinguishing the two back-end implementations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportKind {
    /// Frames are pulled via [`Transport::receive`].
    Streamed,
    /// Complete messages are pushed to a subscribed [`MessageSink`].
    Evented,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Streamed => "streamed",
            Self::Evented => "evented",
        })
    }
}

/// An inbound notification delivered by an evented transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Inbound {
    /// A complete, already-reassembled message.
    Message(Message),
    /// The peer requested connection close.
    Close(Option<CloseStatus>),
}

/// Receiver of inbound notifications from an evented transport.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Handle one inbound notification.
    async fn deliver(&self, inbound: Inbound);
}

/// One accepted bidirectional connection.
///
/// Implementations are shared behind `Arc` between the connection processor
/// and the send/close paths; every method takes `&self`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Which back-end this is.
    fn kind(&self) -> TransportKind;

    /// Current protocol state.
    fn state(&self) -> SocketState;

    /// Await the next frame.
    ///
    /// Streamed back-ends only. `Ok(None)` means the peer ended the stream
    /// without a close frame.
    async fn receive(&self) -> Result<Option<Frame>, TransportError> {
        Err(TransportError::Unsupported {
            kind: self.kind(),
            op: "receive",
        })
    }

    /// Register the sink that inbound messages are relayed to.
    ///
    /// Evented back-ends only.
    async fn subscribe(&self, _sink: Arc<dyn MessageSink>) -> Result<(), TransportError> {
        Err(TransportError::Unsupported {
            kind: self.kind(),
            op: "subscribe",
        })
    }

    /// Send a payload to the peer.
    async fn send(&self, payload: Payload) -> Result<(), TransportError>;

    /// Initiate or acknowledge the close handshake.
    ///
    /// Idempotent: closing an already closing/closed connection is `Ok`.
    async fn close(&self, status: CloseStatus, reason: &str) -> Result<(), TransportError>;

    /// Synchronous teardown: mark the connection closed and halt internal
    /// tasks. Called exactly once, from handle release.
    fn abort(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoCapability;

    #[async_trait]
    impl Transport for NoCapability {
        fn kind(&self) -> TransportKind {
            TransportKind::Evented
        }
        fn state(&self) -> SocketState {
            SocketState::Open
        }
        async fn send(&self, _payload: Payload) -> Result<(), TransportError> {
            Ok(())
        }
        async fn close(&self, _status: CloseStatus, _reason: &str) -> Result<(), TransportError> {
            Ok(())
        }
        fn abort(&self) {}
    }

    struct NullSink;

    #[async_trait]
    impl MessageSink for NullSink {
        async fn deliver(&self, _inbound: Inbound) {}
    }

    #[tokio::test]
    async fn receive_default_is_unsupported() {
        let transport = NoCapability;
        let err = transport.receive().await.unwrap_err();
        assert!(matches!(
            err,
            TransportError::Unsupported { op: "receive", .. }
        ));
    }

    #[tokio::test]
    async fn subscribe_default_is_unsupported() {
        let transport = NoCapability;
        let err = transport.subscribe(Arc::new(NullSink)).await.unwrap_err();
        assert!(matches!(
            err,
            TransportError::Unsupported {
                op: "subscribe",
                ..
            }
        ));
    }

    #[test]
    fn kind_display() {
        assert_eq!(TransportKind::Streamed.to_string(), "streamed");
        assert_eq!(TransportKind::Evented.to_string(), "evented");
    }
}

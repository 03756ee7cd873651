//! Gateway error types.
//!
//! Transport faults never escape the connection loops — they are logged and
//! absorbed there. `ConfigError` is the only error surfaced to the host, at
//! gateway construction time.

use portico_core::SocketState;
use thiserror::Error;

use crate::transport::TransportKind;

/// Failure raised by a transport back-end.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The socket is not in a state that allows the operation.
    #[error("socket is not open (state: {state})")]
    NotOpen {
        /// State observed at the time of the call.
        state: SocketState,
    },

    /// The transport's internal channel is gone (peer task exited).
    #[error("transport channel closed")]
    ChannelClosed,

    /// The back-end does not implement this capability.
    #[error("{op} is not supported by a {kind} transport")]
    Unsupported {
        /// Back-end kind.
        kind: TransportKind,
        /// The capability that was requested.
        op: &'static str,
    },

    /// Underlying protocol or I/O failure.
    #[error("websocket transport failed: {0}")]
    Protocol(String),
}

/// Invalid gateway configuration, reported at construction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A configured subprotocol is not a valid RFC 2616 token.
    #[error("invalid subprotocol token: {0:?}")]
    InvalidProtocolToken(String),

    /// The same subprotocol appears twice in the configured list.
    #[error("duplicate subprotocol: {0:?}")]
    DuplicateProtocol(String),
}

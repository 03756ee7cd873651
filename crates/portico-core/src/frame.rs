//! Frames, messages, and close status codes.
//!
//! A `Frame` is the smallest unit delivered by a transport; a `Message` is
//! one or more frame payloads concatenated up to the final frame. Frames are
//! handed to the frame hook and accumulated, never retained beyond that.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Kind tag carried by a single frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Opcode {
    /// UTF-8 text data.
    Text,
    /// Arbitrary binary data.
    Binary,
    /// Close handshake frame.
    Close,
}

/// The smallest unit delivered by the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Frame kind.
    pub opcode: Opcode,
    /// Frame payload bytes.
    pub payload: Bytes,
    /// Whether this frame completes a message.
    pub fin: bool,
}

impl Frame {
    /// A final text frame.
    pub fn text(payload: impl Into<Bytes>) -> Self {
        Self {
            opcode: Opcode::Text,
            payload: payload.into(),
            fin: true,
        }
    }

    /// A final binary frame.
    pub fn binary(payload: impl Into<Bytes>) -> Self {
        Self {
            opcode: Opcode::Binary,
            payload: payload.into(),
            fin: true,
        }
    }

    /// A close frame.
    pub fn close() -> Self {
        Self {
            opcode: Opcode::Close,
            payload: Bytes::new(),
            fin: true,
        }
    }

    /// A non-final continuation of `self`'s message.
    #[must_use]
    pub fn partial(mut self) -> Self {
        self.fin = false;
        self
    }

    /// Whether this frame signals connection close.
    pub fn is_close(&self) -> bool {
        self.opcode == Opcode::Close
    }
}

/// Kind of a complete message (a message is never a close frame).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// UTF-8 text.
    Text,
    /// Binary.
    Binary,
}

impl MessageKind {
    /// Message kind for a data frame opcode; `None` for `Close`.
    pub fn from_opcode(opcode: Opcode) -> Option<Self> {
        match opcode {
            Opcode::Text => Some(Self::Text),
            Opcode::Binary => Some(Self::Binary),
            Opcode::Close => None,
        }
    }
}

impl From<MessageKind> for Opcode {
    fn from(kind: MessageKind) -> Self {
        match kind {
            MessageKind::Text => Self::Text,
            MessageKind::Binary => Self::Binary,
        }
    }
}

/// A complete application-level unit of data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    /// Message kind, taken from the first frame.
    pub kind: MessageKind,
    /// Concatenated frame payloads in arrival order.
    pub payload: Bytes,
}

impl Message {
    /// The payload as UTF-8 text, if it is valid UTF-8.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// An outbound payload handed to a transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload {
    /// Sent as a text frame.
    Text(String),
    /// Sent as a binary frame.
    Binary(Bytes),
}

impl Payload {
    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        match self {
            Self::Text(s) => s.len(),
            Self::Binary(b) => b.len(),
        }
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<Bytes> for Payload {
    fn from(b: Bytes) -> Self {
        Self::Binary(b)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(b: Vec<u8>) -> Self {
        Self::Binary(Bytes::from(b))
    }
}

/// Close handshake status code (RFC 6455 §7.4).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseStatus {
    /// 1000 — normal closure.
    Normal,
    /// 1001 — endpoint going away.
    GoingAway,
    /// 1002 — protocol error.
    ProtocolError,
    /// 1007 — payload inconsistent with message type.
    InvalidPayload,
    /// 1008 — policy violation.
    PolicyViolation,
    /// 1009 — message too big to process.
    MessageTooBig,
    /// 1011 — unexpected server condition.
    InternalError,
    /// Any other registered code.
    Other(u16),
}

impl CloseStatus {
    /// The numeric close code.
    pub fn code(self) -> u16 {
        match self {
            Self::Normal => 1000,
            Self::GoingAway => 1001,
            Self::ProtocolError => 1002,
            Self::InvalidPayload => 1007,
            Self::PolicyViolation => 1008,
            Self::MessageTooBig => 1009,
            Self::InternalError => 1011,
            Self::Other(code) => code,
        }
    }

    /// Status for a numeric close code.
    pub fn from_code(code: u16) -> Self {
        match code {
            1000 => Self::Normal,
            1001 => Self::GoingAway,
            1002 => Self::ProtocolError,
            1007 => Self::InvalidPayload,
            1008 => Self::PolicyViolation,
            1009 => Self::MessageTooBig,
            1011 => Self::InternalError,
            other => Self::Other(other),
        }
    }
}

impl std::fmt::Display for CloseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

//! # portico-core
//!
//! Foundation types for the portico WebSocket gateway.
//!
//! This crate provides the shared vocabulary the gateway crate builds on:
//!
//! - **Frames and messages**: `Frame` (transport unit), `Message` (complete
//!   application unit), `Payload` (outbound text/binary), `CloseStatus`
//! - **Protocol state**: `SocketState` with a monotonic atomic `StateCell`
//! - **Negotiation**: pure subprotocol selection and header parsing
//! - **Text encoding**: codec applied to outbound string payloads
//! - **Branded IDs**: `ConnectionId` as a UUID v7 newtype
//!
//! Everything here is synchronous and I/O-free.

#![deny(unsafe_code)]

pub mod encoding;
pub mod frame;
pub mod ids;
pub mod negotiate;
pub mod state;

pub use encoding::TextEncoding;
pub use frame::{CloseStatus, Frame, Message, MessageKind, Opcode, Payload};
pub use ids::ConnectionId;
pub use negotiate::Negotiation;
pub use state::{SocketState, StateCell};

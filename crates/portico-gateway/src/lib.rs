//! # portico-gateway
//!
//! Embeddable WebSocket upgrade-and-messaging layer for an axum host.
//!
//! - **Upgrade negotiation**: subprotocol selection in client-preference
//!   order; rejects carry the supported-protocol headers
//! - **Connection registry**: reader/writer-locked, insertion-ordered, with
//!   opportunistic and watchdog-driven purging of dead entries
//! - **Connection processors**: frame reassembly with size limits over two
//!   transport back-ends (streamed axum sockets, evented channel pairs)
//!   behind one contract
//! - **Broadcast / unicast**: snapshot-then-fan-out, best-effort sends
//! - **Lifecycle**: cancellation-aware teardown with an idempotent dispose
//!
//! The host owns the HTTP listener, routing, and shutdown signal; the
//! gateway plugs in as a route (see [`WebSocketGateway::router`]) or via
//! [`WebSocketGateway::attach`] for non-HTTP transports.

#![deny(unsafe_code)]

pub mod config;
pub mod connection;
pub mod error;
pub mod gateway;
pub mod hooks;
pub mod processor;
pub mod registry;
pub mod transport;
pub mod upgrade;
pub mod watchdog;

pub use config::GatewayConfig;
pub use connection::ConnectionHandle;
pub use error::{ConfigError, TransportError};
pub use gateway::WebSocketGateway;
pub use hooks::SocketHandler;
pub use registry::{AddReport, ConnectionRegistry, PurgeReport};
pub use transport::channel::{ChannelPeer, ChannelTransport, PeerEvent};
pub use transport::stream::StreamTransport;
pub use transport::{Inbound, MessageSink, Transport, TransportKind};

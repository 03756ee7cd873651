//! Callback surface invoked from the connection processors.

use std::sync::Arc;

use async_trait::async_trait;
use portico_core::{Frame, Message};

use crate::connection::ConnectionHandle;

/// Hooks a host implements to observe and react to socket traffic.
///
/// All hooks run synchronously within the owning connection's processing
/// loop: within one connection they are invoked strictly in arrival order,
/// and a slow hook backpressures only that connection.
#[async_trait]
pub trait SocketHandler: Send + Sync {
    /// A complete message arrived (all frames up to the final one,
    /// concatenated in arrival order).
    async fn on_message(&self, connection: &Arc<ConnectionHandle>, message: Message);

    /// A raw frame arrived, final or not. Observation only — the frame is
    /// accumulated into the message regardless.
    async fn on_frame(&self, _connection: &Arc<ConnectionHandle>, _frame: &Frame) {}

    /// A connection was accepted and added to the registry.
    async fn on_client_connected(&self, _connection: &Arc<ConnectionHandle>) {}

    /// A connection was removed, for any reason. Fired exactly once per
    /// connection.
    async fn on_client_disconnected(&self, _connection: &Arc<ConnectionHandle>) {}
}

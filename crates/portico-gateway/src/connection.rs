//! Per-connection handle shared between the registry, the processor, and
//! the send/close paths.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use portico_core::{ConnectionId, SocketState};
use tokio_util::sync::CancellationToken;

use crate::transport::{Transport, TransportKind};

/// One accepted WebSocket connection.
///
/// A handle appears in the registry at most once and, once removed, is never
/// re-added. Its transport resources are released exactly once — whichever
/// of the removal paths (loop exit, explicit close, purge, disposal) gets
/// there first wins the release.
pub struct ConnectionHandle {
    id: ConnectionId,
    transport: Arc<dyn Transport>,
    subprotocol: Option<String>,
    requested_protocols: Vec<String>,
    cancel: CancellationToken,
    connected_at: Instant,
    released: AtomicBool,
}

impl ConnectionHandle {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        subprotocol: Option<String>,
        requested_protocols: Vec<String>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id: ConnectionId::new(),
            transport,
            subprotocol,
            requested_protocols,
            cancel,
            connected_at: Instant::now(),
            released: AtomicBool::new(false),
        }
    }

    /// Unique connection ID (UUID v7, ordered by acceptance time).
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// The underlying transport.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Which transport back-end this connection runs on.
    pub fn kind(&self) -> TransportKind {
        self.transport.kind()
    }

    /// Negotiated subprotocol, if any.
    pub fn subprotocol(&self) -> Option<&str> {
        self.subprotocol.as_deref()
    }

    /// Every subprotocol the client requested, in client order.
    pub fn requested_protocols(&self) -> &[String] {
        &self.requested_protocols
    }

    /// Current protocol state.
    pub fn state(&self) -> SocketState {
        self.transport.state()
    }

    /// Whether the connection is fully open.
    pub fn is_open(&self) -> bool {
        self.state().is_open()
    }

    /// Cancellation signal for this connection (child of the gateway's).
    pub fn cancel(&self) -> &CancellationToken {
        &self.cancel
    }

    /// How long this connection has been accepted.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Whether the transport resources have been released.
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Release the transport resources.
    ///
    /// Returns `true` for exactly one caller; all later calls are no-ops.
    pub(crate) fn release(&self) -> bool {
        if self
            .released
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.cancel.cancel();
        self.transport.abort();
        true
    }
}

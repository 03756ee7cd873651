//! Gateway composition: upgrade handling, connection serving, send and
//! broadcast, and lifecycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use axum::Router;
use axum::body::Body;
use axum::extract::{State, WebSocketUpgrade};
use axum::http::{HeaderMap, Response};
use axum::response::IntoResponse;
use axum::routing::get;
use bytes::Bytes;
use futures::future::join_all;
use metrics::{counter, gauge, histogram};
use parking_lot::Mutex;
use portico_core::negotiate::{Negotiation, negotiate};
use portico_core::{CloseStatus, Payload};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::GatewayConfig;
use crate::connection::ConnectionHandle;
use crate::error::ConfigError;
use crate::hooks::SocketHandler;
use crate::processor::{run_event_loop, run_stream_loop};
use crate::registry::ConnectionRegistry;
use crate::transport::stream::StreamTransport;
use crate::transport::{Transport, TransportKind};
use crate::upgrade::{reject_response, requested_protocols};
use crate::watchdog::run_watchdog;

/// The WebSocket endpoint of an embedding HTTP server.
///
/// Owns the configuration, the connection registry, and disposal. Handles
/// the HTTP upgrade (negotiating a subprotocol), runs one processing loop
/// per accepted connection, and offers broadcast/unicast send over registry
/// snapshots.
pub struct WebSocketGateway {
    config: GatewayConfig,
    handler: Arc<dyn SocketHandler>,
    registry: ConnectionRegistry,
    cancel: CancellationToken,
    disposing: AtomicBool,
    watchdog: Mutex<Option<JoinHandle<()>>>,
    weak_self: Weak<Self>,
}

impl WebSocketGateway {
    /// Create a gateway with its own root cancellation signal.
    pub fn new(
        config: GatewayConfig,
        handler: Arc<dyn SocketHandler>,
    ) -> Result<Arc<Self>, ConfigError> {
        Self::build(config, handler, CancellationToken::new())
    }

    /// Create a gateway whose cancellation signal is a child of the host
    /// server's shutdown token.
    pub fn with_shutdown(
        config: GatewayConfig,
        handler: Arc<dyn SocketHandler>,
        shutdown: &CancellationToken,
    ) -> Result<Arc<Self>, ConfigError> {
        Self::build(config, handler, shutdown.child_token())
    }

    fn build(
        config: GatewayConfig,
        handler: Arc<dyn SocketHandler>,
        cancel: CancellationToken,
    ) -> Result<Arc<Self>, ConfigError> {
        config.validate()?;
        Ok(Arc::new_cyclic(|weak_self| Self {
            config,
            handler,
            registry: ConnectionRegistry::new(),
            cancel,
            disposing: AtomicBool::new(false),
            watchdog: Mutex::new(None),
            weak_self: weak_self.clone(),
        }))
    }

    /// The gateway configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Launch background work. Currently: the connection watchdog, if
    /// enabled.
    pub fn start(&self) {
        if self.config.enable_watchdog {
            let task = tokio::spawn(run_watchdog(self.weak_self.clone(), self.cancel.clone()));
            let _ = self.watchdog.lock().replace(task);
        }
    }

    /// Whether disposal has begun.
    pub fn is_disposing(&self) -> bool {
        self.disposing.load(Ordering::Acquire)
    }

    /// Point-in-time snapshot of the live connections.
    pub fn connections(&self) -> Vec<Arc<ConnectionHandle>> {
        self.registry.snapshot()
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    #[cfg(test)]
    pub(crate) fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// A router exposing this gateway at `path`, for merging into the
    /// host's application router.
    pub fn router(self: Arc<Self>, path: &str) -> Router {
        Router::new()
            .route(path, get(upgrade_handler))
            .with_state(self)
    }

    /// Handle an upgrade-eligible request.
    ///
    /// Negotiates a subprotocol against the client's
    /// `Sec-WebSocket-Protocol` headers; a mismatch yields a body-less 400
    /// carrying the supported protocols, an accept performs the transport
    /// upgrade and serves the connection until it ends.
    pub fn handle_upgrade(
        self: Arc<Self>,
        ws: WebSocketUpgrade,
        headers: &HeaderMap,
    ) -> Response<Body> {
        let requested = requested_protocols(headers);
        match negotiate(&self.config.protocols, &requested) {
            Negotiation::Reject => {
                debug!(
                    requested = ?requested,
                    "rejecting websocket: no subprotocol was accepted"
                );
                reject_response(&self.config.protocols)
            }
            Negotiation::Accept(subprotocol) => {
                debug!(
                    subprotocol = subprotocol.as_deref().unwrap_or("<none>"),
                    "accepting websocket"
                );
                let ws = match subprotocol.clone() {
                    Some(protocol) => ws.protocols([protocol]),
                    None => ws,
                };
                let keep_alive = self.config.keep_alive_interval();
                let buffer = self.config.receive_buffer_size;
                ws.on_upgrade(move |socket| async move {
                    let transport: Arc<dyn Transport> =
                        Arc::new(StreamTransport::new(socket, keep_alive, buffer));
                    self.attach(transport, subprotocol, requested).await;
                })
                .into_response()
            }
        }
    }

    /// Serve a connection over an already-established transport.
    ///
    /// This is the entry point for back-ends that do not arrive through the
    /// HTTP upgrade (for example [`ChannelTransport`] pairs). Returns once
    /// the connection has ended and been removed.
    ///
    /// [`ChannelTransport`]: crate::transport::channel::ChannelTransport
    pub async fn attach(
        &self,
        transport: Arc<dyn Transport>,
        subprotocol: Option<String>,
        requested_protocols: Vec<String>,
    ) {
        let connection = Arc::new(ConnectionHandle::new(
            transport,
            subprotocol,
            requested_protocols,
            self.cancel.child_token(),
        ));
        self.serve(connection).await;
    }

    #[instrument(skip_all, fields(conn_id = %connection.id()))]
    async fn serve(&self, connection: Arc<ConnectionHandle>) {
        let report = self.registry.add(connection.clone());
        info!(connections = report.connections, "socket accepted");
        counter!("ws_connections_total").increment(1);
        gauge!("ws_connections_active").increment(1.0);
        for evicted in &report.evicted {
            self.finish_disconnect(evicted).await;
        }

        self.handler.on_client_connected(&connection).await;

        let exit = match connection.kind() {
            TransportKind::Streamed => {
                run_stream_loop(&connection, &self.handler, self.config.max_message_size).await
            }
            TransportKind::Evented => {
                run_event_loop(&connection, &self.handler, self.config.max_message_size).await
            }
        };
        debug!(exit = ?exit, "connection loop finished");

        let _ = self.registry.remove(connection.id());
        self.finish_disconnect(&connection).await;
    }

    /// Release a removed handle and fire the disconnect hook, exactly once
    /// per connection no matter how many removal paths race.
    async fn finish_disconnect(&self, connection: &Arc<ConnectionHandle>) {
        if !connection.release() {
            return;
        }
        info!(conn_id = %connection.id(), "socket disconnected");
        counter!("ws_disconnections_total").increment(1);
        gauge!("ws_connections_active").decrement(1.0);
        histogram!("ws_connection_duration_seconds").record(connection.age().as_secs_f64());
        self.handler.on_client_disconnected(connection).await;
    }

    async fn dispatch(&self, connection: &Arc<ConnectionHandle>, payload: Payload) {
        if let Err(e) = connection.transport().send(payload).await {
            warn!(conn_id = %connection.id(), error = %e, "send failed; payload dropped");
        }
    }

    /// Send a text payload to one connection, encoded per the configured
    /// text encoding. Best-effort: failures are logged and the handle is
    /// kept — dead connections are collected by the purge paths instead.
    pub async fn send_text(&self, connection: &Arc<ConnectionHandle>, text: &str) {
        self.dispatch(connection, self.config.encoding.encode(text))
            .await;
    }

    /// Send a binary payload to one connection. Best-effort, like
    /// [`send_text`](Self::send_text).
    pub async fn send_binary(&self, connection: &Arc<ConnectionHandle>, data: impl Into<Bytes>) {
        self.dispatch(connection, Payload::Binary(data.into())).await;
    }

    /// Send a text payload to every connection in a registry snapshot taken
    /// now. Sends run concurrently; the call completes once all of them
    /// finish. Connections that close mid-broadcast simply fail their send.
    pub async fn broadcast_text(&self, text: &str) {
        self.broadcast_text_if(text, |_| true).await;
    }

    /// Like [`broadcast_text`](Self::broadcast_text), restricted to
    /// connections matching `predicate`.
    pub async fn broadcast_text_if(
        &self,
        text: &str,
        predicate: impl Fn(&ConnectionHandle) -> bool,
    ) {
        let payload = self.config.encoding.encode(text);
        self.fan_out(payload, predicate).await;
    }

    /// Send a binary payload to every connection in a registry snapshot
    /// taken now.
    pub async fn broadcast_binary(&self, data: impl Into<Bytes>) {
        self.broadcast_binary_if(data, |_| true).await;
    }

    /// Like [`broadcast_binary`](Self::broadcast_binary), restricted to
    /// connections matching `predicate`.
    pub async fn broadcast_binary_if(
        &self,
        data: impl Into<Bytes>,
        predicate: impl Fn(&ConnectionHandle) -> bool,
    ) {
        self.fan_out(Payload::Binary(data.into()), predicate).await;
    }

    async fn fan_out(&self, payload: Payload, predicate: impl Fn(&ConnectionHandle) -> bool) {
        let snapshot = self.registry.snapshot();
        let sends = snapshot
            .iter()
            .filter(|c| predicate(c.as_ref()))
            .map(|c| self.dispatch(c, payload.clone()));
        let _ = join_all(sends).await;
    }

    /// Close one connection: request the close handshake (failures are
    /// logged) and unconditionally remove the handle.
    pub async fn close(&self, connection: &Arc<ConnectionHandle>) {
        if let Err(e) = connection
            .transport()
            .close(CloseStatus::Normal, "")
            .await
        {
            warn!(conn_id = %connection.id(), error = %e, "close handshake failed");
        }
        let _ = self.registry.remove(connection.id());
        self.finish_disconnect(connection).await;
    }

    /// Remove and release every connection that is no longer open.
    pub async fn purge_dead(&self) {
        let report = self.registry.purge(|c| !c.is_open());
        debug!(
            purged = report.purged,
            total = report.total,
            "purged sockets"
        );
        for connection in &report.removed {
            self.finish_disconnect(connection).await;
        }
    }

    /// Tear the gateway down: close every connection, then purge.
    ///
    /// Idempotent and safe under concurrent invocation — an atomic guard
    /// lets exactly one caller perform the teardown; all others return
    /// immediately.
    pub async fn dispose(&self) {
        if self
            .disposing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        info!("disposing websocket gateway");

        let snapshot = self.registry.snapshot();
        let closes = snapshot.iter().map(|c| self.close(c));
        let _ = join_all(closes).await;
        self.purge_dead().await;

        // fired last so in-flight close frames got their chance to flush
        self.cancel.cancel();
        if let Some(task) = self.watchdog.lock().take() {
            task.abort();
        }
    }
}

/// GET handler performing the WebSocket upgrade.
async fn upgrade_handler(
    State(gateway): State<Arc<WebSocketGateway>>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response<Body> {
    gateway.handle_upgrade(ws, &headers)
}

//! Background purge of dead registry entries.

use std::sync::Weak;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::gateway::WebSocketGateway;

/// Interval between purges.
// TODO: make the purge interval configurable.
pub(crate) const WATCHDOG_INTERVAL: Duration = Duration::from_secs(30);

/// Purge dead connections until the gateway is dropped, disposing, or the
/// cancellation signal fires.
///
/// Holds only a `Weak` reference so the watchdog never keeps a discarded
/// gateway alive.
pub(crate) async fn run_watchdog(gateway: Weak<WebSocketGateway>, cancel: CancellationToken) {
    loop {
        let Some(gateway) = gateway.upgrade() else {
            break;
        };
        // teardown already purges; skip redundant work
        if gateway.is_disposing() {
            break;
        }
        gateway.purge_dead().await;
        drop(gateway);

        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(WATCHDOG_INTERVAL) => {}
        }
    }
    debug!("connection watchdog stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use portico_core::Message;

    use crate::config::GatewayConfig;
    use crate::connection::ConnectionHandle;
    use crate::gateway::WebSocketGateway;
    use crate::hooks::SocketHandler;
    use crate::transport::Transport;
    use crate::transport::channel::ChannelTransport;

    struct NullHandler;

    #[async_trait]
    impl SocketHandler for NullHandler {
        async fn on_message(&self, _connection: &Arc<ConnectionHandle>, _message: Message) {}
    }

    fn make_gateway() -> Arc<WebSocketGateway> {
        WebSocketGateway::new(GatewayConfig::default(), Arc::new(NullHandler)).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn purges_dead_connections_each_interval() {
        let gateway = make_gateway();
        let cancel = CancellationToken::new();

        // a registered connection with no processor loop behind it
        let (transport, _peer) = ChannelTransport::pair(4);
        let handle = Arc::new(ConnectionHandle::new(
            transport,
            None,
            Vec::new(),
            tokio_util::sync::CancellationToken::new(),
        ));
        let _ = gateway.registry().add(handle.clone());
        assert_eq!(gateway.connection_count(), 1);

        let task = tokio::spawn(run_watchdog(Arc::downgrade(&gateway), cancel.clone()));

        // still open after the first purge
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(gateway.connection_count(), 1);

        // kill the transport underneath the gateway, then let an interval pass
        handle.transport().abort();
        tokio::time::sleep(WATCHDOG_INTERVAL + Duration::from_secs(1)).await;
        assert_eq!(gateway.connection_count(), 0);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stops_on_cancellation() {
        let gateway = make_gateway();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_watchdog(Arc::downgrade(&gateway), cancel.clone()));

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("watchdog should stop promptly")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_gateway_dropped() {
        let gateway = make_gateway();
        let cancel = CancellationToken::new();
        let weak = Arc::downgrade(&gateway);
        let task = tokio::spawn(run_watchdog(weak, cancel));

        drop(gateway);
        tokio::time::sleep(WATCHDOG_INTERVAL + Duration::from_secs(1)).await;
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("watchdog should stop once the gateway is gone")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_disposing() {
        let gateway = make_gateway();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_watchdog(Arc::downgrade(&gateway), cancel));

        gateway.dispose().await;
        tokio::time::sleep(WATCHDOG_INTERVAL + Duration::from_secs(1)).await;
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("watchdog should stop during disposal")
            .unwrap();
    }
}

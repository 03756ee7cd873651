//! Gateway configuration.

use std::time::Duration;

use portico_core::TextEncoding;
use portico_core::negotiate::is_valid_token;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for a [`WebSocketGateway`](crate::WebSocketGateway).
///
/// Immutable once the gateway is constructed; construction validates the
/// protocol list.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Accepted subprotocol tokens, in server-preference order (used only
    /// for the reject-response header list — negotiation itself follows
    /// client order). Empty means "no subprotocol".
    pub protocols: Vec<String>,
    /// Maximum size of a received message in bytes. `0` disables the check;
    /// exceeding it closes the connection with a size-violation status.
    pub max_message_size: usize,
    /// Interval between keep-alive pings. `None` means no pings.
    pub keep_alive_interval_secs: Option<u64>,
    /// Codec applied to outbound string payloads.
    pub encoding: TextEncoding,
    /// Whether to run the background purge of dead connections.
    pub enable_watchdog: bool,
    /// Capacity of each connection's outbound queue.
    pub receive_buffer_size: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            protocols: Vec::new(),
            max_message_size: 0,
            keep_alive_interval_secs: Some(30),
            encoding: TextEncoding::Utf8,
            enable_watchdog: false,
            receive_buffer_size: 2048,
        }
    }
}

impl GatewayConfig {
    /// Validate the configured subprotocol list.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (i, protocol) in self.protocols.iter().enumerate() {
            if !is_valid_token(protocol) {
                return Err(ConfigError::InvalidProtocolToken(protocol.clone()));
            }
            if self.protocols[..i].contains(protocol) {
                return Err(ConfigError::DuplicateProtocol(protocol.clone()));
            }
        }
        Ok(())
    }

    /// Keep-alive interval as a `Duration`, if pings are enabled.
    pub fn keep_alive_interval(&self) -> Option<Duration> {
        self.keep_alive_interval_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let cfg = GatewayConfig::default();
        assert!(cfg.protocols.is_empty());
        assert_eq!(cfg.max_message_size, 0);
        assert_eq!(cfg.keep_alive_interval_secs, Some(30));
        assert_eq!(cfg.encoding, TextEncoding::Utf8);
        assert!(!cfg.enable_watchdog);
        assert_eq!(cfg.receive_buffer_size, 2048);
    }

    #[test]
    fn default_validates() {
        assert_eq!(GatewayConfig::default().validate(), Ok(()));
    }

    #[test]
    fn valid_protocol_list() {
        let cfg = GatewayConfig {
            protocols: vec!["chat".into(), "json".into()],
            ..GatewayConfig::default()
        };
        assert_eq!(cfg.validate(), Ok(()));
    }

    #[test]
    fn invalid_token_rejected() {
        let cfg = GatewayConfig {
            protocols: vec!["chat".into(), "has space".into()],
            ..GatewayConfig::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::InvalidProtocolToken("has space".into()))
        );
    }

    #[test]
    fn duplicate_rejected() {
        let cfg = GatewayConfig {
            protocols: vec!["chat".into(), "json".into(), "chat".into()],
            ..GatewayConfig::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::DuplicateProtocol("chat".into()))
        );
    }

    #[test]
    fn keep_alive_interval_conversion() {
        let cfg = GatewayConfig::default();
        assert_eq!(cfg.keep_alive_interval(), Some(Duration::from_secs(30)));

        let cfg = GatewayConfig {
            keep_alive_interval_secs: None,
            ..GatewayConfig::default()
        };
        assert_eq!(cfg.keep_alive_interval(), None);
    }

    #[test]
    fn serde_roundtrip() {
        let cfg = GatewayConfig {
            protocols: vec!["chat".into()],
            max_message_size: 4096,
            keep_alive_interval_secs: None,
            encoding: TextEncoding::Utf8,
            enable_watchdog: true,
            receive_buffer_size: 64,
        };
        let json = serde_json::to_string(&cfg).unwrap();
        let back: GatewayConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.protocols, cfg.protocols);
        assert_eq!(back.max_message_size, 4096);
        assert_eq!(back.keep_alive_interval_secs, None);
        assert!(back.enable_watchdog);
        assert_eq!(back.receive_buffer_size, 64);
    }
}

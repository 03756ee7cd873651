//! Connection protocol state.
//!
//! State transitions are monotonic toward `Closed`: a connection never
//! resurrects, and `CloseReceived`/`CloseSent` may occur in either order
//! depending on which side initiated the close handshake.

use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

/// Protocol state of a WebSocket connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocketState {
    /// Upgrade accepted, transport not yet ready.
    Connecting,
    /// Bidirectional traffic flowing.
    Open,
    /// Peer sent a close frame; ours not yet sent.
    CloseReceived,
    /// We sent a close frame; peer's not yet received.
    CloseSent,
    /// Handshake complete or connection torn down. Terminal.
    Closed,
}

impl SocketState {
    /// Whether the connection still has processing to do.
    ///
    /// This is the evented processor's loop condition: it keeps polling
    /// while the handshake is open or half-closed.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Open | Self::CloseReceived | Self::CloseSent)
    }

    /// Whether the connection is fully open.
    pub fn is_open(self) -> bool {
        self == Self::Open
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Connecting => 0,
            Self::Open => 1,
            Self::CloseReceived => 2,
            Self::CloseSent => 3,
            Self::Closed => 4,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Open,
            2 => Self::CloseReceived,
            3 => Self::CloseSent,
            _ => Self::Closed,
        }
    }

    /// Whether a transition from `self` to `to` is legal.
    fn allows(self, to: Self) -> bool {
        match self {
            Self::Connecting => to != Self::Connecting,
            Self::Open => matches!(to, Self::CloseReceived | Self::CloseSent | Self::Closed),
            Self::CloseReceived => matches!(to, Self::CloseSent | Self::Closed),
            Self::CloseSent => matches!(to, Self::CloseReceived | Self::Closed),
            Self::Closed => false,
        }
    }
}

impl std::fmt::Display for SocketState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::CloseReceived => "close_received",
            Self::CloseSent => "close_sent",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Atomic holder of a [`SocketState`] enforcing monotonic transitions.
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    /// A cell starting in the given state.
    pub fn new(state: SocketState) -> Self {
        Self(AtomicU8::new(state.as_u8()))
    }

    /// Current state.
    pub fn get(&self) -> SocketState {
        SocketState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Attempt to advance to `to`.
    ///
    /// Returns `true` if the transition was applied. Illegal transitions
    /// (including any attempt to leave `Closed`) are rejected and leave the
    /// cell unchanged.
    pub fn advance(&self, to: SocketState) -> bool {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            if !SocketState::from_u8(current).allows(to) {
                return false;
            }
            match self.0.compare_exchange_weak(
                current,
                to.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new(SocketState::Connecting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_is_active_and_open() {
        assert!(SocketState::Open.is_active());
        assert!(SocketState::Open.is_open());
    }

    #[test]
    fn half_closed_is_active_not_open() {
        for state in [SocketState::CloseReceived, SocketState::CloseSent] {
            assert!(state.is_active());
            assert!(!state.is_open());
        }
    }

    #[test]
    fn terminal_states_inactive() {
        assert!(!SocketState::Connecting.is_active());
        assert!(!SocketState::Closed.is_active());
    }

    #[test]
    fn connecting_advances_to_open() {
        let cell = StateCell::default();
        assert!(cell.advance(SocketState::Open));
        assert_eq!(cell.get(), SocketState::Open);
    }

    #[test]
    fn close_received_then_closed() {
        let cell = StateCell::new(SocketState::Open);
        assert!(cell.advance(SocketState::CloseReceived));
        assert!(cell.advance(SocketState::Closed));
        assert_eq!(cell.get(), SocketState::Closed);
    }

    #[test]
    fn close_handshake_either_order() {
        let cell = StateCell::new(SocketState::Open);
        assert!(cell.advance(SocketState::CloseSent));
        assert!(cell.advance(SocketState::CloseReceived));

        let cell = StateCell::new(SocketState::Open);
        assert!(cell.advance(SocketState::CloseReceived));
        assert!(cell.advance(SocketState::CloseSent));
    }

    #[test]
    fn no_resurrection_from_closed() {
        let cell = StateCell::new(SocketState::Closed);
        for state in [
            SocketState::Connecting,
            SocketState::Open,
            SocketState::CloseReceived,
            SocketState::CloseSent,
        ] {
            assert!(!cell.advance(state));
        }
        assert_eq!(cell.get(), SocketState::Closed);
    }

    #[test]
    fn no_regression_to_open() {
        let cell = StateCell::new(SocketState::Open);
        assert!(cell.advance(SocketState::CloseSent));
        assert!(!cell.advance(SocketState::Open));
        assert_eq!(cell.get(), SocketState::CloseSent);
    }

    #[test]
    fn display_names() {
        assert_eq!(SocketState::Open.to_string(), "open");
        assert_eq!(SocketState::CloseReceived.to_string(), "close_received");
    }

    #[test]
    fn serde_roundtrip() {
        let json = serde_json::to_string(&SocketState::CloseSent).unwrap();
        assert_eq!(json, "\"close_sent\"");
        let back: SocketState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SocketState::CloseSent);
    }
}

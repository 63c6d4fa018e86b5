//! Connection state shared between the socket thread and the owner thread.

use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of the host connection.
///
/// `unconnected -> connecting -> connected -> (error | closing) -> unconnected`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket, and no attempt in progress
    Unconnected,
    /// Attempting to establish connection
    Connecting,
    /// Socket open, envelopes flow
    Connected,
    /// Last attempt or session failed
    Error,
    /// Socket is being shut down
    Closing,
}

impl ConnectionState {
    /// Convert to u8 for atomic storage.
    pub fn to_u8(self) -> u8 {
        match self {
            ConnectionState::Unconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Connected => 2,
            ConnectionState::Error => 3,
            ConnectionState::Closing => 4,
        }
    }

    /// Convert from u8 (atomic storage).
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Error,
            4 => ConnectionState::Closing,
            _ => ConnectionState::Unconnected,
        }
    }
}

/// Update connection state (used by the socket thread and `close`).
pub fn set_connection_state(state_ref: &AtomicU8, new_state: ConnectionState) {
    let previous = ConnectionState::from_u8(state_ref.swap(new_state.to_u8(), Ordering::SeqCst));
    if previous != new_state {
        tracing::debug!(from = ?previous, to = ?new_state, "Connection state changed");
    }
}

//! Session state machine
//!
//! Tracks one WebSocket session from TCP accept to close.

use std::net::SocketAddr;
use std::time::Instant;

use crate::hub::ConnectionId;
use crate::stats::ConnectionStats;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// TCP connected, WebSocket handshake not finished
    Connected,
    /// Handshake complete, registered with the hub
    Open,
    /// Close frame sent or received
    Closing,
    /// Session closed
    Closed,
}

/// Complete session state
#[derive(Debug)]
pub struct SessionState {
    /// Session ID (matches the hub connection id once open)
    pub id: ConnectionId,

    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// Current phase
    pub phase: SessionPhase,

    /// Connection start time
    pub connected_at: Instant,

    /// Time when the WebSocket handshake completed
    pub opened_at: Option<Instant>,

    /// Frame and byte counters
    pub stats: ConnectionStats,
}

impl SessionState {
    /// Create a new session state
    pub fn new(id: ConnectionId, peer_addr: SocketAddr) -> Self {
        Self {
            id,
            peer_addr,
            phase: SessionPhase::Connected,
            connected_at: Instant::now(),
            opened_at: None,
            stats: ConnectionStats::new(),
        }
    }

    /// Complete the WebSocket handshake
    pub fn open(&mut self, id: ConnectionId) {
        if self.phase == SessionPhase::Connected {
            self.id = id;
            self.phase = SessionPhase::Open;
            self.opened_at = Some(Instant::now());
        }
    }

    /// Start closing the session
    pub fn close(&mut self) {
        if matches!(self.phase, SessionPhase::Connected | SessionPhase::Open) {
            self.phase = SessionPhase::Closing;
        }
    }

    /// Mark the session fully closed and freeze its duration
    pub fn finish(&mut self) -> &ConnectionStats {
        self.phase = SessionPhase::Closed;
        self.stats.duration = self.duration();
        &self.stats
    }

    /// Check if the session is open
    pub fn is_open(&self) -> bool {
        self.phase == SessionPhase::Open
    }

    /// Get session duration
    pub fn duration(&self) -> std::time::Duration {
        self.connected_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use super::*;

    fn addr() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8765)
    }

    #[test]
    fn test_session_lifecycle() {
        let mut state = SessionState::new(0, addr());
        assert_eq!(state.phase, SessionPhase::Connected);
        assert!(!state.is_open());

        state.open(7);
        assert_eq!(state.phase, SessionPhase::Open);
        assert_eq!(state.id, 7);
        assert!(state.opened_at.is_some());
        assert!(state.is_open());

        state.close();
        assert_eq!(state.phase, SessionPhase::Closing);

        state.stats.record_received(10);
        let stats = state.finish();
        assert_eq!(stats.frames_received, 1);
        assert_eq!(state.phase, SessionPhase::Closed);
    }

    #[test]
    fn test_open_only_from_connected() {
        let mut state = SessionState::new(0, addr());
        state.close();
        state.open(3);

        assert_eq!(state.phase, SessionPhase::Closing);
        assert_eq!(state.id, 0);
    }
}

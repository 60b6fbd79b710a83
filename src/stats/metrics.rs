//! Statistics for hub routing and WebSocket connections

use std::time::Duration;

/// Connection-level statistics
#[derive(Debug, Clone, Default)]
pub struct ConnectionStats {
    /// Text frames received from the peer
    pub frames_received: u64,
    /// Text frames written to the peer
    pub frames_sent: u64,
    /// Total payload bytes received
    pub bytes_received: u64,
    /// Total payload bytes sent
    pub bytes_sent: u64,
    /// Frames dropped as malformed, oversized or binary
    pub protocol_errors: u64,
    /// Connection duration
    pub duration: Duration,
}

impl ConnectionStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an inbound frame
    pub fn record_received(&mut self, bytes: usize) {
        self.frames_received += 1;
        self.bytes_received += bytes as u64;
    }

    /// Record an outbound frame
    pub fn record_sent(&mut self, bytes: usize) {
        self.frames_sent += 1;
        self.bytes_sent += bytes as u64;
    }

    /// Average inbound frame size in bytes
    pub fn average_frame_size(&self) -> u64 {
        if self.frames_received > 0 {
            self.bytes_received / self.frames_received
        } else {
            0
        }
    }
}

/// Hub-wide statistics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubStats {
    /// Channels with at least one subscriber
    pub channels: usize,
    /// Registered connections
    pub connections: usize,
    /// Sum of per-channel subscriber counts
    pub subscriptions: usize,
    /// Publishes accepted
    pub messages_published: u64,
    /// Frames queued to subscribers
    pub frames_delivered: u64,
    /// Connections dropped for a full or closed queue
    pub subscribers_dropped: u64,
}

impl HubStats {
    /// Average fan-out per publish
    pub fn fan_out(&self) -> f64 {
        if self.messages_published > 0 {
            self.frames_delivered as f64 / self.messages_published as f64
        } else {
            0.0
        }
    }
}

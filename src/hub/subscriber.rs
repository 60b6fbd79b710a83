//! Per-connection hub state

use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Instant;

use tokio::sync::mpsc;

use super::frame::HubFrame;
use crate::protocol::Channel;

/// Hub-assigned connection identifier
pub type ConnectionId = u64;

/// A connection registered with the hub
pub struct Subscriber {
    /// Connection ID
    pub id: ConnectionId,

    /// Remote peer address, when the connection came in over the network
    pub peer_addr: Option<SocketAddr>,

    /// Bounded outbound queue drained by the connection's writer
    pub(super) tx: mpsc::Sender<HubFrame>,

    /// Channels this connection is subscribed to
    pub channels: HashSet<Channel>,

    /// Frames queued for this connection
    pub frames_queued: u64,

    /// When the connection registered
    pub connected_at: Instant,
}

impl Subscriber {
    pub(super) fn new(
        id: ConnectionId,
        peer_addr: Option<SocketAddr>,
        tx: mpsc::Sender<HubFrame>,
    ) -> Self {
        Self {
            id,
            peer_addr,
            tx,
            channels: HashSet::new(),
            frames_queued: 0,
            connected_at: Instant::now(),
        }
    }

    /// Number of subscribed channels
    pub fn subscription_count(&self) -> usize {
        self.channels.len()
    }
}

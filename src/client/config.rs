//! Client configuration

use std::time::Duration;

use crate::protocol::Channel;

/// Default delay before reconnecting after an abnormal close
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(3000);

/// Configuration for a [`ChannelConnection`](super::ChannelConnection)
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Hub WebSocket URL (`ws://host:port`)
    pub url: String,

    /// Delay before a reconnect attempt
    pub reconnect_delay: Duration,

    /// Capacity of the outbound frame queue
    pub outbound_capacity: usize,

    /// Capacity of the event channel handed to the caller
    pub event_capacity: usize,

    /// Channels subscribed on every connect
    pub channels: Vec<Channel>,
}

impl ClientConfig {
    /// Create a config for a hub URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            outbound_capacity: 64,
            event_capacity: 256,
            channels: Vec::new(),
        }
    }

    /// Set the reconnect delay
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Set the outbound queue capacity
    pub fn outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity.max(1);
        self
    }

    /// Set the event channel capacity
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// Add a channel to subscribe on connect
    pub fn subscribe(mut self, channel: Channel) -> Self {
        if !self.channels.contains(&channel) {
            self.channels.push(channel);
        }
        self
    }
}

//! Channel hub implementation
//!
//! The central broker that tracks connections and their channel
//! subscriptions, and fans published messages out to subscribers.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};

use super::config::HubConfig;
use super::error::HubError;
use super::frame::HubFrame;
use super::subscriber::{ConnectionId, Subscriber};
use crate::protocol::{Channel, ChannelMessage, OverlayCommand};
use crate::stats::HubStats;

#[derive(Default)]
struct Routes {
    /// Registered connections
    connections: HashMap<ConnectionId, Subscriber>,
    /// Channel name to subscribed connection ids; never holds an empty set
    channels: HashMap<Channel, HashSet<ConnectionId>>,
}

impl Routes {
    fn remove_connection(&mut self, id: ConnectionId) -> Option<Subscriber> {
        let subscriber = self.connections.remove(&id)?;
        for channel in &subscriber.channels {
            self.detach(channel, id);
        }
        Some(subscriber)
    }

    fn detach(&mut self, channel: &Channel, id: ConnectionId) {
        if let Some(set) = self.channels.get_mut(channel) {
            set.remove(&id);
            if set.is_empty() {
                self.channels.remove(channel);
            }
        }
    }
}

/// Central pub/sub broker
///
/// Thread-safe via `RwLock`. Publish takes the write lock for the whole
/// fan-out, so every subscriber of a channel sees that channel's messages in
/// the same order they were published.
pub struct ChannelHub {
    routes: RwLock<Routes>,

    next_id: AtomicU64,

    messages_published: AtomicU64,
    frames_delivered: AtomicU64,
    subscribers_dropped: AtomicU64,

    config: HubConfig,
}

impl ChannelHub {
    /// Create a new hub with default configuration
    pub fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    /// Create a new hub with custom configuration
    pub fn with_config(config: HubConfig) -> Self {
        Self {
            routes: RwLock::new(Routes::default()),
            next_id: AtomicU64::new(1),
            messages_published: AtomicU64::new(0),
            frames_delivered: AtomicU64::new(0),
            subscribers_dropped: AtomicU64::new(0),
            config,
        }
    }

    /// Get the hub configuration
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Register a connection
    ///
    /// Returns its id and the receiving end of its outbound queue. Dropping
    /// the receiver makes the next fan-out to this connection fail, which
    /// removes it from the hub.
    pub async fn connect(&self) -> (ConnectionId, mpsc::Receiver<HubFrame>) {
        self.connect_from(None).await
    }

    /// Register a connection that arrived from `peer_addr`
    pub async fn connect_from(
        &self,
        peer_addr: Option<SocketAddr>,
    ) -> (ConnectionId, mpsc::Receiver<HubFrame>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.config.outbound_capacity);

        let mut routes = self.routes.write().await;
        routes
            .connections
            .insert(id, Subscriber::new(id, peer_addr, tx));

        tracing::debug!(
            conn_id = id,
            connections = routes.connections.len(),
            "Connection registered"
        );

        (id, rx)
    }

    /// Remove a connection and every subscription it holds
    pub async fn disconnect(&self, id: ConnectionId) {
        let mut routes = self.routes.write().await;

        if let Some(subscriber) = routes.remove_connection(id) {
            tracing::debug!(
                conn_id = id,
                channels = subscriber.subscription_count(),
                frames_queued = subscriber.frames_queued,
                "Connection unregistered"
            );
        }
    }

    /// Subscribe a connection to a channel
    ///
    /// Idempotent: returns `false` when the connection was already subscribed.
    pub async fn subscribe(&self, id: ConnectionId, channel: &Channel) -> Result<bool, HubError> {
        let mut routes = self.routes.write().await;
        let limit = self.config.max_subscriptions_per_connection;

        let subscriber = routes
            .connections
            .get_mut(&id)
            .ok_or(HubError::ConnectionNotFound(id))?;

        if subscriber.channels.contains(channel) {
            return Ok(false);
        }
        if limit > 0 && subscriber.channels.len() >= limit {
            return Err(HubError::SubscriptionLimit { conn_id: id, limit });
        }

        subscriber.channels.insert(channel.clone());
        let set = routes.channels.entry(channel.clone()).or_default();
        set.insert(id);

        tracing::info!(
            channel = %channel,
            conn_id = id,
            subscribers = set.len(),
            "Subscriber added"
        );

        Ok(true)
    }

    /// Unsubscribe a connection from a channel
    ///
    /// Idempotent: returns `false` when the connection was not subscribed.
    pub async fn unsubscribe(
        &self,
        id: ConnectionId,
        channel: &Channel,
    ) -> Result<bool, HubError> {
        let mut routes = self.routes.write().await;

        let subscriber = routes
            .connections
            .get_mut(&id)
            .ok_or(HubError::ConnectionNotFound(id))?;

        if !subscriber.channels.remove(channel) {
            return Ok(false);
        }
        routes.detach(channel, id);

        tracing::debug!(channel = %channel, conn_id = id, "Subscriber removed");

        Ok(true)
    }

    /// Publish a message to every current subscriber of its channel
    ///
    /// Returns the number of subscribers the message was queued for. A
    /// publisher subscribed to the channel receives its own message.
    pub async fn publish(&self, message: &ChannelMessage) -> Result<usize, HubError> {
        let frame = HubFrame::encode(message)?;
        let mut routes = self.routes.write().await;
        self.messages_published.fetch_add(1, Ordering::Relaxed);

        let Some(ids) = routes.channels.get(&frame.channel) else {
            tracing::debug!(channel = %frame.channel, "Publish with no subscribers");
            return Ok(0);
        };
        let ids: Vec<ConnectionId> = ids.iter().copied().collect();

        let mut delivered = 0;
        let mut dead = Vec::new();

        for id in ids {
            let Some(subscriber) = routes.connections.get_mut(&id) else {
                continue;
            };

            match subscriber.tx.try_send(frame.clone()) {
                Ok(()) => {
                    subscriber.frames_queued += 1;
                    delivered += 1;
                }
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        channel = %frame.channel,
                        conn_id = id,
                        "Subscriber queue full, dropping connection"
                    );
                    dead.push(id);
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(
                        channel = %frame.channel,
                        conn_id = id,
                        "Subscriber queue closed, dropping connection"
                    );
                    dead.push(id);
                }
            }
        }

        for id in &dead {
            routes.remove_connection(*id);
        }

        self.frames_delivered
            .fetch_add(delivered as u64, Ordering::Relaxed);
        self.subscribers_dropped
            .fetch_add(dead.len() as u64, Ordering::Relaxed);

        tracing::debug!(
            channel = %frame.channel,
            kind = message.kind().unwrap_or("-"),
            delivered = delivered,
            dropped = dead.len(),
            "Message published"
        );

        Ok(delivered)
    }

    /// Publish a typed command
    pub async fn publish_command(
        &self,
        channel: &Channel,
        command: &OverlayCommand,
    ) -> Result<usize, HubError> {
        let message = ChannelMessage::command(channel.clone(), command)?;
        self.publish(&message).await
    }

    /// Number of connections subscribed to a channel
    pub async fn subscribers(&self, channel: &Channel) -> usize {
        self.routes
            .read()
            .await
            .channels
            .get(channel)
            .map_or(0, HashSet::len)
    }

    /// Channels a connection is subscribed to
    pub async fn subscriptions(&self, id: ConnectionId) -> Option<Vec<Channel>> {
        let routes = self.routes.read().await;
        let subscriber = routes.connections.get(&id)?;
        let mut channels: Vec<Channel> = subscriber.channels.iter().cloned().collect();
        channels.sort();
        Some(channels)
    }

    /// Whether a connection is registered
    pub async fn is_connected(&self, id: ConnectionId) -> bool {
        self.routes.read().await.connections.contains_key(&id)
    }

    /// Number of registered connections
    pub async fn connection_count(&self) -> usize {
        self.routes.read().await.connections.len()
    }

    /// Snapshot hub statistics
    pub async fn stats(&self) -> HubStats {
        let routes = self.routes.read().await;

        HubStats {
            channels: routes.channels.len(),
            connections: routes.connections.len(),
            subscriptions: routes.channels.values().map(HashSet::len).sum(),
            messages_published: self.messages_published.load(Ordering::Relaxed),
            frames_delivered: self.frames_delivered.load(Ordering::Relaxed),
            subscribers_dropped: self.subscribers_dropped.load(Ordering::Relaxed),
        }
    }
}

impl Default for ChannelHub {
    fn default() -> Self {
        Self::new()
    }
}

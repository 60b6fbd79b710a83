//! Reconnecting channel connection
//!
//! Wraps one WebSocket link to the hub behind a fire-and-forget `send` and an
//! event receiver. A single supervisor task owns the link: it connects,
//! re-subscribes every recorded channel, pumps frames until the link drops,
//! then waits `reconnect_delay` and tries again. `close()` stops it for good.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;

use super::config::ClientConfig;
use super::publisher::ChannelPublisher;
use crate::error::{Error, Result, TransportError};
use crate::protocol::{Channel, ChannelMessage, ClientFrame, OverlayCommand, ServerFrame};

/// Events from a channel connection
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// Link established and subscriptions renewed
    Connected,

    /// Link lost or closed
    Disconnected {
        /// Why the link ended
        reason: String,
        /// Whether a reconnect is scheduled
        reconnecting: bool,
    },

    /// Message delivered on a subscribed channel
    Message(ChannelMessage),
}

/// How a session ended
enum SessionEnd {
    /// Closed on purpose (local `close()` or a normal close from the hub)
    Closed,
    /// Link dropped; worth reconnecting
    Dropped(String),
}

struct Shared {
    config: ClientConfig,

    /// Channels to (re)subscribe; lock before `link`
    subscriptions: Mutex<Vec<Channel>>,

    /// Outbound queue of the live session, if any
    link: Mutex<Option<mpsc::Sender<Message>>>,

    connected: AtomicBool,

    closing: watch::Sender<bool>,

    event_tx: mpsc::Sender<ConnectionEvent>,
}

impl Shared {
    fn is_closing(&self) -> bool {
        *self.closing.borrow()
    }

    async fn emit(&self, event: ConnectionEvent) {
        let _ = self.event_tx.send(event).await;
    }

    /// Queue a frame on the live link
    fn send_frame(&self, frame: &ClientFrame) -> Result<()> {
        let text = frame.to_json()?;
        let link = self.link.lock();
        let tx = link.as_ref().ok_or(TransportError::NotConnected)?;

        tx.try_send(Message::text(text)).map_err(|e| match e {
            TrySendError::Full(_) => TransportError::QueueFull,
            TrySendError::Closed(_) => TransportError::NotConnected,
        })?;
        Ok(())
    }
}

/// Client-side connection to the hub
///
/// # Example
/// ```no_run
/// use overlay_hub::client::{ChannelConnection, ClientConfig, ConnectionEvent};
/// use overlay_hub::protocol::Channel;
///
/// # async fn example() -> overlay_hub::error::Result<()> {
/// let config = ClientConfig::new("ws://127.0.0.1:8765")
///     .subscribe(Channel::new("lower")?);
/// let (connection, mut events) = ChannelConnection::new(config);
/// connection.start();
///
/// while let Some(event) = events.recv().await {
///     if let ConnectionEvent::Message(message) = event {
///         println!("{}: {:?}", message.channel, message.kind());
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct ChannelConnection {
    shared: Arc<Shared>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl ChannelConnection {
    /// Create a new connection.
    ///
    /// Returns the connection and a receiver for events. Nothing happens until
    /// [`start`](Self::start) is called.
    pub fn new(config: ClientConfig) -> (Self, mpsc::Receiver<ConnectionEvent>) {
        let (event_tx, event_rx) = mpsc::channel(config.event_capacity);
        let (closing, _) = watch::channel(false);

        let shared = Arc::new(Shared {
            subscriptions: Mutex::new(config.channels.clone()),
            config,
            link: Mutex::new(None),
            connected: AtomicBool::new(false),
            closing,
            event_tx,
        });

        let connection = Self {
            shared,
            supervisor: Mutex::new(None),
        };

        (connection, event_rx)
    }

    /// Start connecting
    ///
    /// Idempotent: a running supervisor is never duplicated, and a closed
    /// connection stays closed.
    pub fn start(&self) {
        if self.shared.is_closing() {
            return;
        }

        let mut supervisor = self.supervisor.lock();
        if supervisor.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }

        let shared = Arc::clone(&self.shared);
        *supervisor = Some(tokio::spawn(supervise(shared)));
    }

    /// Record a channel and subscribe to it on the live link, if any
    pub fn subscribe(&self, channel: Channel) {
        let mut subscriptions = self.shared.subscriptions.lock();
        if subscriptions.contains(&channel) {
            return;
        }
        subscriptions.push(channel.clone());

        // Not connected is fine: the next connect subscribes everything
        let _ = self.shared.send_frame(&ClientFrame::Subscribe { channel });
    }

    /// Forget a channel and unsubscribe it on the live link, if any
    pub fn unsubscribe(&self, channel: &Channel) {
        let mut subscriptions = self.shared.subscriptions.lock();
        let before = subscriptions.len();
        subscriptions.retain(|c| c != channel);
        if subscriptions.len() == before {
            return;
        }

        let _ = self.shared.send_frame(&ClientFrame::Unsubscribe {
            channel: channel.clone(),
        });
    }

    /// Recorded subscriptions
    pub fn subscriptions(&self) -> Vec<Channel> {
        self.shared.subscriptions.lock().clone()
    }

    /// Send a raw client frame
    ///
    /// Fails with `NotConnected` while the link is down; nothing is queued.
    pub fn send(&self, frame: &ClientFrame) -> Result<()> {
        self.shared.send_frame(frame)
    }

    /// Publish a command on a channel
    pub fn publish(&self, channel: &Channel, command: &OverlayCommand) -> Result<()> {
        let frame = ClientFrame::publish(channel.clone(), command)?;
        self.send(&frame)
    }

    /// Whether the link is currently up
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    /// Close the link and suppress any reconnect
    pub async fn close(&self) {
        self.shared.closing.send_replace(true);

        let handle = self.supervisor.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        *self.shared.link.lock() = None;
        self.shared.connected.store(false, Ordering::Release);
    }
}

impl ChannelPublisher for ChannelConnection {
    fn publish(&self, channel: &Channel, command: &OverlayCommand) -> Result<()> {
        ChannelConnection::publish(self, channel, command)
    }
}

impl Drop for ChannelConnection {
    fn drop(&mut self) {
        self.shared.closing.send_replace(true);
        if let Some(handle) = self.supervisor.lock().take() {
            handle.abort();
        }
    }
}

/// Connect, pump, and reconnect until closed
async fn supervise(shared: Arc<Shared>) {
    let mut closing = shared.closing.subscribe();
    let url = shared.config.url.clone();

    loop {
        if shared.is_closing() {
            break;
        }

        let outcome = run_session(&shared, &mut closing).await;

        shared.connected.store(false, Ordering::Release);
        *shared.link.lock() = None;

        let reason = match outcome {
            Ok(SessionEnd::Closed) => {
                tracing::info!(url = %url, "Connection closed");
                shared
                    .emit(ConnectionEvent::Disconnected {
                        reason: "closed".into(),
                        reconnecting: false,
                    })
                    .await;
                break;
            }
            Ok(SessionEnd::Dropped(reason)) => reason,
            Err(e) => e.to_string(),
        };

        let reconnecting = !shared.is_closing();
        shared
            .emit(ConnectionEvent::Disconnected {
                reason: reason.clone(),
                reconnecting,
            })
            .await;
        if !reconnecting {
            break;
        }

        tracing::info!(
            url = %url,
            reason = %reason,
            delay_ms = shared.config.reconnect_delay.as_millis() as u64,
            "Reconnect scheduled"
        );

        tokio::select! {
            _ = tokio::time::sleep(shared.config.reconnect_delay) => {}
            _ = closed(&mut closing) => break,
        }
    }
}

/// Resolve once `close()` has been requested
///
/// The borrow returned by `wait_for` is dropped here so callers never hold
/// it across an await.
async fn closed(closing: &mut watch::Receiver<bool>) {
    let _ = closing.wait_for(|closing| *closing).await;
}

/// One connected session, from connect to link loss
async fn run_session(shared: &Shared, closing: &mut watch::Receiver<bool>) -> Result<SessionEnd> {
    let url = shared.config.url.as_str();

    let connect = tokio::select! {
        result = connect_async(url) => result,
        _ = closed(closing) => return Ok(SessionEnd::Closed),
    };
    let (ws, _) = connect.map_err(|e| TransportError::ConnectFailed {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    let (mut sink, mut stream) = ws.split();

    let (link_tx, mut link_rx) = mpsc::channel(shared.config.outbound_capacity);

    // Installing the link under the subscriptions lock means a concurrent
    // subscribe() is either in this snapshot or sent on the new link.
    let channels = {
        let subscriptions = shared.subscriptions.lock();
        *shared.link.lock() = Some(link_tx);
        subscriptions.clone()
    };

    for channel in channels {
        let text = ClientFrame::Subscribe { channel }.to_json()?;
        sink.send(Message::text(text))
            .await
            .map_err(TransportError::from)?;
    }

    shared.connected.store(true, Ordering::Release);
    tracing::info!(url = %url, "Connected to hub");
    shared.emit(ConnectionEvent::Connected).await;

    loop {
        tokio::select! {
            outbound = link_rx.recv() => {
                let Some(message) = outbound else {
                    let _ = sink.send(Message::Close(None)).await;
                    return Ok(SessionEnd::Closed);
                };
                sink.send(message).await.map_err(TransportError::from)?;
            }
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Text(text))) => match ServerFrame::parse(text.as_str()) {
                    Ok(ServerFrame::Message(message)) => {
                        tracing::debug!(
                            channel = %message.channel,
                            kind = message.kind().unwrap_or("-"),
                            "Message received"
                        );
                        shared.emit(ConnectionEvent::Message(message)).await;
                    }
                    Ok(ServerFrame::Control(control)) => {
                        tracing::trace!(control = ?control, "Control frame received");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Dropping hub frame");
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    return Ok(match frame {
                        Some(frame) if frame.code == CloseCode::Normal => SessionEnd::Closed,
                        Some(frame) => SessionEnd::Dropped(format!(
                            "closed by hub ({}): {}",
                            u16::from(frame.code),
                            frame.reason.as_str()
                        )),
                        None => SessionEnd::Dropped("closed by hub".into()),
                    });
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(Error::from(TransportError::from(e))),
                None => return Ok(SessionEnd::Dropped("connection lost".into())),
            },
            _ = closed(closing) => {
                let _ = sink.send(Message::Close(None)).await;
                return Ok(SessionEnd::Closed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn lower() -> Channel {
        Channel::new("lower").unwrap()
    }

    #[tokio::test]
    async fn test_send_while_disconnected() {
        let (connection, _events) = ChannelConnection::new(ClientConfig::new("ws://127.0.0.1:1"));

        assert!(!connection.is_connected());
        assert!(matches!(
            connection.publish(&lower(), &OverlayCommand::Hide),
            Err(Error::Transport(TransportError::NotConnected))
        ));
    }

    #[tokio::test]
    async fn test_subscriptions_are_recorded_offline() {
        let config = ClientConfig::new("ws://127.0.0.1:1").subscribe(lower());
        let (connection, _events) = ChannelConnection::new(config);

        connection.subscribe(lower());
        connection.subscribe(Channel::new("poster").unwrap());
        assert_eq!(connection.subscriptions().len(), 2);

        connection.unsubscribe(&lower());
        assert_eq!(connection.subscriptions(), vec![Channel::new("poster").unwrap()]);
    }

    #[tokio::test]
    async fn test_failed_connect_schedules_reconnect() {
        // Port 1 refuses connections
        let config =
            ClientConfig::new("ws://127.0.0.1:1").reconnect_delay(Duration::from_millis(20));
        let (connection, mut events) = ChannelConnection::new(config);
        connection.start();
        connection.start();

        for _ in 0..2 {
            match events.recv().await.unwrap() {
                ConnectionEvent::Disconnected { reconnecting, .. } => assert!(reconnecting),
                other => panic!("unexpected {:?}", other),
            }
        }

        connection.close().await;
        assert!(!connection.is_connected());

        // Closed connections never restart
        connection.start();
        assert!(connection.supervisor.lock().is_none());
    }

    #[test]
    fn test_supervisor_is_send() {
        fn assert_send<T: Send>(_: &T) {}

        let (connection, _events) = ChannelConnection::new(ClientConfig::new("ws://127.0.0.1:1"));
        let supervisor = supervise(Arc::clone(&connection.shared));
        assert_send(&supervisor);
    }
}

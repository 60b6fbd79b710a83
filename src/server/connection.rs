//! Per-connection handler
//!
//! Runs the WebSocket handshake, registers the session with the hub, then
//! multiplexes three event sources until the session ends:
//!
//! - frames the hub queued for this connection (written to the socket)
//! - text frames from the peer (subscribe, unsubscribe, publish, ping)
//! - the server-wide shutdown signal

use std::net::SocketAddr;
use std::sync::Arc;

use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Message, Utf8Bytes};
use tokio_tungstenite::WebSocketStream;

use crate::error::{ProtocolError, Result, TransportError};
use crate::hub::{ChannelHub, ConnectionId, HubFrame};
use crate::protocol::{ChannelMessage, ClientFrame, ControlFrame};
use crate::server::config::ServerConfig;
use crate::session::SessionState;

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;

/// A single client connection
pub struct Connection {
    state: SessionState,
    socket: TcpStream,
    config: ServerConfig,
    hub: Arc<ChannelHub>,
    shutdown: watch::Receiver<bool>,
}

impl Connection {
    /// Create a handler for an accepted socket
    pub fn new(
        session_id: u64,
        socket: TcpStream,
        peer_addr: SocketAddr,
        config: ServerConfig,
        hub: Arc<ChannelHub>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            state: SessionState::new(session_id, peer_addr),
            socket,
            config,
            hub,
            shutdown,
        }
    }

    /// Run the session to completion
    pub async fn run(self) -> Result<()> {
        let Connection {
            mut state,
            socket,
            config,
            hub,
            mut shutdown,
        } = self;

        let ws = tokio::time::timeout(
            config.handshake_timeout,
            tokio_tungstenite::accept_async(socket),
        )
        .await
        .map_err(|_| TransportError::HandshakeTimeout)?
        .map_err(TransportError::from)?;

        let (conn_id, mut outbound) = hub.connect_from(Some(state.peer_addr)).await;
        state.open(conn_id);

        tracing::info!(conn_id = conn_id, peer = %state.peer_addr, "Session opened");

        let (mut sink, mut stream) = ws.split();

        let result: Result<()> = loop {
            tokio::select! {
                frame = outbound.recv() => {
                    let Some(frame) = frame else {
                        // The hub dropped this connection after a failed fan-out
                        state.close();
                        let _ = sink.send(close_frame(CloseCode::Again, "subscriber queue overflow")).await;
                        break Ok(());
                    };
                    if let Err(e) = write_frame(&mut sink, &mut state, frame).await {
                        break Err(e);
                    }
                }
                inbound = stream.next() => match inbound {
                    Some(Ok(Message::Text(text))) => {
                        state.stats.record_received(text.len());
                        match handle_text(&hub, conn_id, text.as_str(), &config).await {
                            Ok(Some(reply)) => {
                                let len = reply.len();
                                if let Err(e) = sink.send(Message::text(reply)).await {
                                    break Err(TransportError::from(e).into());
                                }
                                state.stats.record_sent(len);
                            }
                            Ok(None) => {}
                            Err(e) => {
                                state.stats.protocol_errors += 1;
                                tracing::warn!(conn_id = conn_id, error = %e, "Dropping client frame");
                            }
                        }
                    }
                    Some(Ok(Message::Binary(data))) => {
                        state.stats.protocol_errors += 1;
                        tracing::warn!(
                            conn_id = conn_id,
                            size = data.len(),
                            error = %ProtocolError::UnexpectedFrame("binary"),
                            "Dropping client frame"
                        );
                    }
                    Some(Ok(Message::Close(frame))) => {
                        state.close();
                        tracing::debug!(conn_id = conn_id, close = ?frame, "Peer closed session");
                        break Ok(());
                    }
                    // Ping/pong at the WebSocket layer is answered by tungstenite
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break Err(TransportError::from(e).into()),
                    None => break Ok(()),
                },
                _ = shutdown.changed() => {
                    state.close();
                    let _ = sink.send(close_frame(CloseCode::Away, "hub shutting down")).await;
                    break Ok(());
                }
            }
        };

        hub.disconnect(conn_id).await;

        let stats = state.finish();
        tracing::info!(
            conn_id = conn_id,
            frames_received = stats.frames_received,
            frames_sent = stats.frames_sent,
            protocol_errors = stats.protocol_errors,
            duration_ms = stats.duration.as_millis() as u64,
            "Session closed"
        );

        result
    }
}

async fn write_frame(sink: &mut WsSink, state: &mut SessionState, frame: HubFrame) -> Result<()> {
    let len = frame.len();
    let text = match Utf8Bytes::try_from(frame.payload) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(channel = %frame.channel, error = %e, "Skipping non-UTF-8 frame");
            return Ok(());
        }
    };

    sink.send(Message::Text(text))
        .await
        .map_err(TransportError::from)?;
    state.stats.record_sent(len);
    Ok(())
}

/// Apply one client frame; returns a reply to send back, if any
async fn handle_text(
    hub: &ChannelHub,
    conn_id: ConnectionId,
    text: &str,
    config: &ServerConfig,
) -> Result<Option<String>> {
    if text.len() > config.max_message_size {
        return Err(ProtocolError::FrameTooLarge {
            size: text.len(),
            limit: config.max_message_size,
        }
        .into());
    }

    let frame: ClientFrame = serde_json::from_str(text).map_err(ProtocolError::from)?;

    match frame {
        ClientFrame::Subscribe { channel } => {
            hub.subscribe(conn_id, &channel).await?;
        }
        ClientFrame::Unsubscribe { channel } => {
            hub.unsubscribe(conn_id, &channel).await?;
        }
        ClientFrame::Publish { channel, data, id } => {
            hub.publish(&ChannelMessage { channel, data, id }).await?;
        }
        ClientFrame::Ping => {
            let pong = serde_json::to_string(&ControlFrame::Pong)?;
            return Ok(Some(pong));
        }
    }

    Ok(None)
}

fn close_frame(code: CloseCode, reason: &'static str) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: Utf8Bytes::from_static(reason),
    }))
}

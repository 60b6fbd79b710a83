//! overlay-hub: real-time channel hub for live-production overlays
//!
//! Operator consoles publish overlay commands on named channels; rendering
//! surfaces subscribe to the channels they display and report playback state
//! back on the same channel.
//!
//! - [`hub`]: in-process channel broker with per-connection outbound queues
//! - [`server`]: WebSocket front end for the hub
//! - [`client`]: reconnecting client connection with automatic re-subscription
//! - [`overlay`]: renderer-side show/hide state, playlists and the surface actor
//! - [`playback`]: media synchronization and chapter navigation
//! - [`eventlog`]: the console's replay-aware, persisted overlay log
//!
//! # Example
//!
//! ```no_run
//! use overlay_hub::{HubServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> overlay_hub::Result<()> {
//!     let server = HubServer::new(ServerConfig::default());
//!     server.run().await
//! }
//! ```

pub mod client;
pub mod error;
pub mod eventlog;
pub mod hub;
pub mod overlay;
pub mod playback;
pub mod protocol;
pub mod server;
pub mod session;
pub mod stats;

pub use client::{ChannelConnection, ClientConfig, ConnectionEvent};
pub use error::{Error, Result};
pub use eventlog::{EventLogReconciler, ReconcilerConfig};
pub use hub::ChannelHub;
pub use overlay::{OverlayStateMachine, OverlaySurface};
pub use playback::{PlaybackMirror, PlaybackSynchronizer};
pub use protocol::{Channel, ChannelMessage, OverlayCommand};
pub use server::{HubServer, ServerConfig};

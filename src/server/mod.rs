//! WebSocket hub server
//!
//! Accepts WebSocket connections and bridges them to a shared [`ChannelHub`].
//!
//! [`ChannelHub`]: crate::hub::ChannelHub

pub mod config;
pub mod connection;
pub mod listener;

pub use config::ServerConfig;
pub use listener::HubServer;

//! Hub client
//!
//! Provides the client side of the channel protocol:
//! - A reconnecting WebSocket connection with automatic re-subscription
//! - The `ChannelPublisher` port used by components that report state

pub mod config;
pub mod connection;
pub mod publisher;

pub use config::ClientConfig;
pub use connection::{ChannelConnection, ConnectionEvent};
pub use publisher::ChannelPublisher;

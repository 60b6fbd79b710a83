//! Channel protocol
//!
//! JSON envelopes exchanged between clients and the hub, validated channel
//! names, and the closed set of overlay commands.

pub mod channel;
pub mod command;
pub mod message;

pub use channel::Channel;
pub use command::OverlayCommand;
pub use message::{ChannelMessage, ClientFrame, ControlFrame, ServerFrame};

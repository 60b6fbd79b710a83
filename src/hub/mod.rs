//! Channel hub for pub/sub routing
//!
//! The hub maps channel names to the set of connections subscribed to them and
//! fans every publish out to that set. It holds no application state: no
//! history, no retained messages, no per-channel "current" payload.
//!
//! # Architecture
//!
//! ```text
//!                            Arc<ChannelHub>
//!                     ┌──────────────────────────────┐
//!                     │ connections: HashMap<Id,     │
//!                     │   Subscriber {               │
//!                     │     tx: mpsc::Sender,        │
//!                     │     channels,                │
//!                     │   }                          │
//!                     │ >                            │
//!                     │ channels: HashMap<Channel,   │
//!                     │   HashSet<Id>>               │
//!                     └──────────────┬───────────────┘
//!                                    │
//!         ┌──────────────────────────┼──────────────────────────┐
//!         │                          │                          │
//!         ▼                          ▼                          ▼
//!   [Connection 1]             [Connection 2]             [Connection 3]
//!   publish(lower)             rx.recv()                  rx.recv()
//!         │                          │                          │
//!         └──► hub.publish() ──► try_send(frame) ──► WebSocket text frame
//! ```
//!
//! # Shared payloads
//!
//! A publish is serialized once into `bytes::Bytes`. Every subscriber receives
//! a clone of the same [`HubFrame`], which only bumps a reference count.
//!
//! # Failure isolation
//!
//! Each connection owns a bounded outbound queue. A full or closed queue is a
//! send failure: that connection is dropped from the hub and the fan-out
//! continues with the remaining subscribers.

pub mod config;
pub mod error;
pub mod frame;
pub mod store;
pub mod subscriber;

pub use config::HubConfig;
pub use error::HubError;
pub use frame::HubFrame;
pub use store::ChannelHub;
pub use subscriber::{ConnectionId, Subscriber};

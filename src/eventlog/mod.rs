//! Overlay event log
//!
//! The console keeps one audit log of everything shown on the channels it
//! watches. The [`EventLogReconciler`] builds it from live show/hide traffic,
//! recognises operator replays, expires rows with a deadline and persists the
//! result through a [`KeyValueStore`].

pub mod dispatch;
pub mod entry;
pub mod reconciler;
pub mod replay;
pub mod store;

pub use dispatch::{HubDispatcher, OverlayDispatcher};
pub use entry::{EntryDisplay, EventLogEntry};
pub use reconciler::{EventLogReconciler, ReconcilerConfig};
pub use replay::ReplayMarker;
pub use store::{FileStore, KeyValueStore, MemoryStore, PersistedLog};

//! Media playback synchronization
//!
//! The element owner runs a [`PlaybackSynchronizer`]; consoles watching the
//! same channel run a [`PlaybackMirror`]. Both sides share one wire format:
//! commands flow toward the owner, `state` reports flow back.
//!
//! ```text
//!   Console                      Hub                      Renderer
//!   PlaybackMirror ──seek──────► media:A ───────────────► PlaybackSynchronizer
//!        ▲                                                      │
//!        └──────────────── state (every 1000 ms) ◄──────────────┘
//! ```

pub mod chapters;
pub mod media;
pub mod mirror;
pub mod state;
pub mod sync;

pub use chapters::{Chapter, ChapterNavigator, ChapterState, ChapterTarget};
pub use media::{MediaAttachment, MediaElement, PlayerCommand, PlayerCommandPort, PlayerReport};
pub use mirror::PlaybackMirror;
pub use state::{PlaybackState, StateReport};
pub use sync::{PlaybackSynchronizer, SynchronizerConfig};

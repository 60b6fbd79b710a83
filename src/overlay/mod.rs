//! Renderer-side overlay handling
//!
//! An [`OverlaySurface`] owns everything one rendering surface needs for its
//! channel: the show/hide [`OverlayStateMachine`], the [`MediaPlaylist`] and
//! the playback synchronizer.

pub mod playlist;
pub mod state;
pub mod surface;

pub use playlist::{MediaKind, MediaPlaylist, PlaylistItem};
pub use state::{OverlayStateMachine, Transition};
pub use surface::{OverlaySurface, SurfaceConfig, SurfaceInput};

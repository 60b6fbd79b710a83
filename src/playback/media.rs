//! Media element ports
//!
//! Two kinds of element can sit behind a synchronizer:
//!
//! - a native element the renderer owns and can query synchronously
//! - an embedded player in another process, reachable only through a one-way
//!   command port; it reports progress back as [`PlayerReport`]s

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::PlaybackError;

/// A media element the renderer owns
pub trait MediaElement: Send + Sync {
    /// Point the element at a new source
    fn load(&self, src: &str) -> Result<(), PlaybackError>;

    /// Start or resume playback
    fn play(&self) -> Result<(), PlaybackError>;

    fn pause(&self);

    /// Position in seconds
    fn current_time(&self) -> f64;

    fn set_current_time(&self, time: f64);

    /// Length in seconds; 0 or NaN while unknown
    fn duration(&self) -> f64;

    fn is_paused(&self) -> bool;

    fn is_muted(&self) -> bool;

    fn set_muted(&self, muted: bool);

    /// Detach the source and release decoder resources
    fn clear_source(&self);
}

/// Commands for an embedded player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum PlayerCommand {
    Play,
    Pause,
    /// Pause and rewind
    Stop,
    SeekTo { seconds: f64 },
    Mute,
    Unmute,
    /// Cue a source, optionally at a start offset in seconds
    Load {
        src: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start: Option<f64>,
    },
    /// Tear the player down
    Unload,
}

/// One-way command channel to an embedded player
pub trait PlayerCommandPort: Send + Sync {
    /// Post a command; delivery is not confirmed
    fn post(&self, command: PlayerCommand);
}

/// Messages an embedded player sends back
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerReport {
    Progress {
        current_time: f64,
        duration: f64,
        playing: bool,
        muted: bool,
    },
    Ended,
    Error { reason: String },
}

/// The element a synchronizer or overlay drives
#[derive(Clone)]
pub enum MediaAttachment {
    Native(Arc<dyn MediaElement>),
    Embedded(Arc<dyn PlayerCommandPort>),
}

impl MediaAttachment {
    /// Pause and rewind
    pub fn stop(&self) {
        match self {
            MediaAttachment::Native(element) => {
                element.pause();
                element.set_current_time(0.0);
            }
            MediaAttachment::Embedded(port) => port.post(PlayerCommand::Stop),
        }
    }

    /// Release the source
    pub fn teardown(&self) {
        match self {
            MediaAttachment::Native(element) => element.clear_source(),
            MediaAttachment::Embedded(port) => port.post(PlayerCommand::Unload),
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, MediaAttachment::Native(_))
    }
}

impl std::fmt::Debug for MediaAttachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaAttachment::Native(_) => f.write_str("MediaAttachment::Native"),
            MediaAttachment::Embedded(_) => f.write_str("MediaAttachment::Embedded"),
        }
    }
}

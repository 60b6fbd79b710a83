//! Overlay commands
//!
//! The `data` object of every channel message carries one command, tagged by
//! its `type` field. Unrecognized tags deserialize into
//! [`OverlayCommand::Unknown`] so older consumers keep working when newer
//! command types appear on the wire.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::overlay::PlaylistItem;
use crate::playback::{Chapter, ChapterTarget, StateReport};

/// A command carried on a channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OverlayCommand {
    /// Display a payload (or replace the displayed one)
    Show {
        #[serde(default)]
        payload: Value,
    },
    /// Hide the overlay
    Hide,
    /// Start or resume media playback
    Play,
    /// Pause media playback
    Pause,
    /// Seek to a position in seconds
    Seek { time: f64 },
    /// Mute audio
    Mute,
    /// Unmute audio
    Unmute,
    /// Advance to the next playlist item
    Next,
    /// Append a playlist item
    AddItem { item: PlaylistItem },
    /// Replace a playlist item with the same id
    UpdateItem { item: PlaylistItem },
    /// Remove a playlist item
    RemoveItem { id: String },
    /// Reorder the playlist by item id
    Reorder { order: Vec<String> },
    /// Jump to the next chapter
    ChapterNext,
    /// Restart the current chapter or jump to the previous one
    ChapterPrevious,
    /// Jump to a chapter by index or id
    ChapterJump {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
    /// Replace the chapter list
    SetChapters { chapters: Vec<Chapter> },
    /// Periodic playback snapshot from the element owner
    State(StateReport),
    /// Playback failure reported by a renderer
    Error { reason: String },
    /// Renderer finished loading its media
    Ready,
    /// Any command type this build does not know
    #[serde(other)]
    Unknown,
}

impl OverlayCommand {
    /// Wire name of the command
    pub fn kind(&self) -> &'static str {
        match self {
            OverlayCommand::Show { .. } => "show",
            OverlayCommand::Hide => "hide",
            OverlayCommand::Play => "play",
            OverlayCommand::Pause => "pause",
            OverlayCommand::Seek { .. } => "seek",
            OverlayCommand::Mute => "mute",
            OverlayCommand::Unmute => "unmute",
            OverlayCommand::Next => "next",
            OverlayCommand::AddItem { .. } => "add-item",
            OverlayCommand::UpdateItem { .. } => "update-item",
            OverlayCommand::RemoveItem { .. } => "remove-item",
            OverlayCommand::Reorder { .. } => "reorder",
            OverlayCommand::ChapterNext => "chapter-next",
            OverlayCommand::ChapterPrevious => "chapter-previous",
            OverlayCommand::ChapterJump { .. } => "chapter-jump",
            OverlayCommand::SetChapters { .. } => "set-chapters",
            OverlayCommand::State(_) => "state",
            OverlayCommand::Error { .. } => "error",
            OverlayCommand::Ready => "ready",
            OverlayCommand::Unknown => "unknown",
        }
    }

    /// Jump command addressing a chapter by index
    pub fn chapter_jump_index(index: usize) -> Self {
        OverlayCommand::ChapterJump {
            index: Some(index),
            id: None,
        }
    }

    /// Jump command addressing a chapter by id
    pub fn chapter_jump_id(id: impl Into<String>) -> Self {
        OverlayCommand::ChapterJump {
            index: None,
            id: Some(id.into()),
        }
    }

    /// Resolve the addressing mode of a `chapter-jump`
    ///
    /// An index wins when both are present.
    pub fn chapter_target(&self) -> Option<ChapterTarget> {
        match self {
            OverlayCommand::ChapterJump { index: Some(i), .. } => Some(ChapterTarget::Index(*i)),
            OverlayCommand::ChapterJump {
                id: Some(id), ..
            } => Some(ChapterTarget::Id(id.clone())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_show_wire_format() {
        let cmd: OverlayCommand =
            serde_json::from_value(json!({"type": "show", "payload": {"title": "Alice"}}))
                .unwrap();
        assert_eq!(
            cmd,
            OverlayCommand::Show {
                payload: json!({"title": "Alice"})
            }
        );

        let value = serde_json::to_value(&OverlayCommand::Hide).unwrap();
        assert_eq!(value, json!({"type": "hide"}));
    }

    #[test]
    fn test_kebab_case_tags() {
        let cmd: OverlayCommand =
            serde_json::from_value(json!({"type": "chapter-previous"})).unwrap();
        assert_eq!(cmd, OverlayCommand::ChapterPrevious);

        let cmd: OverlayCommand =
            serde_json::from_value(json!({"type": "reorder", "order": ["b", "a"]})).unwrap();
        assert_eq!(
            cmd,
            OverlayCommand::Reorder {
                order: vec!["b".into(), "a".into()]
            }
        );
        assert_eq!(cmd.kind(), "reorder");
    }

    #[test]
    fn test_unknown_type_is_tolerated() {
        let cmd: OverlayCommand =
            serde_json::from_value(json!({"type": "confetti", "amount": 3})).unwrap();
        assert_eq!(cmd, OverlayCommand::Unknown);
    }

    #[test]
    fn test_malformed_known_type_is_error() {
        let result = serde_json::from_value::<OverlayCommand>(json!({"type": "seek"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_state_report_is_flat() {
        let cmd: OverlayCommand = serde_json::from_value(json!({
            "type": "state",
            "currentTime": 12.5,
            "duration": 60.0,
            "isPlaying": true,
            "isMuted": false,
            "currentChapterIndex": 1
        }))
        .unwrap();

        match cmd {
            OverlayCommand::State(report) => {
                assert_eq!(report.current_time, 12.5);
                assert_eq!(report.current_chapter_index, 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_chapter_target() {
        assert_eq!(
            OverlayCommand::chapter_jump_index(2).chapter_target(),
            Some(ChapterTarget::Index(2))
        );
        assert_eq!(
            OverlayCommand::chapter_jump_id("intro").chapter_target(),
            Some(ChapterTarget::Id("intro".into()))
        );

        let both = OverlayCommand::ChapterJump {
            index: Some(0),
            id: Some("intro".into()),
        };
        assert_eq!(both.chapter_target(), Some(ChapterTarget::Index(0)));

        let neither = OverlayCommand::ChapterJump {
            index: None,
            id: None,
        };
        assert_eq!(neither.chapter_target(), None);
    }
}

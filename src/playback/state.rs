//! Playback state and the `state` report

use serde::{Deserialize, Serialize};

/// Playback position and flags of a media element
///
/// Owned by whichever component holds the real element; other copies are
/// mirrors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    /// Position in seconds
    pub current_time: f64,
    /// Media length in seconds; 0 while unknown
    pub duration: f64,
    pub is_playing: bool,
    pub is_muted: bool,
}

impl PlaybackState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn play(&mut self) {
        self.is_playing = true;
    }

    pub fn pause(&mut self) {
        self.is_playing = false;
    }

    /// Move the position, clamped to the known media length
    pub fn seek(&mut self, time: f64) {
        self.current_time = self.clamp(time);
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.is_muted = muted;
    }

    /// Whether the media length is known
    pub fn has_duration(&self) -> bool {
        self.duration > 0.0
    }

    /// Clamp a position to `[0, duration]` (upper bound only once known)
    pub fn clamp(&self, time: f64) -> f64 {
        let time = if time.is_finite() { time.max(0.0) } else { 0.0 };
        if self.has_duration() {
            time.min(self.duration)
        } else {
            time
        }
    }

    /// Reset to an unloaded element
    pub fn reset(&mut self) {
        *self = Self {
            is_muted: self.is_muted,
            ..Self::default()
        };
    }

    /// Build the wire report
    pub fn report(&self, chapter_index: Option<usize>) -> StateReport {
        StateReport {
            current_time: self.current_time,
            duration: self.duration,
            is_playing: self.is_playing,
            is_muted: self.is_muted,
            current_chapter_index: chapter_index.map_or(-1, |i| i as i64),
        }
    }
}

/// Periodic `state` command body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateReport {
    pub current_time: f64,
    pub duration: f64,
    pub is_playing: bool,
    pub is_muted: bool,
    /// Index of the current chapter, or -1
    #[serde(default = "no_chapter")]
    pub current_chapter_index: i64,
}

fn no_chapter() -> i64 {
    -1
}

impl StateReport {
    /// The playback part of the report
    pub fn playback(&self) -> PlaybackState {
        PlaybackState {
            current_time: self.current_time,
            duration: self.duration,
            is_playing: self.is_playing,
            is_muted: self.is_muted,
        }
    }

    /// Current chapter index, if any
    pub fn chapter_index(&self) -> Option<usize> {
        usize::try_from(self.current_chapter_index).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seek_clamps() {
        let mut state = PlaybackState::new();
        state.seek(-5.0);
        assert_eq!(state.current_time, 0.0);

        // Upper bound unknown until duration is set
        state.seek(500.0);
        assert_eq!(state.current_time, 500.0);

        state.duration = 120.0;
        state.seek(500.0);
        assert_eq!(state.current_time, 120.0);

        state.seek(f64::NAN);
        assert_eq!(state.current_time, 0.0);
    }

    #[test]
    fn test_reset_keeps_mute() {
        let mut state = PlaybackState {
            current_time: 10.0,
            duration: 60.0,
            is_playing: true,
            is_muted: true,
        };
        state.reset();

        assert_eq!(state.current_time, 0.0);
        assert!(!state.has_duration());
        assert!(!state.is_playing);
        assert!(state.is_muted);
    }

    #[test]
    fn test_report_wire_format() {
        let state = PlaybackState {
            current_time: 12.5,
            duration: 60.0,
            is_playing: true,
            is_muted: false,
        };

        let value = serde_json::to_value(state.report(None)).unwrap();
        assert_eq!(value["currentTime"], 12.5);
        assert_eq!(value["isPlaying"], true);
        assert_eq!(value["currentChapterIndex"], -1);

        let report = state.report(Some(2));
        assert_eq!(report.chapter_index(), Some(2));
        assert_eq!(report.playback(), state);
    }
}

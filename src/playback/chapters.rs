//! Chapter navigation
//!
//! Chapters are timestamp markers within one media item, kept sorted
//! ascending. The current chapter is the last one whose timestamp is at or
//! before the playback position.
//!
//! Navigation methods return the position to seek to; `None` means no-op.

use serde::{Deserialize, Serialize};

/// Default window after a chapter start in which "previous" goes back a chapter
///
/// Inside the window `previous` steps back; past it the chapter restarts.
/// With chapters at 30 and 90, `previous` at 92 goes to 30 and at 93.1 to 90.
pub const DEFAULT_RESTART_THRESHOLD: f64 = 3.0;

/// A named position within a media item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: String,
    /// Start position in seconds
    pub timestamp: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Chapter {
    pub fn new(id: impl Into<String>, timestamp: f64) -> Self {
        Self {
            id: id.into(),
            timestamp,
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// How a `chapter-jump` addresses its chapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChapterTarget {
    Index(usize),
    Id(String),
}

/// Snapshot of the chapter list and the current chapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterState {
    pub chapters: Vec<Chapter>,
    /// Index of the current chapter, or -1
    pub current_chapter_index: i64,
}

/// Index of the last chapter starting at or before `time`
pub fn chapter_at(chapters: &[Chapter], time: f64) -> Option<usize> {
    let mut found = None;
    for (i, chapter) in chapters.iter().enumerate() {
        if chapter.timestamp <= time {
            found = Some(i);
        } else {
            break;
        }
    }
    found
}

/// Single source of truth for a media item's chapters
#[derive(Debug, Clone)]
pub struct ChapterNavigator {
    chapters: Vec<Chapter>,
    current: Option<usize>,
    restart_threshold: f64,
}

impl ChapterNavigator {
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_RESTART_THRESHOLD)
    }

    /// Navigator with a custom restart threshold in seconds
    pub fn with_threshold(restart_threshold: f64) -> Self {
        Self {
            chapters: Vec::new(),
            current: None,
            restart_threshold,
        }
    }

    /// Replace the chapter list
    ///
    /// Input is stable-sorted by timestamp, so ties keep their given order.
    pub fn set_chapters(&mut self, mut chapters: Vec<Chapter>, current_time: f64) {
        chapters.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        self.chapters = chapters;
        self.refresh(current_time);
    }

    /// Drop every chapter
    pub fn clear(&mut self) {
        self.chapters.clear();
        self.current = None;
    }

    /// Recompute the current chapter for a position
    ///
    /// Returns the new index when it changed.
    pub fn refresh(&mut self, current_time: f64) -> Option<Option<usize>> {
        let index = chapter_at(&self.chapters, current_time);
        if index == self.current {
            return None;
        }
        self.current = index;
        Some(index)
    }

    /// Start of the chapter after the current one; no wraparound
    pub fn next(&mut self, current_time: f64) -> Option<f64> {
        self.refresh(current_time);
        let target = self.current.map_or(0, |i| i + 1);
        let chapter = self.chapters.get(target)?;
        self.current = Some(target);
        Some(chapter.timestamp)
    }

    /// Restart the current chapter, or go back one
    ///
    /// More than `restart_threshold` seconds into the current chapter seeks to
    /// its start; otherwise (including exactly at the threshold) seeks to the
    /// previous chapter, clamped at the first.
    pub fn previous(&mut self, current_time: f64) -> Option<f64> {
        self.refresh(current_time);
        let index = self.current?;
        let elapsed = current_time - self.chapters[index].timestamp;

        let target = if elapsed > self.restart_threshold {
            index
        } else {
            index.saturating_sub(1)
        };
        self.current = Some(target);
        Some(self.chapters[target].timestamp)
    }

    /// Jump to a chapter by index or id; unknown targets are ignored
    pub fn jump(&mut self, target: &ChapterTarget) -> Option<f64> {
        let index = match target {
            ChapterTarget::Index(i) => (*i < self.chapters.len()).then_some(*i)?,
            ChapterTarget::Id(id) => self.chapters.iter().position(|c| &c.id == id)?,
        };
        self.current = Some(index);
        Some(self.chapters[index].timestamp)
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    pub fn state(&self) -> ChapterState {
        ChapterState {
            chapters: self.chapters.clone(),
            current_chapter_index: self.current.map_or(-1, |i| i as i64),
        }
    }
}

impl Default for ChapterNavigator {
    fn default() -> Self {
        Self::new()
    }
}

//! Media playlist
//!
//! Ordered items for a multi-item media overlay, plus the index of the item
//! currently loaded. Edits keep the current item current wherever it moves.

use serde::{Deserialize, Serialize};

/// How an item is played
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// File or URL played by a native element
    #[default]
    Video,
    /// Video id played by an embedded player
    Youtube,
}

/// One playlist entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistItem {
    pub id: String,
    /// URL, path or embedded-player video id
    pub src: String,
    #[serde(default)]
    pub kind: MediaKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Trim start in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<f64>,
    /// Trim end in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<f64>,
}

impl PlaylistItem {
    pub fn new(id: impl Into<String>, src: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            src: src.into(),
            kind: MediaKind::Video,
            title: None,
            start: None,
            end: None,
        }
    }

    pub fn youtube(id: impl Into<String>, video_id: impl Into<String>) -> Self {
        Self {
            kind: MediaKind::Youtube,
            ..Self::new(id, video_id)
        }
    }

    pub fn trimmed(mut self, start: f64, end: f64) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }
}

/// Ordered list of media items
#[derive(Debug, Clone, Default)]
pub struct MediaPlaylist {
    items: Vec<PlaylistItem>,
    current: Option<usize>,
}

impl MediaPlaylist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item, or replace the item with the same id in place
    ///
    /// Returns `true` when the added item became current (the playlist was
    /// empty).
    pub fn add(&mut self, item: PlaylistItem) -> bool {
        if let Some(i) = self.position(&item.id) {
            self.items[i] = item;
            return false;
        }

        self.items.push(item);
        if self.current.is_none() {
            self.current = Some(0);
            return true;
        }
        false
    }

    /// Replace an existing item
    ///
    /// Returns `true` when the replaced item is the current one. Unknown ids
    /// are ignored.
    pub fn update(&mut self, item: PlaylistItem) -> bool {
        let Some(i) = self.position(&item.id) else {
            return false;
        };
        self.items[i] = item;
        self.current == Some(i)
    }

    /// Remove an item
    ///
    /// Returns `true` when the current item changed. Removing the current
    /// item makes the following item current, wrapping to the first.
    pub fn remove(&mut self, id: &str) -> bool {
        let Some(i) = self.position(id) else {
            return false;
        };
        self.items.remove(i);

        match self.current {
            Some(current) if i < current => {
                self.current = Some(current - 1);
                false
            }
            Some(current) if i == current => {
                self.current = if self.items.is_empty() {
                    None
                } else if current < self.items.len() {
                    Some(current)
                } else {
                    Some(0)
                };
                true
            }
            _ => false,
        }
    }

    /// Reorder by id
    ///
    /// Listed ids come first in the given order; unknown ids are skipped and
    /// unlisted items keep their relative order at the end.
    pub fn reorder(&mut self, order: &[String]) {
        let current_id = self.current().map(|item| item.id.clone());

        let mut remaining = std::mem::take(&mut self.items);
        let mut reordered = Vec::with_capacity(remaining.len());
        for id in order {
            if let Some(i) = remaining.iter().position(|item| &item.id == id) {
                reordered.push(remaining.remove(i));
            }
        }
        reordered.append(&mut remaining);
        self.items = reordered;

        self.current = current_id.and_then(|id| self.position(&id));
    }

    /// Advance to the next item, wrapping to the first
    pub fn next(&mut self) -> Option<&PlaylistItem> {
        if self.items.is_empty() {
            return None;
        }
        let next = self.current.map_or(0, |i| (i + 1) % self.items.len());
        self.current = Some(next);
        self.items.get(next)
    }

    pub fn current(&self) -> Option<&PlaylistItem> {
        self.items.get(self.current?)
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn items(&self) -> &[PlaylistItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playlist(ids: &[&str]) -> MediaPlaylist {
        let mut playlist = MediaPlaylist::new();
        for id in ids {
            playlist.add(PlaylistItem::new(*id, format!("{}.mp4", id)));
        }
        playlist
    }

    fn ids(playlist: &MediaPlaylist) -> Vec<&str> {
        playlist.items().iter().map(|item| item.id.as_str()).collect()
    }

    #[test]
    fn test_first_item_becomes_current() {
        let mut playlist = MediaPlaylist::new();
        assert!(playlist.add(PlaylistItem::new("a", "a.mp4")));
        assert!(!playlist.add(PlaylistItem::new("b", "b.mp4")));
        assert_eq!(playlist.current().unwrap().id, "a");
    }

    #[test]
    fn test_add_existing_id_replaces() {
        let mut playlist = playlist(&["a", "b"]);
        playlist.add(PlaylistItem::new("a", "other.mp4"));

        assert_eq!(playlist.len(), 2);
        assert_eq!(playlist.items()[0].src, "other.mp4");
    }

    #[test]
    fn test_next_wraps() {
        let mut playlist = playlist(&["a", "b", "c"]);
        assert_eq!(playlist.next().unwrap().id, "b");
        assert_eq!(playlist.next().unwrap().id, "c");
        assert_eq!(playlist.next().unwrap().id, "a");

        assert!(MediaPlaylist::new().next().is_none());
    }

    #[test]
    fn test_update_reports_current() {
        let mut playlist = playlist(&["a", "b"]);
        assert!(playlist.update(PlaylistItem::new("a", "a2.mp4")));
        assert!(!playlist.update(PlaylistItem::new("b", "b2.mp4")));
        assert!(!playlist.update(PlaylistItem::new("zzz", "z.mp4")));
        assert_eq!(playlist.current().unwrap().src, "a2.mp4");
    }

    #[test]
    fn test_remove_adjusts_current() {
        let mut playlist = playlist(&["a", "b", "c"]);
        playlist.next(); // b

        assert!(!playlist.remove("a"));
        assert_eq!(playlist.current().unwrap().id, "b");

        assert!(playlist.remove("b"));
        assert_eq!(playlist.current().unwrap().id, "c");

        assert!(playlist.remove("c"));
        assert!(playlist.current().is_none());
        assert!(!playlist.remove("c"));
    }

    #[test]
    fn test_remove_last_current_wraps() {
        let mut playlist = playlist(&["a", "b"]);
        playlist.next(); // b

        assert!(playlist.remove("b"));
        assert_eq!(playlist.current().unwrap().id, "a");
    }

    #[test]
    fn test_reorder_keeps_current() {
        let mut playlist = playlist(&["a", "b", "c", "d"]);
        playlist.next(); // b

        playlist.reorder(&["c".into(), "missing".into(), "b".into()]);

        assert_eq!(ids(&playlist), vec!["c", "b", "a", "d"]);
        assert_eq!(playlist.current().unwrap().id, "b");
        assert_eq!(playlist.current_index(), Some(1));
    }

    #[test]
    fn test_item_wire_format() {
        let item: PlaylistItem = serde_json::from_value(serde_json::json!({
            "id": "yt-1",
            "src": "dQw4w9WgXcQ",
            "kind": "youtube",
            "start": 10.0,
            "end": 20.0
        }))
        .unwrap();
        assert_eq!(item, PlaylistItem::youtube("yt-1", "dQw4w9WgXcQ").trimmed(10.0, 20.0));

        let item: PlaylistItem =
            serde_json::from_value(serde_json::json!({"id": "v", "src": "v.mp4"})).unwrap();
        assert_eq!(item.kind, MediaKind::Video);
    }
}

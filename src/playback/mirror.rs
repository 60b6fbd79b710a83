//! Console-side playback mirror
//!
//! A read-only copy of a remote element's state, fed by the `state` reports
//! on its channel. The one local write is an optimistic `seek`, so a scrub
//! bar does not jump back while the next report is in flight.

use std::sync::Arc;

use tokio::time::Instant;

use super::chapters::Chapter;
use super::state::{PlaybackState, StateReport};
use crate::client::ChannelPublisher;
use crate::error::Result;
use crate::protocol::{Channel, OverlayCommand};

/// Mirror of a remote [`PlaybackState`]
pub struct PlaybackMirror {
    channel: Channel,
    publisher: Arc<dyn ChannelPublisher>,
    state: PlaybackState,
    chapter_index: Option<usize>,
    ready: bool,
    last_error: Option<String>,
    last_report_at: Option<Instant>,
}

impl PlaybackMirror {
    pub fn new(channel: Channel, publisher: Arc<dyn ChannelPublisher>) -> Self {
        Self {
            channel,
            publisher,
            state: PlaybackState::new(),
            chapter_index: None,
            ready: false,
            last_error: None,
            last_report_at: None,
        }
    }

    /// Take in a command seen on the channel
    ///
    /// Returns `true` if the mirror changed.
    pub fn apply(&mut self, command: &OverlayCommand) -> bool {
        match command {
            OverlayCommand::State(report) => {
                self.apply_report(report);
                true
            }
            OverlayCommand::Ready => {
                self.ready = true;
                self.last_error = None;
                true
            }
            OverlayCommand::Error { reason } => {
                self.last_error = Some(reason.clone());
                true
            }
            // Includes the echo of our own seek, which is already applied
            _ => false,
        }
    }

    fn apply_report(&mut self, report: &StateReport) {
        self.state = report.playback();
        self.chapter_index = report.chapter_index();
        self.last_report_at = Some(Instant::now());
    }

    pub fn play(&self) -> Result<()> {
        self.send(&OverlayCommand::Play)
    }

    pub fn pause(&self) -> Result<()> {
        self.send(&OverlayCommand::Pause)
    }

    /// Seek the remote element and move the local copy immediately
    pub fn seek(&mut self, time: f64) -> Result<()> {
        self.state.seek(time);
        self.send(&OverlayCommand::Seek {
            time: self.state.current_time,
        })
    }

    pub fn set_muted(&self, muted: bool) -> Result<()> {
        self.send(if muted {
            &OverlayCommand::Mute
        } else {
            &OverlayCommand::Unmute
        })
    }

    pub fn next(&self) -> Result<()> {
        self.send(&OverlayCommand::Next)
    }

    pub fn chapter_next(&self) -> Result<()> {
        self.send(&OverlayCommand::ChapterNext)
    }

    pub fn chapter_previous(&self) -> Result<()> {
        self.send(&OverlayCommand::ChapterPrevious)
    }

    pub fn jump_to_chapter(&self, index: usize) -> Result<()> {
        self.send(&OverlayCommand::chapter_jump_index(index))
    }

    pub fn set_chapters(&self, chapters: Vec<Chapter>) -> Result<()> {
        self.send(&OverlayCommand::SetChapters { chapters })
    }

    fn send(&self, command: &OverlayCommand) -> Result<()> {
        self.publisher.publish(&self.channel, command)
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn chapter_index(&self) -> Option<usize> {
        self.chapter_index
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Time since the last `state` report
    pub fn report_age(&self) -> Option<std::time::Duration> {
        self.last_report_at.map(|at| at.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::publisher::testing::RecordingPublisher;

    fn mirror() -> (PlaybackMirror, Arc<RecordingPublisher>) {
        let publisher = Arc::new(RecordingPublisher::default());
        let mirror = PlaybackMirror::new(Channel::media("B").unwrap(), publisher.clone());
        (mirror, publisher)
    }

    fn report(time: f64) -> OverlayCommand {
        OverlayCommand::State(StateReport {
            current_time: time,
            duration: 60.0,
            is_playing: true,
            is_muted: false,
            current_chapter_index: 0,
        })
    }

    #[tokio::test]
    async fn test_mirror_follows_reports() {
        let (mut mirror, _publisher) = mirror();
        assert!(mirror.report_age().is_none());

        assert!(mirror.apply(&report(12.0)));
        assert_eq!(mirror.state().current_time, 12.0);
        assert_eq!(mirror.chapter_index(), Some(0));
        assert!(mirror.report_age().is_some());

        assert!(mirror.apply(&OverlayCommand::Error {
            reason: "404".into()
        }));
        assert_eq!(mirror.last_error(), Some("404"));

        assert!(mirror.apply(&OverlayCommand::Ready));
        assert!(mirror.is_ready());
        assert!(mirror.last_error().is_none());

        assert!(!mirror.apply(&OverlayCommand::Hide));
    }

    #[tokio::test]
    async fn test_optimistic_seek() {
        let (mut mirror, publisher) = mirror();
        mirror.apply(&report(10.0));

        mirror.seek(75.0).unwrap();
        assert_eq!(mirror.state().current_time, 60.0);
        assert_eq!(publisher.commands(), vec![OverlayCommand::Seek { time: 60.0 }]);

        // The echo of our own seek changes nothing
        assert!(!mirror.apply(&OverlayCommand::Seek { time: 60.0 }));
        assert_eq!(mirror.state().current_time, 60.0);
    }

    #[tokio::test]
    async fn test_commands_are_published() {
        let (mirror, publisher) = mirror();
        mirror.play().unwrap();
        mirror.set_muted(true).unwrap();
        mirror.chapter_previous().unwrap();
        mirror.jump_to_chapter(2).unwrap();

        let sent = publisher.sent();
        assert!(sent.iter().all(|(channel, _)| channel.as_str() == "media:B"));
        assert_eq!(
            publisher.commands(),
            vec![
                OverlayCommand::Play,
                OverlayCommand::Mute,
                OverlayCommand::ChapterPrevious,
                OverlayCommand::chapter_jump_index(2),
            ]
        );
    }
}

//! Playback synchronizer
//!
//! Owns the authoritative [`PlaybackState`] of one media element and keeps it
//! in step with the element:
//!
//! - inbound commands (`play`, `seek`, `chapter-*`) drive the element
//! - the element is sampled on a short interval (native) or reports its own
//!   progress (embedded)
//! - the state is republished on the owning channel on a longer interval
//!
//! The synchronizer is a plain struct; the owner drives it from its own task
//! and interval timers.

use std::sync::Arc;
use std::time::Duration;

use super::chapters::{ChapterNavigator, DEFAULT_RESTART_THRESHOLD};
use super::media::{MediaAttachment, PlayerCommand, PlayerReport};
use super::state::PlaybackState;
use crate::client::ChannelPublisher;
use crate::error::{PlaybackError, Result};
use crate::protocol::{Channel, OverlayCommand};

/// Synchronizer timing
#[derive(Debug, Clone)]
pub struct SynchronizerConfig {
    /// How often the state is republished
    pub report_interval: Duration,
    /// How often the element is sampled and the chapter refreshed
    pub chapter_interval: Duration,
    /// Seconds into a chapter after which "previous" restarts it
    pub restart_threshold: f64,
}

impl Default for SynchronizerConfig {
    fn default() -> Self {
        Self {
            report_interval: Duration::from_millis(1000),
            chapter_interval: Duration::from_millis(500),
            restart_threshold: DEFAULT_RESTART_THRESHOLD,
        }
    }
}

impl SynchronizerConfig {
    pub fn report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    pub fn chapter_interval(mut self, interval: Duration) -> Self {
        self.chapter_interval = interval;
        self
    }

    pub fn restart_threshold(mut self, seconds: f64) -> Self {
        self.restart_threshold = seconds;
        self
    }
}

/// Trimmed segment of the current item
#[derive(Debug, Clone, Copy, PartialEq)]
struct Trim {
    start: f64,
    end: f64,
}

/// Keeps one media element and its channel in step
pub struct PlaybackSynchronizer {
    channel: Channel,
    publisher: Arc<dyn ChannelPublisher>,
    attachment: Option<MediaAttachment>,
    state: PlaybackState,
    chapters: ChapterNavigator,
    trim: Option<Trim>,
    ready_sent: bool,
    config: SynchronizerConfig,
}

impl PlaybackSynchronizer {
    pub fn new(
        channel: Channel,
        publisher: Arc<dyn ChannelPublisher>,
        config: SynchronizerConfig,
    ) -> Self {
        Self {
            channel,
            publisher,
            attachment: None,
            state: PlaybackState::new(),
            chapters: ChapterNavigator::with_threshold(config.restart_threshold),
            trim: None,
            ready_sent: false,
            config,
        }
    }

    pub fn config(&self) -> &SynchronizerConfig {
        &self.config
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Attach the element to drive
    pub fn attach(&mut self, attachment: MediaAttachment) {
        self.attachment = Some(attachment);
    }

    pub fn detach(&mut self) -> Option<MediaAttachment> {
        self.attachment.take()
    }

    pub fn attachment(&self) -> Option<&MediaAttachment> {
        self.attachment.as_ref()
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn chapters(&self) -> &ChapterNavigator {
        &self.chapters
    }

    /// Load a source and start playing it
    ///
    /// With both `start` and `end` set, playback loops over that segment.
    pub fn load(
        &mut self,
        src: &str,
        start: Option<f64>,
        end: Option<f64>,
    ) -> std::result::Result<(), PlaybackError> {
        self.state.reset();
        self.chapters.clear();
        self.ready_sent = false;
        self.trim = match (start, end) {
            (Some(start), Some(end)) if end > start => Some(Trim { start, end }),
            _ => None,
        };

        match &self.attachment {
            Some(MediaAttachment::Native(element)) => {
                element.load(src)?;
                if let Some(start) = start {
                    element.set_current_time(start);
                    self.state.seek(start);
                }
                element.play()?;
            }
            Some(MediaAttachment::Embedded(port)) => {
                port.post(PlayerCommand::Load {
                    src: src.to_string(),
                    start,
                });
                if let Some(start) = start {
                    self.state.seek(start);
                }
            }
            None => {
                tracing::debug!(channel = %self.channel, src = src, "Load with no element attached");
                return Ok(());
            }
        }

        self.state.play();
        tracing::debug!(channel = %self.channel, src = src, trimmed = self.trim.is_some(), "Media loaded");
        Ok(())
    }

    /// Apply a playback command
    ///
    /// Returns `false` for commands that are not about playback.
    pub fn apply(&mut self, command: &OverlayCommand) -> std::result::Result<bool, PlaybackError> {
        match command {
            OverlayCommand::Play => self.play()?,
            OverlayCommand::Pause => self.pause(),
            OverlayCommand::Seek { time } => self.seek(*time),
            OverlayCommand::Mute => self.set_muted(true),
            OverlayCommand::Unmute => self.set_muted(false),
            OverlayCommand::ChapterNext => {
                if let Some(time) = self.chapters.next(self.state.current_time) {
                    self.seek(time);
                }
            }
            OverlayCommand::ChapterPrevious => {
                if let Some(time) = self.chapters.previous(self.state.current_time) {
                    self.seek(time);
                }
            }
            OverlayCommand::ChapterJump { .. } => {
                let time = command
                    .chapter_target()
                    .and_then(|target| self.chapters.jump(&target));
                if let Some(time) = time {
                    self.seek(time);
                }
            }
            OverlayCommand::SetChapters { chapters } => {
                self.chapters
                    .set_chapters(chapters.clone(), self.state.current_time);
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    pub fn play(&mut self) -> std::result::Result<(), PlaybackError> {
        match &self.attachment {
            Some(MediaAttachment::Native(element)) => element.play()?,
            Some(MediaAttachment::Embedded(port)) => port.post(PlayerCommand::Play),
            None => {}
        }
        self.state.play();
        Ok(())
    }

    pub fn pause(&mut self) {
        match &self.attachment {
            Some(MediaAttachment::Native(element)) => element.pause(),
            Some(MediaAttachment::Embedded(port)) => port.post(PlayerCommand::Pause),
            None => {}
        }
        self.state.pause();
    }

    /// Seek the element and update the local state without waiting for it
    pub fn seek(&mut self, time: f64) {
        let time = self.state.clamp(time);
        match &self.attachment {
            Some(MediaAttachment::Native(element)) => element.set_current_time(time),
            Some(MediaAttachment::Embedded(port)) => {
                port.post(PlayerCommand::SeekTo { seconds: time })
            }
            None => {}
        }
        self.state.seek(time);
        self.chapters.refresh(time);
    }

    pub fn set_muted(&mut self, muted: bool) {
        match &self.attachment {
            Some(MediaAttachment::Native(element)) => element.set_muted(muted),
            Some(MediaAttachment::Embedded(port)) => port.post(if muted {
                PlayerCommand::Mute
            } else {
                PlayerCommand::Unmute
            }),
            None => {}
        }
        self.state.set_muted(muted);
    }

    /// Stop playback and forget the current item
    pub fn stop(&mut self) {
        if let Some(attachment) = &self.attachment {
            attachment.stop();
        }
        self.mark_stopped();
    }

    /// Record a stop performed directly on the element
    pub fn mark_stopped(&mut self) {
        self.state.pause();
        self.state.seek(0.0);
        self.trim = None;
    }

    /// Sample a native element
    ///
    /// Applies the trim loop and refreshes the chapter. Returns `true` when
    /// the element reached the end of its media.
    pub fn poll(&mut self) -> bool {
        let Some(MediaAttachment::Native(element)) = &self.attachment else {
            self.chapters.refresh(self.state.current_time);
            return false;
        };

        let duration = element.duration();
        self.state.duration = if duration.is_finite() { duration.max(0.0) } else { 0.0 };
        self.state.current_time = element.current_time().max(0.0);
        self.state.is_playing = !element.is_paused();
        self.state.is_muted = element.is_muted();

        if let Some(trim) = self.trim {
            if self.state.current_time >= trim.end {
                element.set_current_time(trim.start);
                self.state.seek(trim.start);
                if let Err(e) = element.play() {
                    tracing::warn!(channel = %self.channel, error = %e, "Trim loop restart failed");
                }
                self.state.play();
            }
        }

        self.chapters.refresh(self.state.current_time);

        self.trim.is_none()
            && self.state.has_duration()
            && !self.state.is_playing
            && self.state.current_time >= self.state.duration
    }

    /// Take progress from an embedded player
    pub fn on_player_report(&mut self, report: &PlayerReport) -> std::result::Result<(), PlaybackError> {
        match report {
            PlayerReport::Progress {
                current_time,
                duration,
                playing,
                muted,
            } => {
                self.state.duration = duration.max(0.0);
                self.state.current_time = current_time.max(0.0);
                self.state.is_playing = *playing;
                self.state.is_muted = *muted;

                if let (Some(trim), Some(MediaAttachment::Embedded(port))) =
                    (self.trim, &self.attachment)
                {
                    if self.state.current_time >= trim.end {
                        port.post(PlayerCommand::SeekTo {
                            seconds: trim.start,
                        });
                        port.post(PlayerCommand::Play);
                        self.state.seek(trim.start);
                        self.state.play();
                    }
                }

                self.chapters.refresh(self.state.current_time);
                Ok(())
            }
            PlayerReport::Ended => {
                self.state.pause();
                Ok(())
            }
            PlayerReport::Error { reason } => Err(PlaybackError::Player(reason.clone())),
        }
    }

    /// Publish the current state on the channel
    ///
    /// Nothing is published while the media length is unknown. The first
    /// report for an item is preceded by a one-time `ready`. Returns whether a
    /// report was sent.
    pub fn report(&mut self) -> Result<bool> {
        if !self.state.has_duration() {
            return Ok(false);
        }

        if !self.ready_sent {
            self.publisher.publish(&self.channel, &OverlayCommand::Ready)?;
            self.ready_sent = true;
        }

        let report = self.state.report(self.chapters.current_index());
        self.publisher
            .publish(&self.channel, &OverlayCommand::State(report))?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::publisher::testing::RecordingPublisher;
    use crate::playback::media::testing::{FakeElement, RecordingPlayer};
    use crate::playback::{Chapter, MediaElement};

    fn synchronizer() -> (PlaybackSynchronizer, Arc<RecordingPublisher>) {
        let publisher = Arc::new(RecordingPublisher::default());
        let sync = PlaybackSynchronizer::new(
            Channel::media("A").unwrap(),
            publisher.clone(),
            SynchronizerConfig::default(),
        );
        (sync, publisher)
    }

    #[test]
    fn test_report_suppressed_without_duration() {
        let (mut sync, publisher) = synchronizer();
        let element = FakeElement::new();
        sync.attach(MediaAttachment::Native(element.clone()));
        sync.load("clip.mp4", None, None).unwrap();

        sync.poll();
        assert!(!sync.report().unwrap());
        assert!(publisher.sent().is_empty());

        element.set_duration(60.0);
        sync.poll();
        assert!(sync.report().unwrap());
        assert!(sync.report().unwrap());

        let commands = publisher.commands();
        assert_eq!(commands[0], OverlayCommand::Ready);
        assert!(matches!(commands[1], OverlayCommand::State(_)));
        assert_eq!(commands.len(), 3);
    }

    #[test]
    fn test_seek_is_optimistic_and_clamped() {
        let (mut sync, _publisher) = synchronizer();
        let element = FakeElement::new();
        element.set_duration(100.0);
        sync.attach(MediaAttachment::Native(element.clone()));
        sync.load("clip.mp4", None, None).unwrap();
        sync.poll();

        sync.apply(&OverlayCommand::Seek { time: 40.0 }).unwrap();
        assert_eq!(sync.state().current_time, 40.0);
        assert_eq!(element.current_time(), 40.0);

        sync.apply(&OverlayCommand::Seek { time: 400.0 }).unwrap();
        assert_eq!(sync.state().current_time, 100.0);
    }

    #[test]
    fn test_embedded_commands_are_posted() {
        let (mut sync, _publisher) = synchronizer();
        let player = RecordingPlayer::new();
        sync.attach(MediaAttachment::Embedded(player.clone()));

        sync.load("dQw4w9WgXcQ", Some(5.0), None).unwrap();
        sync.apply(&OverlayCommand::Pause).unwrap();
        sync.apply(&OverlayCommand::Mute).unwrap();
        sync.apply(&OverlayCommand::Seek { time: 12.0 }).unwrap();

        assert_eq!(
            player.posted(),
            vec![
                PlayerCommand::Load {
                    src: "dQw4w9WgXcQ".into(),
                    start: Some(5.0)
                },
                PlayerCommand::Pause,
                PlayerCommand::Mute,
                PlayerCommand::SeekTo { seconds: 12.0 },
            ]
        );
        assert!(sync.state().is_muted);
        assert!(!sync.state().is_playing);
    }

    #[test]
    fn test_player_reports_are_clamped() {
        let (mut sync, _publisher) = synchronizer();
        sync.attach(MediaAttachment::Embedded(RecordingPlayer::new()));

        sync.on_player_report(&PlayerReport::Progress {
            current_time: -1.0,
            duration: 30.0,
            playing: true,
            muted: false,
        })
        .unwrap();
        assert_eq!(sync.state().current_time, 0.0);
        assert!(sync.state().has_duration());

        let err = sync
            .on_player_report(&PlayerReport::Error {
                reason: "embed blocked".into(),
            })
            .unwrap_err();
        assert_eq!(err.reason(), "embed blocked");
    }

    #[test]
    fn test_trim_loop_native() {
        let (mut sync, _publisher) = synchronizer();
        let element = FakeElement::new();
        element.set_duration(120.0);
        sync.attach(MediaAttachment::Native(element.clone()));
        sync.load("clip.mp4", Some(10.0), Some(20.0)).unwrap();
        assert_eq!(element.current_time(), 10.0);

        element.set_time(20.2);
        assert!(!sync.poll());
        assert_eq!(element.current_time(), 10.0);
        assert_eq!(sync.state().current_time, 10.0);
        assert!(!element.is_paused());
    }

    #[test]
    fn test_trim_loop_embedded() {
        let (mut sync, _publisher) = synchronizer();
        let player = RecordingPlayer::new();
        sync.attach(MediaAttachment::Embedded(player.clone()));
        sync.load("abc", Some(3.0), Some(8.0)).unwrap();

        sync.on_player_report(&PlayerReport::Progress {
            current_time: 8.1,
            duration: 60.0,
            playing: true,
            muted: false,
        })
        .unwrap();

        let posted = player.posted();
        assert_eq!(
            &posted[posted.len() - 2..],
            &[PlayerCommand::SeekTo { seconds: 3.0 }, PlayerCommand::Play]
        );
        assert_eq!(sync.state().current_time, 3.0);
    }

    #[test]
    fn test_native_end_detected() {
        let (mut sync, _publisher) = synchronizer();
        let element = FakeElement::new();
        element.set_duration(30.0);
        sync.attach(MediaAttachment::Native(element.clone()));
        sync.load("clip.mp4", None, None).unwrap();

        element.set_time(30.0);
        element.pause();
        assert!(sync.poll());
    }

    #[test]
    fn test_chapter_navigation_seeks() {
        let (mut sync, publisher) = synchronizer();
        let element = FakeElement::new();
        element.set_duration(120.0);
        sync.attach(MediaAttachment::Native(element.clone()));
        sync.load("clip.mp4", None, None).unwrap();

        sync.apply(&OverlayCommand::SetChapters {
            chapters: vec![
                Chapter::new("qa", 90.0),
                Chapter::new("intro", 0.0),
                Chapter::new("talk", 30.0),
            ],
        })
        .unwrap();

        element.set_time(45.0);
        sync.poll();
        assert_eq!(sync.chapters().current_index(), Some(1));

        sync.apply(&OverlayCommand::ChapterNext).unwrap();
        assert_eq!(element.current_time(), 90.0);

        sync.apply(&OverlayCommand::chapter_jump_id("intro")).unwrap();
        assert_eq!(element.current_time(), 0.0);

        sync.report().unwrap();
        match publisher.commands().last() {
            Some(OverlayCommand::State(report)) => assert_eq!(report.current_chapter_index, 0),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_play_failure_surfaces() {
        let (mut sync, _publisher) = synchronizer();
        let element = FakeElement::new();
        element.fail_play("autoplay blocked");
        sync.attach(MediaAttachment::Native(element));

        let err = sync.load("clip.mp4", None, None).unwrap_err();
        assert!(matches!(err, PlaybackError::PlayRejected(_)));
    }

    #[test]
    fn test_non_playback_commands_are_not_handled() {
        let (mut sync, _publisher) = synchronizer();
        assert!(!sync.apply(&OverlayCommand::Hide).unwrap());
        assert!(!sync.apply(&OverlayCommand::Unknown).unwrap());
    }
}

//! Renderer-side overlay surface
//!
//! Consumes one channel's traffic and routes every command to the overlay
//! state machine, the playlist or the playback synchronizer. Playback
//! failures put up a banner, go upstream as `error`, and advance the
//! playlist after a delay.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::playlist::MediaPlaylist;
use super::state::{OverlayStateMachine, Transition, DEFAULT_TEARDOWN_DELAY};
use crate::client::{ChannelPublisher, ConnectionEvent};
use crate::error::PlaybackError;
use crate::playback::{MediaAttachment, PlaybackSynchronizer, PlayerReport, SynchronizerConfig};
use crate::protocol::{Channel, ChannelMessage, OverlayCommand};

/// Surface timing
#[derive(Debug, Clone)]
pub struct SurfaceConfig {
    /// Delay before advancing past a failed item
    pub error_advance_delay: Duration,
    /// Delay between hide and source teardown
    pub teardown_delay: Duration,
    pub sync: SynchronizerConfig,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            error_advance_delay: Duration::from_millis(2000),
            teardown_delay: DEFAULT_TEARDOWN_DELAY,
            sync: SynchronizerConfig::default(),
        }
    }
}

impl SurfaceConfig {
    pub fn error_advance_delay(mut self, delay: Duration) -> Self {
        self.error_advance_delay = delay;
        self
    }

    pub fn teardown_delay(mut self, delay: Duration) -> Self {
        self.teardown_delay = delay;
        self
    }

    pub fn sync(mut self, sync: SynchronizerConfig) -> Self {
        self.sync = sync;
        self
    }
}

/// Inputs that do not arrive over the channel
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceInput {
    /// Move to the next playlist item
    Advance,
    /// Progress or failure from an embedded player
    Player(PlayerReport),
}

/// One overlay surface bound to one channel
pub struct OverlaySurface {
    channel: Channel,
    overlay: OverlayStateMachine,
    playlist: MediaPlaylist,
    sync: PlaybackSynchronizer,
    publisher: Arc<dyn ChannelPublisher>,
    banner: Option<String>,
    advance: Option<JoinHandle<()>>,
    inputs_tx: mpsc::Sender<SurfaceInput>,
    inputs_rx: Option<mpsc::Receiver<SurfaceInput>>,
    config: SurfaceConfig,
}

impl OverlaySurface {
    pub fn new(channel: Channel, publisher: Arc<dyn ChannelPublisher>, config: SurfaceConfig) -> Self {
        let (inputs_tx, inputs_rx) = mpsc::channel(64);
        Self {
            overlay: OverlayStateMachine::with_teardown_delay(channel.clone(), config.teardown_delay),
            playlist: MediaPlaylist::new(),
            sync: PlaybackSynchronizer::new(channel.clone(), publisher.clone(), config.sync.clone()),
            channel,
            publisher,
            banner: None,
            advance: None,
            inputs_tx,
            inputs_rx: Some(inputs_rx),
            config,
        }
    }

    /// Attach the element this surface plays media on
    pub fn attach(&mut self, attachment: MediaAttachment) {
        self.overlay.attach(attachment.clone());
        self.sync.attach(attachment);
    }

    /// Sender for player reports and other out-of-band inputs
    pub fn inputs(&self) -> mpsc::Sender<SurfaceInput> {
        self.inputs_tx.clone()
    }

    /// Handle one message from the connection
    pub fn handle(&mut self, message: &ChannelMessage) {
        if message.channel != self.channel {
            return;
        }

        match message.decode() {
            Ok(command) => self.dispatch(command),
            Err(e) => {
                tracing::warn!(channel = %self.channel, error = %e, "Dropping malformed command");
            }
        }
    }

    /// Route a decoded command
    pub fn dispatch(&mut self, command: OverlayCommand) {
        tracing::debug!(channel = %self.channel, command = command.kind(), "Command received");

        match command {
            OverlayCommand::Show { .. } => {
                if self.overlay.apply(&command) == Transition::Shown && self.playlist.current().is_some() {
                    self.load_current();
                }
            }
            OverlayCommand::Hide => {
                if self.overlay.apply(&command) == Transition::Hidden {
                    self.cancel_advance();
                    self.sync.mark_stopped();
                }
            }
            OverlayCommand::Play
            | OverlayCommand::Pause
            | OverlayCommand::Seek { .. }
            | OverlayCommand::Mute
            | OverlayCommand::Unmute
            | OverlayCommand::ChapterNext
            | OverlayCommand::ChapterPrevious
            | OverlayCommand::ChapterJump { .. }
            | OverlayCommand::SetChapters { .. } => {
                if let Err(e) = self.sync.apply(&command) {
                    self.playback_failed(e);
                }
            }
            OverlayCommand::Next => self.advance(),
            OverlayCommand::AddItem { item } => {
                if self.playlist.add(item) && self.overlay.is_visible() {
                    self.load_current();
                }
            }
            OverlayCommand::UpdateItem { item } => {
                if self.playlist.update(item) && self.overlay.is_visible() {
                    self.load_current();
                }
            }
            OverlayCommand::RemoveItem { id } => {
                if self.playlist.remove(&id) {
                    if self.playlist.is_empty() {
                        self.sync.stop();
                    } else if self.overlay.is_visible() {
                        self.load_current();
                    }
                }
            }
            OverlayCommand::Reorder { order } => self.playlist.reorder(&order),
            // Reports from this surface echoed back by the hub
            OverlayCommand::State(_) | OverlayCommand::Ready | OverlayCommand::Error { .. } => {}
            OverlayCommand::Unknown => {
                tracing::debug!(channel = %self.channel, "Ignoring unknown command");
            }
        }
    }

    /// Handle an out-of-band input
    pub fn on_input(&mut self, input: SurfaceInput) {
        match input {
            SurfaceInput::Advance => self.advance(),
            SurfaceInput::Player(PlayerReport::Ended) => {
                let _ = self.sync.on_player_report(&PlayerReport::Ended);
                self.advance();
            }
            SurfaceInput::Player(report) => {
                if let Err(e) = self.sync.on_player_report(&report) {
                    self.playback_failed(e);
                }
            }
        }
    }

    /// Move to the next playlist item and load it
    ///
    /// While hidden only the cursor moves; the next show loads the item.
    pub fn advance(&mut self) {
        self.cancel_advance();
        self.banner = None;
        if self.playlist.next().is_some() && self.overlay.is_visible() {
            self.load_current();
        }
    }

    fn load_current(&mut self) {
        let Some(item) = self.playlist.current().cloned() else {
            return;
        };

        match self.sync.load(&item.src, item.start, item.end) {
            Ok(()) => {
                self.banner = None;
                tracing::info!(channel = %self.channel, item = %item.id, "Playing item");
            }
            Err(e) => self.playback_failed(e),
        }
    }

    fn playback_failed(&mut self, error: PlaybackError) {
        let reason = error.reason().to_string();
        tracing::warn!(channel = %self.channel, reason = %reason, "Playback failed");

        self.banner = Some(reason.clone());
        if let Err(e) = self
            .publisher
            .publish(&self.channel, &OverlayCommand::Error { reason })
        {
            tracing::debug!(channel = %self.channel, error = %e, "Error report not sent");
        }

        self.cancel_advance();
        let inputs = self.inputs_tx.clone();
        let delay = self.config.error_advance_delay;
        self.advance = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = inputs.send(SurfaceInput::Advance).await;
        }));
    }

    fn cancel_advance(&mut self) {
        if let Some(handle) = self.advance.take() {
            handle.abort();
        }
    }

    /// Publish the playback state
    pub fn report(&mut self) {
        if let Err(e) = self.sync.report() {
            tracing::debug!(channel = %self.channel, error = %e, "State report not sent");
        }
    }

    /// Sample the element; advances when the item ended
    pub fn poll(&mut self) {
        if self.sync.poll() {
            self.advance();
        }
    }

    /// Drive the surface from connection events until the connection goes away
    pub async fn run(mut self, mut events: mpsc::Receiver<ConnectionEvent>) {
        let Some(mut inputs) = self.inputs_rx.take() else {
            tracing::error!(channel = %self.channel, "Surface already running");
            return;
        };

        let mut report_tick = interval(self.config.sync.report_interval);
        report_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut poll_tick = interval(self.config.sync.chapter_interval);
        poll_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(ConnectionEvent::Message(message)) => self.handle(&message),
                    Some(ConnectionEvent::Connected) => {
                        tracing::info!(channel = %self.channel, "Surface connected");
                    }
                    Some(ConnectionEvent::Disconnected { reason, reconnecting }) => {
                        tracing::info!(channel = %self.channel, reason = %reason, reconnecting, "Surface disconnected");
                    }
                    None => break,
                },
                Some(input) = inputs.recv() => self.on_input(input),
                _ = report_tick.tick() => self.report(),
                _ = poll_tick.tick() => self.poll(),
            }
        }

        self.cancel_advance();
        tracing::debug!(channel = %self.channel, "Surface stopped");
    }

    pub fn overlay(&self) -> &OverlayStateMachine {
        &self.overlay
    }

    pub fn playlist(&self) -> &MediaPlaylist {
        &self.playlist
    }

    pub fn synchronizer(&self) -> &PlaybackSynchronizer {
        &self.sync
    }

    /// Failure text currently shown, if any
    pub fn banner(&self) -> Option<&str> {
        self.banner.as_deref()
    }
}

impl Drop for OverlaySurface {
    fn drop(&mut self) {
        self.cancel_advance();
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::client::publisher::testing::RecordingPublisher;
    use crate::overlay::PlaylistItem;
    use crate::playback::media::testing::FakeElement;
    use crate::playback::MediaElement;

    fn surface() -> (OverlaySurface, Arc<FakeElement>, Arc<RecordingPublisher>) {
        let publisher = Arc::new(RecordingPublisher::default());
        let mut surface = OverlaySurface::new(
            Channel::media("A").unwrap(),
            publisher.clone(),
            SurfaceConfig::default(),
        );
        let element = FakeElement::new();
        element.set_duration(60.0);
        surface.attach(MediaAttachment::Native(element.clone()));
        (surface, element, publisher)
    }

    fn add(surface: &mut OverlaySurface, id: &str) {
        surface.dispatch(OverlayCommand::AddItem {
            item: PlaylistItem::new(id, format!("{}.mp4", id)),
        });
    }

    #[tokio::test]
    async fn test_show_loads_current_item() {
        let (mut surface, element, _publisher) = surface();
        add(&mut surface, "a");
        add(&mut surface, "b");
        assert!(element.state.lock().src.is_none());

        surface.dispatch(OverlayCommand::Show { payload: json!({}) });

        assert_eq!(element.state.lock().src.as_deref(), Some("a.mp4"));
        assert!(!element.is_paused());
        assert!(surface.synchronizer().state().is_playing);
    }

    #[tokio::test]
    async fn test_next_wraps_playlist() {
        let (mut surface, element, _publisher) = surface();
        add(&mut surface, "a");
        add(&mut surface, "b");
        surface.dispatch(OverlayCommand::Show { payload: json!({}) });

        surface.dispatch(OverlayCommand::Next);
        assert_eq!(element.state.lock().src.as_deref(), Some("b.mp4"));
        surface.dispatch(OverlayCommand::Next);
        assert_eq!(element.state.lock().src.as_deref(), Some("a.mp4"));
    }

    #[tokio::test]
    async fn test_hide_stops_and_marks_state() {
        let (mut surface, element, _publisher) = surface();
        add(&mut surface, "a");
        surface.dispatch(OverlayCommand::Show { payload: json!({}) });
        element.set_time(20.0);

        surface.dispatch(OverlayCommand::Hide);

        assert!(element.is_paused());
        assert_eq!(element.current_time(), 0.0);
        assert!(!surface.synchronizer().state().is_playing);
        assert!(!surface.overlay().is_visible());
    }

    #[tokio::test]
    async fn test_next_while_hidden_only_moves_cursor() {
        let (mut surface, element, _publisher) = surface();
        add(&mut surface, "a");
        add(&mut surface, "b");
        surface.dispatch(OverlayCommand::Show { payload: json!({}) });
        surface.dispatch(OverlayCommand::Hide);

        surface.dispatch(OverlayCommand::Next);

        assert_eq!(surface.playlist().current().unwrap().id, "b");
        assert_ne!(element.state.lock().src.as_deref(), Some("b.mp4"));
        assert!(element.is_paused());
        assert!(!surface.synchronizer().state().is_playing);

        surface.dispatch(OverlayCommand::Show { payload: json!({}) });
        assert_eq!(element.state.lock().src.as_deref(), Some("b.mp4"));
        assert!(!element.is_paused());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_item_reports_and_advances() {
        let (mut surface, element, publisher) = surface();
        let mut inputs = surface.inputs_rx.take().unwrap();
        add(&mut surface, "a");
        add(&mut surface, "b");

        element.fail_load("404 not found");
        surface.dispatch(OverlayCommand::Show { payload: json!({}) });

        assert_eq!(surface.banner(), Some("404 not found"));
        assert_eq!(
            publisher.commands(),
            vec![OverlayCommand::Error {
                reason: "404 not found".into()
            }]
        );

        tokio::time::sleep(Duration::from_millis(1999)).await;
        assert!(inputs.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(2)).await;
        let input = inputs.recv().await.unwrap();
        assert_eq!(input, SurfaceInput::Advance);

        surface.on_input(input);
        assert!(surface.banner().is_none());
        assert_eq!(element.state.lock().src.as_deref(), Some("b.mp4"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_next_cancels_pending_advance() {
        let (mut surface, element, _publisher) = surface();
        let mut inputs = surface.inputs_rx.take().unwrap();
        add(&mut surface, "a");
        add(&mut surface, "b");
        add(&mut surface, "c");

        element.fail_load("decode error");
        surface.dispatch(OverlayCommand::Show { payload: json!({}) });
        surface.dispatch(OverlayCommand::Next);

        tokio::time::sleep(Duration::from_millis(3000)).await;
        assert!(inputs.try_recv().is_err());
        assert_eq!(element.state.lock().src.as_deref(), Some("b.mp4"));
    }

    #[tokio::test]
    async fn test_remove_current_loads_following() {
        let (mut surface, element, _publisher) = surface();
        add(&mut surface, "a");
        add(&mut surface, "b");
        surface.dispatch(OverlayCommand::Show { payload: json!({}) });

        surface.dispatch(OverlayCommand::RemoveItem { id: "a".into() });
        assert_eq!(element.state.lock().src.as_deref(), Some("b.mp4"));

        surface.dispatch(OverlayCommand::RemoveItem { id: "b".into() });
        assert!(surface.playlist().is_empty());
        assert!(element.is_paused());
    }

    #[tokio::test]
    async fn test_other_channels_and_garbage_ignored() {
        let (mut surface, element, _publisher) = surface();
        add(&mut surface, "a");

        let other = ChannelMessage::new(
            Channel::media("B").unwrap(),
            json!({"type": "show", "payload": {}}),
        );
        surface.handle(&other);
        assert!(!surface.overlay().is_visible());

        let garbage = ChannelMessage::new(Channel::media("A").unwrap(), json!({"type": 42}));
        surface.handle(&garbage);

        let unknown = ChannelMessage::new(Channel::media("A").unwrap(), json!({"type": "sparkle"}));
        surface.handle(&unknown);

        assert!(element.state.lock().src.is_none());
    }

    #[tokio::test]
    async fn test_ended_report_advances() {
        let (mut surface, element, _publisher) = surface();
        add(&mut surface, "a");
        add(&mut surface, "b");
        surface.dispatch(OverlayCommand::Show { payload: json!({}) });

        surface.on_input(SurfaceInput::Player(PlayerReport::Ended));
        assert_eq!(element.state.lock().src.as_deref(), Some("b.mp4"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_reports_state() {
        let (surface, element, publisher) = surface();
        let (events_tx, events_rx) = mpsc::channel(8);
        let task = tokio::spawn(surface.run(events_rx));

        events_tx
            .send(ConnectionEvent::Message(ChannelMessage::command(
                Channel::media("A").unwrap(),
                &OverlayCommand::AddItem {
                    item: PlaylistItem::new("a", "a.mp4"),
                },
            ).unwrap()))
            .await
            .unwrap();
        events_tx
            .send(ConnectionEvent::Message(ChannelMessage::command(
                Channel::media("A").unwrap(),
                &OverlayCommand::Show { payload: json!({}) },
            ).unwrap()))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(element.state.lock().src.as_deref(), Some("a.mp4"));
        let commands = publisher.commands();
        assert!(commands.contains(&OverlayCommand::Ready));
        assert!(commands.iter().any(|c| matches!(c, OverlayCommand::State(_))));

        drop(events_tx);
        task.await.unwrap();
    }
}

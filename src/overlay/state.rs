//! Overlay state machine
//!
//! One instance per overlay surface. The overlay is either hidden or showing
//! exactly one payload; a new `show` replaces the payload.
//!
//! ```text
//!            show                 show (replace)
//!   hidden ─────────► visible ◄──────────────┐
//!      ▲                 │ └─────────────────┘
//!      └───── hide ──────┘
//! ```
//!
//! Hiding stops any attached media right away and releases its source
//! after a short delay, so the fade-out can finish on the last frame.

use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;

use crate::playback::MediaAttachment;
use crate::protocol::{Channel, OverlayCommand};

/// Default delay between hide and source teardown
pub const DEFAULT_TEARDOWN_DELAY: Duration = Duration::from_millis(600);

/// Result of applying a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// hidden → visible
    Shown,
    /// visible → visible with a new payload
    Replaced,
    /// visible → hidden
    Hidden,
    /// Already in the requested state
    Unchanged,
    /// Not a show/hide command
    Ignored,
}

/// Show/hide state of one overlay
pub struct OverlayStateMachine {
    channel: Channel,
    current: Option<Value>,
    attachment: Option<MediaAttachment>,
    teardown: Option<JoinHandle<()>>,
    teardown_delay: Duration,
}

impl OverlayStateMachine {
    pub fn new(channel: Channel) -> Self {
        Self::with_teardown_delay(channel, DEFAULT_TEARDOWN_DELAY)
    }

    pub fn with_teardown_delay(channel: Channel, teardown_delay: Duration) -> Self {
        Self {
            channel,
            current: None,
            attachment: None,
            teardown: None,
            teardown_delay,
        }
    }

    /// Attach the media element this overlay displays
    pub fn attach(&mut self, attachment: MediaAttachment) {
        self.attachment = Some(attachment);
    }

    /// Apply a command; anything but show/hide is ignored
    pub fn apply(&mut self, command: &OverlayCommand) -> Transition {
        match command {
            OverlayCommand::Show { payload } => self.show(payload.clone()),
            OverlayCommand::Hide => self.hide(),
            _ => Transition::Ignored,
        }
    }

    /// Display a payload
    pub fn show(&mut self, payload: Value) -> Transition {
        // A pending teardown would blank the new payload
        self.cancel_teardown();

        let transition = match self.current.replace(payload) {
            None => Transition::Shown,
            Some(_) => Transition::Replaced,
        };
        tracing::debug!(channel = %self.channel, transition = ?transition, "Overlay shown");
        transition
    }

    /// Hide the overlay; idempotent
    ///
    /// Must be called within a tokio runtime when media is attached.
    pub fn hide(&mut self) -> Transition {
        if self.current.take().is_none() {
            return Transition::Unchanged;
        }

        if let Some(attachment) = &self.attachment {
            attachment.stop();
            self.schedule_teardown(attachment.clone());
        }

        tracing::debug!(channel = %self.channel, "Overlay hidden");
        Transition::Hidden
    }

    fn schedule_teardown(&mut self, attachment: MediaAttachment) {
        self.cancel_teardown();

        let delay = self.teardown_delay;
        self.teardown = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            attachment.teardown();
        }));
    }

    /// Abort a pending teardown
    pub fn cancel_teardown(&mut self) {
        if let Some(handle) = self.teardown.take() {
            handle.abort();
        }
    }

    /// Whether a teardown is scheduled and has not run yet
    pub fn teardown_pending(&self) -> bool {
        self.teardown.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn current(&self) -> Option<&Value> {
        self.current.as_ref()
    }

    pub fn is_visible(&self) -> bool {
        self.current.is_some()
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }
}

impl Drop for OverlayStateMachine {
    fn drop(&mut self) {
        self.cancel_teardown();
    }
}

//! Replay marker
//!
//! Set just before an operator replay is dispatched. The `show` the replay
//! produces comes back over the channel like any other; the marker lets the
//! log recognise it and reuse the existing entry instead of adding a row.

use std::time::Duration;

use tokio::time::Instant;

use crate::protocol::Channel;

/// Default window in which a show can match a marker
pub const DEFAULT_REPLAY_WINDOW: Duration = Duration::from_millis(2000);

/// A pending operator replay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayMarker {
    pub event_id: String,
    pub channel: Channel,
    pub issued_at: Instant,
}

impl ReplayMarker {
    pub fn new(event_id: impl Into<String>, channel: Channel) -> Self {
        Self {
            event_id: event_id.into(),
            channel,
            issued_at: Instant::now(),
        }
    }

    /// Whether the matching window has closed
    pub fn is_expired(&self, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(self.issued_at) > window
    }

    /// Whether a show on `channel` at `now` is this replay
    pub fn matches(&self, channel: &Channel, now: Instant, window: Duration) -> bool {
        self.channel == *channel && !self.is_expired(now, window)
    }
}

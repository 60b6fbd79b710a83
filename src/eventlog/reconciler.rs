//! Event log reconciler
//!
//! Turns show/hide traffic from every channel the console watches into one
//! newest-first log:
//!
//! - a `show` normally creates a row and deactivates the channel's previous
//!   active row
//! - a `show` matching the pending [`ReplayMarker`] reactivates the replayed
//!   row and moves it to the top instead
//! - a `hide` deactivates every active row shown on that channel
//!
//! Rows with a deadline are deactivated by a timer. Every change is written
//! through to the [`KeyValueStore`]; storage failures are logged only.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::dispatch::OverlayDispatcher;
use super::entry::EventLogEntry;
use super::replay::{ReplayMarker, DEFAULT_REPLAY_WINDOW};
use super::store::{load_events, save_events, KeyValueStore, DEFAULT_STORAGE_KEY};
use crate::client::ConnectionEvent;
use crate::error::{Error, Result};
use crate::protocol::{Channel, ChannelMessage, OverlayCommand};

/// Reconciler configuration
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Maximum number of rows kept
    pub capacity: usize,
    /// How long a replay marker can match
    pub replay_window: Duration,
    /// Key the log is persisted under
    pub storage_key: String,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            replay_window: DEFAULT_REPLAY_WINDOW,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
        }
    }
}

impl ReconcilerConfig {
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn replay_window(mut self, window: Duration) -> Self {
        self.replay_window = window;
        self
    }

    pub fn storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }
}

struct Timer {
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct LogState {
    entries: Vec<EventLogEntry>,
    marker: Option<ReplayMarker>,
    timers: HashMap<String, Timer>,
    next_generation: u64,
    closed: bool,
}

struct Inner {
    state: Mutex<LogState>,
    store: Arc<dyn KeyValueStore>,
    config: ReconcilerConfig,
}

impl Inner {
    fn persist(&self, entries: &[EventLogEntry]) {
        if let Err(e) = save_events(self.store.as_ref(), &self.config.storage_key, entries) {
            tracing::warn!(key = %self.config.storage_key, error = %e, "Failed to persist event log");
        }
    }
}

/// Replay-aware overlay event log
pub struct EventLogReconciler<D> {
    inner: Arc<Inner>,
    dispatcher: D,
}

impl<D: OverlayDispatcher> EventLogReconciler<D> {
    /// Open the log persisted in `store`
    ///
    /// Persisted rows come back inactive.
    pub fn open(store: Arc<dyn KeyValueStore>, dispatcher: D, config: ReconcilerConfig) -> Self {
        let mut entries = load_events(store.as_ref(), &config.storage_key);
        entries.truncate(config.capacity);
        tracing::info!(entries = entries.len(), key = %config.storage_key, "Event log opened");

        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(LogState {
                    entries,
                    ..Default::default()
                }),
                store,
                config,
            }),
            dispatcher,
        }
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.inner.config
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    /// Take in one message from a watched channel
    ///
    /// Must be called within a tokio runtime; auto-hide timers are spawned.
    pub fn ingest(&self, message: &ChannelMessage) {
        match message.decode() {
            Ok(OverlayCommand::Show { payload }) => {
                self.on_show(&message.channel, &payload);
            }
            Ok(OverlayCommand::Hide) => self.on_hide(&message.channel),
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(channel = %message.channel, error = %e, "Dropping malformed message");
            }
        }
    }

    /// Record a show; returns the id of the row it landed on
    ///
    /// Must be called within a tokio runtime when the payload carries a
    /// deadline.
    pub fn on_show(&self, channel: &Channel, payload: &Value) -> String {
        let now_ms = now_millis();
        let now = Instant::now();
        let window = self.inner.config.replay_window;

        let mut guard = self.inner.state.lock();
        let state = &mut *guard;

        let replayed = match state.marker.take() {
            Some(marker) if marker.matches(channel, now, window) => Some(marker.event_id),
            Some(marker) if !marker.is_expired(now, window) => {
                // Pending replay on another channel
                state.marker = Some(marker);
                None
            }
            _ => None,
        };

        let position = replayed
            .as_ref()
            .and_then(|id| state.entries.iter().position(|e| &e.id == id));

        let entry = match position {
            Some(i) => {
                let mut entry = state.entries.remove(i);
                entry.reactivate(payload, now_ms);
                tracing::info!(channel = %channel, id = %entry.id, "Replay matched");
                entry
            }
            None => {
                let entry = EventLogEntry::from_show(channel, payload, now_ms);
                tracing::info!(channel = %channel, id = %entry.id, title = %entry.display.title, "Overlay shown");
                entry
            }
        };

        for other in state.entries.iter_mut() {
            if other.is_active && other.shown_on(channel) {
                other.is_active = false;
                if let Some(timer) = state.timers.remove(&other.id) {
                    timer.handle.abort();
                }
            }
        }

        let id = entry.id.clone();
        let hide_at = entry.hide_at;
        state.entries.insert(0, entry);

        let capacity = self.inner.config.capacity;
        if state.entries.len() > capacity {
            let dropped: Vec<EventLogEntry> = state.entries.drain(capacity..).collect();
            for entry in dropped {
                if let Some(timer) = state.timers.remove(&entry.id) {
                    timer.handle.abort();
                }
            }
        }

        self.schedule_auto_hide(state, &id, hide_at, now_ms);
        self.inner.persist(&state.entries);
        id
    }

    /// Record a hide on `channel`
    pub fn on_hide(&self, channel: &Channel) {
        let mut state = self.inner.state.lock();
        let state = &mut *state;

        let mut changed = 0;
        for entry in state.entries.iter_mut() {
            if entry.is_active && entry.shown_on(channel) {
                entry.is_active = false;
                if let Some(timer) = state.timers.remove(&entry.id) {
                    timer.handle.abort();
                }
                changed += 1;
            }
        }

        if changed > 0 {
            tracing::info!(channel = %channel, entries = changed, "Overlay hidden");
            self.inner.persist(&state.entries);
        }
    }

    fn schedule_auto_hide(&self, state: &mut LogState, id: &str, hide_at: Option<i64>, now_ms: i64) {
        if let Some(timer) = state.timers.remove(id) {
            timer.handle.abort();
        }
        let Some(hide_at) = hide_at else {
            return;
        };
        if state.closed {
            return;
        }

        state.next_generation += 1;
        let generation = state.next_generation;
        let delay = Duration::from_millis(hide_at.saturating_sub(now_ms).max(0) as u64);
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let entry_id = id.to_string();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            expire(&inner, &entry_id, generation);
        });

        state.timers.insert(id.to_string(), Timer { generation, handle });
    }

    /// Re-show a logged overlay with its original payload
    ///
    /// The resulting `show` is matched back to this row when it arrives
    /// within the replay window. A failed dispatch clears the marker.
    pub async fn replay_overlay(&self, id: &str) -> Result<()> {
        let (channel, payload) = {
            let mut state = self.inner.state.lock();
            let entry = state
                .entries
                .iter()
                .find(|e| e.id == id)
                .ok_or_else(|| Error::UnknownEntry(id.to_string()))?;
            let target = (entry.original_channel.clone(), entry.original_payload.clone());
            state.marker = Some(ReplayMarker::new(id, target.0.clone()));
            target
        };

        tracing::debug!(channel = %channel, id = id, "Replaying overlay");
        if let Err(e) = self.dispatcher.show(&channel, &payload).await {
            let mut state = self.inner.state.lock();
            if state.marker.as_ref().is_some_and(|m| m.event_id == id) {
                state.marker = None;
            }
            tracing::warn!(channel = %channel, id = id, error = %e, "Replay dispatch failed");
            return Err(e);
        }
        Ok(())
    }

    /// Hide the channel a logged overlay was shown on
    pub async fn stop_overlay(&self, id: &str) -> Result<()> {
        let channel = self
            .get(id)
            .map(|entry| entry.original_channel)
            .ok_or_else(|| Error::UnknownEntry(id.to_string()))?;
        self.dispatcher.hide(&channel).await
    }

    /// Snapshot of the log, newest first
    pub fn entries(&self) -> Vec<EventLogEntry> {
        self.inner.state.lock().entries.clone()
    }

    pub fn get(&self, id: &str) -> Option<EventLogEntry> {
        self.inner
            .state
            .lock()
            .entries
            .iter()
            .find(|e| e.id == id)
            .cloned()
    }

    /// The active row on `channel`, if any
    pub fn active(&self, channel: &Channel) -> Option<EventLogEntry> {
        self.inner
            .state
            .lock()
            .entries
            .iter()
            .find(|e| e.is_active && e.shown_on(channel))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The pending replay marker, if any
    pub fn replay_marker(&self) -> Option<ReplayMarker> {
        self.inner.state.lock().marker.clone()
    }

    /// Drop every row
    pub fn clear(&self) {
        let mut state = self.inner.state.lock();
        for (_, timer) in state.timers.drain() {
            timer.handle.abort();
        }
        state.entries.clear();
        state.marker = None;
        self.inner.persist(&state.entries);
        tracing::info!("Event log cleared");
    }

    /// Cancel every timer; later deadlines are not scheduled
    pub fn shutdown(&self) {
        let mut state = self.inner.state.lock();
        state.closed = true;
        state.marker = None;
        for (_, timer) in state.timers.drain() {
            timer.handle.abort();
        }
    }

    /// Ingest connection events until the connection goes away
    pub async fn run(&self, mut events: mpsc::Receiver<ConnectionEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                ConnectionEvent::Message(message) => self.ingest(&message),
                ConnectionEvent::Connected => tracing::debug!("Event log connected"),
                ConnectionEvent::Disconnected { reason, .. } => {
                    tracing::debug!(reason = %reason, "Event log disconnected");
                }
            }
        }
    }
}

impl<D> Drop for EventLogReconciler<D> {
    fn drop(&mut self) {
        let mut state = self.inner.state.lock();
        for (_, timer) in state.timers.drain() {
            timer.handle.abort();
        }
    }
}

fn expire(inner: &Inner, id: &str, generation: u64) {
    let mut guard = inner.state.lock();
    let state = &mut *guard;
    let current = state.timers.get(id).is_some_and(|t| t.generation == generation);
    if !current {
        return;
    }
    state.timers.remove(id);

    let Some(entry) = state.entries.iter_mut().find(|e| e.id == id) else {
        return;
    };
    if !entry.is_active {
        return;
    }
    entry.is_active = false;
    tracing::info!(channel = %entry.display.channel, id = id, "Auto-hide");
    inner.persist(&state.entries);
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

//! Event log entries
//!
//! An entry is created from the payload of the first `show` of an overlay.
//! The display fields are derived once from that payload; later reactivations
//! only refresh `timestamp`, `hideAt` and `isActive`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::protocol::Channel;

/// Default origin for shows that do not name one
pub const DEFAULT_ORIGIN: &str = "console";

/// What the log shows for an entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryDisplay {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    pub channel: Channel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side: Option<String>,
}

impl EntryDisplay {
    /// Derive the display fields from a show payload
    pub fn from_payload(channel: &Channel, payload: &Value) -> Self {
        let title = ["title", "name", "text", "message"]
            .iter()
            .find_map(|key| text_field(payload, key))
            .unwrap_or_else(|| channel.to_string());

        Self {
            title,
            subtitle: text_field(payload, "subtitle").or_else(|| text_field(payload, "role")),
            channel: channel.clone(),
            side: text_field(payload, "side"),
        }
    }
}

/// One row of the event log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventLogEntry {
    pub id: String,
    /// Overlay kind, e.g. `lower` or `poster`
    #[serde(rename = "type")]
    pub kind: String,
    /// Last activation, ms since the Unix epoch
    pub timestamp: i64,
    pub from: String,
    pub is_active: bool,
    /// Auto-hide deadline, ms since the Unix epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hide_at: Option<i64>,
    pub display: EntryDisplay,
    pub original_payload: Value,
    pub original_channel: Channel,
}

impl EventLogEntry {
    /// New active entry for a show
    pub fn from_show(channel: &Channel, payload: &Value, now_ms: i64) -> Self {
        let kind = text_field(payload, "kind").unwrap_or_else(|| channel.base().to_string());

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            timestamp: now_ms,
            from: text_field(payload, "from").unwrap_or_else(|| DEFAULT_ORIGIN.to_string()),
            is_active: true,
            hide_at: hide_deadline(payload, now_ms),
            display: EntryDisplay::from_payload(channel, payload),
            original_payload: payload.clone(),
            original_channel: channel.clone(),
        }
    }

    /// Mark active again after a replay
    pub fn reactivate(&mut self, payload: &Value, now_ms: i64) {
        self.timestamp = now_ms;
        self.hide_at = hide_deadline(payload, now_ms);
        self.is_active = true;
    }

    /// Whether a hide on `channel` applies to this entry
    pub fn shown_on(&self, channel: &Channel) -> bool {
        self.display.channel == *channel
    }
}

/// Auto-hide deadline for a payload shown at `now_ms`
///
/// A positive `duration` (seconds) wins over an absolute `hideAt`.
pub fn hide_deadline(payload: &Value, now_ms: i64) -> Option<i64> {
    if let Some(seconds) = payload.get("duration").and_then(Value::as_f64) {
        if seconds.is_finite() && seconds > 0.0 {
            // Oversized durations clamp to a far-off deadline
            return Some(now_ms.saturating_add((seconds * 1000.0).round() as i64));
        }
    }
    payload.get("hideAt").and_then(Value::as_i64)
}

fn text_field(payload: &Value, key: &str) -> Option<String> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

//! Fan-out frames
//!
//! A [`HubFrame`] is what lands in a subscriber's outbound queue: the channel
//! it was published on plus the already-serialized JSON text of the forwarded
//! `{channel, data, id?}` envelope.

use bytes::Bytes;

use super::error::HubError;
use crate::error::ProtocolError;
use crate::protocol::{Channel, ChannelMessage};

/// A serialized message queued for one subscriber
///
/// Cheap to clone: the payload is reference-counted.
#[derive(Debug, Clone, PartialEq)]
pub struct HubFrame {
    /// Channel the message was published on
    pub channel: Channel,
    /// UTF-8 JSON text of the forwarded envelope
    pub payload: Bytes,
}

impl HubFrame {
    /// Serialize a message once for fan-out
    pub fn encode(message: &ChannelMessage) -> Result<Self, HubError> {
        let json = serde_json::to_vec(message).map_err(HubError::Encode)?;
        Ok(Self {
            channel: message.channel.clone(),
            payload: Bytes::from(json),
        })
    }

    /// Parse the payload back into a message
    pub fn decode(&self) -> Result<ChannelMessage, ProtocolError> {
        Ok(serde_json::from_slice(&self.payload)?)
    }

    /// Payload size in bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_encode_forwarded_envelope() {
        let mut message = ChannelMessage::new(
            Channel::new("lower").unwrap(),
            json!({"type": "show", "payload": {"title": "Alice"}}),
        );
        message.id = Some("evt-1".into());

        let frame = HubFrame::encode(&message).unwrap();
        assert_eq!(frame.channel.as_str(), "lower");

        let value: serde_json::Value = serde_json::from_slice(&frame.payload).unwrap();
        assert_eq!(value["channel"], "lower");
        assert_eq!(value["data"]["payload"]["title"], "Alice");
        assert_eq!(value["id"], "evt-1");
        assert!(value.get("type").is_none());

        assert_eq!(frame.decode().unwrap(), message);
    }

    #[test]
    fn test_clone_shares_payload() {
        let message = ChannelMessage::new(Channel::new("poster").unwrap(), json!({"type": "hide"}));
        let frame = HubFrame::encode(&message).unwrap();
        let copy = frame.clone();

        assert_eq!(frame.payload.as_ptr(), copy.payload.as_ptr());
        assert_eq!(frame.len(), copy.len());
        assert!(!frame.is_empty());
    }
}

//! Wire envelope
//!
//! Client to hub:
//!
//! ```text
//! {"type":"subscribe",   "channel":"lower"}
//! {"type":"unsubscribe", "channel":"lower"}
//! {"type":"publish",     "channel":"lower", "data":{"type":"show", ...}, "id":"opt"}
//! {"type":"ping"}
//! ```
//!
//! Hub to client: `{"channel":"lower","data":{...},"id":"opt"}` for forwarded
//! publishes and `{"type":"pong"}` for pings.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::channel::Channel;
use super::command::OverlayCommand;
use crate::error::ProtocolError;

/// Frames sent by clients to the hub
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientFrame {
    /// Add the connection to a channel's subscriber set
    Subscribe { channel: Channel },
    /// Remove the connection from a channel's subscriber set
    Unsubscribe { channel: Channel },
    /// Fan a message out to a channel's subscribers
    Publish {
        channel: Channel,
        #[serde(default)]
        data: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
    /// Liveness probe
    Ping,
}

impl ClientFrame {
    /// Publish frame carrying a command
    pub fn publish(channel: Channel, command: &OverlayCommand) -> Result<Self, ProtocolError> {
        Ok(ClientFrame::Publish {
            channel,
            data: serde_json::to_value(command)?,
            id: None,
        })
    }

    /// Encode as a JSON text frame
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Control replies sent by the hub
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlFrame {
    /// Reply to [`ClientFrame::Ping`]
    Pong,
}

/// A message delivered on a channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// Channel the message was published on
    pub channel: Channel,
    /// Command object; `data.type` names the command
    #[serde(default)]
    pub data: Value,
    /// Optional publisher-assigned id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl ChannelMessage {
    /// Wrap raw data
    pub fn new(channel: Channel, data: Value) -> Self {
        Self {
            channel,
            data,
            id: None,
        }
    }

    /// Message carrying a typed command
    pub fn command(channel: Channel, command: &OverlayCommand) -> Result<Self, ProtocolError> {
        Ok(Self::new(channel, serde_json::to_value(command)?))
    }

    /// The `data.type` tag, if any
    pub fn kind(&self) -> Option<&str> {
        self.data.get("type").and_then(Value::as_str)
    }

    /// Decode the carried command
    pub fn decode(&self) -> Result<OverlayCommand, ProtocolError> {
        Ok(OverlayCommand::deserialize(&self.data)?)
    }
}

/// Anything a client can receive from the hub
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ServerFrame {
    /// Forwarded publish
    Message(ChannelMessage),
    /// Control reply
    Control(ControlFrame),
}

impl ServerFrame {
    /// Parse a JSON text frame
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn lower() -> Channel {
        Channel::new("lower").unwrap()
    }

    #[test]
    fn test_client_frames() {
        let frame: ClientFrame =
            serde_json::from_str(r#"{"type":"subscribe","channel":"lower"}"#).unwrap();
        assert_eq!(frame, ClientFrame::Subscribe { channel: lower() });

        let frame: ClientFrame = serde_json::from_str(
            r#"{"type":"publish","channel":"lower","data":{"type":"hide"}}"#,
        )
        .unwrap();
        assert_eq!(
            frame,
            ClientFrame::Publish {
                channel: lower(),
                data: json!({"type": "hide"}),
                id: None,
            }
        );

        assert!(serde_json::from_str::<ClientFrame>(r#"{"type":"subscribe","channel":""}"#).is_err());
        assert!(serde_json::from_str::<ClientFrame>(r#"{"type":"launch"}"#).is_err());
    }

    #[test]
    fn test_publish_helper_encodes_command() {
        let frame = ClientFrame::publish(lower(), &OverlayCommand::Seek { time: 4.0 }).unwrap();
        let value: Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "publish");
        assert_eq!(value["data"]["type"], "seek");
        assert_eq!(value["data"]["time"], 4.0);
        assert!(value.get("id").is_none());
    }

    #[test]
    fn test_server_frames() {
        match ServerFrame::parse(r#"{"channel":"lower","data":{"type":"hide"}}"#).unwrap() {
            ServerFrame::Message(msg) => {
                assert_eq!(msg.kind(), Some("hide"));
                assert_eq!(msg.decode().unwrap(), OverlayCommand::Hide);
            }
            other => panic!("unexpected {:?}", other),
        }

        assert_eq!(
            ServerFrame::parse(r#"{"type":"pong"}"#).unwrap(),
            ServerFrame::Control(ControlFrame::Pong)
        );
        assert!(ServerFrame::parse("nope").is_err());
    }

    #[test]
    fn test_decode_unknown_and_malformed() {
        let msg = ChannelMessage::new(lower(), json!({"type": "sparkle"}));
        assert_eq!(msg.decode().unwrap(), OverlayCommand::Unknown);

        let msg = ChannelMessage::new(lower(), json!({"type": "seek", "time": "soon"}));
        assert!(msg.decode().is_err());

        let msg = ChannelMessage::new(lower(), Value::Null);
        assert!(msg.decode().is_err());
        assert_eq!(msg.kind(), None);
    }
}

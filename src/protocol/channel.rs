//! Channel names
//!
//! A channel is a pure routing key. Single-instance overlays use static
//! names (`lower`, `poster`); multi-instance features use a parameterized
//! `base:instance` form (`media:A`, `media:B`).

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Maximum channel name length in bytes
pub const MAX_CHANNEL_LEN: usize = 128;

/// Lower-third overlay
pub const LOWER: &str = "lower";
/// Poster overlay
pub const POSTER: &str = "poster";
/// Full-frame poster overlay
pub const POSTER_BIGPICTURE: &str = "poster-bigpicture";
/// Highlighted chat message overlay
pub const CHAT_HIGHLIGHT: &str = "chat-highlight";
/// Prefix for media player instances
pub const MEDIA_PREFIX: &str = "media";

/// A validated channel name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Channel(String);

impl Channel {
    /// Validate and wrap a channel name
    pub fn new(name: impl Into<String>) -> Result<Self, ProtocolError> {
        let name = name.into();
        validate(&name)?;
        Ok(Self(name))
    }

    /// Channel for a media player instance (`media:<instance>`)
    pub fn media(instance: &str) -> Result<Self, ProtocolError> {
        Self::new(format!("{}:{}", MEDIA_PREFIX, instance))
    }

    /// The channel name
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Base name, without the `:instance` parameter
    pub fn base(&self) -> &str {
        match self.0.split_once(':') {
            Some((base, _)) => base,
            None => &self.0,
        }
    }

    /// Instance parameter, if the name is parameterized
    pub fn instance(&self) -> Option<&str> {
        self.0.split_once(':').map(|(_, instance)| instance)
    }
}

fn validate(name: &str) -> Result<(), ProtocolError> {
    let reason = if name.is_empty() {
        "empty"
    } else if name.len() > MAX_CHANNEL_LEN {
        "too long"
    } else if name.chars().any(|c| c.is_control()) {
        "contains control characters"
    } else {
        return Ok(());
    };

    Err(ProtocolError::InvalidChannel {
        channel: name.to_string(),
        reason,
    })
}

impl TryFrom<String> for Channel {
    type Error = ProtocolError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        Self::new(name)
    }
}

impl TryFrom<&str> for Channel {
    type Error = ProtocolError;

    fn try_from(name: &str) -> Result<Self, Self::Error> {
        Self::new(name)
    }
}

impl From<Channel> for String {
    fn from(channel: Channel) -> Self {
        channel.0
    }
}

impl Borrow<str> for Channel {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Channel {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        for name in [LOWER, POSTER, POSTER_BIGPICTURE, CHAT_HIGHLIGHT, "media:A"] {
            assert_eq!(Channel::new(name).unwrap().as_str(), name);
        }
    }

    #[test]
    fn test_invalid_names() {
        assert!(Channel::new("").is_err());
        assert!(Channel::new("a\nb").is_err());
        assert!(Channel::new("x".repeat(MAX_CHANNEL_LEN + 1)).is_err());
    }

    #[test]
    fn test_media_channel() {
        let channel = Channel::media("B").unwrap();
        assert_eq!(channel.as_str(), "media:B");
        assert_eq!(channel.base(), "media");
        assert_eq!(channel.instance(), Some("B"));

        let lower = Channel::new(LOWER).unwrap();
        assert_eq!(lower.base(), "lower");
        assert_eq!(lower.instance(), None);
    }

    #[test]
    fn test_serde_validates() {
        let channel: Channel = serde_json::from_str("\"poster\"").unwrap();
        assert_eq!(channel.as_str(), "poster");
        assert_eq!(serde_json::to_string(&channel).unwrap(), "\"poster\"");

        assert!(serde_json::from_str::<Channel>("\"\"").is_err());
    }
}

use std::fmt;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::platform::Platform;

/// Where a message came from, or where a reply should go. Opaque to the
/// coordinator; each adapter knows how to read its own (a Discord channel id,
/// a YouTube live chat id, a Twitch `#channel`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelRef(pub String);

impl ChannelRef {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A chat line normalized from any platform. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub platform: Platform,
    pub author_name: String,
    pub author_id: String,
    pub text: String,
    pub origin: ChannelRef,
    pub received_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(
        platform: Platform,
        author_name: &str,
        author_id: &str,
        text: &str,
        origin: ChannelRef,
    ) -> Self {
        Self {
            platform,
            author_name: author_name.to_string(),
            author_id: author_id.to_string(),
            text: text.to_string(),
            origin,
            received_at: Utc::now(),
        }
    }
}

// File: cmdrelay-common/src/models/platform.rs

use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};

/// The chat surfaces the relay knows about.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    YouTube,
    Twitch,
    Discord,
}

impl Platform {
    /// Human-facing label used in announcements and log lines.
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::YouTube => "YouTube",
            Platform::Twitch => "Twitch",
            Platform::Discord => "Discord",
        }
    }

    /// Surfaces that may receive a `!proxycommands` reply. Twitch is the relay
    /// target and never gets one.
    pub fn is_echo_surface(&self) -> bool {
        matches!(self, Platform::YouTube | Platform::Discord)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::YouTube => write!(f, "youtube"),
            Platform::Twitch => write!(f, "twitch"),
            Platform::Discord => write!(f, "discord"),
        }
    }
}

impl FromStr for Platform {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "youtube" | "yt" => Ok(Platform::YouTube),
            "twitch" | "twitch-irc" => Ok(Platform::Twitch),
            "discord" => Ok(Platform::Discord),
            _ => Err(format!("Unknown platform: {}", s)),
        }
    }
}

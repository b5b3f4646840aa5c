// File: cmdrelay-common/src/traits/platform_traits.rs

use async_trait::async_trait;
use crate::error::Error;
use crate::models::message::ChannelRef;
use crate::models::platform::Platform;

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionStatus {
    Connected,
    /// Session started but not joined yet.
    Connecting,
    Disconnected,
    Reconnecting,
    Error(String),
}

/// A chat surface the relay can connect to and send through. Inbound traffic
/// is not pulled through this trait; each adapter pushes it into the sink it
/// was constructed with.
#[async_trait]
pub trait PlatformIntegration: Send + Sync {
    fn platform(&self) -> Platform;

    async fn connect(&mut self) -> Result<(), Error>;
    async fn disconnect(&mut self) -> Result<(), Error>;
    async fn send_message(&self, channel: &ChannelRef, message: &str) -> Result<(), Error>;
    async fn get_connection_status(&self) -> Result<ConnectionStatus, Error>;

    /// Channel replies go to when the caller has no better target
    /// (the joined Twitch channel, the active YouTube live chat).
    fn default_channel(&self) -> Option<ChannelRef>;

    async fn is_connected(&self) -> bool {
        matches!(self.get_connection_status().await, Ok(ConnectionStatus::Connected))
    }
}

/// Watches whether a stream is live and reports transitions through its sink.
#[async_trait]
pub trait StreamMonitor: Send + Sync {
    async fn start(&mut self) -> Result<(), Error>;
    async fn stop(&mut self) -> Result<(), Error>;
    fn is_running(&self) -> bool;
}

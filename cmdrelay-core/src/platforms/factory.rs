//! src/platforms/factory.rs

use cmdrelay_common::error::Error;
use cmdrelay_common::models::RelayConfig;
use cmdrelay_common::traits::platform_traits::{PlatformIntegration, StreamMonitor};

use crate::platforms::discord::runtime::DiscordPlatform;
use crate::platforms::sink::EventSink;
use crate::platforms::twitch_helix::monitor::TwitchStreamMonitor;
use crate::platforms::twitch_irc::runtime::TwitchIrcPlatform;
use crate::platforms::youtube::runtime::YouTubePlatform;

/// Builds adapters from a config snapshot. Construction must not touch the
/// network; that happens in `connect`/`start`.
pub trait AdapterFactory: Send + Sync {
    fn twitch_chat(
        &self,
        config: &RelayConfig,
        sink: EventSink,
    ) -> Result<Box<dyn PlatformIntegration>, Error>;

    fn stream_monitor(
        &self,
        config: &RelayConfig,
        sink: EventSink,
    ) -> Result<Box<dyn StreamMonitor>, Error>;

    fn youtube(
        &self,
        config: &RelayConfig,
        sink: EventSink,
    ) -> Result<Box<dyn PlatformIntegration>, Error>;

    fn discord(
        &self,
        config: &RelayConfig,
        sink: EventSink,
    ) -> Result<Box<dyn PlatformIntegration>, Error>;
}

/// The production adapters.
#[derive(Default)]
pub struct LiveAdapterFactory;

impl LiveAdapterFactory {
    pub fn new() -> Self {
        Self
    }
}

impl AdapterFactory for LiveAdapterFactory {
    fn twitch_chat(
        &self,
        config: &RelayConfig,
        sink: EventSink,
    ) -> Result<Box<dyn PlatformIntegration>, Error> {
        Ok(Box::new(TwitchIrcPlatform::from_config(config, sink)?))
    }

    fn stream_monitor(
        &self,
        config: &RelayConfig,
        sink: EventSink,
    ) -> Result<Box<dyn StreamMonitor>, Error> {
        Ok(Box::new(TwitchStreamMonitor::from_config(config, sink)?))
    }

    fn youtube(
        &self,
        config: &RelayConfig,
        sink: EventSink,
    ) -> Result<Box<dyn PlatformIntegration>, Error> {
        Ok(Box::new(YouTubePlatform::from_config(config, sink)?))
    }

    fn discord(
        &self,
        config: &RelayConfig,
        sink: EventSink,
    ) -> Result<Box<dyn PlatformIntegration>, Error> {
        Ok(Box::new(DiscordPlatform::from_config(config, sink)?))
    }
}

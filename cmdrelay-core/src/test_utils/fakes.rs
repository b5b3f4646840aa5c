// File: cmdrelay-core/src/test_utils/fakes.rs
//
// In-process stand-ins for the platform adapters. Each fake is moved into
// the coordinator; the matching remote stays with the test to inspect sends
// and push events through the fake's sink.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use cmdrelay_common::models::{ChannelRef, ChatMessage, Platform, RelayConfig};
use cmdrelay_common::traits::platform_traits::{ConnectionStatus, PlatformIntegration, StreamMonitor};

use crate::Error;
use crate::platforms::factory::AdapterFactory;
use crate::platforms::sink::{AdapterEvent, EventSink};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default)]
struct ChatRemoteState {
    sent: Vec<(ChannelRef, String)>,
    connects: usize,
    disconnects: usize,
    connected: bool,
}

/// Test-side view of a `FakeChatAdapter`.
#[derive(Clone)]
pub struct FakeChatRemote {
    platform: Platform,
    sink: EventSink,
    config: RelayConfig,
    state: Arc<Mutex<ChatRemoteState>>,
}

impl FakeChatRemote {
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// The config snapshot the adapter was built from.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn generation(&self) -> u64 {
        self.sink.generation()
    }

    pub fn sent(&self) -> Vec<(ChannelRef, String)> {
        lock(&self.state).sent.clone()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        lock(&self.state).sent.iter().map(|(_, t)| t.clone()).collect()
    }

    pub fn connects(&self) -> usize {
        lock(&self.state).connects
    }

    pub fn disconnects(&self) -> usize {
        lock(&self.state).disconnects
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }

    /// Whether the adapter's event gate is still open.
    pub fn sink_open(&self) -> bool {
        self.sink.is_open()
    }

    pub fn emit(&self, event: AdapterEvent) -> bool {
        self.sink.emit(event)
    }

    /// Pushes a chat line as if it arrived from the platform.
    pub fn say(&self, author_id: &str, origin: &str, text: &str) -> bool {
        let msg = ChatMessage::new(self.platform, author_id, author_id, text, ChannelRef::new(origin));
        self.sink.message(msg)
    }
}

pub struct FakeChatAdapter {
    remote: FakeChatRemote,
    default_channel: Option<ChannelRef>,
    fail_connect: bool,
}

impl FakeChatAdapter {
    pub fn new(platform: Platform, config: &RelayConfig, sink: EventSink) -> Self {
        let default_channel = match platform {
            Platform::Twitch => Some(ChannelRef::new("#streamer")),
            Platform::YouTube => Some(ChannelRef::new("live-chat-1")),
            Platform::Discord => None,
        };
        Self {
            remote: FakeChatRemote {
                platform,
                sink,
                config: config.clone(),
                state: Arc::new(Mutex::new(ChatRemoteState::default())),
            },
            default_channel,
            fail_connect: false,
        }
    }

    pub fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    pub fn remote(&self) -> FakeChatRemote {
        self.remote.clone()
    }
}

#[async_trait]
impl PlatformIntegration for FakeChatAdapter {
    fn platform(&self) -> Platform {
        self.remote.platform
    }

    async fn connect(&mut self) -> Result<(), Error> {
        let mut st = lock(&self.remote.state);
        st.connects += 1;
        if self.fail_connect {
            return Err(Error::Platform(format!("{} connect refused", self.remote.platform)));
        }
        st.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), Error> {
        let mut st = lock(&self.remote.state);
        st.disconnects += 1;
        st.connected = false;
        Ok(())
    }

    async fn send_message(&self, channel: &ChannelRef, message: &str) -> Result<(), Error> {
        lock(&self.remote.state).sent.push((channel.clone(), message.to_string()));
        Ok(())
    }

    async fn get_connection_status(&self) -> Result<ConnectionStatus, Error> {
        if lock(&self.remote.state).connected {
            Ok(ConnectionStatus::Connected)
        } else {
            Ok(ConnectionStatus::Disconnected)
        }
    }

    fn default_channel(&self) -> Option<ChannelRef> {
        self.default_channel.clone()
    }
}

#[derive(Debug, Default)]
struct MonitorRemoteState {
    starts: usize,
    stops: usize,
    running: bool,
}

#[derive(Clone)]
pub struct FakeMonitorRemote {
    sink: EventSink,
    state: Arc<Mutex<MonitorRemoteState>>,
}

impl FakeMonitorRemote {
    pub fn generation(&self) -> u64 {
        self.sink.generation()
    }

    pub fn starts(&self) -> usize {
        lock(&self.state).starts
    }

    pub fn stops(&self) -> usize {
        lock(&self.state).stops
    }

    pub fn sink_open(&self) -> bool {
        self.sink.is_open()
    }

    pub fn go_online(&self) -> bool {
        self.sink.emit(AdapterEvent::StreamOnline)
    }

    pub fn go_offline(&self) -> bool {
        self.sink.emit(AdapterEvent::StreamOffline)
    }
}

pub struct FakeStreamMonitor {
    remote: FakeMonitorRemote,
}

impl FakeStreamMonitor {
    pub fn new(sink: EventSink) -> Self {
        Self {
            remote: FakeMonitorRemote {
                sink,
                state: Arc::new(Mutex::new(MonitorRemoteState::default())),
            },
        }
    }

    pub fn remote(&self) -> FakeMonitorRemote {
        self.remote.clone()
    }
}

#[async_trait]
impl StreamMonitor for FakeStreamMonitor {
    async fn start(&mut self) -> Result<(), Error> {
        let mut st = lock(&self.remote.state);
        st.starts += 1;
        st.running = true;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), Error> {
        let mut st = lock(&self.remote.state);
        st.stops += 1;
        st.running = false;
        Ok(())
    }

    fn is_running(&self) -> bool {
        lock(&self.remote.state).running
    }
}

#[derive(Default)]
struct FactoryLog {
    twitch: Vec<FakeChatRemote>,
    monitors: Vec<FakeMonitorRemote>,
    youtube: Vec<FakeChatRemote>,
    discord: Vec<FakeChatRemote>,
}

/// Hands out fakes and remembers every one it built, in order.
#[derive(Default)]
pub struct FakeAdapterFactory {
    log: Mutex<FactoryLog>,
    fail_youtube_connect: bool,
}

impl FakeAdapterFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failing_youtube(mut self) -> Self {
        self.fail_youtube_connect = true;
        self
    }

    pub fn twitch_remotes(&self) -> Vec<FakeChatRemote> {
        lock(&self.log).twitch.clone()
    }

    pub fn latest_twitch(&self) -> Option<FakeChatRemote> {
        lock(&self.log).twitch.last().cloned()
    }

    pub fn monitor_remotes(&self) -> Vec<FakeMonitorRemote> {
        lock(&self.log).monitors.clone()
    }

    pub fn latest_monitor(&self) -> Option<FakeMonitorRemote> {
        lock(&self.log).monitors.last().cloned()
    }

    pub fn youtube(&self) -> Option<FakeChatRemote> {
        lock(&self.log).youtube.last().cloned()
    }

    pub fn discord(&self) -> Option<FakeChatRemote> {
        lock(&self.log).discord.last().cloned()
    }

    /// The Twitch access token each Twitch chat adapter was built with.
    pub fn observed_twitch_tokens(&self) -> Vec<String> {
        lock(&self.log)
            .twitch
            .iter()
            .map(|p| p.config().twitch_access_token.clone())
            .collect()
    }
}

impl AdapterFactory for FakeAdapterFactory {
    fn twitch_chat(
        &self,
        config: &RelayConfig,
        sink: EventSink,
    ) -> Result<Box<dyn PlatformIntegration>, Error> {
        let fake = FakeChatAdapter::new(Platform::Twitch, config, sink);
        lock(&self.log).twitch.push(fake.remote());
        Ok(Box::new(fake))
    }

    fn stream_monitor(
        &self,
        _config: &RelayConfig,
        sink: EventSink,
    ) -> Result<Box<dyn StreamMonitor>, Error> {
        let fake = FakeStreamMonitor::new(sink);
        lock(&self.log).monitors.push(fake.remote());
        Ok(Box::new(fake))
    }

    fn youtube(
        &self,
        config: &RelayConfig,
        sink: EventSink,
    ) -> Result<Box<dyn PlatformIntegration>, Error> {
        let mut fake = FakeChatAdapter::new(Platform::YouTube, config, sink);
        if self.fail_youtube_connect {
            fake = fake.failing_connect();
        }
        lock(&self.log).youtube.push(fake.remote());
        Ok(Box::new(fake))
    }

    fn discord(
        &self,
        config: &RelayConfig,
        sink: EventSink,
    ) -> Result<Box<dyn PlatformIntegration>, Error> {
        let fake = FakeChatAdapter::new(Platform::Discord, config, sink);
        lock(&self.log).discord.push(fake.remote());
        Ok(Box::new(fake))
    }
}

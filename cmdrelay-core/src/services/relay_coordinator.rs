//! services/relay_coordinator.rs
//!
//! Owns every adapter, filters inbound chat against the stored command list
//! and forwards matches to Twitch. One async mutex over `RelayState`
//! serializes dispatch against the Twitch rebuild that follows a config
//! update; events carry the generation of the adapter that produced them so
//! anything from a retired Twitch instance is discarded.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, trace};

use cmdrelay_common::models::{ChannelRef, ChatMessage, Command, Platform, RelayConfig};

use crate::Error;
use crate::eventbus::{EventBus, RelayEvent};
use crate::platforms::{
    AdapterEnvelope, AdapterEvent, AdapterFactory, AdapterHandle, AdapterSlot, ChatHandle,
    EventSink, MonitorHandle,
};
use crate::repositories::{CommandRepository, ConfigRepository};
use crate::services::command_filter::{
    enabled_commands, format_command_list, is_command_list_request, is_configured_channel,
    is_own_message, match_command,
};
use crate::services::command_service::CommandService;
use crate::services::config_service::ConfigService;
use crate::telemetry::Telemetry;

const SRC_STARTUP: &str = "RelayCoordinator.startup";
const SRC_DISPATCH: &str = "RelayCoordinator.on_inbound_message";
const SRC_RECONFIGURE: &str = "RelayCoordinator.on_configuration_updated";
const SRC_STREAM: &str = "RelayCoordinator.on_stream_event";
const SRC_TWITCH: &str = "RelayCoordinator.twitch";
const SRC_YOUTUBE: &str = "RelayCoordinator.youtube";
const SRC_DISCORD: &str = "RelayCoordinator.discord";
const SRC_SHUTDOWN: &str = "RelayCoordinator.shutdown";

pub fn connection_announcement(platform: Platform) -> String {
    format!("cmdrelay for {} has connected.", platform.display_name())
}

/// Lifecycle of an echo surface (YouTube, Discord).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceState {
    /// Flag off; no adapter was ever built.
    Disabled,
    Idle,
    Connected,
}

/// Lifecycle of the Twitch chat adapter and its stream monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TwitchState {
    Stopped,
    Starting,
    Running,
}

struct RelayState {
    config: Option<RelayConfig>,
    generation: u64,
    twitch_state: TwitchState,
    twitch_chat: Option<ChatHandle>,
    stream_monitor: Option<MonitorHandle>,
    youtube_state: SurfaceState,
    youtube: Option<ChatHandle>,
    discord_state: SurfaceState,
    discord: Option<ChatHandle>,
    discord_bot_id: Option<String>,
}

impl RelayState {
    fn new() -> Self {
        Self {
            config: None,
            generation: 0,
            twitch_state: TwitchState::Stopped,
            twitch_chat: None,
            stream_monitor: None,
            youtube_state: SurfaceState::Disabled,
            youtube: None,
            discord_state: SurfaceState::Disabled,
            discord: None,
            discord_bot_id: None,
        }
    }
}

pub struct RelayCoordinator {
    config_repo: Arc<dyn ConfigRepository>,
    command_repo: Arc<dyn CommandRepository>,
    config_service: ConfigService,
    command_service: CommandService,
    event_bus: Arc<EventBus>,
    telemetry: Arc<dyn Telemetry>,
    factory: Arc<dyn AdapterFactory>,
    /// Process settings, used only to bootstrap the stored config.
    settings: RelayConfig,

    state: Mutex<RelayState>,
    events_tx: mpsc::UnboundedSender<AdapterEnvelope>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<AdapterEnvelope>>>,
    bus_rx: Mutex<Option<mpsc::Receiver<RelayEvent>>>,
}

impl RelayCoordinator {
    pub fn new(
        config_repo: Arc<dyn ConfigRepository>,
        command_repo: Arc<dyn CommandRepository>,
        event_bus: Arc<EventBus>,
        telemetry: Arc<dyn Telemetry>,
        factory: Arc<dyn AdapterFactory>,
        settings: RelayConfig,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            config_service: ConfigService::new(config_repo.clone(), event_bus.clone()),
            command_service: CommandService::new(command_repo.clone()),
            config_repo,
            command_repo,
            event_bus,
            telemetry,
            factory,
            settings,
            state: Mutex::new(RelayState::new()),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            bus_rx: Mutex::new(None),
        }
    }

    // ------------------------------------------------------------------
    // lifecycle
    // ------------------------------------------------------------------

    /// Loads (or creates) the stored config, seeds commands, subscribes to
    /// config notifications and brings up the enabled adapters. Only a
    /// failure to obtain the config is returned; everything else is reported
    /// through telemetry.
    pub async fn start(&self) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        if state.config.is_some() {
            return Err(Error::Startup("relay coordinator already started".into()));
        }

        let config = match self.config_service.bootstrap(&self.settings).await {
            Ok(cfg) => cfg,
            Err(e) => {
                self.telemetry.exception(SRC_STARTUP, &e);
                return Err(Error::Startup(format!("could not load relay config: {}", e)));
            }
        };

        if let Err(e) = self.command_service.seed_default_commands().await {
            self.telemetry.exception(SRC_STARTUP, &e);
        }

        *self.bus_rx.lock().await = Some(self.event_bus.subscribe(None).await);
        state.config = Some(config.clone());

        if config.enable_discord {
            self.build_discord(&mut state, &config).await;
        }
        if config.enable_youtube {
            self.build_youtube(&mut state, &config);
        }
        self.start_twitch(&mut state, &config).await;

        info!(
            "Relay started (youtube={:?}, discord={:?}, twitch={:?})",
            state.youtube_state, state.discord_state, state.twitch_state
        );
        Ok(())
    }

    /// Pumps adapter events and bus notifications until the bus signals
    /// shutdown, then tears the adapters down. Call `start` first.
    pub async fn run(&self) -> Result<(), Error> {
        let mut envelopes = self
            .events_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| Error::Startup("relay coordinator is already running".into()))?;
        let mut notifications = self
            .bus_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| Error::Startup("start() must succeed before run()".into()))?;
        let mut shutdown_rx = self.event_bus.shutdown_signal();

        while !*shutdown_rx.borrow() {
            tokio::select! {
                Ok(_) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signaled; leaving relay loop.");
                        break;
                    }
                }
                Some(env) = envelopes.recv() => {
                    self.handle_envelope(env).await;
                }
                Some(evt) = notifications.recv() => {
                    self.handle_bus_event(evt).await;
                }
                else => break,
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Disconnects Twitch chat and stops the monitor; YouTube and Discord are
    /// closed best-effort.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        self.stop_twitch(&mut state).await;

        if let Some(yt) = state.youtube.take() {
            if let Err(e) = yt.close().await {
                self.telemetry.exception(SRC_SHUTDOWN, &e);
            }
            state.youtube_state = SurfaceState::Idle;
        }
        if let Some(dc) = state.discord.take() {
            if let Err(e) = dc.close().await {
                self.telemetry.exception(SRC_SHUTDOWN, &e);
            }
            state.discord_state = SurfaceState::Idle;
        }
        info!("Relay adapters shut down.");
    }

    // ------------------------------------------------------------------
    // entry points
    // ------------------------------------------------------------------

    /// A chat line from YouTube (or any surface without its own gates).
    pub async fn on_inbound_message(&self, msg: ChatMessage) {
        let state = self.state.lock().await;
        self.dispatch(&state, &msg).await;
    }

    /// A chat line from Discord. Our own messages and anything outside the
    /// configured channel are dropped before filtering.
    pub async fn on_discord_inbound_message(&self, msg: ChatMessage) {
        let state = self.state.lock().await;
        self.dispatch_discord(&state, &msg).await;
    }

    /// Re-reads the stored config and rebuilds Twitch chat and the stream
    /// monitor from it. YouTube and Discord keep running as they are.
    pub async fn on_configuration_updated(&self) {
        let mut state = self.state.lock().await;
        if state.config.is_none() {
            debug!("Config update before start; nothing to rebuild");
            return;
        }

        let config = match self.config_repo.get_config().await {
            Ok(Some(cfg)) => cfg,
            Ok(None) => {
                self.telemetry.warning(SRC_RECONFIGURE, "config update announced but no config is stored");
                return;
            }
            Err(e) => {
                self.telemetry.exception(SRC_RECONFIGURE, &e);
                return;
            }
        };

        info!("Config changed ({}); rebuilding Twitch chat and stream monitor", config.modified_date);
        self.stop_twitch(&mut state).await;
        state.config = Some(config.clone());
        self.start_twitch(&mut state, &config).await;
    }

    pub async fn on_stream_online(&self) {
        let mut state = self.state.lock().await;
        self.stream_online(&mut state).await;
    }

    pub async fn on_stream_offline(&self) {
        let mut state = self.state.lock().await;
        self.stream_offline(&mut state).await;
    }

    /// Routes one adapter event. Events from a retired Twitch generation are
    /// dropped here.
    pub async fn handle_envelope(&self, env: AdapterEnvelope) {
        let mut state = self.state.lock().await;

        let rebuilt_slot = matches!(env.slot, AdapterSlot::TwitchChat | AdapterSlot::StreamMonitor);
        if rebuilt_slot && env.generation != state.generation {
            debug!(
                "Dropping {:?} event from generation {} (current {})",
                env.slot, env.generation, state.generation
            );
            return;
        }

        match (env.slot, env.event) {
            (_, AdapterEvent::Connected { platform, self_id }) => {
                self.on_connected(&mut state, platform, self_id).await;
            }
            (AdapterSlot::YouTube, AdapterEvent::Message(msg)) => {
                self.dispatch(&state, &msg).await;
            }
            (AdapterSlot::Discord, AdapterEvent::Message(msg)) => {
                self.dispatch_discord(&state, &msg).await;
            }
            (AdapterSlot::TwitchChat, AdapterEvent::Message(msg)) => {
                debug!("[twitch] {} {}: {}", msg.origin, msg.author_name, msg.text);
            }
            (AdapterSlot::StreamMonitor, AdapterEvent::StreamOnline) => {
                self.stream_online(&mut state).await;
            }
            (AdapterSlot::StreamMonitor, AdapterEvent::StreamOffline) => {
                self.stream_offline(&mut state).await;
            }
            (slot, event) => {
                trace!("Ignoring {:?} from {:?}", event, slot);
            }
        }
    }

    async fn handle_bus_event(&self, evt: RelayEvent) {
        match evt {
            RelayEvent::ConfigUpdated { .. } => self.on_configuration_updated().await,
            RelayEvent::SystemMessage(text) => info!("System message: {}", text),
        }
    }

    // ------------------------------------------------------------------
    // inspection
    // ------------------------------------------------------------------

    pub async fn twitch_state(&self) -> TwitchState {
        self.state.lock().await.twitch_state
    }

    pub async fn youtube_state(&self) -> SurfaceState {
        self.state.lock().await.youtube_state
    }

    pub async fn discord_state(&self) -> SurfaceState {
        self.state.lock().await.discord_state
    }

    /// Generation of the current Twitch chat / monitor pair.
    pub async fn generation(&self) -> u64 {
        self.state.lock().await.generation
    }

    pub async fn current_config(&self) -> Option<RelayConfig> {
        self.state.lock().await.config.clone()
    }

    // ------------------------------------------------------------------
    // dispatch
    // ------------------------------------------------------------------

    async fn fetch_commands(&self) -> Vec<Command> {
        match self.command_repo.list_commands().await {
            Ok(commands) => commands,
            Err(e) => {
                self.telemetry.exception(SRC_DISPATCH, &e);
                Vec::new()
            }
        }
    }

    async fn dispatch(&self, state: &RelayState, msg: &ChatMessage) {
        let commands = self.fetch_commands().await;

        if is_command_list_request(&msg.text) {
            let reply = format_command_list(&enabled_commands(&commands));
            self.reply_on_echo_surfaces(state, &reply).await;
            return;
        }

        match match_command(&msg.text, &commands) {
            Some(cmd) => {
                debug!("Relaying {} from {} ({})", cmd.command_name, msg.author_name, msg.platform);
                self.send_to_twitch(state, &msg.text).await;
            }
            None => trace!("No command matched: {}", msg.text),
        }
    }

    async fn dispatch_discord(&self, state: &RelayState, msg: &ChatMessage) {
        // The bot id arrives with Ready. Until then nothing counts as our own
        // message; the relay posts nothing to Discord before Ready anyway.
        if is_own_message(msg, state.discord_bot_id.as_deref()) {
            trace!("Ignoring our own Discord message");
            return;
        }
        let Some(config) = state.config.as_ref() else {
            return;
        };
        if !is_configured_channel(msg, config) {
            trace!("Ignoring Discord message from channel {}", msg.origin);
            return;
        }
        self.dispatch(state, msg).await;
    }

    async fn send_to_twitch(&self, state: &RelayState, text: &str) {
        let Some(chat) = state.twitch_chat.as_ref() else {
            self.telemetry.warning(SRC_TWITCH, "Twitch chat is not running; message dropped");
            return;
        };
        let Some(target) = chat.get().default_channel() else {
            self.telemetry.warning(SRC_TWITCH, "Twitch chat has no channel; message dropped");
            return;
        };
        if let Err(e) = chat.send(&target, text).await {
            self.telemetry.exception(SRC_TWITCH, &e);
        }
    }

    async fn send_to_youtube(&self, state: &RelayState, text: &str) {
        let Some(yt) = state.youtube.as_ref() else {
            return;
        };
        let Some(target) = yt.get().default_channel() else {
            self.telemetry.warning(SRC_YOUTUBE, "no active YouTube live chat; message not posted");
            return;
        };
        if let Err(e) = yt.send(&target, text).await {
            self.telemetry.exception(SRC_YOUTUBE, &e);
        }
    }

    async fn send_to_discord(&self, state: &RelayState, text: &str) {
        let Some(dc) = state.discord.as_ref() else {
            return;
        };
        let configured = state
            .config
            .as_ref()
            .map(|c| c.discord_channel_id.trim())
            .filter(|id| !id.is_empty())
            .map(ChannelRef::new);
        let Some(target) = configured.or_else(|| dc.get().default_channel()) else {
            self.telemetry.warning(SRC_DISCORD, "no Discord channel configured; message not posted");
            return;
        };
        if let Err(e) = dc.send(&target, text).await {
            self.telemetry.exception(SRC_DISCORD, &e);
        }
    }

    /// The command list goes to every enabled echo surface and never to Twitch.
    async fn reply_on_echo_surfaces(&self, state: &RelayState, text: &str) {
        self.send_to_discord(state, text).await;
        self.send_to_youtube(state, text).await;
    }

    async fn on_connected(&self, state: &mut RelayState, platform: Platform, self_id: Option<String>) {
        info!("{} connected", platform.display_name());
        match platform {
            Platform::Discord => {
                if let Some(id) = self_id {
                    debug!("Discord bot user id is {}", id);
                    state.discord_bot_id = Some(id);
                }
            }
            Platform::Twitch => {
                self.send_to_twitch(state, &connection_announcement(Platform::Twitch)).await;
            }
            Platform::YouTube => {
                self.send_to_youtube(state, &connection_announcement(Platform::YouTube)).await;
            }
        }
    }

    // ------------------------------------------------------------------
    // stream signals
    // ------------------------------------------------------------------

    async fn stream_online(&self, state: &mut RelayState) {
        match state.youtube_state {
            SurfaceState::Disabled => {
                debug!("Stream online; YouTube disabled");
                return;
            }
            SurfaceState::Connected => {
                debug!("Stream online; YouTube already connected");
                return;
            }
            SurfaceState::Idle => {}
        }
        let Some(yt) = state.youtube.as_mut() else {
            self.telemetry.warning(SRC_STREAM, "stream online but no YouTube adapter was built");
            return;
        };
        match yt.get_mut().connect().await {
            Ok(()) => {
                state.youtube_state = SurfaceState::Connected;
                info!("Stream online; YouTube connected");
            }
            Err(e) => self.telemetry.exception(SRC_STREAM, &e),
        }
    }

    async fn stream_offline(&self, state: &mut RelayState) {
        if state.youtube_state != SurfaceState::Connected {
            debug!("Stream offline; YouTube not connected");
            return;
        }
        if let Some(yt) = state.youtube.as_mut() {
            if let Err(e) = yt.get_mut().disconnect().await {
                self.telemetry.exception(SRC_STREAM, &e);
            }
        }
        state.youtube_state = SurfaceState::Idle;
        info!("Stream offline; YouTube disconnected");
    }

    // ------------------------------------------------------------------
    // adapter construction
    // ------------------------------------------------------------------

    async fn build_discord(&self, state: &mut RelayState, config: &RelayConfig) {
        state.discord_state = SurfaceState::Idle;
        let sink = EventSink::new(AdapterSlot::Discord, 0, self.events_tx.clone());
        let adapter = match self.factory.discord(config, sink.clone()) {
            Ok(a) => a,
            Err(e) => {
                self.telemetry.exception(SRC_DISCORD, &e);
                return;
            }
        };
        let mut handle = AdapterHandle::new(adapter, sink);
        match handle.get_mut().connect().await {
            Ok(()) => state.discord_state = SurfaceState::Connected,
            Err(e) => self.telemetry.exception(SRC_DISCORD, &e),
        }
        state.discord = Some(handle);
    }

    fn build_youtube(&self, state: &mut RelayState, config: &RelayConfig) {
        state.youtube_state = SurfaceState::Idle;
        let sink = EventSink::new(AdapterSlot::YouTube, 0, self.events_tx.clone());
        match self.factory.youtube(config, sink.clone()) {
            Ok(adapter) => state.youtube = Some(AdapterHandle::new(adapter, sink)),
            Err(e) => self.telemetry.exception(SRC_YOUTUBE, &e),
        }
    }

    /// Builds a new Twitch chat / monitor pair under a fresh generation.
    async fn start_twitch(&self, state: &mut RelayState, config: &RelayConfig) {
        state.generation += 1;
        let generation = state.generation;
        state.twitch_state = TwitchState::Starting;

        let chat_sink = EventSink::new(AdapterSlot::TwitchChat, generation, self.events_tx.clone());
        match self.factory.twitch_chat(config, chat_sink.clone()) {
            Ok(adapter) => {
                let mut handle = AdapterHandle::new(adapter, chat_sink);
                match handle.get_mut().connect().await {
                    Ok(()) => {
                        state.twitch_chat = Some(handle);
                        state.twitch_state = TwitchState::Running;
                    }
                    Err(e) => {
                        self.telemetry.exception(SRC_TWITCH, &e);
                        if let Err(e) = handle.close().await {
                            self.telemetry.exception(SRC_TWITCH, &e);
                        }
                        state.twitch_state = TwitchState::Stopped;
                    }
                }
            }
            Err(e) => {
                self.telemetry.exception(SRC_TWITCH, &e);
                state.twitch_state = TwitchState::Stopped;
            }
        }

        let monitor_sink = EventSink::new(AdapterSlot::StreamMonitor, generation, self.events_tx.clone());
        match self.factory.stream_monitor(config, monitor_sink.clone()) {
            Ok(monitor) => {
                let mut handle = AdapterHandle::new(monitor, monitor_sink);
                match handle.get_mut().start().await {
                    Ok(()) => state.stream_monitor = Some(handle),
                    Err(e) => {
                        self.telemetry.exception(SRC_TWITCH, &e);
                        if let Err(e) = handle.close().await {
                            self.telemetry.exception(SRC_TWITCH, &e);
                        }
                    }
                }
            }
            Err(e) => self.telemetry.exception(SRC_TWITCH, &e),
        }

        info!("Twitch generation {} is {:?}", generation, state.twitch_state);
    }

    async fn stop_twitch(&self, state: &mut RelayState) {
        state.twitch_state = TwitchState::Stopped;
        if let Some(chat) = state.twitch_chat.take() {
            if let Err(e) = chat.close().await {
                self.telemetry.exception(SRC_TWITCH, &e);
            }
        }
        if let Some(monitor) = state.stream_monitor.take() {
            if let Err(e) = monitor.close().await {
                self.telemetry.exception(SRC_TWITCH, &e);
            }
        }
    }
}

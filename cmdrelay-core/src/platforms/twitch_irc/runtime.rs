//! src/platforms/twitch_irc/runtime.rs
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use cmdrelay_common::models::{ChannelRef, ChatMessage, Platform, RelayConfig};
use cmdrelay_common::traits::platform_traits::{ConnectionStatus, PlatformIntegration};

use crate::Error;
use crate::platforms::sink::{AdapterEvent, EventSink};

use super::client::{IrcIncomingEvent, TwitchIrcClient};

const RECONNECT_INITIAL_DELAY: Duration = Duration::from_secs(1);
const RECONNECT_MAX_DELAY: Duration = Duration::from_secs(60);

/// IRC wants `oauth:<token>` in PASS; the auth flow hands out bare tokens.
pub fn normalize_oauth_token(token: &str) -> String {
    let token = token.trim();
    if token.starts_with("oauth:") {
        token.to_string()
    } else {
        format!("oauth:{}", token)
    }
}

pub fn normalize_channel(channel: &str) -> String {
    let channel = channel.trim().to_lowercase();
    if channel.starts_with('#') {
        channel
    } else {
        format!("#{}", channel)
    }
}

/// Doubles the reconnect delay, capped at a minute.
pub fn next_backoff(delay: Duration) -> Duration {
    (delay * 2).min(RECONNECT_MAX_DELAY)
}

/// Opens a logged-in IRC session.
#[async_trait]
pub trait IrcConnector: Send + Sync {
    async fn connect(&self, user_name: &str, oauth_token: &str) -> io::Result<TwitchIrcClient>;
}

/// TLS to `irc.chat.twitch.tv`.
pub struct TwitchTlsConnector;

#[async_trait]
impl IrcConnector for TwitchTlsConnector {
    async fn connect(&self, user_name: &str, oauth_token: &str) -> io::Result<TwitchIrcClient> {
        TwitchIrcClient::connect(user_name, oauth_token).await
    }
}

type SharedClient = Arc<Mutex<Option<TwitchIrcClient>>>;

fn with_client<T>(client: &SharedClient, f: impl FnOnce(&mut Option<TwitchIrcClient>) -> T) -> T {
    match client.lock() {
        Ok(mut guard) => f(&mut *guard),
        Err(poisoned) => f(&mut *poisoned.into_inner()),
    }
}

/// Everything the background session needs to log back in.
struct Session {
    connector: Arc<dyn IrcConnector>,
    user_name: String,
    oauth_token: String,
    channel: String,
    sink: EventSink,
    client: SharedClient,
    initial_delay: Duration,
}

impl Session {
    /// Logs in and joins the channel, handing back the read side.
    async fn open(&self) -> io::Result<mpsc::UnboundedReceiver<IrcIncomingEvent>> {
        let mut client = self.connector.connect(&self.user_name, &self.oauth_token).await?;
        let incoming = client
            .incoming
            .take()
            .ok_or_else(|| io::Error::other("no incoming channel in TwitchIrcClient"))?;
        client.join_channel(&self.channel);
        with_client(&self.client, |slot| *slot = Some(client));
        Ok(incoming)
    }

    /// Retries `open` with exponential backoff until it succeeds or the
    /// adapter is closed.
    async fn reopen(&self) -> Option<mpsc::UnboundedReceiver<IrcIncomingEvent>> {
        let mut delay = self.initial_delay;
        loop {
            sleep(delay).await;
            if !self.sink.is_open() {
                return None;
            }
            match self.open().await {
                Ok(incoming) => {
                    info!("(TwitchIrcPlatform) reconnected to {}", self.channel);
                    return Some(incoming);
                }
                Err(e) => {
                    warn!("(TwitchIrcPlatform) reconnect failed: {}. Retrying in {:?}", e, delay);
                    delay = next_backoff(delay);
                }
            }
        }
    }

    /// Forwards events until the connection ends, then logs back in.
    async fn run(self, mut incoming: mpsc::UnboundedReceiver<IrcIncomingEvent>) {
        loop {
            while let Some(evt) = incoming.recv().await {
                if evt.command == "RECONNECT" {
                    break;
                }
                TwitchIrcPlatform::forward(evt, &self.user_name, &self.sink);
            }

            if let Some(old) = with_client(&self.client, Option::take) {
                old.shutdown();
            }
            if !self.sink.is_open() {
                break;
            }
            warn!("(TwitchIrcPlatform) connection to {} lost; reconnecting", self.channel);
            match self.reopen().await {
                Some(rx) => incoming = rx,
                None => break,
            }
        }
        info!("(TwitchIrcPlatform) session ended.");
    }
}

/// Twitch chat for the relay: joins the one configured channel and posts
/// relayed commands into it. Dropped connections are re-established in the
/// background.
pub struct TwitchIrcPlatform {
    user_name: String,
    oauth_token: String,
    channel: String,
    sink: EventSink,
    connector: Arc<dyn IrcConnector>,
    reconnect_delay: Duration,

    pub connection_status: ConnectionStatus,
    client: SharedClient,
    session_handle: Option<JoinHandle<()>>,
}

impl TwitchIrcPlatform {
    pub fn from_config(config: &RelayConfig, sink: EventSink) -> Result<Self, Error> {
        if config.twitch_user_name.trim().is_empty() {
            return Err(Error::Config("Twitch IRC needs twitch_user_name".into()));
        }
        if config.twitch_channel.trim().is_empty() {
            return Err(Error::Config("Twitch IRC needs twitch_channel".into()));
        }
        Ok(Self {
            user_name: config.twitch_user_name.trim().to_lowercase(),
            oauth_token: normalize_oauth_token(&config.twitch_access_token),
            channel: normalize_channel(&config.twitch_channel),
            sink,
            connector: Arc::new(TwitchTlsConnector),
            reconnect_delay: RECONNECT_INITIAL_DELAY,
            connection_status: ConnectionStatus::Disconnected,
            client: Arc::new(Mutex::new(None)),
            session_handle: None,
        })
    }

    pub fn with_connector(mut self, connector: Arc<dyn IrcConnector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    fn forward(evt: IrcIncomingEvent, own_nick: &str, sink: &EventSink) {
        match evt.command.as_str() {
            "PRIVMSG" => {
                let msg = ChatMessage::new(
                    Platform::Twitch,
                    evt.user_name.as_deref().unwrap_or_default(),
                    evt.user_id.as_deref().unwrap_or_default(),
                    evt.text.as_deref().unwrap_or_default(),
                    ChannelRef::new(evt.channel.unwrap_or_default()),
                );
                sink.message(msg);
            }
            "JOIN" => {
                let is_self = evt
                    .user_name
                    .as_deref()
                    .is_some_and(|n| n.eq_ignore_ascii_case(own_nick));
                if is_self {
                    info!("(TwitchIrcPlatform) joined {}", evt.channel.as_deref().unwrap_or("?"));
                    sink.emit(AdapterEvent::Connected {
                        platform: Platform::Twitch,
                        self_id: None,
                    });
                }
            }
            "NOTICE" => {
                info!("(TwitchIrcPlatform) NOTICE from server");
            }
            other => {
                debug!("(TwitchIrcPlatform) ignoring {}", other);
            }
        }
    }
}

#[async_trait]
impl PlatformIntegration for TwitchIrcPlatform {
    fn platform(&self) -> Platform {
        Platform::Twitch
    }

    async fn connect(&mut self) -> Result<(), Error> {
        if self.session_handle.is_some() {
            info!("(TwitchIrcPlatform) connect => already connected");
            return Ok(());
        }
        if self.oauth_token == "oauth:" {
            return Err(Error::Auth("Twitch IRC access token is empty".into()));
        }

        let session = Session {
            connector: self.connector.clone(),
            user_name: self.user_name.clone(),
            oauth_token: self.oauth_token.clone(),
            channel: self.channel.clone(),
            sink: self.sink.clone(),
            client: self.client.clone(),
            initial_delay: self.reconnect_delay,
        };

        let incoming = match session.open().await {
            Ok(rx) => rx,
            Err(e) => {
                let msg = format!("Error connecting to Twitch IRC => {}", e);
                error!("{}", msg);
                self.connection_status = ConnectionStatus::Error(msg);
                return Err(Error::Platform("Twitch IRC connect failed".into()));
            }
        };

        self.session_handle = Some(tokio::spawn(session.run(incoming)));
        self.connection_status = ConnectionStatus::Connected;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), Error> {
        self.connection_status = ConnectionStatus::Disconnected;

        if let Some(h) = self.session_handle.take() {
            h.abort();
        }
        if let Some(cli) = with_client(&self.client, Option::take) {
            cli.part_channel(&self.channel);
            cli.shutdown();
        }
        Ok(())
    }

    async fn send_message(&self, channel: &ChannelRef, message: &str) -> Result<(), Error> {
        with_client(&self.client, |slot| match slot.as_ref() {
            None => Err(Error::Platform("No active Twitch IRC connection".into())),
            Some(cli) if cli.send_privmsg(channel.as_str(), message) => Ok(()),
            Some(_) => Err(Error::Platform("Twitch IRC writer has stopped".into())),
        })
    }

    async fn get_connection_status(&self) -> Result<ConnectionStatus, Error> {
        let live = with_client(&self.client, |slot| slot.is_some());
        match (&self.session_handle, live) {
            (Some(_), false) => Ok(ConnectionStatus::Reconnecting),
            _ => Ok(self.connection_status.clone()),
        }
    }

    fn default_channel(&self) -> Option<ChannelRef> {
        Some(ChannelRef::new(self.channel.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, split, AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf};
    use crate::platforms::sink::{AdapterEnvelope, AdapterSlot};

    #[test]
    fn token_and_channel_are_normalized() {
        assert_eq!(normalize_oauth_token("abc123"), "oauth:abc123");
        assert_eq!(normalize_oauth_token("oauth:abc123"), "oauth:abc123");
        assert_eq!(normalize_channel("SomeStreamer"), "#somestreamer");
        assert_eq!(normalize_channel("#somestreamer"), "#somestreamer");
    }

    #[test]
    fn own_join_becomes_connected() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(AdapterSlot::TwitchChat, 1, tx);

        let someone_else = IrcIncomingEvent {
            command: "JOIN".into(),
            channel: Some("#streamer".into()),
            user_name: Some("viewer".into()),
            user_id: None,
            text: None,
        };
        TwitchIrcPlatform::forward(someone_else, "relaybot", &sink);
        assert!(rx.try_recv().is_err());

        let me = IrcIncomingEvent {
            command: "JOIN".into(),
            channel: Some("#streamer".into()),
            user_name: Some("RelayBot".into()),
            user_id: None,
            text: None,
        };
        TwitchIrcPlatform::forward(me, "relaybot", &sink);
        let env = rx.try_recv().unwrap();
        assert_eq!(
            env.event,
            AdapterEvent::Connected { platform: Platform::Twitch, self_id: None }
        );
    }

    #[test]
    fn backoff_doubles_up_to_a_minute() {
        assert_eq!(next_backoff(Duration::from_secs(1)), Duration::from_secs(2));
        assert_eq!(next_backoff(Duration::from_secs(32)), Duration::from_secs(60));
        assert_eq!(next_backoff(Duration::from_secs(60)), Duration::from_secs(60));
    }

    /// Hands out in-memory sessions; the test plays the server side.
    struct LoopbackConnector {
        servers: mpsc::UnboundedSender<DuplexStream>,
    }

    #[async_trait]
    impl IrcConnector for LoopbackConnector {
        async fn connect(&self, user_name: &str, oauth_token: &str) -> io::Result<TwitchIrcClient> {
            let (client_io, server_io) = duplex(4096);
            self.servers
                .send(server_io)
                .map_err(|_| io::Error::other("test server gone"))?;
            let (read_half, write_half) = split(client_io);
            Ok(TwitchIrcClient::start(read_half, write_half, user_name, oauth_token))
        }
    }

    async fn next_server(rx: &mut mpsc::UnboundedReceiver<DuplexStream>) -> DuplexStream {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("client never connected")
            .expect("connector dropped")
    }

    /// Reads what the client sent until it joins a channel.
    async fn read_until_join(lines: &mut Lines<BufReader<ReadHalf<DuplexStream>>>) -> String {
        loop {
            let line = tokio::time::timeout(Duration::from_secs(2), lines.next_line())
                .await
                .expect("client went quiet")
                .unwrap()
                .expect("client closed");
            if line.starts_with("JOIN ") {
                return line;
            }
        }
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<AdapterEnvelope>) -> AdapterEvent {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("no adapter event")
            .unwrap()
            .event
    }

    #[tokio::test]
    async fn rejoins_after_reconnect_and_eof() {
        let (servers_tx, mut servers_rx) = mpsc::unbounded_channel();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(AdapterSlot::TwitchChat, 1, tx);
        let cfg = RelayConfig {
            twitch_user_name: "relaybot".into(),
            twitch_access_token: "secret".into(),
            twitch_channel: "streamer".into(),
            ..Default::default()
        };
        let mut twitch = TwitchIrcPlatform::from_config(&cfg, sink)
            .unwrap()
            .with_connector(Arc::new(LoopbackConnector { servers: servers_tx }))
            .with_reconnect_delay(Duration::from_millis(5));

        twitch.connect().await.unwrap();

        // First session: join, then the server asks us to move.
        let (r, mut w) = split(next_server(&mut servers_rx).await);
        let mut lines = BufReader::new(r).lines();
        assert_eq!(read_until_join(&mut lines).await, "JOIN #streamer");
        w.write_all(b":relaybot!relaybot@relaybot.tmi.twitch.tv JOIN #streamer\r\n:tmi.twitch.tv RECONNECT\r\n")
            .await
            .unwrap();
        assert_eq!(
            next_event(&mut rx).await,
            AdapterEvent::Connected { platform: Platform::Twitch, self_id: None }
        );

        // Second session: logs in again and relays chat.
        let (r, mut w) = split(next_server(&mut servers_rx).await);
        let mut lines = BufReader::new(r).lines();
        assert_eq!(read_until_join(&mut lines).await, "JOIN #streamer");
        w.write_all(b"@user-id=7 :viewer!viewer@viewer.tmi.twitch.tv PRIVMSG #streamer :!bsr 25f\r\n")
            .await
            .unwrap();
        match next_event(&mut rx).await {
            AdapterEvent::Message(msg) => assert_eq!(msg.text, "!bsr 25f"),
            other => panic!("unexpected event {:?}", other),
        }
        twitch.send_message(&ChannelRef::new("#streamer"), "hello").await.unwrap();
        assert_eq!(
            tokio::time::timeout(Duration::from_secs(2), lines.next_line()).await.unwrap().unwrap().as_deref(),
            Some("PRIVMSG #streamer :hello")
        );

        // Plain EOF also triggers a new session.
        drop(w);
        drop(lines);
        let (r, _w) = split(next_server(&mut servers_rx).await);
        let mut lines = BufReader::new(r).lines();
        assert_eq!(read_until_join(&mut lines).await, "JOIN #streamer");

        twitch.disconnect().await.unwrap();
        assert_eq!(twitch.get_connection_status().await.unwrap(), ConnectionStatus::Disconnected);
    }

    #[test]
    fn requires_user_and_channel() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(AdapterSlot::TwitchChat, 1, tx);
        let cfg = RelayConfig::default();
        assert!(matches!(TwitchIrcPlatform::from_config(&cfg, sink), Err(Error::Config(_))));
    }
}

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use twilight_gateway::{
    self as gateway,
    CloseFrame,
    Config,
    Event,
    EventTypeFlags,
    Intents,
    MessageSender,
    Shard,
    StreamExt,
};
use twilight_http::Client as HttpClient;
use twilight_http::client::ClientBuilder;
use twilight_model::id::marker::ChannelMarker;
use twilight_model::id::Id;

use cmdrelay_common::models::{ChannelRef, ChatMessage, Platform, RelayConfig};
use cmdrelay_common::traits::platform_traits::{ConnectionStatus, PlatformIntegration};

use crate::Error;
use crate::platforms::sink::{AdapterEvent, EventSink};

/// Reads gateway events for one shard and pushes the ones the relay cares
/// about into the sink. Bot and self filtering is left to the coordinator.
async fn shard_runner(mut shard: Shard, sink: EventSink) {
    let shard_id = shard.id().number();
    info!("(ShardRunner) Shard {shard_id} started. Listening for events.");

    let wanted = EventTypeFlags::READY | EventTypeFlags::MESSAGE_CREATE;
    while let Some(item) = shard.next_event(wanted).await {
        let event = match item {
            Ok(event) => event,
            Err(err) => {
                error!("Shard {shard_id} => error receiving event: {err:?}");
                continue;
            }
        };

        match event {
            Event::Ready(ready) => {
                info!(
                    "Shard {shard_id} => READY as {} (ID={})",
                    ready.user.name, ready.user.id
                );
                sink.emit(AdapterEvent::Connected {
                    platform: Platform::Discord,
                    self_id: Some(ready.user.id.to_string()),
                });
            }
            Event::MessageCreate(msg) => {
                trace!("Shard {shard_id} => message in {} from {}", msg.channel_id, msg.author.name);
                let chat = ChatMessage::new(
                    Platform::Discord,
                    &msg.author.name,
                    &msg.author.id.to_string(),
                    &msg.content,
                    ChannelRef::new(msg.channel_id.to_string()),
                );
                if !sink.message(chat) {
                    debug!("Shard {shard_id} => sink closed, stopping");
                    break;
                }
            }
            other => {
                trace!("Shard {shard_id} => unhandled event: {:?}", other.kind());
            }
        }
    }

    warn!("(ShardRunner) Shard {shard_id} event loop ended.");
}

pub fn parse_channel_id(channel: &str) -> Result<Id<ChannelMarker>, Error> {
    let raw: u64 = channel
        .trim()
        .parse()
        .map_err(|_| Error::Platform(format!("Invalid channel ID: {channel}")))?;
    Id::new_checked(raw).ok_or_else(|| Error::Platform(format!("Invalid channel ID: {channel}")))
}

pub struct DiscordPlatform {
    token: String,
    channel_id: String,
    sink: EventSink,

    pub connection_status: ConnectionStatus,
    shard_tasks: Vec<JoinHandle<()>>,
    shard_senders: Vec<MessageSender>,
    http: Option<Arc<HttpClient>>,
}

impl DiscordPlatform {
    pub fn from_config(config: &RelayConfig, sink: EventSink) -> Result<Self, Error> {
        if config.discord_token.trim().is_empty() {
            return Err(Error::Auth("Discord token is empty".into()));
        }
        Ok(Self {
            token: config.discord_token.trim().to_string(),
            channel_id: config.discord_channel_id.trim().to_string(),
            sink,
            connection_status: ConnectionStatus::Disconnected,
            shard_tasks: Vec::new(),
            shard_senders: Vec::new(),
            http: None,
        })
    }
}

#[async_trait]
impl PlatformIntegration for DiscordPlatform {
    fn platform(&self) -> Platform {
        Platform::Discord
    }

    async fn connect(&mut self) -> Result<(), Error> {
        if matches!(self.connection_status, ConnectionStatus::Connected) {
            info!("(DiscordPlatform) Already connected => skipping");
            return Ok(());
        }

        let http_client = Arc::new(
            ClientBuilder::new()
                .token(self.token.clone())
                .timeout(Duration::from_secs(30))
                .build()
        );
        self.http = Some(http_client.clone());

        let config = Config::new(
            self.token.clone(),
            Intents::GUILDS | Intents::GUILD_MESSAGES | Intents::MESSAGE_CONTENT,
        );

        let shards = gateway::create_recommended(&http_client, config, |_, b| b.build())
            .await
            .map_err(|e| {
                self.connection_status = ConnectionStatus::Error(e.to_string());
                Error::Platform(format!("create_recommended error: {e}"))
            })?;

        for shard in shards {
            self.shard_senders.push(shard.sender());
            let sink = self.sink.clone();
            self.shard_tasks.push(tokio::spawn(shard_runner(shard, sink)));
        }

        self.connection_status = ConnectionStatus::Connected;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), Error> {
        self.connection_status = ConnectionStatus::Disconnected;

        for sender in &self.shard_senders {
            let _ = sender.close(CloseFrame::NORMAL);
        }
        for mut task in self.shard_tasks.drain(..) {
            if tokio::time::timeout(Duration::from_secs(5), &mut task).await.is_err() {
                warn!("(DiscordPlatform) shard did not close in time; aborting");
                task.abort();
            }
        }
        self.shard_senders.clear();
        self.http = None;
        Ok(())
    }

    async fn send_message(&self, channel: &ChannelRef, message: &str) -> Result<(), Error> {
        let channel_id = parse_channel_id(channel.as_str())?;
        let http = self
            .http
            .as_ref()
            .ok_or_else(|| Error::Platform("Discord is not connected".into()))?;

        http.create_message(channel_id)
            .content(message)
            .await
            .map_err(|e| Error::Platform(format!("Error sending Discord message: {e:?}")))?;
        Ok(())
    }

    async fn get_connection_status(&self) -> Result<ConnectionStatus, Error> {
        Ok(self.connection_status.clone())
    }

    fn default_channel(&self) -> Option<ChannelRef> {
        if self.channel_id.is_empty() {
            None
        } else {
            Some(ChannelRef::new(self.channel_id.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use crate::platforms::sink::AdapterSlot;

    #[test]
    fn channel_ids_must_be_nonzero_numbers() {
        assert!(parse_channel_id("123456789012345678").is_ok());
        assert!(parse_channel_id("0").is_err());
        assert!(parse_channel_id("general").is_err());
    }

    #[test]
    fn needs_a_token() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(AdapterSlot::Discord, 0, tx);
        let cfg = RelayConfig {
            discord_channel_id: "42".into(),
            ..Default::default()
        };
        assert!(matches!(DiscordPlatform::from_config(&cfg, sink.clone()), Err(Error::Auth(_))));

        let cfg = RelayConfig {
            discord_token: "token".into(),
            discord_channel_id: " 42 ".into(),
            ..Default::default()
        };
        let discord = DiscordPlatform::from_config(&cfg, sink).unwrap();
        assert_eq!(discord.default_channel(), Some(ChannelRef::new("42")));
    }
}

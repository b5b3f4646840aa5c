//! Polls Helix for the configured channel and reports live/offline transitions.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use cmdrelay_common::models::RelayConfig;
use cmdrelay_common::traits::platform_traits::StreamMonitor;

use crate::Error;
use crate::platforms::sink::{AdapterEvent, EventSink};

use super::client::TwitchHelixClient;
use super::requests::fetch_live_stream;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// What a new observation means given the previous one. The first
/// observation always reports the current state, since a monitor built
/// after a rebuild cannot know what its predecessor last said.
pub fn transition(previous: Option<bool>, live: bool) -> Option<AdapterEvent> {
    match (previous, live) {
        (Some(true), true) | (Some(false), false) => None,
        (_, true) => Some(AdapterEvent::StreamOnline),
        (_, false) => Some(AdapterEvent::StreamOffline),
    }
}

pub struct TwitchStreamMonitor {
    client: Arc<TwitchHelixClient>,
    user_login: String,
    poll_interval: Duration,
    sink: EventSink,
    running: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl TwitchStreamMonitor {
    pub fn from_config(config: &RelayConfig, sink: EventSink) -> Result<Self, Error> {
        let user_login = config.twitch_channel.trim().trim_start_matches('#').to_lowercase();
        if user_login.is_empty() {
            return Err(Error::Config("stream monitor needs twitch_channel".into()));
        }
        if config.twitch_client_id.trim().is_empty() {
            return Err(Error::Config("stream monitor needs twitch_client_id".into()));
        }
        let client = TwitchHelixClient::new(&config.twitch_access_token, &config.twitch_client_id);
        Ok(Self {
            client: Arc::new(client),
            user_login,
            poll_interval: DEFAULT_POLL_INTERVAL,
            sink,
            running: Arc::new(AtomicBool::new(false)),
            task: None,
        })
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

#[async_trait]
impl StreamMonitor for TwitchStreamMonitor {
    async fn start(&mut self) -> Result<(), Error> {
        if self.task.is_some() {
            return Ok(());
        }

        let client = self.client.clone();
        let login = self.user_login.clone();
        let sink = self.sink.clone();
        let running = self.running.clone();
        let period = self.poll_interval;

        running.store(true, Ordering::SeqCst);
        info!("(TwitchStreamMonitor) watching '{}' every {:?}", login, period);

        self.task = Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last: Option<bool> = None;

            while running.load(Ordering::SeqCst) && sink.is_open() {
                ticker.tick().await;
                let live = match fetch_live_stream(&client, &login).await {
                    Ok(stream) => stream.is_some(),
                    Err(e) => {
                        warn!("(TwitchStreamMonitor) poll failed: {}", e);
                        continue;
                    }
                };
                if let Some(evt) = transition(last, live) {
                    match evt {
                        AdapterEvent::StreamOnline => info!("(TwitchStreamMonitor) stream started: {}", login),
                        _ => info!("(TwitchStreamMonitor) stream stopped: {}", login),
                    }
                    sink.emit(evt);
                }
                last = Some(live);
            }
            info!("(TwitchStreamMonitor) poll loop ended for '{}'", login);
        }));
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), Error> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

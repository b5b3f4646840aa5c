//! src/platforms/youtube/runtime.rs

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use cmdrelay_common::models::{ChannelRef, ChatMessage, Platform, RelayConfig};
use cmdrelay_common::traits::platform_traits::{ConnectionStatus, PlatformIntegration};

use crate::Error;
use crate::platforms::sink::{AdapterEvent, EventSink};

use super::client::{GoogleCredentials, LiveChatApi, LiveChatPage, YouTubeApiClient};

const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);
const ERROR_BACKOFF: Duration = Duration::from_secs(5);
const LOOKUP_INITIAL_DELAY: Duration = Duration::from_secs(5);
const LOOKUP_MAX_DELAY: Duration = Duration::from_secs(60);

/// Turns one poll page into chat messages, in list order.
pub fn page_messages(page: &LiveChatPage, live_chat_id: &str) -> Vec<ChatMessage> {
    page.items
        .iter()
        .filter_map(|item| {
            let text = item.text()?;
            let (author_id, author_name) = match &item.author_details {
                Some(a) => (a.channel_id.as_str(), a.display_name.as_str()),
                None => (item.snippet.author_channel_id.as_str(), ""),
            };
            Some(ChatMessage::new(
                Platform::YouTube,
                author_name,
                author_id,
                text,
                ChannelRef::new(live_chat_id),
            ))
        })
        .collect()
}

/// Keeps asking for the active broadcast's live chat until one shows up or
/// the sink is closed. The broadcast often appears a while after the stream
/// itself goes live.
async fn find_live_chat(
    api: &dyn LiveChatApi,
    user_email: &str,
    sink: &EventSink,
    initial_delay: Duration,
) -> Option<String> {
    let mut delay = initial_delay;
    while sink.is_open() {
        match api.find_live_chat_id().await {
            Ok(Some(id)) => return Some(id),
            Ok(None) => {
                info!(
                    "(YouTubePlatform) no active broadcast for {} yet; retrying in {:?}",
                    user_email, delay
                );
            }
            Err(e) => {
                warn!("(YouTubePlatform) live chat lookup failed: {}; retrying in {:?}", e, delay);
            }
        }
        sleep(delay).await;
        delay = (delay * 2).min(LOOKUP_MAX_DELAY);
    }
    None
}

async fn poll_loop(api: Arc<dyn LiveChatApi>, live_chat_id: String, sink: EventSink) {
    let mut page_token: Option<String> = None;
    // The first page is chat history from before we connected; only its
    // page token is used.
    let mut backlog = true;

    while sink.is_open() {
        match api.list_messages(&live_chat_id, page_token.as_deref()).await {
            Ok(page) => {
                if !backlog {
                    for msg in page_messages(&page, &live_chat_id) {
                        if !sink.message(msg) {
                            break;
                        }
                    }
                } else {
                    debug!("(YouTubePlatform) skipped {} backlog items", page.items.len());
                }
                backlog = false;
                if page.next_page_token.is_some() {
                    page_token = page.next_page_token;
                }
                let wait = Duration::from_millis(page.polling_interval_millis).max(MIN_POLL_INTERVAL);
                sleep(wait).await;
            }
            Err(e) => {
                warn!("(YouTubePlatform) poll failed: {}", e);
                sleep(ERROR_BACKOFF).await;
            }
        }
    }
    info!("(YouTubePlatform) poll loop ended for chat {}", live_chat_id);
}

pub struct YouTubePlatform {
    credentials_file: String,
    user_email: String,
    sink: EventSink,
    lookup_delay: Duration,

    pub connection_status: ConnectionStatus,
    api: Option<Arc<dyn LiveChatApi>>,
    live_chat_id: Arc<Mutex<Option<String>>>,
    session_task: Option<JoinHandle<()>>,
}

impl YouTubePlatform {
    pub fn from_config(config: &RelayConfig, sink: EventSink) -> Result<Self, Error> {
        if config.google_credentials_file.trim().is_empty() {
            return Err(Error::Config("YouTube needs google_credentials_file".into()));
        }
        Ok(Self {
            credentials_file: config.google_credentials_file.trim().to_string(),
            user_email: config.youtube_user_email.clone(),
            sink,
            lookup_delay: LOOKUP_INITIAL_DELAY,
            connection_status: ConnectionStatus::Disconnected,
            api: None,
            live_chat_id: Arc::new(Mutex::new(None)),
            session_task: None,
        })
    }

    /// Uses `api` instead of loading credentials on first connect.
    pub fn with_api(mut self, api: Arc<dyn LiveChatApi>) -> Self {
        self.api = Some(api);
        self
    }

    pub fn with_lookup_delay(mut self, delay: Duration) -> Self {
        self.lookup_delay = delay;
        self
    }

    fn set_live_chat_id(slot: &Mutex<Option<String>>, id: Option<String>) {
        match slot.lock() {
            Ok(mut guard) => *guard = id,
            Err(poisoned) => *poisoned.into_inner() = id,
        }
    }
}

#[async_trait]
impl PlatformIntegration for YouTubePlatform {
    fn platform(&self) -> Platform {
        Platform::YouTube
    }

    /// Starts a chat session. Returns once credentials are loaded; the live
    /// chat lookup and polling run in the background, and `Connected` is
    /// emitted when the chat is found.
    async fn connect(&mut self) -> Result<(), Error> {
        if self.session_task.is_some() {
            info!("(YouTubePlatform) connect => already connected");
            return Ok(());
        }

        let api = match &self.api {
            Some(api) => api.clone(),
            None => {
                let creds = GoogleCredentials::load(&self.credentials_file)
                    .await
                    .map_err(|e| {
                        self.connection_status = ConnectionStatus::Error(e.to_string());
                        e
                    })?;
                let api: Arc<dyn LiveChatApi> = Arc::new(YouTubeApiClient::new(creds));
                self.api = Some(api.clone());
                api
            }
        };

        let sink = self.sink.clone();
        let user_email = self.user_email.clone();
        let chat_slot = self.live_chat_id.clone();
        let initial_delay = self.lookup_delay;
        self.session_task = Some(tokio::spawn(async move {
            let Some(live_chat_id) = find_live_chat(api.as_ref(), &user_email, &sink, initial_delay).await else {
                debug!("(YouTubePlatform) lookup stopped before a live chat was found");
                return;
            };
            info!("(YouTubePlatform) connected to live chat {}", live_chat_id);
            Self::set_live_chat_id(&chat_slot, Some(live_chat_id.clone()));
            sink.emit(AdapterEvent::Connected {
                platform: Platform::YouTube,
                self_id: None,
            });
            poll_loop(api, live_chat_id, sink).await;
        }));
        self.connection_status = ConnectionStatus::Connecting;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), Error> {
        if let Some(task) = self.session_task.take() {
            task.abort();
        }
        Self::set_live_chat_id(&self.live_chat_id, None);
        self.connection_status = ConnectionStatus::Disconnected;
        info!("(YouTubePlatform) disconnected");
        Ok(())
    }

    async fn send_message(&self, channel: &ChannelRef, message: &str) -> Result<(), Error> {
        let api = self
            .api
            .as_ref()
            .ok_or_else(|| Error::Platform("YouTube is not connected".into()))?;
        api.insert_message(channel.as_str(), message).await
    }

    async fn get_connection_status(&self) -> Result<ConnectionStatus, Error> {
        let found = match self.live_chat_id.lock() {
            Ok(guard) => guard.is_some(),
            Err(poisoned) => poisoned.into_inner().is_some(),
        };
        if found && self.session_task.is_some() {
            Ok(ConnectionStatus::Connected)
        } else {
            Ok(self.connection_status.clone())
        }
    }

    fn default_channel(&self) -> Option<ChannelRef> {
        match self.live_chat_id.lock() {
            Ok(guard) => guard.as_deref().map(ChannelRef::new),
            Err(poisoned) => poisoned.into_inner().as_deref().map(ChannelRef::new),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;
    use crate::platforms::sink::{AdapterEnvelope, AdapterSlot};

    #[test]
    fn page_keeps_text_messages_in_order() {
        let body = r#"{
            "pollingIntervalMillis": 2000,
            "items": [
                { "id": "a", "snippet": { "type": "textMessageEvent", "displayMessage": "!queue 5" },
                  "authorDetails": { "channelId": "UC1", "displayName": "One" } },
                { "id": "b", "snippet": { "type": "superChatEvent", "displayMessage": "$5" } },
                { "id": "c", "snippet": { "type": "textMessageEvent", "displayMessage": "!bsr next",
                  "authorChannelId": "UC2" } }
            ]
        }"#;
        let page: LiveChatPage = serde_json::from_str(body).unwrap();
        let msgs = page_messages(&page, "chat-9");
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].text, "!queue 5");
        assert_eq!(msgs[0].author_name, "One");
        assert_eq!(msgs[1].text, "!bsr next");
        assert_eq!(msgs[1].author_id, "UC2");
        assert_eq!(msgs[1].origin, ChannelRef::new("chat-9"));
    }

    #[test]
    fn needs_a_credentials_file() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(AdapterSlot::YouTube, 0, tx);
        let yt = YouTubePlatform::from_config(&RelayConfig::default(), sink);
        assert!(matches!(yt, Err(Error::Config(_))));
    }

    /// Reports no broadcast for the first `misses` lookups.
    struct LateBroadcast {
        misses: usize,
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl LiveChatApi for LateBroadcast {
        async fn find_live_chat_id(&self) -> Result<Option<String>, Error> {
            let n = self.lookups.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                Err(Error::Platform("503 from liveBroadcasts".into()))
            } else if n < self.misses {
                Ok(None)
            } else {
                Ok(Some("chat-1".into()))
            }
        }

        async fn list_messages(&self, _live_chat_id: &str, _page_token: Option<&str>) -> Result<LiveChatPage, Error> {
            Ok(LiveChatPage::default())
        }

        async fn insert_message(&self, _live_chat_id: &str, _text: &str) -> Result<(), Error> {
            Ok(())
        }
    }

    fn platform_with(api: Arc<dyn LiveChatApi>, tx: mpsc::UnboundedSender<AdapterEnvelope>) -> YouTubePlatform {
        let cfg = RelayConfig {
            google_credentials_file: "/nonexistent/creds.json".into(),
            youtube_user_email: "streamer@example.com".into(),
            ..Default::default()
        };
        let sink = EventSink::new(AdapterSlot::YouTube, 0, tx);
        YouTubePlatform::from_config(&cfg, sink)
            .unwrap()
            .with_api(api)
            .with_lookup_delay(Duration::from_millis(5))
    }

    #[tokio::test]
    async fn keeps_looking_until_the_broadcast_appears() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let api = Arc::new(LateBroadcast { misses: 3, lookups: AtomicUsize::new(0) });
        let mut yt = platform_with(api.clone(), tx);

        yt.connect().await.unwrap();
        assert_eq!(yt.default_channel(), None);

        let env = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("no Connected event")
            .unwrap();
        assert_eq!(
            env.event,
            AdapterEvent::Connected { platform: Platform::YouTube, self_id: None }
        );
        assert_eq!(api.lookups.load(Ordering::SeqCst), 4);
        assert_eq!(yt.default_channel(), Some(ChannelRef::new("chat-1")));
        assert_eq!(yt.get_connection_status().await.unwrap(), ConnectionStatus::Connected);

        yt.disconnect().await.unwrap();
        assert_eq!(yt.default_channel(), None);
    }

    #[tokio::test]
    async fn disconnect_stops_the_lookup() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let api = Arc::new(LateBroadcast { misses: usize::MAX, lookups: AtomicUsize::new(0) });
        let mut yt = platform_with(api.clone(), tx);

        yt.connect().await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        yt.disconnect().await.unwrap();
        let seen = api.lookups.load(Ordering::SeqCst);
        assert!(seen >= 1);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(api.lookups.load(Ordering::SeqCst), seen);
        assert!(rx.try_recv().is_err());
    }
}

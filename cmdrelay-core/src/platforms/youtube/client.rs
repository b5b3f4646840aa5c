// File: cmdrelay-core/src/platforms/youtube/client.rs

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::Error;

pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Refresh a little before Google says the token dies.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Contents of the file named by `google_credentials_file`.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl GoogleCredentials {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::Config(format!("cannot read Google credentials '{}': {}", path.display(), e))
        })?;
        let creds: GoogleCredentials = serde_json::from_str(&raw)?;
        if creds.refresh_token.trim().is_empty() {
            return Err(Error::Auth("Google credentials carry no refresh_token".into()));
        }
        Ok(creds)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Debug, Deserialize)]
struct BroadcastList {
    #[serde(default)]
    items: Vec<Broadcast>,
}

#[derive(Debug, Deserialize)]
struct Broadcast {
    snippet: BroadcastSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BroadcastSnippet {
    live_chat_id: Option<String>,
}

/// One page of `liveChat/messages`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveChatPage {
    pub next_page_token: Option<String>,
    #[serde(default)]
    pub polling_interval_millis: u64,
    #[serde(default)]
    pub items: Vec<LiveChatItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveChatItem {
    pub id: String,
    pub snippet: LiveChatSnippet,
    pub author_details: Option<AuthorDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveChatSnippet {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub display_message: String,
    #[serde(default)]
    pub author_channel_id: String,
    pub text_message_details: Option<TextMessageDetails>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextMessageDetails {
    pub message_text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorDetails {
    pub channel_id: String,
    pub display_name: String,
}

impl LiveChatItem {
    /// Text for plain chat lines; None for superchats, joins and the like.
    pub fn text(&self) -> Option<&str> {
        if self.snippet.kind != "textMessageEvent" {
            return None;
        }
        match &self.snippet.text_message_details {
            Some(details) => Some(details.message_text.as_str()),
            None => Some(self.snippet.display_message.as_str()),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InsertSnippet<'a> {
    live_chat_id: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    text_message_details: TextMessageDetails,
}

#[derive(Serialize)]
struct InsertBody<'a> {
    snippet: InsertSnippet<'a>,
}

/// Thin wrapper over the YouTube Data API calls the relay needs, with the
/// access token refreshed from the stored refresh token on demand.
pub struct YouTubeApiClient {
    http: Arc<ReqwestClient>,
    credentials: GoogleCredentials,
    token: Mutex<Option<(String, Instant)>>,
    token_url: String,
    api_base: String,
}

impl YouTubeApiClient {
    pub fn new(credentials: GoogleCredentials) -> Self {
        Self {
            http: Arc::new(ReqwestClient::new()),
            credentials,
            token: Mutex::new(None),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            api_base: YOUTUBE_API_BASE.to_string(),
        }
    }

    pub fn with_endpoints(mut self, token_url: &str, api_base: &str) -> Self {
        self.token_url = token_url.to_string();
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    async fn access_token(&self) -> Result<String, Error> {
        let mut guard = self.token.lock().await;
        if let Some((token, expires_at)) = guard.as_ref() {
            if Instant::now() + TOKEN_EXPIRY_MARGIN < *expires_at {
                return Ok(token.clone());
            }
        }

        let resp = self
            .http
            .post(&self.token_url)
            .form(&[
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("refresh_token", self.credentials.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Auth(format!("Google token refresh: HTTP {} => {}", status, body)));
        }

        let parsed: TokenResponse = resp.json().await?;
        debug!("(YouTubeApiClient) access token refreshed, expires in {}s", parsed.expires_in);
        let expires_at = Instant::now() + Duration::from_secs(parsed.expires_in);
        *guard = Some((parsed.access_token.clone(), expires_at));
        Ok(parsed.access_token)
    }

    async fn check(resp: reqwest::Response, what: &str) -> Result<reqwest::Response, Error> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        Err(Error::Platform(format!("{}: HTTP {} => {}", what, status, body)))
    }

    /// The live chat of the account's active broadcast, if one is running.
    pub async fn find_live_chat_id(&self) -> Result<Option<String>, Error> {
        let token = self.access_token().await?;
        let resp = self
            .http
            .get(format!("{}/liveBroadcasts", self.api_base))
            .query(&[
                ("part", "snippet"),
                ("broadcastStatus", "active"),
                ("broadcastType", "all"),
            ])
            .bearer_auth(token)
            .send()
            .await?;
        let list: BroadcastList = Self::check(resp, "liveBroadcasts.list").await?.json().await?;
        Ok(list.items.into_iter().find_map(|b| b.snippet.live_chat_id))
    }

    pub async fn list_messages(
        &self,
        live_chat_id: &str,
        page_token: Option<&str>,
    ) -> Result<LiveChatPage, Error> {
        let token = self.access_token().await?;
        let mut query = vec![
            ("liveChatId", live_chat_id),
            ("part", "snippet,authorDetails"),
        ];
        if let Some(page) = page_token {
            query.push(("pageToken", page));
        }
        let resp = self
            .http
            .get(format!("{}/liveChat/messages", self.api_base))
            .query(&query)
            .bearer_auth(token)
            .send()
            .await?;
        Ok(Self::check(resp, "liveChatMessages.list").await?.json().await?)
    }

    pub async fn insert_message(&self, live_chat_id: &str, text: &str) -> Result<(), Error> {
        let token = self.access_token().await?;
        let body = InsertBody {
            snippet: InsertSnippet {
                live_chat_id,
                kind: "textMessageEvent",
                text_message_details: TextMessageDetails {
                    message_text: text.to_string(),
                },
            },
        };
        let resp = self
            .http
            .post(format!("{}/liveChat/messages", self.api_base))
            .query(&[("part", "snippet")])
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        Self::check(resp, "liveChatMessages.insert").await?;
        Ok(())
    }
}


/// The live chat calls the YouTube adapter makes.
#[async_trait]
pub trait LiveChatApi: Send + Sync {
    async fn find_live_chat_id(&self) -> Result<Option<String>, Error>;
    async fn list_messages(&self, live_chat_id: &str, page_token: Option<&str>) -> Result<LiveChatPage, Error>;
    async fn insert_message(&self, live_chat_id: &str, text: &str) -> Result<(), Error>;
}

#[async_trait]
impl LiveChatApi for YouTubeApiClient {
    async fn find_live_chat_id(&self) -> Result<Option<String>, Error> {
        YouTubeApiClient::find_live_chat_id(self).await
    }

    async fn list_messages(&self, live_chat_id: &str, page_token: Option<&str>) -> Result<LiveChatPage, Error> {
        YouTubeApiClient::list_messages(self, live_chat_id, page_token).await
    }

    async fn insert_message(&self, live_chat_id: &str, text: &str) -> Result<(), Error> {
        YouTubeApiClient::insert_message(self, live_chat_id, text).await
    }
}

// File: cmdrelay-core/src/platforms/twitch_helix/client.rs

use std::sync::Arc;
use reqwest::Client as ReqwestClient;

pub const HELIX_BASE_URL: &str = "https://api.twitch.tv/helix";

/// A small wrapper client for calling Helix endpoints.
pub struct TwitchHelixClient {
    http: Arc<ReqwestClient>,
    bearer_token: String,
    client_id: String,
    base_url: String,
}

impl TwitchHelixClient {
    /// Helix wants the bare token, so an IRC-style `oauth:` prefix is dropped.
    pub fn new(bearer_token: &str, client_id: &str) -> Self {
        Self {
            http: Arc::new(ReqwestClient::new()),
            bearer_token: bearer_token.trim().trim_start_matches("oauth:").to_string(),
            client_id: client_id.trim().to_string(),
            base_url: HELIX_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn bearer_token(&self) -> &str {
        &self.bearer_token
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn http_client(&self) -> Arc<ReqwestClient> {
        self.http.clone()
    }
}

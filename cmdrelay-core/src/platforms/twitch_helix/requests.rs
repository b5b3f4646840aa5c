// ========================================================
// File: cmdrelay-core/src/platforms/twitch_helix/requests.rs
// ========================================================
use serde::Deserialize;
use tracing::debug;

use crate::Error;
use super::client::TwitchHelixClient;

/// Response from "Get Streams" endpoint.
#[derive(Debug, Deserialize)]
pub struct StreamsResponse {
    pub data: Vec<StreamData>,
}

/// Single stream data record. Only the fields the monitor reads.
#[derive(Debug, Deserialize)]
pub struct StreamData {
    pub id: String,
    pub user_login: String,
    #[serde(rename = "type")]
    pub type_field: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub started_at: String,
}

impl StreamsResponse {
    /// The first entry whose type is "live", if any.
    pub fn live_stream(&self) -> Option<&StreamData> {
        self.data.iter().find(|s| s.type_field == "live")
    }
}

/// Calls `GET /streams?user_login=` and returns the live stream for that
/// login, or `None` when the channel is offline.
pub async fn fetch_live_stream(
    client: &TwitchHelixClient,
    user_login: &str,
) -> Result<Option<StreamData>, Error> {
    let url = format!("{}/streams", client.base_url());
    let resp = client
        .http_client()
        .get(&url)
        .query(&[("user_login", user_login)])
        .header("Client-Id", client.client_id())
        .header("Authorization", format!("Bearer {}", client.bearer_token()))
        .send()
        .await
        .map_err(|e| Error::Platform(format!("fetch_live_stream network error: {}", e)))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body_text = resp.text().await.unwrap_or_default();
        return Err(Error::Platform(format!(
            "fetch_live_stream: HTTP {} => {}",
            status, body_text
        )));
    }

    let body = resp.text().await?;
    let parsed: StreamsResponse = serde_json::from_str(&body)
        .map_err(|e| Error::Platform(format!("fetch_live_stream parse error: {}", e)))?;

    let live = parsed.data.into_iter().find(|s| s.type_field == "live");
    debug!("fetch_live_stream({}) => live={}", user_login, live.is_some());
    Ok(live)
}
